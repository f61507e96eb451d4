//! Session-scoped identity data and signature newtypes.

use serde::{Deserialize, Serialize};

use super::{PublicKey, from_prefixed_hex, to_prefixed_hex};

/// Account exposed by the privacy-ledger wallet extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedAccount {
    /// SS58 address of the public account.
    pub address: String,
    /// Shielded (zk) address paired with the account, when exposed.
    #[serde(rename = "zkAddress", default)]
    pub zk_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Identity established by a successful connect.
///
/// Exclusively owned by the orchestrator and rebuilt on every reconnect;
/// nothing here is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdentitySession {
    pub address: String,
    pub zk_address: Option<String>,
    pub public_key: PublicKey,
    /// Address supplied by the pre-authenticated session link; also the
    /// key the proof record is stored under.
    pub expected_address: String,
}

/// Token id of the account-bound credential on the EVM registry (decimal).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialToken(String);

impl CredentialToken {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signature returned by `eth_signTypedData_v4`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvmSignature(pub Vec<u8>);

impl EvmSignature {
    pub fn from_hex(s: &str) -> Option<Self> {
        from_prefixed_hex(s).ok().map(EvmSignature)
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }
}

/// Raw sr25519 signature produced by the privacy-ledger signer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sr25519Signature(pub Vec<u8>);

impl Sr25519Signature {
    pub fn from_hex(s: &str) -> Option<Self> {
        from_prefixed_hex(s).ok().map(Sr25519Signature)
    }
}
