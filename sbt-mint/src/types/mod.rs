//! Core domain types shared by the adapters and the orchestrator.
//!
//! This module defines strongly-typed addresses, public keys, block hashes,
//! fixed-point balances, asset identifiers and the proof/record structures
//! that flow through a mint attempt. The goal is to avoid "naked" strings
//! and byte buffers in public APIs and instead use domain-specific newtypes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod address;
pub mod asset;
pub mod balance;
pub mod proof;
pub mod record;
pub mod session;

pub use address::{AddressError, EvmAddress, PUBLIC_KEY_LEN, PublicKey, decode_account, decode_ss58, encode_ss58};
pub use asset::{AssetId, AssetIdRange};
pub use balance::{Balance, Balances, DEFAULT_DECIMALS};
pub use proof::{
    MintTransaction, ProofBundle, ProofBytes, ProofEntry, ProofError, RawProofBundle,
    SbtBuildRequest, SbtInfo, SignatureBinding, TransferPost,
};
pub use record::{ProofInfo, ProofRecord};
pub use session::{CredentialToken, EvmSignature, IdentitySession, InjectedAccount, Sr25519Signature};

/// Length in bytes of substrate block hashes.
pub const HASH_LEN: usize = 32;

/// 256-bit block hash of the privacy ledger.
///
/// The genesis hash is used as the `salt` of the typed-data signing domain,
/// so it is kept as raw bytes until the signing payload is assembled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BlockHash(pub [u8; HASH_LEN]);

impl BlockHash {
    /// Parses a `0x`-prefixed (or bare) 32-byte hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(strip_hex_prefix(s)).ok()?;
        let arr: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(BlockHash(arr))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Canonical `0x`-prefixed lowercase hex form.
    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BlockHash::from_hex(&s).ok_or_else(|| serde::de::Error::custom("expected 32-byte hex hash"))
    }
}

/// Strips an optional `0x` / `0X` prefix.
pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Encodes bytes as `0x`-prefixed lowercase hex.
pub(crate) fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decodes a `0x`-prefixed (or bare) hex string.
pub(crate) fn from_prefixed_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(strip_hex_prefix(s))
}
