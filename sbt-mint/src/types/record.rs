//! Durable proof record published after a successful mint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One minted proof inside a [`ProofRecord`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofInfo {
    /// Hex commitment randomness of the minted output.
    pub proof_id: String,
    /// Image shown for the credential.
    pub blur_url: String,
    /// Reserved asset id the SBT was minted under (decimal).
    pub asset_id: String,
    /// Raw transaction descriptor returned by proof building.
    pub transaction_data: Value,
}

/// JSON document stored remotely for the relying party.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    /// Privacy-ledger address that minted the SBT.
    pub address: String,
    /// Credential type tag, e.g. `zkBAB`.
    pub token_type: String,
    pub proof_info: Vec<ProofInfo>,
}

impl ProofRecord {
    pub fn new(address: impl Into<String>, token_type: impl Into<String>, info: ProofInfo) -> Self {
        Self {
            address: address.into(),
            token_type: token_type.into(),
            proof_info: vec![info],
        }
    }

    /// The primary (first) proof entry, if any.
    pub fn primary(&self) -> Option<&ProofInfo> {
        self.proof_info.first()
    }
}
