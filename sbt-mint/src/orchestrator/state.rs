//! Observable orchestrator state.
//!
//! The orchestrator never reports progress through return values alone;
//! every transition publishes an [`OrchestratorStatus`] snapshot that
//! front ends render.

use std::fmt;

use serde::Serialize;

use super::error::{MintError, Precondition};
use crate::types::{BlockHash, CredentialToken, EvmAddress, IdentitySession, ProofRecord};

/// Step of an in-flight mint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum MintStep {
    Syncing,
    RangeQuerying,
    ProofBuilding,
    /// Collecting signatures for entry `index` (1-based) of `total`.
    Signing { index: usize, total: usize },
    Submitting,
    AwaitingInclusion,
}

impl MintStep {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            MintStep::Syncing => "syncing",
            MintStep::RangeQuerying => "range_querying",
            MintStep::ProofBuilding => "proof_building",
            MintStep::Signing { .. } => "signing",
            MintStep::Submitting => "submitting",
            MintStep::AwaitingInclusion => "awaiting_inclusion",
        }
    }
}

impl fmt::Display for MintStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintStep::Signing { index, total } => write!(f, "signing({index}/{total})"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum MintPhase {
    Disconnected,
    LedgerConnected,
    CredentialConnected,
    Ready { eligible: bool },
    Minting { step: MintStep },
    Minted { block: BlockHash },
    Failed { kind: String, message: String },
}

/// User-facing rendering of a [`MintError`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precondition: Option<Precondition>,
    pub message: String,
    pub recoverable: bool,
}

impl From<&MintError> for ErrorView {
    fn from(err: &MintError) -> Self {
        Self {
            kind: err.kind(),
            precondition: err.precondition(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

/// Display strings of both balances (`-` when unavailable).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub public: String,
    pub private: String,
}

/// Snapshot published on every transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrchestratorStatus {
    #[serde(flatten)]
    pub phase: MintPhase,
    pub session: Option<IdentitySession>,
    pub evm_address: Option<EvmAddress>,
    pub credential: Option<CredentialToken>,
    pub balances: BalanceView,
    pub eligible: bool,
    pub last_error: Option<ErrorView>,
    pub record: Option<ProofRecord>,
}

impl OrchestratorStatus {
    pub fn is_minting(&self) -> bool {
        matches!(self.phase, MintPhase::Minting { .. })
    }
}

impl Default for OrchestratorStatus {
    fn default() -> Self {
        Self {
            phase: MintPhase::Disconnected,
            session: None,
            evm_address: None,
            credential: None,
            balances: BalanceView {
                public: crate::types::balance::BALANCE_PLACEHOLDER.to_string(),
                private: crate::types::balance::BALANCE_PLACEHOLDER.to_string(),
            },
            eligible: false,
            last_error: None,
            record: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phase_flattens_into_status() {
        let status = OrchestratorStatus {
            phase: MintPhase::Minting {
                step: MintStep::Signing { index: 1, total: 2 },
            },
            ..OrchestratorStatus::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["phase"], "minting");
        assert_eq!(value["step"], json!({ "step": "signing", "index": 1, "total": 2 }));
        assert_eq!(value["balances"]["public"], "-");
    }

    #[test]
    fn error_view_carries_precondition() {
        let view = ErrorView::from(&MintError::PreconditionUnmet(Precondition::ZeroBalance));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["kind"], "precondition_unmet");
        assert_eq!(value["precondition"], "zero_balance");
        assert_eq!(value["recoverable"], true);
    }

    #[test]
    fn signing_step_displays_progress() {
        assert_eq!(MintStep::Signing { index: 2, total: 3 }.to_string(), "signing(2/3)");
        assert_eq!(MintStep::AwaitingInclusion.to_string(), "awaiting_inclusion");
    }
}
