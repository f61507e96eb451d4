//! Error taxonomy at the orchestrator boundary.
//!
//! Every lower-layer error converts into exactly one [`MintError`] kind.
//! The `Display` text is what the user sees.

use serde::Serialize;
use thiserror::Error;

use crate::credential::RegistryError;
use crate::ledger::LedgerError;
use crate::types::ProofError;
use crate::wallet::WalletError;

/// Shown when the user rejects the EVM wallet connection prompt.
pub const DECLINED_EVM_CONNECT: &str = "you declined to connect the EVM wallet";
/// Shown when the user rejects the privacy wallet authorization prompt.
pub const DECLINED_LEDGER_CONNECT: &str = "you declined to connect the privacy wallet";
/// Shown when the user rejects a typed-data or raw signature request.
pub const DECLINED_SIGNATURE: &str = "you declined the signature request";

/// Unmet precondition for an orchestrator action.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    #[error("the privacy wallet extension is not available")]
    NoWalletExtension,
    #[error("the privacy wallet exposes no accounts")]
    NoAccounts,
    #[error("no privacy wallet account matches the authenticated address")]
    AccountMismatch,
    #[error("the EVM wallet is not available")]
    NoEvmWallet,
    #[error("the EVM wallet returned no accounts")]
    NoEvmAccount,
    #[error("connect both wallets first")]
    NotConnected,
    #[error("no account-bound credential is bound to the EVM account")]
    NoCredential,
    #[error("the public balance must hold at least one whole token")]
    ZeroBalance,
    #[error("a mint is already in progress")]
    MintInProgress,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MintError {
    #[error("{0}")]
    PreconditionUnmet(Precondition),
    #[error("{0}")]
    UserDeclined(String),
    #[error("{0}")]
    RemoteUnavailable(String),
    /// No asset ids reserved for the account yet.
    #[error("not eligible yet: {0}")]
    DecodeAbsent(String),
    #[error("{0}")]
    ProtocolInvariant(String),
    /// The batch was included but its dispatch failed.
    #[error("transaction dispatch failed: {0}")]
    DispatchFailed(String),
}

impl MintError {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MintError::PreconditionUnmet(_) => "precondition_unmet",
            MintError::UserDeclined(_) => "user_declined",
            MintError::RemoteUnavailable(_) => "remote_unavailable",
            MintError::DecodeAbsent(_) => "decode_absent",
            MintError::ProtocolInvariant(_) => "protocol_invariant",
            MintError::DispatchFailed(_) => "dispatch_failed",
        }
    }

    /// Whether the user can fix the cause and retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MintError::ProtocolInvariant(_) | MintError::DispatchFailed(_)
        )
    }

    pub fn precondition(&self) -> Option<Precondition> {
        match self {
            MintError::PreconditionUnmet(p) => Some(*p),
            _ => None,
        }
    }

    /// Converts a wallet error, using `declined` as the message when the
    /// user rejected the prompt.
    pub fn from_wallet(err: WalletError, declined: &str) -> Self {
        match err {
            WalletError::UserRejected => MintError::UserDeclined(declined.to_string()),
            other => other.into(),
        }
    }
}

impl From<Precondition> for MintError {
    fn from(p: Precondition) -> Self {
        MintError::PreconditionUnmet(p)
    }
}

impl From<WalletError> for MintError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotInstalled => MintError::PreconditionUnmet(Precondition::NoWalletExtension),
            WalletError::UserRejected => MintError::UserDeclined("you declined the request".to_string()),
            WalletError::Protocol(_) => MintError::ProtocolInvariant(err.to_string()),
            WalletError::Provider { .. } | WalletError::Transport(_) => {
                MintError::RemoteUnavailable(err.to_string())
            }
        }
    }
}

impl From<LedgerError> for MintError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DecodeAbsent(msg) => MintError::DecodeAbsent(msg),
            LedgerError::Decode(_) => MintError::ProtocolInvariant(err.to_string()),
            LedgerError::Signer(wallet) => MintError::from_wallet(wallet, DECLINED_SIGNATURE),
            LedgerError::NoEndpoints
            | LedgerError::Connect { .. }
            | LedgerError::Transport(_)
            | LedgerError::Timeout { .. }
            | LedgerError::Rpc { .. } => MintError::RemoteUnavailable(err.to_string()),
        }
    }
}

impl From<ProofError> for MintError {
    fn from(err: ProofError) -> Self {
        MintError::ProtocolInvariant(err.to_string())
    }
}

impl From<RegistryError> for MintError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unavailable(_) => MintError::RemoteUnavailable(err.to_string()),
            RegistryError::Decode(_) => MintError::ProtocolInvariant(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_kinds() {
        let absent: MintError = LedgerError::DecodeAbsent("no reservation".into()).into();
        assert_eq!(absent.kind(), "decode_absent");
        assert!(absent.is_recoverable());
        assert_eq!(absent.to_string(), "not eligible yet: no reservation");

        let timeout: MintError = LedgerError::Timeout {
            method: "state_getStorage".into(),
        }
        .into();
        assert_eq!(timeout.kind(), "remote_unavailable");

        let signer: MintError = LedgerError::Signer(WalletError::UserRejected).into();
        assert_eq!(signer, MintError::UserDeclined(DECLINED_SIGNATURE.to_string()));
    }

    #[test]
    fn declined_prompts_get_contextual_messages() {
        let err = MintError::from_wallet(WalletError::UserRejected, DECLINED_EVM_CONNECT);
        assert_eq!(err.to_string(), DECLINED_EVM_CONNECT);

        let other = MintError::from_wallet(
            WalletError::Provider {
                code: -32603,
                message: "internal".into(),
            },
            DECLINED_EVM_CONNECT,
        );
        assert_eq!(other.kind(), "remote_unavailable");
    }

    #[test]
    fn proof_errors_are_invariant_violations() {
        let err: MintError = ProofError::Misaligned {
            transactions: 2,
            posts: 1,
        }
        .into();
        assert_eq!(err.kind(), "protocol_invariant");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn preconditions_render_their_message() {
        let err = MintError::from(Precondition::AccountMismatch);
        assert_eq!(err.precondition(), Some(Precondition::AccountMismatch));
        assert_eq!(
            err.to_string(),
            "no privacy wallet account matches the authenticated address"
        );
    }
}
