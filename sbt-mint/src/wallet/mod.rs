//! Privacy-ledger wallet extension seam.
//!
//! The wallet extension owns key custody and proof generation; this crate
//! only consumes it. The traits here mirror the extension surface:
//!
//! - [`WalletExtension::enable`] hands out an [`InjectedWallet`],
//! - which exposes accounts, a raw-byte signer, an extrinsic signer and
//! - a [`PrivateWallet`] for syncing, shielded balances, proof building
//!   and wallet-state notifications.
//!
//! [`monitor`] and [`balance`] build on top of these traits; [`bridge`]
//! implements them against a JSON-RPC bridge to the extension.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jsonrpc::JsonRpcError;
use crate::types::{
    AssetId, InjectedAccount, MintTransaction, RawProofBundle, SbtBuildRequest, Sr25519Signature,
};

pub mod balance;
pub mod bridge;
pub mod monitor;

pub use balance::BalanceAggregator;
pub use bridge::{BridgeInjectedWallet, BridgeWalletExtension};
pub use monitor::WalletStateMonitor;

/// Standard wallet-provider error code for "user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Errors surfaced by wallet extensions and wallet providers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    /// No extension / provider is reachable.
    #[error("wallet extension is not available")]
    NotInstalled,
    /// The user rejected the prompt (provider code 4001).
    #[error("user rejected the request")]
    UserRejected,
    /// Any other provider-reported error.
    #[error("wallet error {code}: {message}")]
    Provider { code: i64, message: String },
    #[error("wallet transport error: {0}")]
    Transport(String),
    #[error("unexpected wallet response: {0}")]
    Protocol(String),
}

impl WalletError {
    /// Maps a provider error code, singling out [`USER_REJECTED_CODE`].
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        if code == USER_REJECTED_CODE {
            WalletError::UserRejected
        } else {
            WalletError::Provider {
                code,
                message: message.into(),
            }
        }
    }
}

impl From<JsonRpcError> for WalletError {
    fn from(e: JsonRpcError) -> Self {
        match e {
            JsonRpcError::Rpc { code, message, .. } => WalletError::from_code(code, message),
            JsonRpcError::Transport(msg) => WalletError::Transport(msg),
            JsonRpcError::Status(status) => WalletError::Transport(format!("HTTP status {status}")),
            JsonRpcError::Protocol(msg) => WalletError::Protocol(msg),
        }
    }
}

/// Snapshot of the private wallet's readiness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    #[serde(default)]
    pub is_wallet_ready: bool,
    #[serde(default)]
    pub is_wallet_busy: bool,
}

impl WalletState {
    /// Ready and not busy: the only state in which balances may be read.
    pub fn is_idle(&self) -> bool {
        self.is_wallet_ready && !self.is_wallet_busy
    }
}

/// Callback invoked with every wallet-state notification.
pub type WalletStateListener = Arc<dyn Fn(WalletState) + Send + Sync>;

/// Handle that cancels a wallet-state subscription.
///
/// Calling [`Unsubscribe::call`] more than once is a no-op.
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn call(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Raw payload handed to the privacy-ledger signer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RawPayload {
    pub address: String,
    /// `0x`-prefixed hex of the bytes to sign.
    pub data: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl RawPayload {
    pub fn bytes(address: impl Into<String>, data: &[u8]) -> Self {
        Self {
            address: address.into(),
            data: format!("0x{}", hex::encode(data)),
            kind: "bytes",
        }
    }
}

/// Request to sign one batch extrinsic wrapping the given calls.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct BatchSigningRequest<'a> {
    pub address: &'a str,
    pub nonce: u64,
    pub calls: &'a [MintTransaction],
}

/// Signs arbitrary bytes with a privacy-ledger account key.
#[async_trait]
pub trait RawSigner: Send + Sync {
    async fn sign_raw(&self, payload: &RawPayload) -> Result<Sr25519Signature, WalletError>;
}

/// Produces a signed, SCALE-encoded `utility.batch` extrinsic.
#[async_trait]
pub trait ExtrinsicSigner: Send + Sync {
    async fn sign_batch(&self, request: &BatchSigningRequest<'_>) -> Result<Vec<u8>, WalletError>;
}

/// Private (shielded) wallet exposed by the extension.
#[async_trait]
pub trait PrivateWallet: Send + Sync {
    /// Synchronizes local proof-generation state with the chain.
    async fn wallet_sync(&self) -> Result<(), WalletError>;

    /// Raw (unscaled) shielded balance, `None` when unavailable.
    async fn zk_balance(&self, network: &str, asset_id: &AssetId) -> Result<Option<String>, WalletError>;

    /// Builds SBT transfer posts for the requested asset ids.
    async fn multi_sbt_post_build(&self, request: &SbtBuildRequest) -> Result<RawProofBundle, WalletError>;

    /// Registers `listener` for wallet-state changes.
    fn subscribe_wallet_state(&self, listener: WalletStateListener) -> Unsubscribe;
}

/// Handle returned by [`WalletExtension::enable`].
#[async_trait]
pub trait InjectedWallet: Send + Sync {
    async fn accounts(&self) -> Result<Vec<InjectedAccount>, WalletError>;

    fn raw_signer(&self) -> Arc<dyn RawSigner>;

    fn extrinsic_signer(&self) -> Arc<dyn ExtrinsicSigner>;

    fn private_wallet(&self) -> Arc<dyn PrivateWallet>;
}

/// Entry point of the privacy-ledger wallet extension.
#[async_trait]
pub trait WalletExtension: Send + Sync {
    async fn enable(&self, app_name: &str) -> Result<Arc<dyn InjectedWallet>, WalletError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn idle_requires_ready_and_not_busy() {
        let ready = WalletState {
            is_wallet_ready: true,
            is_wallet_busy: false,
        };
        assert!(ready.is_idle());
        assert!(!WalletState { is_wallet_busy: true, ..ready }.is_idle());
        assert!(!WalletState::default().is_idle());
    }

    #[test]
    fn wallet_state_reads_extension_field_names() {
        let state: WalletState =
            serde_json::from_str(r#"{ "isWalletReady": true, "isWalletBusy": false, "isWalletInitialized": true }"#)
                .unwrap();
        assert!(state.is_idle());
    }

    #[test]
    fn unsubscribe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut handle = Unsubscribe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.call();
        handle.call();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
    }

    #[test]
    fn provider_code_4001_is_user_rejection() {
        assert_eq!(WalletError::from_code(4001, "nope"), WalletError::UserRejected);
        assert_eq!(
            WalletError::from_code(-32603, "internal"),
            WalletError::Provider {
                code: -32603,
                message: "internal".to_string()
            }
        );
    }

    #[test]
    fn raw_payload_is_hex_bytes() {
        let payload = RawPayload::bytes("addr", &[0xde, 0xad]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["data"], "0xdead");
        assert_eq!(json["type"], "bytes");
    }
}
