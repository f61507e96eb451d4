//! Privacy-ledger session adapter.
//!
//! The orchestrator talks to the ledger only through [`LedgerConnector`]
//! and [`LedgerClient`]. The production implementation in [`rpc`] speaks
//! WebSocket JSON-RPC to a substrate node; [`storage`] holds the storage-key
//! derivation and SCALE decoding it needs.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use rand::Rng;
use thiserror::Error;

use crate::types::{AssetIdRange, Balance, BlockHash, MintTransaction, PublicKey};
use crate::wallet::{ExtrinsicSigner, WalletError};

pub mod rpc;
pub mod storage;

pub use rpc::{WsLedgerClient, WsLedgerConnector};

/// Errors from the ledger adapter.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("no ledger RPC endpoints configured")]
    NoEndpoints,
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("ledger transport error: {0}")]
    Transport(String),
    #[error("ledger request {method} timed out")]
    Timeout { method: String },
    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// The queried storage item does not exist.
    #[error("{0}")]
    DecodeAbsent(String),
    #[error("failed to decode ledger response: {0}")]
    Decode(String),
    #[error("extrinsic signing failed: {0}")]
    Signer(#[from] WalletError),
}

/// Nonce selection for submitted extrinsics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NonceMode {
    /// Let the node assign the next valid index, including pool-pending ones.
    #[default]
    Auto,
    Explicit(u64),
}

/// Lifecycle event of a submitted extrinsic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InclusionEvent {
    Ready,
    Broadcast,
    InBlock(BlockHash),
    Finalized(BlockHash),
    /// Included, but the dispatch itself failed.
    DispatchFailed(String),
    /// Dropped, invalid or usurped before inclusion.
    Dropped(String),
}

impl InclusionEvent {
    /// Block hash for in-block or finalized events.
    pub fn included_in(&self) -> Option<&BlockHash> {
        match self {
            InclusionEvent::InBlock(h) | InclusionEvent::Finalized(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Display for InclusionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InclusionEvent::Ready => f.write_str("ready"),
            InclusionEvent::Broadcast => f.write_str("broadcast"),
            InclusionEvent::InBlock(h) => write!(f, "inBlock({})", h.to_hex()),
            InclusionEvent::Finalized(h) => write!(f, "finalized({})", h.to_hex()),
            InclusionEvent::DispatchFailed(msg) => write!(f, "dispatchFailed({msg})"),
            InclusionEvent::Dropped(msg) => write!(f, "dropped({msg})"),
        }
    }
}

/// Stream of inclusion events for one submitted batch.
pub type InclusionStream = BoxStream<'static, Result<InclusionEvent, LedgerError>>;

/// Connected ledger session with a bound extrinsic signer.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Free balance of `account`. `None` when the account data holds no
    /// usable balance field.
    async fn free_balance(&self, account: &PublicKey) -> Result<Option<Balance>, LedgerError>;

    /// Asset ids reserved for `account`; [`LedgerError::DecodeAbsent`] when
    /// no reservation exists.
    async fn reserved_asset_range(&self, account: &PublicKey) -> Result<AssetIdRange, LedgerError>;

    async fn genesis_hash(&self) -> Result<BlockHash, LedgerError>;

    /// Signs all `transactions` as one batch extrinsic from `account` and
    /// submits it, returning its inclusion events.
    async fn submit_batch(
        &self,
        transactions: Vec<MintTransaction>,
        account: &str,
        nonce: NonceMode,
    ) -> Result<InclusionStream, LedgerError>;
}

/// Opens ledger sessions.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(
        &self,
        candidates: &[String],
        signer: Arc<dyn ExtrinsicSigner>,
    ) -> Result<Arc<dyn LedgerClient>, LedgerError>;
}

/// Picks the RPC endpoint for a connection attempt.
pub trait EndpointSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a str>;
}

/// Uniformly random choice among the candidates.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomEndpoint;

impl EndpointSelector for RandomEndpoint {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[idx].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_endpoint_stays_within_candidates() {
        let candidates = vec!["wss://a".to_string(), "wss://b".to_string()];
        for _ in 0..32 {
            let picked = RandomEndpoint.select(&candidates).unwrap();
            assert!(candidates.iter().any(|c| c == picked));
        }
        assert_eq!(RandomEndpoint.select(&[]), None);
    }

    #[test]
    fn only_block_events_carry_inclusion() {
        let hash = BlockHash([7; 32]);
        assert_eq!(InclusionEvent::InBlock(hash).included_in(), Some(&hash));
        assert_eq!(InclusionEvent::Finalized(hash).included_in(), Some(&hash));
        assert_eq!(InclusionEvent::Ready.included_in(), None);
        assert_eq!(InclusionEvent::Dropped("usurped".into()).included_in(), None);
    }
}
