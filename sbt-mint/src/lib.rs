//! Identity-binding SBT mint library crate.
//!
//! Proves that one person controls both a privacy-ledger account and an EVM
//! account holding an account-bound credential, then mints a private
//! soul-bound token on the privacy ledger whose proof embeds both
//! signatures:
//!
//! - strongly-typed domain types (`types`),
//! - account matching against a pre-authenticated address (`matcher`),
//! - privacy wallet extension seams, state monitor and balances (`wallet`),
//! - the privacy-ledger RPC client and storage decoding (`ledger`),
//! - the EVM credential wallet and registry lookup (`credential`),
//! - proof record publication (`publisher`),
//! - Prometheus-based metrics (`metrics`),
//! - and the orchestrator state machine that ties them together
//!   (`orchestrator`).
//!
//! Binaries wire concrete adapters into a [`MintContext`] and drive a
//! [`MintOrchestrator`].

pub mod config;
pub mod credential;
pub mod jsonrpc;
pub mod ledger;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod publisher;
pub mod types;
pub mod wallet;

// Re-export top-level configuration types.
pub use config::{
    ConfigError, CredentialConfig, LedgerConfig, MintConfig, RecordConfig, WalletConfig,
};

// Re-export the orchestrator surface.
pub use orchestrator::{
    BalanceView, ErrorView, MintContext, MintError, MintOrchestrator, MintPhase, MintStep,
    OrchestratorStatus, Precondition,
};

// Re-export adapter traits and their network-backed implementations.
pub use credential::{
    CredentialRegistry, CredentialWallet, EvmProvider, HttpCredentialRegistry, HttpEvmProvider,
    RegistryError,
};
pub use ledger::{
    InclusionEvent, LedgerClient, LedgerConnector, LedgerError, NonceMode, WsLedgerClient,
    WsLedgerConnector,
};
pub use publisher::{HttpRecordStore, ProofRecordPublisher, RecordStore, StoreError};
pub use wallet::{
    BridgeWalletExtension, InjectedWallet, PrivateWallet, WalletError, WalletExtension,
};

pub use matcher::{MatchedAccount, find_matching_account};
pub use metrics::{MetricsRegistry, MintMetrics};

// Re-export domain types at the crate root for convenience.
pub use types::*;
