//! Top-level configuration for the mint orchestrator.
//!
//! This module aggregates configuration for:
//!
//! - the privacy ledger (RPC candidates, token decimals, network, asset),
//! - the EVM credential side (registry RPC, registry contract, wallet provider),
//! - the private-wallet extension bridge,
//! - proof record storage.
//!
//! Defaults carry the production deployment constants. [`MintConfig::from_env`]
//! overrides individual values from `SBT_*` environment variables.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::types::{AssetId, DEFAULT_DECIMALS, EvmAddress};

/// BAB (Binance Account Bound) token registry on BSC.
pub const BAB_REGISTRY_ADDRESS: &str = "0x2B09d47D550061f995A3b5C6F0Fd58005215D7c8";

#[derive(Debug, Error)]
#[error("invalid value for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

/// Privacy-ledger settings.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// WebSocket RPC candidates; one is picked per session.
    pub rpc_endpoints: Vec<String>,
    /// Decimal exponent of the native token.
    pub decimals: u32,
    /// Network name passed to the private wallet.
    pub network: String,
    /// Asset whose shielded balance is displayed.
    pub asset_id: AssetId,
    pub request_timeout: Duration,
    /// Longest wait between submission and the batch landing in a block.
    pub inclusion_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_endpoints: vec!["wss://crispy.baikal.testnet.calamari.systems".to_string()],
            decimals: DEFAULT_DECIMALS,
            network: "Calamari".to_string(),
            asset_id: AssetId::from(1u128),
            request_timeout: Duration::from_secs(30),
            inclusion_timeout: Duration::from_secs(180),
        }
    }
}

/// EVM credential settings.
#[derive(Clone, Debug)]
pub struct CredentialConfig {
    /// Public JSON-RPC endpoint used for registry reads.
    pub evm_rpc_url: String,
    pub registry_address: EvmAddress,
    /// JSON-RPC endpoint fronting the user's EVM wallet.
    pub provider_url: String,
    /// Signing prompts wait on the user, so this is generous.
    pub request_timeout: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        let registry_address = BAB_REGISTRY_ADDRESS
            .parse()
            .expect("hard-coded registry address should parse");
        Self {
            evm_rpc_url: "https://bsc-dataseed.binance.org".to_string(),
            registry_address,
            provider_url: "http://127.0.0.1:1248".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Private-wallet extension bridge settings.
#[derive(Clone, Debug)]
pub struct WalletConfig {
    pub bridge_url: String,
    /// Name the extension shows in its authorization prompt.
    pub app_name: String,
    /// Proof building runs inside this window.
    pub request_timeout: Duration,
    pub state_poll_interval: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:9988".to_string(),
            app_name: "DTIM".to_string(),
            request_timeout: Duration::from_secs(300),
            state_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Proof record storage settings.
#[derive(Clone, Debug)]
pub struct RecordConfig {
    pub base_url: String,
    /// Key prefix; records live at `<prefix>/<expected-address>`.
    pub prefix: String,
    /// Credential image embedded in each record.
    pub image_url: String,
    pub token_type: String,
    pub request_timeout: Duration,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wetee-dtim-zkbab.oss-cn-hongkong.aliyuncs.com".to_string(),
            prefix: "kyc".to_string(),
            image_url: "https://npo-cdn.asmatch.xyz/zkBAB_Front.jpg".to_string(),
            token_type: "zkBAB".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Aggregated orchestrator configuration.
#[derive(Clone, Debug, Default)]
pub struct MintConfig {
    pub ledger: LedgerConfig,
    pub credential: CredentialConfig,
    pub wallet: WalletConfig,
    pub records: RecordConfig,
}

impl MintConfig {
    /// Defaults overridden by any `SBT_*` variables present in the
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(v) = lookup("SBT_LEDGER_RPC") {
            cfg.ledger.rpc_endpoints = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("SBT_DECIMALS") {
            cfg.ledger.decimals = parse("SBT_DECIMALS", &v)?;
        }
        if let Some(v) = lookup("SBT_NETWORK") {
            cfg.ledger.network = v;
        }
        if let Some(v) = lookup("SBT_ASSET_ID") {
            cfg.ledger.asset_id = parse("SBT_ASSET_ID", &v)?;
        }
        if let Some(v) = lookup("SBT_LEDGER_TIMEOUT_SECS") {
            cfg.ledger.request_timeout = Duration::from_secs(parse("SBT_LEDGER_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("SBT_INCLUSION_TIMEOUT_SECS") {
            cfg.ledger.inclusion_timeout =
                Duration::from_secs(parse("SBT_INCLUSION_TIMEOUT_SECS", &v)?);
        }

        if let Some(v) = lookup("SBT_EVM_RPC_URL") {
            cfg.credential.evm_rpc_url = v;
        }
        if let Some(v) = lookup("SBT_REGISTRY_ADDRESS") {
            cfg.credential.registry_address = parse("SBT_REGISTRY_ADDRESS", &v)?;
        }
        if let Some(v) = lookup("SBT_EVM_PROVIDER_URL") {
            cfg.credential.provider_url = v;
        }

        if let Some(v) = lookup("SBT_WALLET_BRIDGE_URL") {
            cfg.wallet.bridge_url = v;
        }
        if let Some(v) = lookup("SBT_APP_NAME") {
            cfg.wallet.app_name = v;
        }

        if let Some(v) = lookup("SBT_RECORD_BASE_URL") {
            cfg.records.base_url = v;
        }
        if let Some(v) = lookup("SBT_RECORD_PREFIX") {
            cfg.records.prefix = v;
        }
        if let Some(v) = lookup("SBT_RECORD_IMAGE_URL") {
            cfg.records.image_url = v;
        }
        if let Some(v) = lookup("SBT_TOKEN_TYPE") {
            cfg.records.token_type = v;
        }

        Ok(cfg)
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        var,
        reason: e.to_string(),
    })
}
