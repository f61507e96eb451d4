//! Gateway configuration.
//!
//! Only the HTTP listen address lives here. Orchestrator settings come from
//! `sbt_mint::MintConfig::from_env()`.

use std::env;
use std::net::SocketAddr;

/// Variable that overrides [`ApiConfig::listen_addr`].
pub const LISTEN_ADDR_VAR: &str = "SBT_GATEWAY_ADDR";

/// Configuration for the gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl ApiConfig {
    /// Defaults, with the listen address taken from `SBT_GATEWAY_ADDR` when set.
    pub fn from_env() -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Ok(addr) = env::var(LISTEN_ADDR_VAR) {
            cfg.listen_addr = addr
                .parse()
                .map_err(|e| format!("invalid {LISTEN_ADDR_VAR} {addr:?}: {e}"))?;
        }
        Ok(cfg)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        // All interfaces, so a container port mapping reaches it.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self { listen_addr: addr }
    }
}
