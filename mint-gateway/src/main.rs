//! Mint gateway binary.
//!
//! Exposes the identity-binding mint orchestrator over HTTP:
//!
//! - `GET /health`
//! - `POST /connect?address=<expected>`
//! - `POST /credential/connect`
//! - `POST /balances/refresh`
//! - `POST /mint`
//! - `GET /status`
//! - `GET /record?address=<expected>`
//! - `GET /metrics`
//!
//! The orchestrator talks to the privacy ledger over WebSocket JSON-RPC,
//! to the wallet extension and EVM wallet through their JSON-RPC bridges,
//! and publishes proof records to object storage.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use tokio::signal;

use config::ApiConfig;
use sbt_mint::{
    BridgeWalletExtension, CredentialWallet, HttpCredentialRegistry, HttpEvmProvider,
    HttpRecordStore, MetricsRegistry, MintConfig, MintContext, MintOrchestrator,
    ProofRecordPublisher, WsLedgerConnector,
};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "mint_gateway=info,sbt_mint=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env()?;
    let mint_cfg = MintConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    // ---------------------------
    // Adapters
    // ---------------------------

    let extension = BridgeWalletExtension::new(&mint_cfg.wallet)
        .map_err(|e| format!("failed to create wallet bridge client: {e}"))?;

    let ledger = WsLedgerConnector::new(mint_cfg.ledger.request_timeout);

    let provider = HttpEvmProvider::new(
        mint_cfg.credential.provider_url.clone(),
        mint_cfg.credential.request_timeout,
    )
    .map_err(|e| format!("failed to create EVM provider client: {e}"))?;

    let registry = HttpCredentialRegistry::new(
        mint_cfg.credential.evm_rpc_url.clone(),
        mint_cfg.credential.registry_address,
        mint_cfg.ledger.request_timeout,
    )
    .map_err(|e| format!("failed to create credential registry client: {e}"))?;

    let store = HttpRecordStore::new(
        mint_cfg.records.base_url.clone(),
        mint_cfg.records.request_timeout,
    )
    .map_err(|e| format!("failed to create record store client: {e}"))?;

    // ---------------------------
    // Orchestrator + shared state
    // ---------------------------

    let ctx = MintContext {
        extension: Arc::new(extension),
        ledger: Arc::new(ledger),
        credential: Arc::new(CredentialWallet::new(Arc::new(provider), Arc::new(registry))),
        publisher: Arc::new(ProofRecordPublisher::new(
            Arc::new(store),
            mint_cfg.records.prefix.clone(),
        )),
        metrics: metrics.clone(),
    };

    tracing::info!(
        endpoints = ?mint_cfg.ledger.rpc_endpoints,
        network = %mint_cfg.ledger.network,
        registry = %mint_cfg.credential.registry_address,
        "orchestrator configured"
    );

    let app_state: SharedState = Arc::new(AppState {
        orchestrator: Arc::new(MintOrchestrator::new(ctx, mint_cfg)),
        metrics,
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = routes::router(app_state);

    tracing::info!("mint gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
