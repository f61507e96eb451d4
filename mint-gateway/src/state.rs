//! Shared application state.

use std::sync::Arc;

use sbt_mint::{MetricsRegistry, MintOrchestrator};

/// Shared state held by the request handlers.
///
/// Wrapped in an [`Arc`] and passed to handlers via Axum's `State`
/// extractor.
pub struct AppState {
    /// The single orchestrator driven by this gateway.
    pub orchestrator: Arc<MintOrchestrator>,
    /// Registry served on `/metrics`; the orchestrator records into it.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
