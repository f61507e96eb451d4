//! Metrics for mint attempts.
//!
//! This module defines Prometheus-compatible metrics for the orchestrator.
//! The registry is encoded on demand with [`MetricsRegistry::gather_text`];
//! the gateway serves the result at `/metrics`.
//!
//! Typical usage:
//!
//! ```ignore
//! use std::sync::Arc;
//! use sbt_mint::metrics::MetricsRegistry;
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! registry.mint.attempts.inc();
//! let body = registry.gather_text();
//! ```

pub mod prometheus;

pub use self::prometheus::{MetricsRegistry, MintMetrics};
