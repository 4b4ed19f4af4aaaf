//! Infrastructure - configuration, metrics, and reconnect policy
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, env overrides, defaults)
//! - `metrics` - Lock-free channel counters
//! - `backoff` - Capped exponential backoff for reconnects

pub mod backoff;
pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use backoff::Backoff;
pub use config::Config;
pub use metrics::Metrics;
