//! Infrastructure - configuration and metrics
//!
//! - `config` - Application configuration (TOML loading, env overrides, defaults)
//! - `metrics` - Lock-free metrics collection

pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use config::{Config, LogFormat, ScannerSource};
pub use metrics::Metrics;
