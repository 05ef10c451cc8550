//! Stowage Core Library
//!
//! Shared types for the stowage storage crates: the backend kind tag, validated
//! per-backend configuration and tracing setup.

pub mod config;
pub mod storage_types;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ConfigError, LocalConfig, S3Config, StorageConfig};
pub use storage_types::StorageKind;
