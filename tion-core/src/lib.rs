//! Tion Core Library
//!
//! Shared types, decoders, errors and configuration for the Tion breezer
//! driver. Transport and device-model code lives in `tion-hardware`.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    default_config_path, resolve_config_path, DeviceConfig, ModelKind, RetryConfig, StaticConfig,
    TimeoutConfig,
};
pub use error::*;
pub use types::*;
