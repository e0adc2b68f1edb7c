//! Configuration types for Tion drivers
//!
//! [`StaticConfig`] holds the device, retry and timeout settings. It is read
//! once at startup from a TOML file and stays immutable afterwards.

mod paths;
mod static_config;

pub use paths::{default_config_path, resolve_config_path, CONFIG_PATH_ENV};
pub use static_config::{
    DeviceConfig, ModelKind, RetryConfig, StaticConfig, TimeoutConfig, ADDRESS_ENV,
};
