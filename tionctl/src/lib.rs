//! Tion CLI Library
//!
//! Command definitions, handlers and output formatting for `tionctl`.
//!
//! ```no_run
//! use tion_core::StaticConfig;
//! use tionctl::cli::build_driver;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = StaticConfig::default();
//! let mut driver = build_driver(&config).await?;
//! let state = driver.get(false).await?;
//! println!("Fan speed: {}", state.fan_speed);
//! # Ok(())
//! # }
//! ```

pub mod cli;

// Internal formatting functions - not part of public API
#[doc(hidden)]
pub mod format;
