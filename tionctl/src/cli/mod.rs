//! CLI module for tionctl
//!
//! Command definitions and their handlers.

pub mod commands;
pub mod handlers;

pub use commands::*;
pub use handlers::*;
