//! Error types for Tion drivers

use crate::types::ActionKind;
use thiserror::Error;
use uuid::Uuid;

/// Core error type for Tion operations
#[derive(Error, Debug)]
pub enum TionError {
    /// Connect, disconnect or subscribe failed at the transport level
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Transport write failed
    #[error("Write error: {0}")]
    Write(String),

    /// A transport call or notification wait exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Response frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An action kept failing until the retry budget ran out
    #[error("{message}")]
    Device { action: ActionKind, message: String },

    /// No Bluetooth adapter available
    #[error("No Bluetooth adapter found")]
    AdapterNotFound,

    /// No peripheral with the requested address was seen
    #[error("Peripheral not found: {0}")]
    PeripheralNotFound(String),

    /// The peripheral does not expose a required characteristic
    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Tion operations
pub type Result<T> = std::result::Result<T, TionError>;

impl TionError {
    /// Whether retrying the same action could plausibly succeed.
    ///
    /// Malformed frames and bad arguments will fail the same way every time,
    /// so they bypass the retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            TionError::Connectivity(_)
            | TionError::Write(_)
            | TionError::Timeout(_)
            | TionError::PeripheralNotFound(_)
            | TionError::CharacteristicNotFound(_)
            | TionError::Io(_) => true,
            TionError::Decode(_)
            | TionError::InvalidInput(_)
            | TionError::Device { .. }
            | TionError::AdapterNotFound
            | TionError::Config(_) => false,
        }
    }

    /// The action identifier carried by an exhausted-retries error
    pub fn action(&self) -> Option<&ActionKind> {
        match self {
            TionError::Device { action, .. } => Some(action),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for TionError {
    fn from(err: toml::de::Error) -> Self {
        TionError::Config(err.to_string())
    }
}
