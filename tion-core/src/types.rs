//! Core types and data structures for Tion drivers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Reserved address that selects a fully simulated device.
pub const SIMULATED_ADDRESS: &str = "dummy";

/// Labels for on/off style status codes, indexed by code
pub const STATUS_LABELS: [&str; 2] = ["off", "on"];

/// Label returned for any code outside a label table
pub const UNKNOWN_LABEL: &str = "unknown";

/// Bytes at or above this value encode negative temperatures
pub const TEMPERATURE_BARRIER: u8 = 0b1000_0000;

/// Identity of the device a driver talks to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceAddress {
    /// A real peripheral, identified by its hardware address
    Hardware(String),
    /// No peripheral at all; every transport operation is skipped
    Simulated,
}

impl DeviceAddress {
    /// Parse an address string; `"dummy"` selects simulated mode
    pub fn parse(address: &str) -> Self {
        if address == SIMULATED_ADDRESS {
            DeviceAddress::Simulated
        } else {
            DeviceAddress::Hardware(address.to_string())
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, DeviceAddress::Simulated)
    }

    /// Address string as given in configuration
    pub fn as_str(&self) -> &str {
        match self {
            DeviceAddress::Hardware(address) => address,
            DeviceAddress::Simulated => SIMULATED_ADDRESS,
        }
    }
}

impl FromStr for DeviceAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(DeviceAddress::parse(s))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link state, always derived from a live transport query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    #[serde(rename = "disc")]
    Disconnected,
}

impl ConnectionState {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Get a string representation for status output
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disc",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan speed setting, always within `0..=6`
///
/// Deserialization goes through [`FanSpeed::new`], so stored values obey the
/// same fallback rule as runtime assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64")]
pub struct FanSpeed(u8);

impl FanSpeed {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 6;
    /// Stored whenever a requested speed is out of range
    pub const FALLBACK: u8 = 1;

    /// Build a fan speed from an arbitrary integer.
    ///
    /// Out-of-range values do not clamp to the nearest bound: both too-low
    /// and too-high requests store [`FanSpeed::FALLBACK`].
    pub fn new(requested: i64) -> Self {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&requested) {
            FanSpeed(requested as u8)
        } else {
            warn!(
                "Incorrect new fan speed {}. Will use {} instead",
                requested,
                Self::FALLBACK
            );
            FanSpeed(Self::FALLBACK)
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl From<i64> for FanSpeed {
    fn from(requested: i64) -> Self {
        FanSpeed::new(requested)
    }
}

impl From<FanSpeed> for u8 {
    fn from(speed: FanSpeed) -> Self {
        speed.0
    }
}

/// Identifies the operation a retry loop is attempting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Establishing the link
    Connect,
    /// Writing the given request frame
    Write(Vec<u8>),
    /// Requesting and reading back device state
    Read,
    /// Anything else, named for log output
    Other(&'static str),
}

impl ActionKind {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Connect => "connect",
            ActionKind::Write(_) => "write",
            ActionKind::Read => "get_state",
            ActionKind::Other(name) => *name,
        }
    }

    /// Message reported once every attempt of this action has failed
    pub fn exhausted_message(&self, address: &DeviceAddress) -> String {
        match self {
            ActionKind::Connect => format!("could not connect to {}", address),
            ActionKind::Write(request) => format!("could not write request {}", to_hex(request)),
            ActionKind::Read => "could not get updated state".to_string(),
            ActionKind::Other(name) => format!("could not perform {}", name),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acknowledgement returned by a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAck {
    /// Handed to the transport (no confirmation requested)
    Sent,
    /// Simulated device, nothing was sent
    Simulated,
}

/// Decode a one-byte temperature.
///
/// Values below the 128 barrier are read directly; values at or above it are
/// negative, interpreted as a two's-complement signed byte.
pub fn decode_temperature(raw: u8) -> i16 {
    if raw < TEMPERATURE_BARRIER {
        raw as i16
    } else {
        raw as i16 - 256
    }
}

/// Look up `code` in an ordered label table, falling back to `"unknown"`
pub fn label_for(labels: &[&'static str], code: i64) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|index| labels.get(index))
        .copied()
        .unwrap_or(UNKNOWN_LABEL)
}

/// Map an on/off status code to its label
pub fn process_status(code: i64) -> &'static str {
    label_for(&STATUS_LABELS, code)
}

/// Lowercase hex rendering of a byte slice
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
