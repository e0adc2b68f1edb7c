//! tion-hardware
//!
//! Device-side crate: the transport abstraction, the btleplug transport, the
//! notification sink, the connection and retry state machine, and the device
//! models with their byte layouts.
//!
//! Public API:
//! - `driver::DeviceDriver`: high-level driver for one device
//! - `link::DeviceLink`: connect/disconnect/write and the retry wrapper
//! - `models::DeviceModel`: per-family wire format; `models::S3` implements it
//! - `transport::Transport`: what the wireless stack must provide
//! - `ble::BtleplugTransport`: `Transport` on the host Bluetooth stack

pub mod ble;
pub mod driver;
pub mod link;
pub mod models;
pub mod notification;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use ble::BtleplugTransport;
pub use driver::{DeviceDriver, SharedDriver};
pub use link::{Characteristics, DeviceLink};
pub use models::{DeviceModel, S3};
pub use notification::NotificationSink;
pub use transport::{NotificationHandler, Transport};
