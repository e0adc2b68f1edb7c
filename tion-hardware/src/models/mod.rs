//! Device model definitions
//!
//! Each device family implements [`DeviceModel`] with its own characteristic
//! UUIDs and byte layout. The driver is generic over one model, chosen when
//! it is built.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use tion_core::Result;
use uuid::Uuid;

use crate::link::{Characteristics, DeviceLink};

pub mod s3;

pub use s3::{S3Mode, S3Request, S3Settings, S3State, S3};

/// Wire format and exchange strategy of one device family
///
/// # Example
///
/// ```
/// use tion_hardware::models::{DeviceModel, S3};
///
/// assert_eq!(S3::NAME, "Tion Breezer 3S");
/// ```
#[async_trait]
pub trait DeviceModel: Send + Sync + 'static {
    /// Human-readable model name
    const NAME: &'static str;

    /// GATT service carrying the characteristics below
    const SERVICE_UUID: Uuid;

    /// Characteristic requests are written to
    const WRITE_UUID: Uuid;

    /// Characteristic responses are pushed on
    const NOTIFY_UUID: Uuid;

    /// Logical request understood by [`encode_request`](Self::encode_request)
    type Request: Debug + Send + Sync;

    /// Decoded device state
    type State: Debug + Serialize + Send;

    /// Request that asks the device for its current state
    fn status_request(&self) -> Self::Request;

    /// Request that puts the device into paired mode, if the family has one
    fn pair_request(&self) -> Option<Self::Request> {
        None
    }

    /// Serialize a request into the device's wire format
    fn encode_request(&self, request: &Self::Request) -> Result<Vec<u8>>;

    /// Deliver an encoded request and return the raw response frame
    async fn send_request(&self, link: &mut DeviceLink, request: Vec<u8>) -> Result<Vec<u8>>;

    /// Parse a raw response frame
    fn decode_response(&self, response: &[u8]) -> Result<Self::State>;

    /// Frame answered by a simulated device for `request`
    fn simulated_response(&self, request: &[u8]) -> Vec<u8>;

    /// Fan speed reported in a decoded state, if the family reports one
    fn reported_fan_speed(&self, _state: &Self::State) -> Option<i64> {
        None
    }

    fn characteristics() -> Characteristics
    where
        Self: Sized,
    {
        Characteristics {
            write: Self::WRITE_UUID,
            notify: Self::NOTIFY_UUID,
        }
    }
}
