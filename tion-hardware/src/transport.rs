//! Transport abstraction
//!
//! The wireless stack is an external collaborator. The driver only needs the
//! handful of operations below, which lets tests run against a mock and the
//! real implementation live in [`crate::ble`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tion_core::{Result, TionError};
use tokio::time::timeout;
use uuid::Uuid;

/// Callback invoked for every notification pushed by the peripheral.
///
/// Receives the characteristic the data arrived on and the raw payload.
pub type NotificationHandler = Arc<dyn Fn(Uuid, &[u8]) + Send + Sync>;

/// Trait for BLE transport abstraction
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the link to the peripheral
    async fn connect(&mut self) -> Result<()>;

    /// Tear down the link
    async fn disconnect(&mut self) -> Result<()>;

    /// Live link state
    async fn is_connected(&self) -> Result<bool>;

    /// Write `payload` to the characteristic `uuid`
    async fn write_characteristic(
        &mut self,
        uuid: Uuid,
        payload: &[u8],
        with_response: bool,
    ) -> Result<()>;

    /// Route notifications from characteristic `uuid` to `handler`
    async fn subscribe_notifications(
        &mut self,
        uuid: Uuid,
        handler: NotificationHandler,
    ) -> Result<()>;
}

/// Run a transport call under a deadline
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    timeout(deadline, call)
        .await
        .map_err(|_| TionError::Timeout(format!("{} did not finish within {:?}", what, deadline)))?
}
