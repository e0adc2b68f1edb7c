//! Notification sink
//!
//! Holds the most recent payload pushed by the peripheral. There is no queue:
//! a notification that arrives before the previous one was taken replaces it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tion_core::{to_hex, Result, TionError};
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::transport::NotificationHandler;

#[derive(Debug, Default)]
struct Buffer {
    data: Vec<u8>,
    have_new_data: bool,
}

#[derive(Debug, Default)]
struct Inner {
    buffer: Mutex<Buffer>,
    arrived: Notify,
}

/// Single-slot buffer for notification payloads
///
/// Cloning is cheap and every clone shares the same slot, so one clone can be
/// handed to the transport while the driver keeps another.
#[derive(Debug, Clone, Default)]
pub struct NotificationSink {
    inner: Arc<Inner>,
}

impl NotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, Buffer> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a pushed payload, replacing anything unread
    pub fn on_notification(&self, source: Uuid, data: &[u8]) {
        debug!("Got data from {} response {}", source, to_hex(data));
        {
            let mut buffer = self.buffer();
            buffer.data = data.to_vec();
            buffer.have_new_data = true;
        }
        self.inner.arrived.notify_waiters();
    }

    /// Return the buffered payload and mark it as read.
    ///
    /// The buffer itself is kept, so calling this again before the next
    /// notification returns the same bytes.
    pub fn take_data(&self) -> Vec<u8> {
        let mut buffer = self.buffer();
        buffer.have_new_data = false;
        buffer.data.clone()
    }

    /// Whether a payload arrived since the last [`take_data`](Self::take_data)
    pub fn has_new_data(&self) -> bool {
        self.buffer().have_new_data
    }

    /// Wait until unread data is available, then take it
    pub async fn wait_for_data(&self, deadline: Duration) -> Result<Vec<u8>> {
        let arrived = self.inner.arrived.notified();
        tokio::pin!(arrived);
        // Register before checking so a push between the check and the await is not lost
        arrived.as_mut().enable();

        if self.has_new_data() {
            return Ok(self.take_data());
        }

        timeout(deadline, arrived).await.map_err(|_| {
            TionError::Timeout(format!("no notification within {:?}", deadline))
        })?;
        Ok(self.take_data())
    }

    /// Callback to register with the transport
    pub fn handler(&self) -> NotificationHandler {
        let sink = self.clone();
        Arc::new(move |source, data| sink.on_notification(source, data))
    }
}
