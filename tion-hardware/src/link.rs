//! Device link: connection state machine and retry policy
//!
//! `DeviceLink` owns the transport and the notification sink. It never caches
//! connection state; every check asks the transport.

use futures::future::BoxFuture;
use tion_core::{
    to_hex, ActionKind, ConnectionState, DeviceAddress, Result, RetryConfig, TimeoutConfig,
    TionError, WriteAck,
};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::notification::NotificationSink;
use crate::transport::{with_deadline, Transport};

/// Characteristics a device model reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristics {
    pub write: Uuid,
    pub notify: Uuid,
}

/// Connection to one device
pub struct DeviceLink {
    address: DeviceAddress,
    transport: Option<Box<dyn Transport>>,
    sink: NotificationSink,
    characteristics: Characteristics,
    retry: RetryConfig,
    timeouts: TimeoutConfig,
}

impl DeviceLink {
    /// Create a link.
    ///
    /// A simulated address never touches `transport`, so `None` is fine there.
    pub fn new(
        address: DeviceAddress,
        transport: Option<Box<dyn Transport>>,
        characteristics: Characteristics,
        retry: RetryConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            address,
            transport,
            sink: NotificationSink::new(),
            characteristics,
            retry,
            timeouts,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn is_simulated(&self) -> bool {
        self.address.is_simulated()
    }

    pub fn sink(&self) -> &NotificationSink {
        &self.sink
    }

    pub fn characteristics(&self) -> Characteristics {
        self.characteristics
    }

    fn transport(&self) -> Result<&(dyn Transport + 'static)> {
        self.transport
            .as_deref()
            .ok_or_else(|| detached(&self.address))
    }

    fn transport_mut(&mut self) -> Result<&mut (dyn Transport + 'static)> {
        let address = &self.address;
        self.transport
            .as_deref_mut()
            .ok_or_else(|| detached(address))
    }

    /// Live connection state.
    ///
    /// A simulated device reports `Connected` without any transport call.
    pub async fn connection_status(&self) -> Result<ConnectionState> {
        if self.is_simulated() {
            return Ok(ConnectionState::Connected);
        }
        let deadline = self.timeouts.transport();
        let connected =
            with_deadline(deadline, "is_connected", self.transport()?.is_connected()).await?;
        Ok(ConnectionState::from_connected(connected))
    }

    /// Connect if not already connected.
    ///
    /// A failed attempt sleeps for the configured backoff and then returns
    /// the error; retrying is left to [`perform_with_retries`](Self::perform_with_retries).
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_simulated() {
            info!("Simulated connect");
            return Ok(());
        }

        if self.connection_status().await? == ConnectionState::Connected {
            return Ok(());
        }

        let deadline = self.timeouts.transport();
        let result = with_deadline(deadline, "connect", self.transport_mut()?.connect()).await;
        match result {
            Ok(()) => {
                info!("Connected to {}", self.address);
                Ok(())
            }
            Err(e) => {
                debug!("Got {} while connecting to {}", e, self.address);
                sleep(self.retry.connect_backoff()).await;
                Err(e)
            }
        }
    }

    /// Disconnect if connected
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.is_simulated() {
            debug!("Simulated disconnect");
            return Ok(());
        }

        if self.connection_status().await? == ConnectionState::Disconnected {
            return Ok(());
        }

        let deadline = self.timeouts.transport();
        with_deadline(deadline, "disconnect", self.transport_mut()?.disconnect()).await?;
        debug!("Disconnected from {}", self.address);
        Ok(())
    }

    /// Write a request frame to the write characteristic without asking for
    /// a write confirmation
    pub async fn write(&mut self, request: &[u8]) -> Result<WriteAck> {
        if self.is_simulated() {
            info!("Simulated write {}", to_hex(request));
            return Ok(WriteAck::Simulated);
        }

        let uuid = self.characteristics.write;
        debug!("Writing {} to {}", to_hex(request), uuid);

        let deadline = self.timeouts.transport();
        with_deadline(
            deadline,
            "write",
            self.transport_mut()?.write_characteristic(uuid, request, false),
        )
        .await?;
        Ok(WriteAck::Sent)
    }

    /// Route notifications from the notify characteristic into the sink
    pub async fn enable_notifications(&mut self) -> Result<()> {
        if self.is_simulated() {
            debug!("Simulated device, notifications not needed");
            return Ok(());
        }

        let uuid = self.characteristics.notify;
        debug!("Enabling notifications on {}", uuid);

        let handler = self.sink.handler();
        let deadline = self.timeouts.transport();
        with_deadline(
            deadline,
            "subscribe",
            self.transport_mut()?.subscribe_notifications(uuid, handler),
        )
        .await
        .map_err(|e| match e {
            TionError::Connectivity(_) => e,
            other => TionError::Connectivity(format!("could not enable notifications: {}", other)),
        })
    }

    /// Mark any unread payload as consumed so the next wait sees only fresh data
    pub fn discard_pending(&self) {
        if self.sink.has_new_data() {
            let stale = self.sink.take_data();
            debug!("Dropping unread notification {}", to_hex(&stale));
        }
    }

    /// Wait for the next notification and take it
    pub async fn wait_for_response(&self) -> Result<Vec<u8>> {
        self.sink.wait_for_data(self.timeouts.notification()).await
    }

    /// Run `action` until it succeeds or the attempt budget is spent.
    ///
    /// Every attempt except those of [`ActionKind::Connect`] first makes sure
    /// the link is up. Errors that retrying cannot fix are returned at once.
    /// When all attempts fail the result is [`TionError::Device`] with a
    /// message chosen by `kind`.
    ///
    /// The closure must return a boxed future:
    ///
    /// ```ignore
    /// link.perform_with_retries(ActionKind::Read, |link| Box::pin(async move {
    ///     link.wait_for_response().await
    /// })).await
    /// ```
    pub async fn perform_with_retries<T, F>(&mut self, kind: ActionKind, mut action: F) -> Result<T>
    where
        F: for<'a> FnMut(&'a mut DeviceLink) -> BoxFuture<'a, Result<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            debug!("Doing {}. Attempt {}/{}", kind, attempt, max_attempts);

            let ready = if matches!(kind, ActionKind::Connect) {
                Ok(())
            } else {
                self.connect().await
            };

            let outcome = match ready {
                Ok(()) => action(self).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!("Got exception while {}: {}", kind, e);
                }
            }
        }

        let message = kind.exhausted_message(&self.address);
        error!("{}", message);
        Err(TionError::Device {
            action: kind,
            message,
        })
    }
}

fn detached(address: &DeviceAddress) -> TionError {
    TionError::Connectivity(format!("no transport attached for {}", address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    const WRITE: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
    const NOTIFY: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

    /// Counts WARN events
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn link_with(address: &str, mock: &MockTransport) -> DeviceLink {
        DeviceLink::new(
            DeviceAddress::parse(address),
            mock.boxed(),
            Characteristics {
                write: WRITE,
                notify: NOTIFY,
            },
            RetryConfig::default(),
            TimeoutConfig::default(),
        )
    }

    /// Action that fails with a retryable error `failures` times, then returns 42
    fn flaky(
        failures: usize,
        calls: Arc<AtomicUsize>,
    ) -> impl for<'a> FnMut(&'a mut DeviceLink) -> BoxFuture<'a, Result<u32>> {
        move |_link| {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(TionError::Write("flaky".to_string()))
                } else {
                    Ok(42)
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_on_third_attempt_with_two_warnings() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = MockTransport::connected();
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = link
            .perform_with_retries(ActionKind::Other("probe"), flaky(2, calls.clone()))
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(warnings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failures_warn_once_per_attempt() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = MockTransport::new();
        mock.state().connect_failures = 2;
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = link
            .perform_with_retries(ActionKind::Read, flaky(0, calls.clone()))
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(mock.count("connect"), 3);
        assert_eq!(warnings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_after_first_success() {
        let mock = MockTransport::connected();
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);
        let calls = Arc::new(AtomicUsize::new(0));

        link.perform_with_retries(ActionKind::Read, flaky(0, calls.clone()))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_messages() {
        let cases = [
            (ActionKind::Read, "could not get updated state"),
            (
                ActionKind::Write(vec![0x3d, 0x01, 0x5a]),
                "could not write request 3d015a",
            ),
            (ActionKind::Other("pair"), "could not perform pair"),
        ];

        for (kind, expected) in cases {
            let mock = MockTransport::connected();
            let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);
            let calls = Arc::new(AtomicUsize::new(0));

            let err = link
                .perform_with_retries(kind.clone(), flaky(usize::MAX, calls.clone()))
                .await
                .unwrap_err();

            assert_eq!(calls.load(Ordering::SeqCst), 3);
            assert_eq!(err.to_string(), expected);
            assert_eq!(err.action(), Some(&kind));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_exhaustion_names_address() {
        let mock = MockTransport::new();
        mock.state().connect_failures = 10;
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        let err = link
            .perform_with_retries(ActionKind::Connect, |link| Box::pin(link.connect()))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "could not connect to AA:BB:CC:DD:EE:FF");
        assert_eq!(mock.count("connect"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_waits_backoff() {
        let mock = MockTransport::new();
        mock.state().connect_failures = 1;
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        let started = tokio::time::Instant::now();
        assert!(link.connect().await.is_err());
        assert!(started.elapsed() >= Duration::from_secs(2));

        // Second call succeeds without another backoff
        let started = tokio::time::Instant::now();
        link.connect().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_connect_actions_connect_first() {
        let mock = MockTransport::new();
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        link.perform_with_retries(ActionKind::Read, |link| {
            Box::pin(async move { link.connection_status().await })
        })
        .await
        .unwrap();

        assert_eq!(mock.count("connect"), 1);
        assert!(mock.state().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_counts_as_attempt() {
        let mock = MockTransport::new();
        mock.state().connect_failures = 2;
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = link
            .perform_with_retries(ActionKind::Read, flaky(0, calls.clone()))
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(mock.count("connect"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_errors_are_not_retried() {
        let mock = MockTransport::connected();
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = link
            .perform_with_retries(ActionKind::Read, move |_link| {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TionError::Decode("short frame".to_string()))
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TionError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_status_is_queried_every_time() {
        let mock = MockTransport::connected();
        let link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        assert_eq!(
            link.connection_status().await.unwrap(),
            ConnectionState::Connected
        );
        mock.state().connected = false;
        assert_eq!(
            link.connection_status().await.unwrap(),
            ConnectionState::Disconnected
        );
        assert_eq!(mock.count("is_connected"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_skips_when_already_disconnected() {
        let mock = MockTransport::new();
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        link.disconnect().await.unwrap();
        assert_eq!(mock.count("disconnect"), 0);

        mock.state().connected = true;
        link.disconnect().await.unwrap();
        assert_eq!(mock.count("disconnect"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_without_response() {
        let mock = MockTransport::connected();
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        let ack = link.write(&[0x3d, 0x01]).await.unwrap();
        assert_eq!(ack, WriteAck::Sent);

        let writes = mock.state().writes.clone();
        assert_eq!(writes, vec![(WRITE, vec![0x3d, 0x01], false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_link_never_touches_transport() {
        let mock = MockTransport::new();
        let mut link = link_with("dummy", &mock);

        link.connect().await.unwrap();
        assert_eq!(link.write(&[1, 2, 3]).await.unwrap(), WriteAck::Simulated);
        link.enable_notifications().await.unwrap();
        link.disconnect().await.unwrap();
        assert_eq!(
            link.connection_status().await.unwrap(),
            ConnectionState::Connected
        );

        assert!(mock.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_notifications_failure_is_connectivity() {
        let mock = MockTransport::connected();
        mock.state().subscribe_fails = true;
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        let err = link.enable_notifications().await.unwrap_err();
        assert!(matches!(err, TionError::Connectivity(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_reaches_sink_after_write() {
        let mock = MockTransport::connected();
        mock.respond_with(vec![0xB3, 0x10]);
        let mut link = link_with("AA:BB:CC:DD:EE:FF", &mock);

        link.enable_notifications().await.unwrap();
        link.write(&[0x3d]).await.unwrap();

        assert!(link.sink().has_new_data());
        assert_eq!(link.wait_for_response().await.unwrap(), vec![0xB3, 0x10]);

        // Requests go out on the write characteristic, answers arrive on notify
        let state = mock.state();
        assert_eq!(state.writes[0].0, WRITE);
        assert_eq!(state.notified, vec![NOTIFY]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_transport_is_connectivity_error() {
        let mut link = DeviceLink::new(
            DeviceAddress::parse("AA:BB:CC:DD:EE:FF"),
            None,
            Characteristics {
                write: WRITE,
                notify: NOTIFY,
            },
            RetryConfig::default(),
            TimeoutConfig::default(),
        );

        assert!(matches!(
            link.connect().await,
            Err(TionError::Connectivity(_))
        ));
    }
}
