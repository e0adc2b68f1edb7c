//! Device driver - high-level interface for one breezer
//!
//! Wraps a [`DeviceLink`] and a [`DeviceModel`] and exposes the operations a
//! host needs: read state, apply settings, pair, and the fan-speed setting.

use std::sync::Arc;
use tion_core::{
    ActionKind, ConnectionState, DeviceAddress, FanSpeed, Result, RetryConfig, StaticConfig,
    TimeoutConfig, TionError, WriteAck,
};
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::link::DeviceLink;
use crate::models::DeviceModel;
use crate::transport::Transport;

/// Driver shared between tasks.
///
/// The link is not reentrant, so concurrent callers must take the lock for
/// the whole operation.
pub type SharedDriver<M> = Arc<Mutex<DeviceDriver<M>>>;

/// Driver for one device of family `M`
pub struct DeviceDriver<M: DeviceModel> {
    model: M,
    link: DeviceLink,
    fan_speed: FanSpeed,
    span: Span,
}

impl<M: DeviceModel> DeviceDriver<M> {
    /// Create a driver.
    ///
    /// `transport` may be `None` for a simulated address.
    pub fn new(
        model: M,
        address: DeviceAddress,
        transport: Option<Box<dyn Transport>>,
        retry: RetryConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        let span = info_span!("tion", model = M::NAME, address = %address);
        let link = DeviceLink::new(address, transport, M::characteristics(), retry, timeouts);
        Self {
            model,
            link,
            fan_speed: FanSpeed::default(),
            span,
        }
    }

    /// Create a driver from loaded configuration
    pub fn from_config(
        model: M,
        config: &StaticConfig,
        transport: Option<Box<dyn Transport>>,
    ) -> Self {
        Self::new(
            model,
            config.device_address(),
            transport,
            config.retry.clone(),
            config.timeouts.clone(),
        )
    }

    /// Replace the span every operation of this driver is recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Wrap into a [`SharedDriver`]
    pub fn into_shared(self) -> SharedDriver<M> {
        Arc::new(Mutex::new(self))
    }

    pub fn address(&self) -> &DeviceAddress {
        self.link.address()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn link(&self) -> &DeviceLink {
        &self.link
    }

    /// Last fan speed set or reported
    pub fn fan_speed(&self) -> u8 {
        self.fan_speed.value()
    }

    /// Store a new fan speed; anything outside `0..=6` becomes 1
    pub fn set_fan_speed(&mut self, requested: i64) {
        let _entered = self.span.enter();
        self.fan_speed = FanSpeed::new(requested);
    }

    /// Live connection state
    pub async fn connection_status(&self) -> Result<ConnectionState> {
        self.link
            .connection_status()
            .instrument(self.span.clone())
            .await
    }

    /// Connect, retrying per the configured policy
    pub async fn connect(&mut self) -> Result<()> {
        let span = self.span.clone();
        self.link
            .perform_with_retries(ActionKind::Connect, |link| Box::pin(link.connect()))
            .instrument(span)
            .await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        let span = self.span.clone();
        self.link.disconnect().instrument(span).await
    }

    /// Read the device state.
    ///
    /// Connects, enables notifications, sends the model's status request and
    /// decodes the answer. The link is closed afterwards unless
    /// `keep_connection` is set.
    pub async fn get(&mut self, keep_connection: bool) -> Result<M::State> {
        let span = self.span.clone();
        async move {
            self.connect().await?;

            // Everything after a successful connect ends in `finish`
            let outcome = match self.link.enable_notifications().await {
                Ok(()) => self.read_state().await,
                Err(e) => Err(e),
            };

            self.finish(keep_connection, outcome.is_ok()).await?;
            let state = outcome?;

            if let Some(speed) = self.model.reported_fan_speed(&state) {
                self.fan_speed = FanSpeed::new(speed);
            }
            debug!("Decoded state: {:?}", state);
            Ok(state)
        }
        .instrument(span)
        .await
    }

    /// Encode and write `request`, retrying per the configured policy
    pub async fn set(&mut self, request: &M::Request, keep_connection: bool) -> Result<WriteAck> {
        let span = self.span.clone();
        async move {
            let frame = self.model.encode_request(request)?;
            info!("Sending {:?}", request);

            self.connect().await?;
            let outcome = self
                .link
                .perform_with_retries(ActionKind::Write(frame.clone()), |link| {
                    let frame = frame.clone();
                    Box::pin(async move { link.write(&frame).await })
                })
                .await;

            self.finish(keep_connection, outcome.is_ok()).await?;
            outcome
        }
        .instrument(span)
        .await
    }

    /// Put the device into pairing mode
    pub async fn pair(&mut self) -> Result<WriteAck> {
        match self.model.pair_request() {
            Some(request) => self.set(&request, false).await,
            None => Err(TionError::InvalidInput(format!(
                "{} does not support pairing",
                M::NAME
            ))),
        }
    }

    async fn read_state(&mut self) -> Result<M::State> {
        let request = self.model.encode_request(&self.model.status_request())?;
        let frame = self.exchange(request).await?;
        self.model.decode_response(&frame)
    }

    /// Send an encoded request and return the raw answer
    async fn exchange(&mut self, request: Vec<u8>) -> Result<Vec<u8>> {
        if self.link.is_simulated() {
            self.link.write(&request).await?;
            return Ok(self.model.simulated_response(&request));
        }
        self.model.send_request(&mut self.link, request).await
    }

    /// Close the link unless asked to keep it.
    ///
    /// A disconnect failure after a failed operation is only logged so the
    /// original error reaches the caller.
    async fn finish(&mut self, keep_connection: bool, succeeded: bool) -> Result<()> {
        if keep_connection {
            return Ok(());
        }
        match self.link.disconnect().await {
            Ok(()) => Ok(()),
            Err(e) if succeeded => Err(e),
            Err(e) => {
                warn!("Disconnect after failed operation also failed: {}", e);
                Ok(())
            }
        }
    }
}
