//! Mock transport shared by the unit tests in this crate

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tion_core::{Result, TionError};
use uuid::Uuid;

use crate::transport::{NotificationHandler, Transport};

#[derive(Default)]
pub(crate) struct MockState {
    pub connected: bool,
    /// Remaining connect calls that should fail
    pub connect_failures: u32,
    /// Remaining write calls that should fail
    pub write_failures: u32,
    pub subscribe_fails: bool,
    /// Payload pushed through the handler after every successful write
    pub response: Option<Vec<u8>>,
    /// Characteristic subscribed to and the handler registered for it
    pub subscription: Option<(Uuid, NotificationHandler)>,
    /// Characteristic of every notification delivered, in order
    pub notified: Vec<Uuid>,
    /// Every transport call, by name, in order
    pub calls: Vec<String>,
    pub writes: Vec<(Uuid, Vec<u8>, bool)>,
}

/// Scriptable transport; clones share state so tests can inspect it after
/// boxing one copy into a driver.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        let mock = Self::new();
        mock.state().connected = true;
        mock
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn respond_with(&self, frame: Vec<u8>) {
        self.state().response = Some(frame);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == name).count()
    }

    pub fn boxed(&self) -> Option<Box<dyn Transport>> {
        Some(Box::new(self.clone()))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.calls.push("connect".to_string());
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(TionError::Connectivity("device not reachable".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.calls.push("disconnect".to_string());
        state.connected = false;
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        let mut state = self.state();
        state.calls.push("is_connected".to_string());
        Ok(state.connected)
    }

    async fn write_characteristic(
        &mut self,
        uuid: Uuid,
        payload: &[u8],
        with_response: bool,
    ) -> Result<()> {
        let (subscription, response) = {
            let mut state = self.state();
            state.calls.push("write".to_string());
            if state.write_failures > 0 {
                state.write_failures -= 1;
                return Err(TionError::Write("gatt write rejected".to_string()));
            }
            state.writes.push((uuid, payload.to_vec(), with_response));
            let subscription = state.subscription.clone();
            let response = state.response.clone();
            if let (Some((source, _)), Some(_)) = (&subscription, &response) {
                state.notified.push(*source);
            }
            (subscription, response)
        };

        if let (Some((source, handler)), Some(frame)) = (subscription, response) {
            handler(source, &frame);
        }
        Ok(())
    }

    async fn subscribe_notifications(
        &mut self,
        uuid: Uuid,
        handler: NotificationHandler,
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.push("subscribe".to_string());
        if state.subscribe_fails {
            return Err(TionError::Timeout("cccd write".to_string()));
        }
        state.subscription = Some((uuid, handler));
        Ok(())
    }
}
