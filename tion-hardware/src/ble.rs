//! btleplug-backed transport
//!
//! Looks the peripheral up by hardware address, connects, discovers services,
//! and pumps notifications from the peripheral into the registered handler.

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::time::Duration;
use tion_core::{Result, TionError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::transport::{NotificationHandler, Transport};

/// Transport over the host Bluetooth stack
pub struct BtleplugTransport {
    adapter: Adapter,
    address: String,
    scan_duration: Duration,
    service: Option<Uuid>,
    peripheral: Option<Peripheral>,
    pump: Option<JoinHandle<()>>,
}

impl BtleplugTransport {
    /// Create a transport for `address` on the adapter at `adapter_index`
    ///
    /// # Arguments
    /// * `adapter_index` - Which adapter to use when the host has several
    /// * `address` - Peripheral hardware address (e.g., "AA:BB:CC:DD:EE:FF")
    /// * `scan_duration` - How long to scan if the adapter has not seen the peripheral yet
    pub async fn new(adapter_index: usize, address: &str, scan_duration: Duration) -> Result<Self> {
        let manager = Manager::new().await.map_err(|e| {
            error!("Failed to open Bluetooth manager: {}", e);
            TionError::Connectivity(format!("Bluetooth manager unavailable: {}", e))
        })?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| TionError::Connectivity(format!("Failed to list adapters: {}", e)))?;
        debug!("Found {} Bluetooth adapter(s)", adapters.len());

        let adapter = adapters
            .into_iter()
            .nth(adapter_index)
            .ok_or(TionError::AdapterNotFound)?;

        Ok(Self {
            adapter,
            address: address.to_string(),
            scan_duration,
            service: None,
            peripheral: None,
            pump: None,
        })
    }

    /// Only scan for peripherals advertising `service`
    pub fn with_service(mut self, service: Uuid) -> Self {
        self.service = Some(service);
        self
    }

    async fn known_peripheral(&self) -> Result<Option<Peripheral>> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TionError::Connectivity(format!("Failed to list peripherals: {}", e)))?;

        Ok(peripherals
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(&self.address)))
    }

    /// Find the peripheral, scanning briefly if the adapter has not seen it
    async fn find_peripheral(&self) -> Result<Peripheral> {
        if let Some(peripheral) = self.known_peripheral().await? {
            return Ok(peripheral);
        }

        debug!("Scanning {:?} for {}", self.scan_duration, self.address);
        self.adapter
            .start_scan(scan_filter(self.service))
            .await
            .map_err(|e| TionError::Connectivity(format!("Failed to start scan: {}", e)))?;
        tokio::time::sleep(self.scan_duration).await;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        self.known_peripheral()
            .await?
            .ok_or_else(|| TionError::PeripheralNotFound(self.address.clone()))
    }

    fn connected_peripheral(&self) -> Result<&Peripheral> {
        self.peripheral
            .as_ref()
            .ok_or_else(|| TionError::Connectivity(format!("{} is not connected", self.address)))
    }

    fn characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TionError::CharacteristicNotFound(uuid))
    }

    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[async_trait]
impl Transport for BtleplugTransport {
    async fn connect(&mut self) -> Result<()> {
        let peripheral = match &self.peripheral {
            Some(peripheral) => peripheral.clone(),
            None => self.find_peripheral().await?,
        };

        peripheral
            .connect()
            .await
            .map_err(|e| TionError::Connectivity(format!("Connect failed: {}", e)))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| TionError::Connectivity(format!("Service discovery failed: {}", e)))?;

        info!("Connected to peripheral {}", self.address);
        self.peripheral = Some(peripheral);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.stop_pump();
        if let Some(peripheral) = &self.peripheral {
            peripheral
                .disconnect()
                .await
                .map_err(|e| TionError::Connectivity(format!("Disconnect failed: {}", e)))?;
        }
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        match &self.peripheral {
            Some(peripheral) => peripheral
                .is_connected()
                .await
                .map_err(|e| TionError::Connectivity(format!("Link state unavailable: {}", e))),
            None => Ok(false),
        }
    }

    async fn write_characteristic(
        &mut self,
        uuid: Uuid,
        payload: &[u8],
        with_response: bool,
    ) -> Result<()> {
        let peripheral = self.connected_peripheral()?;
        let characteristic = Self::characteristic(peripheral, uuid)?;
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        peripheral
            .write(&characteristic, payload, write_type)
            .await
            .map_err(|e| TionError::Write(format!("GATT write failed: {}", e)))
    }

    async fn subscribe_notifications(
        &mut self,
        uuid: Uuid,
        handler: NotificationHandler,
    ) -> Result<()> {
        let peripheral = self.connected_peripheral()?.clone();
        let characteristic = Self::characteristic(&peripheral, uuid)?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| TionError::Connectivity(format!("Subscribe failed: {}", e)))?;
        let mut notifications = peripheral.notifications().await.map_err(|e| {
            TionError::Connectivity(format!("Notification stream unavailable: {}", e))
        })?;

        self.stop_pump();
        self.pump = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == uuid {
                    handler(notification.uuid, &notification.value);
                }
            }
            debug!("Notification stream for {} closed", uuid);
        }));
        Ok(())
    }
}

/// Scan filter matching advertisers of `service`, or everything
fn scan_filter(service: Option<Uuid>) -> ScanFilter {
    ScanFilter {
        services: service.into_iter().collect(),
    }
}

impl Drop for BtleplugTransport {
    fn drop(&mut self) {
        self.stop_pump();
    }
}
