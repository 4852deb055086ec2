//! Bluetooth Low Energy transport backed by `btleplug`
//!
//! # Requirements
//!
//! Enable the `ble` feature in Cargo.toml to use this transport.
//!
//! On Linux, you'll also need:
//! ```bash
//! apt install libdbus-1-dev
//! ```
//!
//! Scanning for and connecting to the peripheral is left to the caller; this
//! type adapts a peripheral that is already connected.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{BleTransport, NotificationHandler, MTU};
use crate::error::{NukiError, Result};

type Handlers = Arc<Mutex<HashMap<Uuid, NotificationHandler>>>;

/// Transport over a connected `btleplug` peripheral
pub struct BtleplugTransport {
    peripheral: Peripheral,
    name: String,
    characteristics: HashMap<Uuid, Characteristic>,
    handlers: Handlers,
    shutdown: CancellationToken,
}

impl BtleplugTransport {
    /// Discover services of `peripheral` and start dispatching notifications
    pub async fn new(peripheral: Peripheral) -> Result<Self> {
        peripheral.discover_services().await?;
        let characteristics = peripheral
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c))
            .collect::<HashMap<_, _>>();

        let name = peripheral
            .properties()
            .await?
            .and_then(|p| p.local_name)
            .unwrap_or_else(|| peripheral.address().to_string());

        let handlers: Handlers = Arc::default();
        let shutdown = CancellationToken::new();
        let mut notifications = peripheral.notifications().await?;

        let pump_handlers = handlers.clone();
        let pump_shutdown = shutdown.clone();
        let pump_name = name.clone();
        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    _ = pump_shutdown.cancelled() => break,
                    n = notifications.next() => match n {
                        Some(n) => n,
                        None => break,
                    },
                };
                let handler = pump_handlers.lock().get(&notification.uuid).cloned();
                match handler {
                    Some(handler) => handler(&notification.value),
                    None => trace!(uuid = %notification.uuid, "Notification without subscriber"),
                }
            }
            debug!(transport = %pump_name, "Notification pump stopped");
        });

        debug!(
            transport = %name,
            characteristics = characteristics.len(),
            "Transport ready"
        );

        Ok(Self {
            peripheral,
            name,
            characteristics,
            handlers,
            shutdown,
        })
    }

    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .get(&uuid)
            .ok_or_else(|| NukiError::CharacteristicNotFound(uuid.to_string()))
    }
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    async fn has_characteristic(&self, characteristic: Uuid) -> Result<bool> {
        Ok(self.characteristics.contains_key(&characteristic))
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        let c = self.characteristic(characteristic)?;
        self.handlers.lock().insert(characteristic, handler);
        if let Err(e) = self.peripheral.subscribe(c).await {
            self.handlers.lock().remove(&characteristic);
            return Err(e.into());
        }
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        let c = self.characteristic(characteristic)?;
        self.handlers.lock().remove(&characteristic);
        self.peripheral.unsubscribe(c).await?;
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, chunk: &[u8]) -> Result<()> {
        if chunk.len() > MTU {
            warn!(len = chunk.len(), "Chunk exceeds MTU");
        }
        let c = self.characteristic(characteristic)?;
        self.peripheral
            .write(c, chunk, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        self.handlers.lock().clear();
        self.peripheral.disconnect().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for BtleplugTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
