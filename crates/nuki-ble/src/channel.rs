//! One subscribed characteristic with blocking response waits
//!
//! A [`Channel`] owns the notification subscription of either the general or
//! the user characteristic. Inbound chunks are reassembled inside the
//! notification callback and queued; waits pull from that queue until a
//! deadline passes or the caller cancels.

use nuki_protocol::{encrypt_command, Command, CommandId, DeviceError, DeviceType, NonceSource, SharedKey};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{NukiError, Result};
use crate::reassembly::Reassembler;
use crate::transport::{discover, split_chunks, BleTransport, ChannelKind, NotificationHandler};

/// A subscribed data input/output characteristic
pub struct Channel<T: BleTransport + ?Sized> {
    transport: Arc<T>,
    kind: ChannelKind,
    characteristic: Uuid,
    device_type: DeviceType,
    encryption: Option<(u32, SharedKey)>,
    inbound: mpsc::UnboundedReceiver<Result<Command>>,
}

impl<T: BleTransport + ?Sized> Channel<T> {
    /// Subscribe to the general characteristic (plain commands)
    pub async fn open_general(transport: Arc<T>) -> Result<Self> {
        Self::open(transport, Reassembler::plain(), None).await
    }

    /// Subscribe to the user characteristic for `authorization_id`
    pub async fn open_user(transport: Arc<T>, authorization_id: u32, key: SharedKey) -> Result<Self> {
        let reassembler = Reassembler::encrypted(authorization_id, key.clone());
        Self::open(transport, reassembler, Some((authorization_id, key))).await
    }

    async fn open(
        transport: Arc<T>,
        reassembler: Reassembler,
        encryption: Option<(u32, SharedKey)>,
    ) -> Result<Self> {
        let kind = reassembler.kind();
        let (characteristic, device_type) = discover(transport.as_ref(), kind).await?;

        let (tx, inbound) = mpsc::unbounded_channel();
        let reassembler = Mutex::new(reassembler);
        let handler: NotificationHandler = Arc::new(move |chunk: &[u8]| {
            let Some(result) = reassembler.lock().push(chunk) else {
                return;
            };
            if tx.send(result).is_err() {
                trace!(channel = kind.tag(), "No receiver for inbound command");
            }
        });
        transport.subscribe(characteristic, handler).await?;

        debug!(
            channel = kind.tag(),
            %characteristic,
            %device_type,
            transport = transport.name(),
            "Subscribed"
        );

        Ok(Self {
            transport,
            kind,
            characteristic,
            device_type,
            encryption,
            inbound,
        })
    }

    /// Channel kind
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Device family found during discovery
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Subscribed characteristic
    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }

    /// Send `cmd`, sealing it first on the user channel
    ///
    /// Responses still queued from an earlier exchange are dropped first so
    /// they cannot be taken as the answer to `cmd`.
    pub async fn send(&mut self, cmd: &Command, nonces: &mut dyn NonceSource) -> Result<()> {
        self.discard_stale();
        let tag = self.kind.tag();
        let message = match &self.encryption {
            None => {
                debug!(channel = tag, %cmd, "Sending command");
                cmd.to_bytes()
            }
            Some((authorization_id, key)) => {
                debug!(channel = tag, %cmd, authorization_id, "Sending encrypted command");
                let sealed = encrypt_command(*authorization_id, key, cmd, nonces)?;
                trace!(channel = tag, len = sealed.len(), bytes = ?sealed, "Encrypted message");
                sealed
            }
        };

        for chunk in split_chunks(&message) {
            self.transport.write(self.characteristic, chunk).await?;
        }
        Ok(())
    }

    /// Wait for the next command
    ///
    /// An ErrorReport is returned as [`NukiError::Device`].
    pub async fn wait_for_response(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Command> {
        let deadline = Instant::now() + timeout;
        let cmd = self.recv(deadline, timeout, cancel).await?;
        self.reject_error_report(cmd)
    }

    /// Wait for a command with `id`, discarding others
    ///
    /// An ErrorReport ends the wait with [`NukiError::Device`] unless `id` is
    /// itself [`CommandId::ErrorReport`]. The deadline covers the whole wait,
    /// not each discarded command.
    pub async fn wait_for_specific_response(
        &mut self,
        id: CommandId,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Command> {
        let deadline = Instant::now() + timeout;
        loop {
            let cmd = self.recv(deadline, timeout, cancel).await?;
            if cmd.is(id) {
                return Ok(cmd);
            }
            let cmd = self.reject_error_report(cmd)?;
            debug!(
                channel = self.kind.tag(),
                expected = %id,
                got = %cmd.id(),
                "Discarding unexpected response"
            );
        }
    }

    /// Unsubscribe from the characteristic
    pub async fn close(&self) -> Result<()> {
        debug!(channel = self.kind.tag(), "Unsubscribing");
        self.transport.unsubscribe(self.characteristic).await
    }

    async fn recv(
        &mut self,
        deadline: Instant,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Command> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(NukiError::Cancelled),
            msg = self.inbound.recv() => msg.unwrap_or(Err(NukiError::ChannelClosed)),
            _ = tokio::time::sleep_until(deadline) => Err(NukiError::Timeout {
                duration_ms: timeout.as_millis() as u64,
            }),
        }
    }

    fn discard_stale(&mut self) {
        while let Ok(stale) = self.inbound.try_recv() {
            match stale {
                Ok(cmd) => debug!(channel = self.kind.tag(), %cmd, "Discarding stale response"),
                Err(e) => debug!(channel = self.kind.tag(), error = %e, "Discarding stale failure"),
            }
        }
    }

    fn reject_error_report(&self, cmd: Command) -> Result<Command> {
        match DeviceError::from_command(&cmd, self.device_type) {
            Some(err) => Err(err.into()),
            None => Ok(cmd),
        }
    }
}

impl<T: BleTransport + ?Sized> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("kind", &self.kind)
            .field("characteristic", &self.characteristic)
            .field("device_type", &self.device_type)
            .field("encrypted", &self.encryption.is_some())
            .finish()
    }
}
