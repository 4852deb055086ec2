//! Test utilities for exercising the client without a radio
//!
//! [`MockTransport`] is an in-memory peripheral. It exposes a configurable set
//! of characteristics, records every write, reassembles outbound messages and
//! can be told to fail individual operations. Attach a [`ScriptedDevice`] to
//! have it answer each complete outbound message with canned replies.
//!
//! # Example
//!
//! ```rust
//! use nuki_ble::protocol::{Command, CommandId, DeviceType};
//! use nuki_ble::test_utils::{MockTransport, ScriptedDevice};
//!
//! let device = ScriptedDevice::new()
//!     .reply_plain(&[Command::new(CommandId::Challenge, &[0u8; 32])]);
//! let mock = MockTransport::new(DeviceType::SmartLock).with_device(device);
//! assert!(mock.writes().is_empty());
//! ```

use bytes::Bytes;
use nuki_protocol::{encrypt_command, Command, DeviceType, OsNonceSource, SharedKey};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{NukiError, Result};
use crate::reassembly::FrameAssembler;
use crate::transport::{profile_for, split_chunks, BleTransport, NotificationHandler};

/// Operation a [`MockTransport`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFailure {
    /// `subscribe`
    Subscribe,
    /// `unsubscribe`
    Unsubscribe,
    /// `write`
    Write,
    /// `close`
    Close,
}

/// Produces replies to complete outbound messages
pub trait MockResponder: Send {
    /// Raw messages to notify in answer to `message` written to `characteristic`
    fn respond(&mut self, characteristic: Uuid, message: &[u8]) -> Vec<Bytes>;
}

#[derive(Default)]
struct MockState {
    characteristics: HashSet<Uuid>,
    handlers: HashMap<Uuid, NotificationHandler>,
    writes: Vec<(Uuid, Bytes)>,
    assemblers: HashMap<Uuid, FrameAssembler>,
    messages: Vec<(Uuid, Bytes)>,
    failures: HashSet<MockFailure>,
    closed: bool,
    responder: Option<Box<dyn MockResponder>>,
}

/// In-memory transport for tests
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Transport exposing both characteristics of `device_type`
    pub fn new(device_type: DeviceType) -> Self {
        let mock = Self::empty();
        if let Some(profile) = profile_for(device_type) {
            mock.add_characteristic(profile.general);
            mock.add_characteristic(profile.user);
        }
        mock
    }

    /// Transport exposing no characteristics
    pub fn empty() -> Self {
        Self::default()
    }

    /// Answer outbound messages with `device`
    pub fn with_device(self, device: impl MockResponder + 'static) -> Self {
        self.state.lock().responder = Some(Box::new(device));
        self
    }

    /// Expose another characteristic
    pub fn add_characteristic(&self, characteristic: Uuid) {
        self.state.lock().characteristics.insert(characteristic);
    }

    /// Make every later call of `op` fail
    pub fn fail_on(&self, op: MockFailure) {
        self.state.lock().failures.insert(op);
    }

    /// Deliver one notification chunk to the subscriber of `characteristic`
    pub fn notify(&self, characteristic: Uuid, chunk: &[u8]) {
        let handler = self.state.lock().handlers.get(&characteristic).cloned();
        match handler {
            Some(handler) => handler(chunk),
            None => debug!(%characteristic, "Dropping notification without subscriber"),
        }
    }

    /// Every chunk written so far
    pub fn writes(&self) -> Vec<(Uuid, Bytes)> {
        self.state.lock().writes.clone()
    }

    /// Complete outbound messages written to `characteristic`
    pub fn messages(&self, characteristic: Uuid) -> Vec<Bytes> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|(uuid, _)| *uuid == characteristic)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Whether `characteristic` has a subscriber
    pub fn is_subscribed(&self, characteristic: Uuid) -> bool {
        self.state.lock().handlers.contains_key(&characteristic)
    }

    /// Whether `close` succeeded
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn check(state: &MockState, op: MockFailure) -> Result<()> {
        if state.failures.contains(&op) {
            return Err(NukiError::Transport(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    async fn has_characteristic(&self, characteristic: Uuid) -> Result<bool> {
        Ok(self.state.lock().characteristics.contains(&characteristic))
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, MockFailure::Subscribe)?;
        if !state.characteristics.contains(&characteristic) {
            return Err(NukiError::CharacteristicNotFound(characteristic.to_string()));
        }
        state.handlers.insert(characteristic, handler);
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, MockFailure::Unsubscribe)?;
        state.handlers.remove(&characteristic);
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, chunk: &[u8]) -> Result<()> {
        let (replies, handler) = {
            let mut state = self.state.lock();
            Self::check(&state, MockFailure::Write)?;
            state.writes.push((characteristic, Bytes::copy_from_slice(chunk)));

            let complete = state.assemblers.entry(characteristic).or_default().push(chunk);
            let Some(message) = complete else {
                return Ok(());
            };
            state.messages.push((characteristic, message.clone()));

            let replies = match state.responder.as_mut() {
                Some(responder) => responder.respond(characteristic, &message),
                None => Vec::new(),
            };
            (replies, state.handlers.get(&characteristic).cloned())
        };

        // Handlers run outside the lock so they may call back into the mock
        if let Some(handler) = handler {
            for reply in &replies {
                for piece in split_chunks(reply) {
                    handler(piece);
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, MockFailure::Close)?;
        state.handlers.clear();
        state.closed = true;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Device double answering each outbound message with the next reply set
///
/// Reply sets are consumed in order; once exhausted the device stays silent.
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    replies: VecDeque<Vec<Bytes>>,
}

impl ScriptedDevice {
    /// Device with no scripted replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next message with raw `messages`
    pub fn reply(mut self, messages: Vec<Bytes>) -> Self {
        self.replies.push_back(messages);
        self
    }

    /// Answer the next message with plain `commands`
    pub fn reply_plain(self, commands: &[Command]) -> Self {
        self.reply(commands.iter().map(Command::to_bytes).collect())
    }

    /// Answer the next message with `commands` sealed for `authorization_id`
    pub fn reply_encrypted(
        self,
        authorization_id: u32,
        key: &SharedKey,
        commands: &[Command],
    ) -> nuki_protocol::Result<Self> {
        let mut nonces = OsNonceSource;
        let sealed = commands
            .iter()
            .map(|cmd| encrypt_command(authorization_id, key, cmd, &mut nonces))
            .collect::<nuki_protocol::Result<Vec<_>>>()?;
        Ok(self.reply(sealed))
    }

    /// Do not answer the next message
    pub fn silent(self) -> Self {
        self.reply(Vec::new())
    }

    /// Reply sets not yet used
    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl MockResponder for ScriptedDevice {
    fn respond(&mut self, _characteristic: Uuid, _message: &[u8]) -> Vec<Bytes> {
        self.replies.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MTU, SMARTLOCK_PROFILE};
    use nuki_protocol::CommandId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_mock_profiles() {
        let mock = MockTransport::new(DeviceType::SmartLock);
        assert!(mock.has_characteristic(SMARTLOCK_PROFILE.user).await.unwrap());
        let empty = MockTransport::empty();
        assert!(!empty.has_characteristic(SMARTLOCK_PROFILE.user).await.unwrap());
    }

    #[tokio::test]
    async fn test_scripted_replies_are_chunked() {
        let reply = Command::new(CommandId::Challenge, &[0x42; 32]);
        let mock = MockTransport::new(DeviceType::SmartLock)
            .with_device(ScriptedDevice::new().reply_plain(&[reply]));

        let chunks = Arc::new(AtomicUsize::new(0));
        let seen = chunks.clone();
        let handler: NotificationHandler = Arc::new(move |chunk: &[u8]| {
            assert!(chunk.len() <= MTU);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        mock.subscribe(SMARTLOCK_PROFILE.general, handler).await.unwrap();

        mock.write(SMARTLOCK_PROFILE.general, &[0x01, 0x00]).await.unwrap();
        assert_eq!(chunks.load(Ordering::SeqCst), 2);
        assert_eq!(mock.messages(SMARTLOCK_PROFILE.general).len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mock = MockTransport::new(DeviceType::SmartLock);
        mock.fail_on(MockFailure::Write);
        let err = mock.write(SMARTLOCK_PROFILE.general, &[0]).await.unwrap_err();
        assert!(matches!(err, NukiError::Transport(_)));
        assert!(mock.writes().is_empty());
    }
}
