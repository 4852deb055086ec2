//! Reassembly of notification chunks into commands
//!
//! The device sends each response as a sequence of notifications of at most
//! [`MTU`] bytes. A chunk of exactly [`MTU`] bytes means more follow; anything
//! shorter (including an empty chunk) ends the message.

use bytes::{Bytes, BytesMut};
use nuki_protocol::{decrypt_command, Command, SharedKey};
use tracing::{debug, trace, warn};

use crate::error::{NukiError, Result};
use crate::transport::{ChannelKind, MTU};

/// Byte accumulator for one characteristic
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: BytesMut,
}

impl FrameAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning the message if it is now complete
    pub fn push(&mut self, chunk: &[u8]) -> Option<Bytes> {
        self.buf.extend_from_slice(chunk);
        if chunk.len() == MTU {
            return None;
        }
        Some(self.buf.split().freeze())
    }

    /// Bytes received for the message in progress
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial message
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

/// How complete messages are turned into commands
pub enum Decoder {
    /// CRC-framed plaintext (general channel)
    Plain,
    /// Sealed messages for one authorization (user channel)
    Encrypted {
        /// Id every inner message must carry
        authorization_id: u32,
        /// Shared key of the authorization
        key: SharedKey,
    },
}

impl Decoder {
    /// Channel this decoder belongs to
    pub fn kind(&self) -> ChannelKind {
        match self {
            Decoder::Plain => ChannelKind::General,
            Decoder::Encrypted { .. } => ChannelKind::User,
        }
    }

    /// Decode one complete message
    pub fn decode(&self, message: Bytes) -> Result<Command> {
        match self {
            Decoder::Plain => Ok(Command::decode(message)?),
            Decoder::Encrypted {
                authorization_id,
                key,
            } => {
                let (inner_id, cmd) = decrypt_command(&message, key)?;
                if inner_id != *authorization_id {
                    return Err(NukiError::UnexpectedAuthorizationId {
                        expected: *authorization_id,
                        got: inner_id,
                    });
                }
                Ok(cmd)
            }
        }
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decoder::Plain => f.write_str("Plain"),
            Decoder::Encrypted {
                authorization_id, ..
            } => f
                .debug_struct("Encrypted")
                .field("authorization_id", authorization_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Assembler and decoder for one subscribed characteristic
#[derive(Debug)]
pub struct Reassembler {
    assembler: FrameAssembler,
    decoder: Decoder,
}

impl Reassembler {
    /// Create a reassembler using `decoder`
    pub fn new(decoder: Decoder) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            decoder,
        }
    }

    /// Reassembler for the general channel
    pub fn plain() -> Self {
        Self::new(Decoder::Plain)
    }

    /// Reassembler for the user channel of `authorization_id`
    pub fn encrypted(authorization_id: u32, key: SharedKey) -> Self {
        Self::new(Decoder::Encrypted {
            authorization_id,
            key,
        })
    }

    /// Channel this reassembler serves
    pub fn kind(&self) -> ChannelKind {
        self.decoder.kind()
    }

    /// Feed one notification chunk
    ///
    /// Returns `None` while the message is incomplete. The buffer is empty
    /// again after every returned result, good or bad.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Result<Command>> {
        let tag = self.kind().tag();
        let Some(message) = self.assembler.push(chunk) else {
            trace!(
                channel = tag,
                chunk = chunk.len(),
                pending = self.assembler.pending(),
                "Partial message"
            );
            return None;
        };

        let result = self.decoder.decode(message);
        match &result {
            Ok(cmd) => debug!(channel = tag, %cmd, "Received command"),
            Err(e) => warn!(channel = tag, error = %e, "Failed to decode message"),
        }
        Some(result)
    }
}
