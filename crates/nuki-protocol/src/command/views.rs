//! Fixed-layout views used during pairing and request/response handling

use super::{Command, CommandId};
use crate::error::Result;
use crate::types::CompletionStatus;

/// Size of public keys
pub const PUBLIC_KEY_LEN: usize = 32;

/// Size of challenge nonces
pub const CHALLENGE_NONCE_LEN: usize = 32;

/// Public key announced by the device
#[derive(Debug, Clone, Copy)]
pub struct PublicKeyCommand<'a> {
    cmd: &'a Command,
}

impl<'a> PublicKeyCommand<'a> {
    /// View `cmd` as a public key
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::PublicKey)?;
        cmd.expect_payload_len(PUBLIC_KEY_LEN)?;
        Ok(Self { cmd })
    }

    /// The 32-byte key
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(&self.cmd.payload()[..PUBLIC_KEY_LEN]);
        key
    }
}

/// Device-issued nonce to be embedded in the next request
#[derive(Debug, Clone, Copy)]
pub struct ChallengeCommand<'a> {
    cmd: &'a Command,
}

impl<'a> ChallengeCommand<'a> {
    /// View `cmd` as a challenge
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::Challenge)?;
        cmd.expect_payload_len(CHALLENGE_NONCE_LEN)?;
        Ok(Self { cmd })
    }

    /// Nonce bytes
    pub fn nonce(&self) -> &'a [u8] {
        self.cmd.payload()
    }
}

/// Completion status of the previous request
#[derive(Debug, Clone, Copy)]
pub struct StatusCommand<'a> {
    cmd: &'a Command,
}

impl<'a> StatusCommand<'a> {
    /// View `cmd` as a status
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::Status)?;
        cmd.expect_payload_len(1)?;
        Ok(Self { cmd })
    }

    /// Reported status
    pub fn status(&self) -> CompletionStatus {
        CompletionStatus::from(self.cmd.payload()[0])
    }

    /// Request fully executed
    pub fn is_complete(&self) -> bool {
        self.status() == CompletionStatus::Complete
    }

    /// Request accepted, completion follows
    pub fn is_accepted(&self) -> bool {
        self.status() == CompletionStatus::Accepted
    }
}

/// Authorization assigned by the device during pairing
///
/// Layout: `authenticator:32 ‖ authorization_id:4 ‖ uuid:16 ‖ nonce:32`
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationIdCommand<'a> {
    cmd: &'a Command,
}

impl<'a> AuthorizationIdCommand<'a> {
    const MIN_LEN: usize = 32 + 4 + 16;

    /// View `cmd` as an authorization id response
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::AuthorizationId)?;
        cmd.expect_payload_len(Self::MIN_LEN)?;
        Ok(Self { cmd })
    }

    /// Device's authenticator over the remaining fields
    pub fn authenticator(&self) -> &'a [u8] {
        &self.cmd.payload()[..32]
    }

    /// Assigned authorization id
    pub fn authorization_id(&self) -> u32 {
        let p = self.cmd.payload();
        u32::from_le_bytes([p[32], p[33], p[34], p[35]])
    }

    /// Device uuid
    pub fn uuid(&self) -> &'a [u8] {
        &self.cmd.payload()[36..52]
    }

    /// Fresh device nonce for the confirmation step
    pub fn nonce(&self) -> &'a [u8] {
        &self.cmd.payload()[52..]
    }
}

/// Error reported by the device
#[derive(Debug, Clone, Copy)]
pub struct ErrorReportCommand<'a> {
    cmd: &'a Command,
}

impl<'a> ErrorReportCommand<'a> {
    /// View `cmd` as an error report
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::ErrorReport)?;
        cmd.expect_payload_len(1)?;
        Ok(Self { cmd })
    }

    /// Raw error code
    pub fn code(&self) -> u8 {
        self.cmd.payload()[0]
    }

    /// Command that triggered the error, when the device reports it
    pub fn command_id(&self) -> Option<CommandId> {
        let p = self.cmd.payload();
        (p.len() >= 3).then(|| CommandId::from(u16::from_le_bytes([p[1], p[2]])))
    }
}
