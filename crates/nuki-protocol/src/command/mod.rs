//! Command envelope and typed views
//!
//! Every message exchanged with a device, encrypted or not, is a command:
//!
//! ```text
//! [id:2 LE][payload:n][crc16:2 LE]
//! ```
//!
//! The CRC is CRC-16/CCITT-FALSE over `id‖payload`. A [`Command`] is only
//! ever constructed by [`Command::new`] (which appends a fresh CRC) or by
//! [`Command::decode`] (which rejects a bad one), so holding a `Command`
//! means holding a well-formed envelope.
//!
//! Typed views borrow a command and expose its payload fields by name:
//!
//! - [`PublicKeyCommand`], [`ChallengeCommand`], [`StatusCommand`]
//! - [`AuthorizationIdCommand`], [`ErrorReportCommand`]
//! - [`States`] (SmartLock or Opener, resolved by payload length)
//! - [`Config`] (SmartLock or Opener, resolved by payload length)
//! - [`LogEntryCommand`], [`LogEntryCountCommand`]

mod config;
mod log_entry;
pub mod requests;
mod states;
mod time;
mod views;

pub use config::{Config, OpenerConfig, SmartLockConfig};
pub use log_entry::{LogEntryCommand, LogEntryCountCommand, LogEntryDetail, OwnedLogEntry};
pub use states::{OpenerStates, SmartLockStates, States};
pub use views::{
    AuthorizationIdCommand, ChallengeCommand, ErrorReportCommand, PublicKeyCommand, StatusCommand,
};

use bytes::{BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_16_IBM_3740};
use std::fmt;

use crate::error::{ProtocolError, Result};

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Size of the command id field
pub const ID_LEN: usize = 2;

/// Size of the trailing CRC field
pub const CRC_LEN: usize = 2;

/// Smallest valid command: id plus CRC, empty payload
pub const MIN_COMMAND_LEN: usize = ID_LEN + CRC_LEN;

/// Compute the protocol CRC over a sequence of byte slices
pub fn crc16(parts: &[&[u8]]) -> u16 {
    let mut digest = CRC16.digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize()
}

macro_rules! command_ids {
    ($( $(#[$meta:meta])* $name:ident = $value:literal, )+) => {
        /// Identifier of a command on the wire
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandId {
            $( $(#[$meta])* $name, )+
            /// Id not known to this implementation
            Unknown(u16),
        }

        impl CommandId {
            /// Raw little-endian value
            pub fn value(self) -> u16 {
                match self {
                    $( CommandId::$name => $value, )+
                    CommandId::Unknown(v) => v,
                }
            }

            fn name(self) -> Option<&'static str> {
                match self {
                    $( CommandId::$name => Some(stringify!($name)), )+
                    CommandId::Unknown(_) => None,
                }
            }
        }

        impl From<u16> for CommandId {
            fn from(value: u16) -> Self {
                match value {
                    $( $value => CommandId::$name, )+
                    other => CommandId::Unknown(other),
                }
            }
        }
    };
}

command_ids! {
    /// Ask the device to send a command of a given id
    RequestData = 0x0001,
    /// Public key of either party
    PublicKey = 0x0003,
    /// Device-issued nonce
    Challenge = 0x0004,
    /// Pairing step 1 authenticator
    AuthorizationAuthenticator = 0x0005,
    /// Pairing step 2 client identity
    AuthorizationData = 0x0006,
    /// Pairing step 3 device-assigned id
    AuthorizationId = 0x0007,
    /// Remove a user authorization
    RemoveUserAuthorization = 0x0008,
    /// Request the list of authorizations
    RequestAuthorizationEntries = 0x0009,
    /// Single authorization entry
    AuthorizationEntry = 0x000A,
    /// Invite a new authorization
    AuthorizationDataInvite = 0x000B,
    /// Lock or opener state report
    KeyturnerStates = 0x000C,
    /// Lock or open action
    LockAction = 0x000D,
    /// Status (complete/accepted)
    Status = 0x000E,
    /// Most recent command
    MostRecentCommand = 0x000F,
    /// Openings/closings summary
    OpeningsClosingsSummary = 0x0010,
    /// Battery report
    BatteryReport = 0x0011,
    /// Device-side error
    ErrorReport = 0x0012,
    /// Write configuration
    SetConfig = 0x0013,
    /// Read configuration
    RequestConfig = 0x0014,
    /// Configuration report
    Config = 0x0015,
    /// Change the security PIN
    SetSecurityPin = 0x0019,
    /// Start calibration
    RequestCalibration = 0x001A,
    /// Reboot the device
    RequestReboot = 0x001D,
    /// Pairing step 4 confirmation
    AuthorizationIdConfirmation = 0x001E,
    /// Invite by authorization id
    AuthorizationIdInvite = 0x001F,
    /// Verify the security PIN
    VerifySecurityPin = 0x0020,
    /// Set the device clock
    UpdateTime = 0x0021,
    /// Update a user authorization
    UpdateUserAuthorization = 0x0025,
    /// Number of authorization entries
    AuthorizationEntryCount = 0x0027,
    /// Opener bus signal recording
    StartBusSignalRecording = 0x002F,
    /// Request log entries (or their count)
    RequestLogEntries = 0x0031,
    /// Single log entry
    LogEntry = 0x0032,
    /// Log entry count report
    LogEntryCount = 0x0033,
    /// Enable or disable logging
    EnableLogging = 0x0034,
    /// Write advanced configuration
    SetAdvancedConfig = 0x0035,
    /// Read advanced configuration
    RequestAdvancedConfig = 0x0036,
    /// Advanced configuration report
    AdvancedConfig = 0x0037,
    /// Add a time control entry
    AddTimeControlEntry = 0x0039,
    /// Time control entry id
    TimeControlEntryId = 0x003A,
    /// Remove a time control entry
    RemoveTimeControlEntry = 0x003B,
    /// Request time control entries
    RequestTimeControlEntries = 0x003C,
    /// Time control entry count
    TimeControlEntryCount = 0x003D,
    /// Single time control entry
    TimeControlEntry = 0x003E,
    /// Update a time control entry
    UpdateTimeControlEntry = 0x003F,
    /// Add a keypad code
    AddKeypadCode = 0x0041,
    /// Keypad code id
    KeypadCodeId = 0x0042,
    /// Request keypad codes
    RequestKeypadCodes = 0x0043,
    /// Keypad code count
    KeypadCodeCount = 0x0044,
    /// Single keypad code
    KeypadCode = 0x0045,
    /// Update a keypad code
    UpdateKeypadCode = 0x0046,
    /// Remove a keypad code
    RemoveKeypadCode = 0x0047,
    /// Keypad action
    KeypadAction = 0x0048,
    /// Opener continuous mode action
    ContinuousModeAction = 0x0057,
    /// Lock action without challenge
    SimpleLockAction = 0x0100,
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "Unknown(0x{:04X})", self.value()),
        }
    }
}

/// A framed command: `[id:2 LE][payload][crc16:2 LE]`
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Command {
    raw: Bytes,
}

impl Command {
    /// Frame `payload` under `id`, appending the CRC
    pub fn new(id: CommandId, payload: &[u8]) -> Self {
        let id = id.value().to_le_bytes();
        let crc = crc16(&[&id, payload]);

        let mut buf = BytesMut::with_capacity(ID_LEN + payload.len() + CRC_LEN);
        buf.put_slice(&id);
        buf.put_slice(payload);
        buf.put_u16_le(crc);

        Self { raw: buf.freeze() }
    }

    /// Parse received bytes, rejecting short input and CRC mismatches
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self> {
        let raw = bytes.into();
        if raw.len() < MIN_COMMAND_LEN {
            return Err(ProtocolError::TooShort {
                need: MIN_COMMAND_LEN,
                got: raw.len(),
            });
        }

        let command = Self { raw };
        command.check_crc()?;
        Ok(command)
    }

    /// Decoded command id
    pub fn id(&self) -> CommandId {
        CommandId::from(self.raw_id())
    }

    /// Command id as carried on the wire
    pub fn raw_id(&self) -> u16 {
        u16::from_le_bytes([self.raw[0], self.raw[1]])
    }

    /// True when this command carries `id`
    pub fn is(&self, id: CommandId) -> bool {
        self.raw_id() == id.value()
    }

    /// Bytes between id and CRC
    pub fn payload(&self) -> &[u8] {
        &self.raw[ID_LEN..self.raw.len() - CRC_LEN]
    }

    /// CRC carried in the trailing two bytes
    pub fn crc(&self) -> u16 {
        let n = self.raw.len();
        u16::from_le_bytes([self.raw[n - 2], self.raw[n - 1]])
    }

    /// Verify the trailing CRC against `id‖payload`
    pub fn check_crc(&self) -> Result<()> {
        let expected = crc16(&[&self.raw[..self.raw.len() - CRC_LEN]]);
        let got = self.crc();
        if expected != got {
            return Err(ProtocolError::BadCrc { expected, got });
        }
        Ok(())
    }

    /// Full wire representation
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Cheap clone of the wire representation
    pub fn to_bytes(&self) -> Bytes {
        self.raw.clone()
    }

    /// Total length including id and CRC
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Always false: a command holds at least an id and a CRC
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Fail with [`ProtocolError::UnexpectedCommand`] unless this command is `id`
    pub(crate) fn expect_id(&self, id: CommandId) -> Result<()> {
        if !self.is(id) {
            return Err(ProtocolError::UnexpectedCommand {
                expected: id,
                got: self.id(),
            });
        }
        Ok(())
    }

    /// Fail with [`ProtocolError::TooShort`] unless the payload holds `need` bytes
    pub(crate) fn expect_payload_len(&self, need: usize) -> Result<()> {
        let got = self.payload().len();
        if got < need {
            return Err(ProtocolError::TooShort { need, got });
        }
        Ok(())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id())
            .field("payload", &hex::encode_upper(self.payload()))
            .field("crc", &format_args!("0x{:04X}", self.crc()))
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] id={} payload={} crc=0x{:04X}",
            hex::encode_upper(&self.raw),
            self.raw.len(),
            self.id(),
            hex::encode_upper(self.payload()),
            self.crc()
        )
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

/// Fixed-width text field: truncate to `width` bytes, pad with NULs
pub(crate) fn put_padded_str(buf: &mut BytesMut, text: &str, width: usize) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(width);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, width - n);
}

/// Read a NUL-padded text field
pub(crate) fn read_padded_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
