//! Wire protocol for Nuki SmartLock and Opener devices
//!
//! This crate holds everything about the protocol that does not need a radio:
//! the CRC-framed command envelope, typed views over device responses, the
//! builders for client requests, and the cryptography used during pairing and
//! on the encrypted user channel. It performs no I/O and has no async code.
//!
//! # Layers
//!
//! 1. **Framing** - [`Command`] with CRC-16/CCITT-FALSE, [`CommandId`]
//! 2. **Views** - borrowed typed projections such as [`States`] and [`Config`]
//! 3. **Pairing** - HMAC-SHA256 authenticators keyed by the [`SharedKey`]
//! 4. **Channel** - XSalsa20-Poly1305 sealing of commands for one authorization
//!
//! # Example
//!
//! ```rust
//! use nuki_protocol::{requests, Command, CommandId};
//!
//! let cmd = requests::request_data(CommandId::KeyturnerStates);
//! assert_eq!(hex::encode_upper(cmd.as_bytes()), "01000C0019B7");
//!
//! let decoded = Command::decode(cmd.to_bytes()).unwrap();
//! assert_eq!(decoded.payload(), &[0x0C, 0x00]);
//! ```
//!
//! # Sealed message layout
//!
//! ```text
//! nonce:24 ‖ auth_id:4 LE ‖ len:2 LE ‖ box(auth_id ‖ id:2 ‖ payload ‖ crc:2)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod command;
pub mod crypto;
pub mod device_error;
pub mod error;
pub mod timezone;
pub mod types;

pub use command::requests;
pub use command::{
    crc16, AuthorizationIdCommand, ChallengeCommand, Command, CommandId, Config,
    ErrorReportCommand, LogEntryCommand, LogEntryCountCommand, LogEntryDetail, OpenerConfig,
    OpenerStates, OwnedLogEntry, PublicKeyCommand, SmartLockConfig, SmartLockStates, States,
    StatusCommand,
};
pub use crypto::channel::{decrypt_command, encrypt_command};
pub use crypto::pairing::{
    authorization_authenticator, authorization_data, authorization_id_confirmation,
    verify_authorization_id, AuthorizationData,
};
pub use crypto::{Credentials, KeyPair, NonceSource, OsNonceSource, SharedKey, StaticNonceSource};
pub use device_error::DeviceError;
pub use error::{ProtocolError, Result};
pub use timezone::TimeZoneId;
pub use types::{
    ClientIdType, CompletionStatus, DeviceType, DoorSensorState, LockAction, LockState,
    LogSortOrder, LoggingType, NukiState, OpenAction, Pin, Trigger, Version,
};
