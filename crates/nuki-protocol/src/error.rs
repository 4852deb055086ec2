//! Error types for the wire layer
//!
//! Everything that can go wrong while framing, parsing, sealing or opening
//! a command ends up here. Failures reported *by the device* live in
//! [`crate::device_error`] instead.

use thiserror::Error;

use crate::command::CommandId;

/// Framing and crypto failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // ===== Framing Errors =====
    /// CRC did not match the bytes it protects
    #[error("Bad CRC: expected 0x{expected:04X}, got 0x{got:04X}")]
    BadCrc {
        /// CRC computed over the received bytes
        expected: u16,
        /// CRC carried on the wire
        got: u16,
    },

    /// Fewer bytes than the envelope or view needs
    #[error("Message too short: need {need} bytes, got {got}")]
    TooShort {
        /// Minimum length required
        need: usize,
        /// Actual length
        got: usize,
    },

    /// A typed view was requested over the wrong command
    #[error("Unexpected command: expected {expected}, got {got}")]
    UnexpectedCommand {
        /// Id the view decodes
        expected: CommandId,
        /// Id of the command at hand
        got: CommandId,
    },

    /// Payload length matches no known device variant
    #[error("Unsupported payload for {command}: {len} bytes")]
    UnsupportedPayload {
        /// Command the payload belongs to
        command: CommandId,
        /// Payload length
        len: usize,
    },

    /// Date/time fields do not form a valid timestamp
    #[error("Invalid timestamp {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")]
    InvalidTimestamp {
        /// Year
        year: u16,
        /// Month
        month: u8,
        /// Day
        day: u8,
        /// Hour
        hour: u8,
        /// Minute
        minute: u8,
        /// Second
        second: u8,
    },

    // ===== Crypto Errors =====
    /// Box could not be opened with the shared key
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Key material has the wrong size
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// Box could not be sealed
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Sealed message does not fit the 16-bit length field
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge {
        /// Actual size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Authorization id in the envelope header differs from the sealed one
    #[error("Authorization id mismatch: header {header}, sealed {inner}")]
    AuthorizationIdMismatch {
        /// Id in the unencrypted header
        header: u32,
        /// Id inside the box
        inner: u32,
    },

    /// Authenticator sent by the device does not match the expected one
    #[error("Device authenticator mismatch")]
    AuthenticatorMismatch,

    // ===== Input Errors =====
    /// PIN is not four decimal digits
    #[error("Invalid PIN: {0}")]
    InvalidPin(String),
}

impl ProtocolError {
    /// Get an error code for logging/metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::BadCrc { .. } => "BAD_CRC",
            ProtocolError::TooShort { .. } => "TOO_SHORT",
            ProtocolError::UnexpectedCommand { .. } => "UNEXPECTED_COMMAND",
            ProtocolError::UnsupportedPayload { .. } => "UNSUPPORTED_PAYLOAD",
            ProtocolError::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            ProtocolError::DecryptionFailed => "DECRYPTION_FAILED",
            ProtocolError::InvalidKeyLength { .. } => "INVALID_KEY_LENGTH",
            ProtocolError::EncryptionFailed => "ENCRYPTION_FAILED",
            ProtocolError::MessageTooLarge { .. } => "MESSAGE_TOO_LARGE",
            ProtocolError::AuthorizationIdMismatch { .. } => "AUTHORIZATION_ID_MISMATCH",
            ProtocolError::AuthenticatorMismatch => "AUTHENTICATOR_MISMATCH",
            ProtocolError::InvalidPin(_) => "INVALID_PIN",
        }
    }

    /// True for failures caused by corrupted or forged bytes
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::BadCrc { .. }
                | ProtocolError::DecryptionFailed
                | ProtocolError::AuthorizationIdMismatch { .. }
                | ProtocolError::AuthenticatorMismatch
        )
    }
}

/// Result type alias for wire-layer operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ProtocolError::DecryptionFailed.error_code(), "DECRYPTION_FAILED");
        let err = ProtocolError::BadCrc {
            expected: 0x1234,
            got: 0xABCD,
        };
        assert_eq!(err.error_code(), "BAD_CRC");
        assert!(err.to_string().contains("0x1234"));
        assert!(err.to_string().contains("0xABCD"));
    }

    #[test]
    fn test_integrity_errors() {
        assert!(ProtocolError::DecryptionFailed.is_integrity_error());
        assert!(!ProtocolError::InvalidPin("12".into()).is_integrity_error());
    }

    #[test]
    fn test_unsupported_payload_message() {
        let err = ProtocolError::UnsupportedPayload {
            command: CommandId::Config,
            len: 12,
        };
        assert_eq!(err.to_string(), "Unsupported payload for Config: 12 bytes");
    }
}
