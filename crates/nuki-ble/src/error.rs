//! Error types for client operations
//!
//! Every client operation is a straight sequence of sends and waits. When a
//! step fails, the error is wrapped in [`NukiError::Step`] naming the step,
//! so a caller sees for example "Error while waiting for challenge: Response
//! timeout after 10000ms".

use nuki_protocol::{
    CommandId, CompletionStatus, DeviceError, DeviceType, LockAction, LockState, ProtocolError,
};
use thiserror::Error;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum NukiError {
    // ===== Transport Errors =====
    /// No transport is attached
    #[error("The connection is not established")]
    NotConnected,

    /// No credentials are installed
    #[error("The client is not authenticated")]
    NotAuthenticated,

    /// Neither device profile exposes the characteristic
    #[error("Unable to find {0} characteristic")]
    CharacteristicNotFound(String),

    /// Transport failure (write, subscribe, close)
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response within the configured timeout
    #[error("Response timeout after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Notification source went away
    #[error("Channel closed")]
    ChannelClosed,

    // ===== Framing/Crypto Errors =====
    /// CRC, length or decryption failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Decrypted message belongs to another authorization
    #[error("Unexpected authorization id: expected {expected}, got {got}")]
    UnexpectedAuthorizationId {
        /// Id bound to the channel
        expected: u32,
        /// Id found in the message
        got: u32,
    },

    // ===== Protocol Errors =====
    /// Response id not valid at this point of the exchange
    #[error("Unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        /// What the exchange allows here
        expected: &'static str,
        /// Received id
        got: CommandId,
    },

    /// Status value not valid at this point of the exchange
    #[error("Unexpected status: expected {expected:?}, got {got:?}")]
    UnexpectedStatus {
        /// Required status
        expected: CompletionStatus,
        /// Received status
        got: CompletionStatus,
    },

    /// Lock did not go through the expected state
    #[error("Unexpected lock state: expected {expected:?}, got {got:?}")]
    UnexpectedLockState {
        /// Required state
        expected: LockState,
        /// Reported state
        got: LockState,
    },

    /// Operation is not available for this device family
    #[error("Unexpected device type: this operation is only available for {required}, connected to {actual}")]
    UnsupportedDeviceType {
        /// Family the operation needs
        required: DeviceType,
        /// Family discovered on connect
        actual: DeviceType,
    },

    /// Action has no known state transitions to track
    #[error("Lock action {0:?} cannot be tracked")]
    UnsupportedLockAction(LockAction),

    /// Device authenticator in the pairing reply did not verify
    #[error("Device authenticator mismatch")]
    AuthenticatorMismatch,

    // ===== Device Errors =====
    /// ErrorReport sent by the device
    #[error("Device error 0x{code:02X}: {0}", code = .0.code())]
    Device(#[from] DeviceError),

    // ===== Configuration Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ===== Aggregate Errors =====
    /// One or more resources failed to close
    #[error("Error while closing resources: [{}]", join(.0))]
    Close(Vec<NukiError>),

    /// Failure annotated with the step it occurred in
    #[error("Error while {step}: {source}")]
    Step {
        /// What was being done
        step: &'static str,
        /// Underlying failure
        #[source]
        source: Box<NukiError>,
    },
}

fn join(errors: &[NukiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl NukiError {
    /// Wrap this error with the step it occurred in
    pub fn in_step(self, step: &'static str) -> Self {
        NukiError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping step annotations
    pub fn root(&self) -> &NukiError {
        match self {
            NukiError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the innermost step, if any
    pub fn step(&self) -> Option<&'static str> {
        match self {
            NukiError::Step { step, source } => source.step().or(Some(*step)),
            _ => None,
        }
    }

    /// Check if this error is recoverable/retriable
    pub fn is_retriable(&self) -> bool {
        match self.root() {
            NukiError::Timeout { .. } | NukiError::Transport(_) => true,
            NukiError::Device(err) => err.is_retriable(),
            _ => false,
        }
    }

    /// Check if this is a protocol error (bad data from device)
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self.root(),
            NukiError::Protocol(_)
                | NukiError::UnexpectedAuthorizationId { .. }
                | NukiError::UnexpectedResponse { .. }
                | NukiError::UnexpectedStatus { .. }
                | NukiError::UnexpectedLockState { .. }
                | NukiError::AuthenticatorMismatch
        )
    }

    /// Get an error code for logging/metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            NukiError::NotConnected => "NOT_CONNECTED",
            NukiError::NotAuthenticated => "NOT_AUTHENTICATED",
            NukiError::CharacteristicNotFound(_) => "CHARACTERISTIC_NOT_FOUND",
            NukiError::Transport(_) => "TRANSPORT_ERROR",
            NukiError::Timeout { .. } => "TIMEOUT",
            NukiError::Cancelled => "CANCELLED",
            NukiError::ChannelClosed => "CHANNEL_CLOSED",
            NukiError::Protocol(err) => err.error_code(),
            NukiError::UnexpectedAuthorizationId { .. } => "UNEXPECTED_AUTHORIZATION_ID",
            NukiError::UnexpectedResponse { .. } => "UNEXPECTED_RESPONSE",
            NukiError::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            NukiError::UnexpectedLockState { .. } => "UNEXPECTED_LOCK_STATE",
            NukiError::UnsupportedDeviceType { .. } => "UNSUPPORTED_DEVICE_TYPE",
            NukiError::UnsupportedLockAction(_) => "UNSUPPORTED_LOCK_ACTION",
            NukiError::AuthenticatorMismatch => "AUTHENTICATOR_MISMATCH",
            NukiError::Device(err) => err.error_code(),
            NukiError::InvalidConfig(_) => "INVALID_CONFIG",
            NukiError::Close(_) => "CLOSE_FAILED",
            NukiError::Step { source, .. } => source.error_code(),
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, NukiError>;

/// Attach a step name to a failing result
pub(crate) trait StepExt<T> {
    fn step(self, step: &'static str) -> Result<T>;
}

impl<T, E> StepExt<T> for std::result::Result<T, E>
where
    E: Into<NukiError>,
{
    fn step(self, step: &'static str) -> Result<T> {
        self.map_err(|err| err.into().in_step(step))
    }
}

// Conversion from btleplug errors (only when ble feature is enabled)
#[cfg(feature = "ble")]
impl From<btleplug::Error> for NukiError {
    fn from(err: btleplug::Error) -> Self {
        NukiError::Transport(err.to_string())
    }
}
