//! Errors reported by the device through ErrorReport commands

use thiserror::Error;

use crate::command::{Command, CommandId, ErrorReportCommand};
use crate::types::DeviceType;

/// Error code sent by a SmartLock or Opener
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceError {
    // ===== General Errors =====
    /// 0xFD
    #[error("CRC of received command is invalid")]
    BadCrc,

    /// 0xFE
    #[error("length of retrieved command payload does not match expected length")]
    BadLength,

    /// 0xFF, or any code not listed here
    #[error("unknown error (0x{0:02X})")]
    Unknown(u8),

    // ===== Pairing Errors =====
    /// 0x10
    #[error("public key was requested but the device is not in pairing mode")]
    NotPairing,

    /// 0x11
    #[error("received authenticator does not match the device's own")]
    BadAuthenticator,

    /// 0x12
    #[error("provided parameter is outside of its valid range")]
    PairingBadParameter,

    /// 0x13
    #[error("the maximum number of users has been reached")]
    MaxUser,

    // ===== Keyturner Errors =====
    /// 0x20
    #[error("authorization id is invalid or the payload could not be decrypted with its shared key")]
    NotAuthorized,

    /// 0x21
    #[error("the provided pin does not match the stored one")]
    BadPin,

    /// 0x22
    #[error("the provided nonce does not match the last one or has already been used")]
    BadNonce,

    /// 0x23
    #[error("a provided parameter is outside of its valid range")]
    BadParameter,

    /// 0x24
    #[error("the authorization id to delete does not exist")]
    InvalidAuthId,

    /// 0x25
    #[error("the authorization id is currently disabled")]
    Disabled,

    /// 0x26
    #[error("the authorization id has not been granted remote access")]
    RemoteNotAllowed,

    /// 0x27
    #[error("the authorization id has not been granted access at the current time")]
    TimeNotAllowed,

    /// 0x28
    #[error("an invalid pin has been provided too often")]
    TooManyPinAttempts,

    /// 0x29
    #[error("no more entries can be stored")]
    TooManyEntries,

    /// 0x2A
    #[error("the keypad code already exists")]
    CodeAlreadyExists,

    /// 0x2B
    #[error("the entered keypad code is invalid")]
    CodeInvalid,

    /// 0x2C
    #[error("an invalid pin has been provided multiple times (1)")]
    CodeInvalidTimeout1,

    /// 0x2D
    #[error("an invalid pin has been provided multiple times (2)")]
    CodeInvalidTimeout2,

    /// 0x2E
    #[error("an invalid pin has been provided multiple times (3)")]
    CodeInvalidTimeout3,

    // ===== Motor Errors =====
    /// 0x40
    #[error("auto unlock refused, a lock action was executed shortly before")]
    AutoUnlockTooRecent,

    /// 0x41
    #[error("the device is unsure about its actual lock position")]
    PositionUnknown,

    /// 0x42
    #[error("the motor blocks")]
    MotorBlocked,

    /// 0x43
    #[error("there is a problem with the clutch during motor movement")]
    ClutchFailure,

    /// 0x44
    #[error("the motor moved for too long without blocking")]
    MotorTimeout,

    /// 0x45
    #[error("there is already a lock action processing")]
    Busy,

    /// 0x46
    #[error("the user canceled the motor movement by pressing the button")]
    Canceled,

    /// 0x47 on a SmartLock
    #[error("the Smart Lock has not yet been calibrated")]
    NotCalibrated,

    /// 0x47 on an Opener
    #[error("the Opener is not in operating mode 0x00 and has not yet been trained")]
    NotTrained,

    /// 0x48
    #[error("the internal position database cannot store any more values")]
    MotorPositionLimit,

    /// 0x49 on a SmartLock
    #[error("the motor blocks because of low voltage")]
    MotorLowVoltage,

    /// 0x49 on an Opener
    #[error("no voltage detected on the BUS connection")]
    LowVoltage,

    /// 0x4A
    #[error("power drain during motor movement is zero")]
    MotorPowerFailure,

    /// 0x4B on a SmartLock
    #[error("the power drain during clutch movement is zero")]
    ClutchPowerFailure,

    /// 0x4B on an Opener
    #[error("BUS signal recording ran for more than 30s without a signal")]
    RecordingTimeout,

    /// 0x4C
    #[error("the battery voltage is too low to start a calibration")]
    VoltageTooLow,

    /// 0x4D
    #[error("a firmware update is mandatory")]
    FirmwareUpdateNeeded,

    /// 0x50
    #[error("operating mode is not in the valid range of the firmware")]
    OperatingModeUnknown,
}

impl DeviceError {
    /// Map a wire code; 0x47, 0x49 and 0x4B depend on the device family
    pub fn from_code(code: u8, device_type: DeviceType) -> Self {
        let smartlock = device_type == DeviceType::SmartLock;
        match code {
            0xFD => DeviceError::BadCrc,
            0xFE => DeviceError::BadLength,
            0x10 => DeviceError::NotPairing,
            0x11 => DeviceError::BadAuthenticator,
            0x12 => DeviceError::PairingBadParameter,
            0x13 => DeviceError::MaxUser,
            0x20 => DeviceError::NotAuthorized,
            0x21 => DeviceError::BadPin,
            0x22 => DeviceError::BadNonce,
            0x23 => DeviceError::BadParameter,
            0x24 => DeviceError::InvalidAuthId,
            0x25 => DeviceError::Disabled,
            0x26 => DeviceError::RemoteNotAllowed,
            0x27 => DeviceError::TimeNotAllowed,
            0x28 => DeviceError::TooManyPinAttempts,
            0x29 => DeviceError::TooManyEntries,
            0x2A => DeviceError::CodeAlreadyExists,
            0x2B => DeviceError::CodeInvalid,
            0x2C => DeviceError::CodeInvalidTimeout1,
            0x2D => DeviceError::CodeInvalidTimeout2,
            0x2E => DeviceError::CodeInvalidTimeout3,
            0x40 => DeviceError::AutoUnlockTooRecent,
            0x41 => DeviceError::PositionUnknown,
            0x42 => DeviceError::MotorBlocked,
            0x43 => DeviceError::ClutchFailure,
            0x44 => DeviceError::MotorTimeout,
            0x45 => DeviceError::Busy,
            0x46 => DeviceError::Canceled,
            0x47 if smartlock => DeviceError::NotCalibrated,
            0x47 => DeviceError::NotTrained,
            0x48 => DeviceError::MotorPositionLimit,
            0x49 if smartlock => DeviceError::MotorLowVoltage,
            0x49 => DeviceError::LowVoltage,
            0x4A => DeviceError::MotorPowerFailure,
            0x4B if smartlock => DeviceError::ClutchPowerFailure,
            0x4B => DeviceError::RecordingTimeout,
            0x4C => DeviceError::VoltageTooLow,
            0x4D => DeviceError::FirmwareUpdateNeeded,
            0x50 => DeviceError::OperatingModeUnknown,
            other => DeviceError::Unknown(other),
        }
    }

    /// Decode an ErrorReport command; `None` for any other command
    pub fn from_command(cmd: &Command, device_type: DeviceType) -> Option<Self> {
        if !cmd.is(CommandId::ErrorReport) {
            return None;
        }
        let code = ErrorReportCommand::new(cmd)
            .map(|report| report.code())
            .unwrap_or(0xFF);
        Some(Self::from_code(code, device_type))
    }

    /// Wire code
    pub fn code(&self) -> u8 {
        match self {
            DeviceError::BadCrc => 0xFD,
            DeviceError::BadLength => 0xFE,
            DeviceError::Unknown(code) => *code,
            DeviceError::NotPairing => 0x10,
            DeviceError::BadAuthenticator => 0x11,
            DeviceError::PairingBadParameter => 0x12,
            DeviceError::MaxUser => 0x13,
            DeviceError::NotAuthorized => 0x20,
            DeviceError::BadPin => 0x21,
            DeviceError::BadNonce => 0x22,
            DeviceError::BadParameter => 0x23,
            DeviceError::InvalidAuthId => 0x24,
            DeviceError::Disabled => 0x25,
            DeviceError::RemoteNotAllowed => 0x26,
            DeviceError::TimeNotAllowed => 0x27,
            DeviceError::TooManyPinAttempts => 0x28,
            DeviceError::TooManyEntries => 0x29,
            DeviceError::CodeAlreadyExists => 0x2A,
            DeviceError::CodeInvalid => 0x2B,
            DeviceError::CodeInvalidTimeout1 => 0x2C,
            DeviceError::CodeInvalidTimeout2 => 0x2D,
            DeviceError::CodeInvalidTimeout3 => 0x2E,
            DeviceError::AutoUnlockTooRecent => 0x40,
            DeviceError::PositionUnknown => 0x41,
            DeviceError::MotorBlocked => 0x42,
            DeviceError::ClutchFailure => 0x43,
            DeviceError::MotorTimeout => 0x44,
            DeviceError::Busy => 0x45,
            DeviceError::Canceled => 0x46,
            DeviceError::NotCalibrated | DeviceError::NotTrained => 0x47,
            DeviceError::MotorPositionLimit => 0x48,
            DeviceError::MotorLowVoltage | DeviceError::LowVoltage => 0x49,
            DeviceError::MotorPowerFailure => 0x4A,
            DeviceError::ClutchPowerFailure | DeviceError::RecordingTimeout => 0x4B,
            DeviceError::VoltageTooLow => 0x4C,
            DeviceError::FirmwareUpdateNeeded => 0x4D,
            DeviceError::OperatingModeUnknown => 0x50,
        }
    }

    /// Get an error code for logging/metrics
    pub fn error_code(&self) -> &'static str {
        match self.code() {
            0x10..=0x13 => "DEVICE_PAIRING_ERROR",
            0x20..=0x2E => "DEVICE_KEYTURNER_ERROR",
            0x40..=0x50 => "DEVICE_MOTOR_ERROR",
            _ => "DEVICE_ERROR",
        }
    }

    /// Whether repeating the request later may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            DeviceError::BadCrc
                | DeviceError::BadLength
                | DeviceError::BadNonce
                | DeviceError::Busy
                | DeviceError::AutoUnlockTooRecent
                | DeviceError::MotorTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_codes() {
        assert_eq!(DeviceError::from_code(0xFD, DeviceType::SmartLock), DeviceError::BadCrc);
        assert_eq!(DeviceError::from_code(0xFE, DeviceType::Opener), DeviceError::BadLength);
        assert_eq!(
            DeviceError::from_code(0xFF, DeviceType::SmartLock),
            DeviceError::Unknown(0xFF)
        );
        assert_eq!(
            DeviceError::from_code(0x99, DeviceType::SmartLock),
            DeviceError::Unknown(0x99)
        );
    }

    #[test]
    fn test_device_type_dependent_codes() {
        let sl = DeviceType::SmartLock;
        let op = DeviceType::Opener;
        assert_eq!(DeviceError::from_code(0x47, sl), DeviceError::NotCalibrated);
        assert_eq!(DeviceError::from_code(0x47, op), DeviceError::NotTrained);
        assert_eq!(DeviceError::from_code(0x49, sl), DeviceError::MotorLowVoltage);
        assert_eq!(DeviceError::from_code(0x49, op), DeviceError::LowVoltage);
        assert_eq!(DeviceError::from_code(0x4B, sl), DeviceError::ClutchPowerFailure);
        assert_eq!(DeviceError::from_code(0x4B, op), DeviceError::RecordingTimeout);
    }

    #[test]
    fn test_code_roundtrip() {
        for code in 0u8..=0xFF {
            for dt in [DeviceType::SmartLock, DeviceType::Opener] {
                assert_eq!(DeviceError::from_code(code, dt).code(), code);
            }
        }
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            DeviceError::BadPin.to_string(),
            "the provided pin does not match the stored one"
        );
        assert_eq!(DeviceError::Unknown(0x77).to_string(), "unknown error (0x77)");
    }

    #[test]
    fn test_from_command() {
        let report = Command::new(CommandId::ErrorReport, &[0x21, 0x0D, 0x00]);
        assert_eq!(
            DeviceError::from_command(&report, DeviceType::SmartLock),
            Some(DeviceError::BadPin)
        );
        let status = Command::new(CommandId::Status, &[0x00]);
        assert_eq!(DeviceError::from_command(&status, DeviceType::SmartLock), None);
    }

    #[test]
    fn test_classification() {
        assert!(DeviceError::Busy.is_retriable());
        assert!(!DeviceError::BadPin.is_retriable());
        assert_eq!(DeviceError::BadPin.error_code(), "DEVICE_KEYTURNER_ERROR");
        assert_eq!(DeviceError::MaxUser.error_code(), "DEVICE_PAIRING_ERROR");
        assert_eq!(DeviceError::MotorBlocked.error_code(), "DEVICE_MOTOR_ERROR");
    }
}
