//! Log entry and log entry count views

use chrono::{DateTime, Utc};
use std::fmt;

use super::time::read_utc;
use super::{read_padded_str, Command, CommandId};
use crate::error::Result;
use crate::types::{LockAction, LoggingType, Trigger};

const LOG_ENTRY_MIN_LEN: usize = 48;

/// Single audit log entry
///
/// Layout: `index:4 ‖ timestamp:7 ‖ auth_id:4 ‖ name:32 ‖ type:1 ‖ details`
#[derive(Debug, Clone, Copy)]
pub struct LogEntryCommand<'a> {
    cmd: &'a Command,
}

/// Type-specific part of a log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntryDetail {
    /// Logging was switched on or off
    Logging {
        /// New state
        enabled: bool,
    },
    /// Lock action, calibration or initialization run
    LockAction {
        /// Action performed
        action: LockAction,
        /// What triggered it
        trigger: Trigger,
        /// Action flags
        flags: u8,
        /// Completion status byte
        completion_status: u8,
    },
    /// Action triggered from a keypad
    KeypadAction {
        /// Action performed
        action: LockAction,
        /// Keypad source
        source: u8,
        /// Completion status byte
        completion_status: u8,
        /// Id of the code used
        code_id: u16,
    },
    /// Door sensor event
    DoorSensor {
        /// 0 opened, 1 closed, 2 jammed
        event: u8,
    },
    /// Door sensor logging was switched on or off
    DoorSensorLogging {
        /// New state
        enabled: bool,
    },
    /// Type unknown or details truncated; raw detail bytes
    Unknown(Vec<u8>),
}

impl LogEntryDetail {
    /// Door sensor reported the door opened
    pub fn is_door_opened(&self) -> bool {
        matches!(self, LogEntryDetail::DoorSensor { event: 0x00 })
    }

    /// Door sensor reported the door closed
    pub fn is_door_closed(&self) -> bool {
        matches!(self, LogEntryDetail::DoorSensor { event: 0x01 })
    }

    /// Door sensor reported being jammed
    pub fn is_sensor_jammed(&self) -> bool {
        matches!(self, LogEntryDetail::DoorSensor { event: 0x02 })
    }
}

impl<'a> LogEntryCommand<'a> {
    /// View `cmd` as a log entry
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::LogEntry)?;
        cmd.expect_payload_len(LOG_ENTRY_MIN_LEN)?;
        Ok(Self { cmd })
    }

    /// Underlying command
    pub fn command(&self) -> &'a Command {
        self.cmd
    }

    /// Running index
    pub fn index(&self) -> u32 {
        let p = self.cmd.payload();
        u32::from_le_bytes([p[0], p[1], p[2], p[3]])
    }

    /// When the event happened (UTC)
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        read_utc(&self.cmd.payload()[4..11])
    }

    /// Authorization that caused the event
    pub fn auth_id(&self) -> u32 {
        let p = self.cmd.payload();
        u32::from_le_bytes([p[11], p[12], p[13], p[14]])
    }

    /// Name of that authorization
    pub fn name(&self) -> String {
        read_padded_str(&self.cmd.payload()[15..47])
    }

    /// Entry kind
    pub fn logging_type(&self) -> LoggingType {
        LoggingType::from(self.cmd.payload()[47])
    }

    /// Type-specific fields
    pub fn detail(&self) -> LogEntryDetail {
        let d = &self.cmd.payload()[LOG_ENTRY_MIN_LEN..];
        match (self.logging_type(), d) {
            (LoggingType::LoggingEnabledDisabled, [b, ..]) => {
                LogEntryDetail::Logging { enabled: *b == 0x01 }
            }
            (
                LoggingType::LockAction | LoggingType::Calibration | LoggingType::InitializationRun,
                [action, trigger, flags, status, ..],
            ) => LogEntryDetail::LockAction {
                action: LockAction::from(*action),
                trigger: Trigger::from(*trigger),
                flags: *flags,
                completion_status: *status,
            },
            (LoggingType::KeypadAction, [action, source, status, lo, hi, ..]) => {
                LogEntryDetail::KeypadAction {
                    action: LockAction::from(*action),
                    source: *source,
                    completion_status: *status,
                    code_id: u16::from_le_bytes([*lo, *hi]),
                }
            }
            (LoggingType::DoorSensor, [event, ..]) => LogEntryDetail::DoorSensor { event: *event },
            // The device reports 0x00 for "logging enabled" here.
            (LoggingType::DoorSensorLoggingEnabledDisabled, [b, ..]) => {
                LogEntryDetail::DoorSensorLogging { enabled: *b == 0x00 }
            }
            (_, rest) => LogEntryDetail::Unknown(rest.to_vec()),
        }
    }

    /// Copy the entry out of the borrowed command
    pub fn to_owned_entry(&self) -> OwnedLogEntry {
        OwnedLogEntry {
            command: self.cmd.clone(),
        }
    }
}

impl fmt::Display for LogEntryCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self
            .timestamp()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|_| "invalid time".to_string());
        write!(
            f,
            "[{}][{}][{}][{}]: {:?} > {:?}",
            self.index(),
            time,
            self.auth_id(),
            self.name(),
            self.logging_type(),
            self.detail()
        )
    }
}

/// Log entry that owns its command, for buffering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedLogEntry {
    command: Command,
}

impl OwnedLogEntry {
    /// Borrowed view over the stored command
    pub fn view(&self) -> LogEntryCommand<'_> {
        LogEntryCommand { cmd: &self.command }
    }

    /// Stored command
    pub fn command(&self) -> &Command {
        &self.command
    }
}

impl fmt::Display for OwnedLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.view(), f)
    }
}

/// Number of stored log entries and logging flags
#[derive(Debug, Clone, Copy)]
pub struct LogEntryCountCommand<'a> {
    cmd: &'a Command,
}

impl<'a> LogEntryCountCommand<'a> {
    /// View `cmd` as a log entry count
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::LogEntryCount)?;
        cmd.expect_payload_len(3)?;
        Ok(Self { cmd })
    }

    /// Logging enabled
    pub fn is_logging_enabled(&self) -> bool {
        self.cmd.payload()[0] != 0
    }

    /// Stored entries
    pub fn count(&self) -> u16 {
        let p = self.cmd.payload();
        u16::from_le_bytes([p[1], p[2]])
    }

    /// Door sensor enabled; false when the device omits the field
    pub fn is_door_sensor_enabled(&self) -> bool {
        self.cmd.payload().get(3).is_some_and(|b| *b != 0)
    }

    /// Door sensor logging enabled; false when the device omits the field
    pub fn is_door_sensor_logging_enabled(&self) -> bool {
        self.cmd.payload().get(4).is_some_and(|b| *b != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: u8, details: &[u8]) -> Command {
        let mut p = Vec::new();
        p.extend_from_slice(&42u32.to_le_bytes());
        p.extend_from_slice(&2021u16.to_le_bytes());
        p.extend_from_slice(&[7, 4, 18, 0, 1]);
        p.extend_from_slice(&9u32.to_le_bytes());
        let mut name = b"Marc".to_vec();
        name.resize(32, 0);
        p.extend_from_slice(&name);
        p.push(kind);
        p.extend_from_slice(details);
        Command::new(CommandId::LogEntry, &p)
    }

    #[test]
    fn test_base_fields() {
        let cmd = entry(0x02, &[0x02, 0x00, 0x00, 0x00]);
        let view = LogEntryCommand::new(&cmd).unwrap();
        assert_eq!(view.index(), 42);
        assert_eq!(view.timestamp().unwrap().to_rfc3339(), "2021-07-04T18:00:01+00:00");
        assert_eq!(view.auth_id(), 9);
        assert_eq!(view.name(), "Marc");
        assert_eq!(view.logging_type(), LoggingType::LockAction);
        assert_eq!(
            view.detail(),
            LogEntryDetail::LockAction {
                action: LockAction::Lock,
                trigger: Trigger::System,
                flags: 0,
                completion_status: 0,
            }
        );
    }

    #[test]
    fn test_keypad_detail() {
        let cmd = entry(0x05, &[0x01, 0x02, 0x00, 0x34, 0x12]);
        let view = LogEntryCommand::new(&cmd).unwrap();
        assert_eq!(
            view.detail(),
            LogEntryDetail::KeypadAction {
                action: LockAction::Unlock,
                source: 2,
                completion_status: 0,
                code_id: 0x1234,
            }
        );
    }

    #[test]
    fn test_door_sensor_and_logging_details() {
        let opened = entry(0x06, &[0x00]);
        let detail = LogEntryCommand::new(&opened).unwrap().detail();
        assert!(detail.is_door_opened());
        assert!(!detail.is_door_closed());

        let jammed = entry(0x06, &[0x02]);
        assert!(LogEntryCommand::new(&jammed).unwrap().detail().is_sensor_jammed());

        let logging = entry(0x01, &[0x01]);
        assert_eq!(
            LogEntryCommand::new(&logging).unwrap().detail(),
            LogEntryDetail::Logging { enabled: true }
        );

        let sensor_logging = entry(0x07, &[0x00]);
        assert_eq!(
            LogEntryCommand::new(&sensor_logging).unwrap().detail(),
            LogEntryDetail::DoorSensorLogging { enabled: true }
        );
    }

    #[test]
    fn test_truncated_detail_is_unknown() {
        let cmd = entry(0x02, &[0x01]);
        assert_eq!(
            LogEntryCommand::new(&cmd).unwrap().detail(),
            LogEntryDetail::Unknown(vec![0x01])
        );
    }

    #[test]
    fn test_owned_entry() {
        let cmd = entry(0x03, &[0x02, 0x00, 0x00, 0x00]);
        let owned = LogEntryCommand::new(&cmd).unwrap().to_owned_entry();
        drop(cmd);
        assert_eq!(owned.view().index(), 42);
        assert!(owned.to_string().starts_with("[42]"));
    }

    #[test]
    fn test_log_entry_count() {
        let cmd = Command::new(CommandId::LogEntryCount, &[0x01, 0x2C, 0x01, 0x01, 0x00]);
        let view = LogEntryCountCommand::new(&cmd).unwrap();
        assert!(view.is_logging_enabled());
        assert_eq!(view.count(), 300);
        assert!(view.is_door_sensor_enabled());
        assert!(!view.is_door_sensor_logging_enabled());

        let short = Command::new(CommandId::LogEntryCount, &[0x00, 0x05, 0x00]);
        assert!(!LogEntryCountCommand::new(&short).unwrap().is_door_sensor_enabled());
    }
}
