//! KeyturnerStates views
//!
//! The wire format carries no type tag: SmartLocks send at least 19 payload
//! bytes, Openers at least 22. [`States::new`] resolves the variant once and
//! each variant then exposes only the fields that exist for it.

use chrono::{DateTime, FixedOffset};
use std::fmt;

use super::time::read_local;
use super::{Command, CommandId};
use crate::error::{ProtocolError, Result};
use crate::types::{CompletionStatus, DoorSensorState, LockAction, LockState, NukiState, Trigger};

const SMARTLOCK_MIN_LEN: usize = 19;
const OPENER_MIN_LEN: usize = 22;

macro_rules! common_state_accessors {
    () => {
        /// Operating state
        pub fn nuki_state(&self) -> NukiState {
            NukiState::from(self.cmd.payload()[0])
        }

        /// Lock state
        pub fn lock_state(&self) -> LockState {
            LockState::from(self.cmd.payload()[1])
        }

        /// What caused the current state
        pub fn trigger(&self) -> Trigger {
            Trigger::from(self.cmd.payload()[2])
        }

        /// Device wall-clock time at its configured UTC offset
        pub fn current_time(&self) -> Result<DateTime<FixedOffset>> {
            read_local(&self.cmd.payload()[3..10], self.timezone_offset())
        }

        /// UTC offset in minutes
        pub fn timezone_offset(&self) -> i16 {
            let p = self.cmd.payload();
            i16::from_le_bytes([p[10], p[11]])
        }

        /// Battery critical flag
        pub fn is_battery_critical(&self) -> bool {
            self.cmd.payload()[12] & 0b0000_0001 != 0
        }

        /// Incremented on every configuration change
        pub fn config_update_count(&self) -> u8 {
            self.cmd.payload()[13]
        }

        /// Most recent action
        pub fn last_lock_action(&self) -> LockAction {
            LockAction::from(self.cmd.payload()[15])
        }

        /// Trigger of the most recent action
        pub fn last_lock_action_trigger(&self) -> Trigger {
            Trigger::from(self.cmd.payload()[16])
        }

        /// Completion status of the most recent action
        pub fn last_lock_action_completion_status(&self) -> CompletionStatus {
            CompletionStatus::from(self.cmd.payload()[17])
        }

        /// Door sensor state
        pub fn door_sensor_state(&self) -> DoorSensorState {
            DoorSensorState::from(self.cmd.payload()[18])
        }
    };
}

/// States of either device family
#[derive(Debug, Clone, Copy)]
pub enum States<'a> {
    /// SmartLock layout
    SmartLock(SmartLockStates<'a>),
    /// Opener layout
    Opener(OpenerStates<'a>),
}

impl<'a> States<'a> {
    /// Resolve the layout by payload length
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::KeyturnerStates)?;
        let len = cmd.payload().len();
        if len >= OPENER_MIN_LEN {
            Ok(States::Opener(OpenerStates { cmd }))
        } else if len >= SMARTLOCK_MIN_LEN {
            Ok(States::SmartLock(SmartLockStates { cmd }))
        } else {
            Err(ProtocolError::UnsupportedPayload {
                command: CommandId::KeyturnerStates,
                len,
            })
        }
    }

    fn cmd(&self) -> &'a Command {
        match self {
            States::SmartLock(s) => s.cmd,
            States::Opener(s) => s.cmd,
        }
    }

    /// SmartLock view, if this is one
    pub fn as_smartlock(&self) -> Option<&SmartLockStates<'a>> {
        match self {
            States::SmartLock(s) => Some(s),
            States::Opener(_) => None,
        }
    }

    /// Opener view, if this is one
    pub fn as_opener(&self) -> Option<&OpenerStates<'a>> {
        match self {
            States::Opener(s) => Some(s),
            States::SmartLock(_) => None,
        }
    }
}

struct Common<'a> {
    cmd: &'a Command,
}

impl Common<'_> {
    common_state_accessors!();
}

impl<'a> States<'a> {
    fn common(&self) -> Common<'a> {
        Common { cmd: self.cmd() }
    }

    /// Operating state
    pub fn nuki_state(&self) -> NukiState {
        self.common().nuki_state()
    }

    /// Lock state
    pub fn lock_state(&self) -> LockState {
        self.common().lock_state()
    }

    /// What caused the current state
    pub fn trigger(&self) -> Trigger {
        self.common().trigger()
    }

    /// Device wall-clock time at its configured UTC offset
    pub fn current_time(&self) -> Result<DateTime<FixedOffset>> {
        self.common().current_time()
    }

    /// UTC offset in minutes
    pub fn timezone_offset(&self) -> i16 {
        self.common().timezone_offset()
    }

    /// Battery critical flag
    pub fn is_battery_critical(&self) -> bool {
        self.common().is_battery_critical()
    }

    /// Incremented on every configuration change
    pub fn config_update_count(&self) -> u8 {
        self.common().config_update_count()
    }

    /// Most recent action
    pub fn last_lock_action(&self) -> LockAction {
        self.common().last_lock_action()
    }

    /// Trigger of the most recent action
    pub fn last_lock_action_trigger(&self) -> Trigger {
        self.common().last_lock_action_trigger()
    }

    /// Completion status of the most recent action
    pub fn last_lock_action_completion_status(&self) -> CompletionStatus {
        self.common().last_lock_action_completion_status()
    }

    /// Door sensor state
    pub fn door_sensor_state(&self) -> DoorSensorState {
        self.common().door_sensor_state()
    }
}

/// SmartLock states
#[derive(Debug, Clone, Copy)]
pub struct SmartLockStates<'a> {
    cmd: &'a Command,
}

impl SmartLockStates<'_> {
    common_state_accessors!();

    /// Battery is charging
    pub fn is_battery_charging(&self) -> bool {
        self.cmd.payload()[12] & 0b0000_0010 != 0
    }

    /// Battery charge in percent
    pub fn battery_percentage(&self) -> u8 {
        (self.cmd.payload()[12] >> 2) * 2
    }

    /// Lock 'n' go countdown
    pub fn lock_and_go_timer(&self) -> u8 {
        self.cmd.payload()[14]
    }

    /// Night mode active; absent on older firmware
    pub fn is_night_mode_active(&self) -> bool {
        self.cmd.payload().get(19).is_some_and(|b| *b != 0)
    }

    /// Accessory battery `(supported, critical)`
    pub fn accessory_battery_state(&self) -> (bool, bool) {
        let b = self.cmd.payload().get(20).copied().unwrap_or(0);
        (b & 0b0000_0001 != 0, b & 0b0000_0010 != 0)
    }
}

/// Opener states
#[derive(Debug, Clone, Copy)]
pub struct OpenerStates<'a> {
    cmd: &'a Command,
}

impl OpenerStates<'_> {
    common_state_accessors!();

    /// Ring-to-open countdown
    pub fn ring_to_open_timer(&self) -> u8 {
        self.cmd.payload()[14]
    }
}

impl fmt::Display for States<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = match self {
            States::SmartLock(_) => crate::types::DeviceType::SmartLock,
            States::Opener(_) => crate::types::DeviceType::Opener,
        };
        write!(
            f,
            "{} state={:?} lock={} trigger={:?} door={:?}",
            device,
            self.nuki_state(),
            self.lock_state().describe(device),
            self.trigger(),
            self.door_sensor_state()
        )?;
        if let Ok(time) = self.current_time() {
            write!(f, " time={}", time.to_rfc3339())?;
        }
        match self {
            States::SmartLock(s) => write!(
                f,
                " battery={}%{}{}",
                s.battery_percentage(),
                if s.is_battery_critical() { " critical" } else { "" },
                if s.is_battery_charging() { " charging" } else { "" }
            ),
            States::Opener(s) => write!(
                f,
                " battery_critical={} rto_timer={}",
                s.is_battery_critical(),
                s.ring_to_open_timer()
            ),
        }
    }
}
