//! Config views
//!
//! SmartLock configs are 74 payload bytes and Opener configs 72. The first
//! 48 bytes are shared; past that the layouts drift apart by one byte (LED
//! brightness only exists on SmartLocks) and again later.

use chrono::{DateTime, Utc};
use std::fmt;

use super::time::read_utc;
use super::{read_padded_str, Command, CommandId};
use crate::error::{ProtocolError, Result};
use crate::timezone::TimeZoneId;
use crate::types::{
    AdvertisingMode, DstMode, HomeKitStatus, OpenerCapabilities, OpenerOperationMode, Version,
};

const SMARTLOCK_LEN: usize = 74;
const OPENER_LEN: usize = 72;

/// Byte offsets of the fields shared by both layouts but placed differently
struct Layout {
    time: usize,
    timezone_offset: usize,
    dst_mode: usize,
    has_fob: usize,
    fob_actions: usize,
    advertising_mode: usize,
    has_keypad: usize,
    firmware_version: usize,
    hardware_revision: usize,
    timezone_id: usize,
}

const SMARTLOCK_LAYOUT: Layout = Layout {
    time: 49,
    timezone_offset: 56,
    dst_mode: 58,
    has_fob: 59,
    fob_actions: 60,
    advertising_mode: 64,
    has_keypad: 65,
    firmware_version: 66,
    hardware_revision: 69,
    timezone_id: 72,
};

const OPENER_LAYOUT: Layout = Layout {
    time: 48,
    timezone_offset: 55,
    dst_mode: 57,
    has_fob: 58,
    fob_actions: 59,
    advertising_mode: 63,
    has_keypad: 64,
    firmware_version: 65,
    hardware_revision: 68,
    timezone_id: 70,
};

macro_rules! common_config_accessors {
    ($layout:expr) => {
        /// Device id
        pub fn nuki_id(&self) -> u32 {
            let p = self.cmd.payload();
            u32::from_le_bytes([p[0], p[1], p[2], p[3]])
        }

        /// Configured name
        pub fn name(&self) -> String {
            read_padded_str(&self.cmd.payload()[4..36])
        }

        /// Latitude
        pub fn latitude(&self) -> f32 {
            let p = self.cmd.payload();
            f32::from_le_bytes([p[36], p[37], p[38], p[39]])
        }

        /// Longitude
        pub fn longitude(&self) -> f32 {
            let p = self.cmd.payload();
            f32::from_le_bytes([p[40], p[41], p[42], p[43]])
        }

        /// Pairing via button allowed
        pub fn is_pairing_enabled(&self) -> bool {
            self.cmd.payload()[45] != 0
        }

        /// Button enabled
        pub fn is_button_enabled(&self) -> bool {
            self.cmd.payload()[46] != 0
        }

        /// LED flash enabled
        pub fn is_led_enabled(&self) -> bool {
            self.cmd.payload()[47] != 0
        }

        /// Device clock in UTC
        pub fn current_time(&self) -> Result<DateTime<Utc>> {
            let at = $layout.time;
            read_utc(&self.cmd.payload()[at..at + 7])
        }

        /// Configured UTC offset in minutes
        pub fn timezone_offset(&self) -> i16 {
            let at = $layout.timezone_offset;
            let p = self.cmd.payload();
            i16::from_le_bytes([p[at], p[at + 1]])
        }

        /// DST handling
        pub fn dst_mode(&self) -> DstMode {
            DstMode::from(self.cmd.payload()[$layout.dst_mode])
        }

        /// A fob is paired
        pub fn has_fob(&self) -> bool {
            self.cmd.payload()[$layout.has_fob] != 0
        }

        /// Actions bound to fob presses 1 to 3
        pub fn fob_actions(&self) -> [u8; 3] {
            let at = $layout.fob_actions;
            let p = self.cmd.payload();
            [p[at], p[at + 1], p[at + 2]]
        }

        /// Advertising interval
        pub fn advertising_mode(&self) -> AdvertisingMode {
            AdvertisingMode::from(self.cmd.payload()[$layout.advertising_mode])
        }

        /// A keypad is paired
        pub fn has_keypad(&self) -> bool {
            self.cmd.payload()[$layout.has_keypad] != 0
        }

        /// Firmware version
        pub fn firmware_version(&self) -> Version {
            let at = $layout.firmware_version;
            Version::from_bytes(&self.cmd.payload()[at..at + 3])
        }

        /// Hardware revision (major.minor)
        pub fn hardware_revision(&self) -> Version {
            let at = $layout.hardware_revision;
            Version::from_bytes(&self.cmd.payload()[at..at + 2])
        }

        /// Timezone id
        pub fn timezone_id(&self) -> TimeZoneId {
            let at = $layout.timezone_id;
            let p = self.cmd.payload();
            TimeZoneId(u16::from_le_bytes([p[at], p[at + 1]]))
        }
    };
}

/// Config of either device family
#[derive(Debug, Clone, Copy)]
pub enum Config<'a> {
    /// SmartLock layout
    SmartLock(SmartLockConfig<'a>),
    /// Opener layout
    Opener(OpenerConfig<'a>),
}

impl<'a> Config<'a> {
    /// Resolve the layout by payload length
    pub fn new(cmd: &'a Command) -> Result<Self> {
        cmd.expect_id(CommandId::Config)?;
        match cmd.payload().len() {
            SMARTLOCK_LEN => Ok(Config::SmartLock(SmartLockConfig { cmd })),
            OPENER_LEN => Ok(Config::Opener(OpenerConfig { cmd })),
            len => Err(ProtocolError::UnsupportedPayload {
                command: CommandId::Config,
                len,
            }),
        }
    }

    /// SmartLock view, if this is one
    pub fn as_smartlock(&self) -> Option<&SmartLockConfig<'a>> {
        match self {
            Config::SmartLock(c) => Some(c),
            Config::Opener(_) => None,
        }
    }

    /// Opener view, if this is one
    pub fn as_opener(&self) -> Option<&OpenerConfig<'a>> {
        match self {
            Config::Opener(c) => Some(c),
            Config::SmartLock(_) => None,
        }
    }

    /// Device id
    pub fn nuki_id(&self) -> u32 {
        match self {
            Config::SmartLock(c) => c.nuki_id(),
            Config::Opener(c) => c.nuki_id(),
        }
    }

    /// Configured name
    pub fn name(&self) -> String {
        match self {
            Config::SmartLock(c) => c.name(),
            Config::Opener(c) => c.name(),
        }
    }

    /// Device clock in UTC
    pub fn current_time(&self) -> Result<DateTime<Utc>> {
        match self {
            Config::SmartLock(c) => c.current_time(),
            Config::Opener(c) => c.current_time(),
        }
    }

    /// Firmware version
    pub fn firmware_version(&self) -> Version {
        match self {
            Config::SmartLock(c) => c.firmware_version(),
            Config::Opener(c) => c.firmware_version(),
        }
    }

    /// Hardware revision
    pub fn hardware_revision(&self) -> Version {
        match self {
            Config::SmartLock(c) => c.hardware_revision(),
            Config::Opener(c) => c.hardware_revision(),
        }
    }

    /// Timezone id
    pub fn timezone_id(&self) -> TimeZoneId {
        match self {
            Config::SmartLock(c) => c.timezone_id(),
            Config::Opener(c) => c.timezone_id(),
        }
    }
}

/// SmartLock configuration
#[derive(Debug, Clone, Copy)]
pub struct SmartLockConfig<'a> {
    cmd: &'a Command,
}

impl SmartLockConfig<'_> {
    common_config_accessors!(SMARTLOCK_LAYOUT);

    /// Unlatch on unlock
    pub fn is_auto_unlatch(&self) -> bool {
        self.cmd.payload()[44] != 0
    }

    /// LED brightness 0..=5
    pub fn led_brightness(&self) -> u8 {
        self.cmd.payload()[48]
    }

    /// Lock with a single turn
    pub fn is_single_lock(&self) -> bool {
        self.cmd.payload()[63] != 0
    }

    /// HomeKit status
    pub fn homekit_status(&self) -> HomeKitStatus {
        HomeKitStatus::from(self.cmd.payload()[71])
    }
}

/// Opener configuration
#[derive(Debug, Clone, Copy)]
pub struct OpenerConfig<'a> {
    cmd: &'a Command,
}

impl OpenerConfig<'_> {
    common_config_accessors!(OPENER_LAYOUT);

    /// Supported door-opening modes
    pub fn capabilities(&self) -> OpenerCapabilities {
        OpenerCapabilities::from(self.cmd.payload()[44])
    }

    /// Intercom type
    pub fn operation_mode(&self) -> OpenerOperationMode {
        OpenerOperationMode::from(self.cmd.payload()[62])
    }
}

impl fmt::Display for Config<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self {
            Config::SmartLock(_) => "smartlock",
            Config::Opener(_) => "opener",
        };
        write!(
            f,
            "{} {:08X} {:?} firmware={} hardware={} tz={}",
            family,
            self.nuki_id(),
            self.name(),
            self.firmware_version(),
            self.hardware_revision(),
            self.timezone_id().name()
        )
    }
}
