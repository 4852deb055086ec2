//! Value types carried inside command payloads
//!
//! Single-byte enums keep an `Unknown(u8)` variant so that a newer firmware
//! sending a value we do not know about still decodes losslessly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

macro_rules! wire_enum {
    (
        $(#[$outer:meta])*
        pub enum $ty:ident {
            $( $(#[$meta:meta])* $name:ident = $value:literal, )+
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $ty {
            $( $(#[$meta])* $name, )+
            /// Value not known to this implementation
            Unknown(u8),
        }

        impl From<u8> for $ty {
            fn from(value: u8) -> Self {
                match value {
                    $( $value => $ty::$name, )+
                    other => $ty::Unknown(other),
                }
            }
        }

        impl From<$ty> for u8 {
            fn from(value: $ty) -> u8 {
                match value {
                    $( $ty::$name => $value, )+
                    $ty::Unknown(other) => other,
                }
            }
        }
    };
}

wire_enum! {
    /// Outcome carried by a Status command
    pub enum CompletionStatus {
        /// Request fully executed
        Complete = 0x00,
        /// Request accepted, completion follows asynchronously
        Accepted = 0x01,
    }
}

wire_enum! {
    /// Device operating state
    pub enum NukiState {
        /// Factory state
        Uninitialized = 0x00,
        /// Pairing mode is active
        PairingMode = 0x01,
        /// Normal operation
        DoorMode = 0x02,
        /// Opener continuous mode
        ContinuousMode = 0x03,
        /// Maintenance mode
        MaintenanceMode = 0x04,
    }
}

wire_enum! {
    /// Lock or opener state
    ///
    /// Some values mean different things on the two device families; see
    /// [`LockState::describe`].
    pub enum LockState {
        /// Not calibrated
        Uncalibrated = 0x00,
        /// Locked (SmartLock) or online (Opener)
        Locked = 0x01,
        /// Unlocking in progress
        Unlocking = 0x02,
        /// Unlocked (SmartLock) or ring-to-open active (Opener)
        Unlocked = 0x03,
        /// Locking in progress
        Locking = 0x04,
        /// Unlatched (SmartLock) or open (Opener)
        Unlatched = 0x05,
        /// Unlocked with lock 'n' go pending
        UnlockedLockAndGo = 0x06,
        /// Unlatching (SmartLock) or opening (Opener)
        Unlatching = 0x07,
        /// Calibration running
        Calibration = 0xFC,
        /// Boot run
        BootRun = 0xFD,
        /// Motor blocked
        MotorBlocked = 0xFE,
        /// Undefined
        Undefined = 0xFF,
    }
}

impl LockState {
    /// Human-readable name for the given device family
    pub fn describe(self, device: DeviceType) -> &'static str {
        match (self, device) {
            (LockState::Locked, DeviceType::Opener) => "online",
            (LockState::Unlocked, DeviceType::Opener) => "rto active",
            (LockState::Unlatched, DeviceType::Opener) => "open",
            (LockState::Unlatching, DeviceType::Opener) => "opening",
            (LockState::Uncalibrated, DeviceType::Opener) => "untrained",
            (LockState::Uncalibrated, _) => "uncalibrated",
            (LockState::Locked, _) => "locked",
            (LockState::Unlocking, _) => "unlocking",
            (LockState::Unlocked, _) => "unlocked",
            (LockState::Locking, _) => "locking",
            (LockState::Unlatched, _) => "unlatched",
            (LockState::UnlockedLockAndGo, _) => "unlocked (lock 'n' go)",
            (LockState::Unlatching, _) => "unlatching",
            (LockState::Calibration, _) => "calibration",
            (LockState::BootRun, _) => "boot run",
            (LockState::MotorBlocked, _) => "motor blocked",
            (LockState::Undefined, _) | (LockState::Unknown(_), _) => "undefined",
        }
    }
}

wire_enum! {
    /// What caused a state change
    pub enum Trigger {
        /// Via bluetooth command
        System = 0x00,
        /// Turning the key or knob
        Manual = 0x01,
        /// Pressing the button
        Button = 0x02,
        /// Time control or similar
        Automatic = 0x03,
        /// Auto lock
        AutoLock = 0x06,
    }
}

wire_enum! {
    /// Door sensor state
    pub enum DoorSensorState {
        /// No sensor installed
        Unavailable = 0x00,
        /// Sensor deactivated
        Deactivated = 0x01,
        /// Door closed
        DoorClosed = 0x02,
        /// Door opened
        DoorOpened = 0x03,
        /// State unknown
        DoorStateUnknown = 0x04,
        /// Calibrating
        Calibrating = 0x05,
    }
}

wire_enum! {
    /// SmartLock action
    pub enum LockAction {
        /// Unlock
        Unlock = 0x01,
        /// Lock
        Lock = 0x02,
        /// Unlatch
        Unlatch = 0x03,
        /// Lock 'n' go
        LockAndGo = 0x04,
        /// Lock 'n' go with unlatch
        LockAndGoWithUnlatch = 0x05,
        /// Full lock
        FullLock = 0x06,
        /// Fob action 1
        FobAction1 = 0x81,
        /// Fob action 2
        FobAction2 = 0x82,
        /// Fob action 3
        FobAction3 = 0x83,
    }
}

/// Auto-unlock flag for [`LockAction`]
pub const LOCK_ACTION_FLAG_AUTO_UNLOCK: u8 = 0b0000_0001;
/// Force flag for [`LockAction`]
pub const LOCK_ACTION_FLAG_FORCE: u8 = 0b0000_0010;

wire_enum! {
    /// Opener action
    pub enum OpenAction {
        /// Activate ring to open
        ActivateRto = 0x01,
        /// Deactivate ring to open
        DeactivateRto = 0x02,
        /// Actuate the electric strike
        ElectricStrikeActuation = 0x03,
        /// Activate continuous mode
        ActivateContinuousMode = 0x04,
        /// Deactivate continuous mode
        DeactivateContinuousMode = 0x05,
        /// Fob action 1
        FobAction1 = 0x81,
        /// Fob action 2
        FobAction2 = 0x82,
        /// Fob action 3
        FobAction3 = 0x83,
    }
}

/// Geofence flag for [`OpenAction`]
pub const OPEN_ACTION_FLAG_GEOFENCE: u8 = 0b0000_0001;
/// Force flag for [`OpenAction`]
pub const OPEN_ACTION_FLAG_FORCE: u8 = 0b0000_0010;

wire_enum! {
    /// Kind of client being paired
    pub enum ClientIdType {
        /// Smartphone app
        App = 0x00,
        /// Bridge
        Bridge = 0x01,
        /// Fob
        Fob = 0x02,
        /// Keypad
        Keypad = 0x03,
    }
}

wire_enum! {
    /// Ordering of requested log entries
    pub enum LogSortOrder {
        /// Oldest first
        Ascending = 0x00,
        /// Newest first
        Descending = 0x01,
    }
}

wire_enum! {
    /// Kind of a log entry
    pub enum LoggingType {
        /// Logging was enabled or disabled
        LoggingEnabledDisabled = 0x01,
        /// Lock action
        LockAction = 0x02,
        /// Calibration
        Calibration = 0x03,
        /// Initialization run
        InitializationRun = 0x04,
        /// Keypad action
        KeypadAction = 0x05,
        /// Door sensor event
        DoorSensor = 0x06,
        /// Door sensor logging was enabled or disabled
        DoorSensorLoggingEnabledDisabled = 0x07,
    }
}

wire_enum! {
    /// Opener door-opening capabilities
    pub enum OpenerCapabilities {
        /// Door opening only
        OnlyDoorOpening = 0x00,
        /// Door opening and ring to open
        Both = 0x01,
        /// Ring to open only
        OnlyRto = 0x02,
    }
}

wire_enum! {
    /// Intercom the opener is attached to
    pub enum OpenerOperationMode {
        /// Generic door opener
        GenericDoorOpener = 0x00,
        /// Analogue intercom
        AnalogueIntercom = 0x01,
        /// Digital intercom
        DigitalIntercom = 0x02,
        /// Siedle digital intercom
        DigitalIntercomSiedle = 0x03,
        /// TCS digital intercom
        DigitalIntercomTcs = 0x04,
        /// Bticino digital intercom
        DigitalIntercomBticino = 0x05,
        /// Siedle HTS analogue intercom
        AnalogIntercomSiedleHts = 0x06,
        /// STR digital intercom
        DigitalIntercomStr = 0x07,
        /// Ritto digital intercom
        DigitalIntercomRitto = 0x08,
        /// Fermax digital intercom
        DigitalIntercomFermax = 0x09,
        /// Comelit digital intercom
        DigitalIntercomComelit = 0x0A,
        /// Urmet BiBus digital intercom
        DigitalIntercomUrmetBiBus = 0x0B,
        /// Urmet 2Voice digital intercom
        DigitalIntercomUrmet2Voice = 0x0C,
        /// Golmar digital intercom
        DigitalIntercomGolmar = 0x0D,
        /// SKS digital intercom
        DigitalIntercomSks = 0x0E,
        /// Spare
        DigitalIntercomSpare = 0x0F,
    }
}

wire_enum! {
    /// Daylight saving time handling
    pub enum DstMode {
        /// No DST
        Disabled = 0x00,
        /// European DST rules
        European = 0x01,
    }
}

wire_enum! {
    /// BLE advertising interval
    pub enum AdvertisingMode {
        /// Chosen by the device
        Automatic = 0x00,
        /// Normal
        Normal = 0x01,
        /// Slow
        Slow = 0x02,
        /// Slowest
        Slowest = 0x03,
    }
}

wire_enum! {
    /// HomeKit integration status
    pub enum HomeKitStatus {
        /// Not available
        NotAvailable = 0x00,
        /// Disabled
        Disabled = 0x01,
        /// Enabled
        Enabled = 0x02,
        /// Enabled and paired
        EnabledAndPaired = 0x03,
    }
}

/// Device family, discovered from the characteristic a connection exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Smart lock
    SmartLock,
    /// Intercom opener
    Opener,
    /// Not determined
    Unknown,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::SmartLock => write!(f, "smartlock"),
            DeviceType::Opener => write!(f, "opener"),
            DeviceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Firmware version or hardware revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    /// Major
    pub major: u8,
    /// Minor
    pub minor: u8,
    /// Patch
    pub patch: u8,
}

impl Version {
    /// Read up to three bytes; missing components are zero
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let at = |i: usize| bytes.get(i).copied().unwrap_or(0);
        Self {
            major: at(0),
            minor: at(1),
            patch: at(2),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Security PIN
///
/// Accepted textually as exactly four decimal digits and sent as a
/// little-endian `u16`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pin(u16);

impl Pin {
    /// Wrap a numeric PIN
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Numeric value
    pub fn value(self) -> u16 {
        self.0
    }

    /// Wire encoding
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl From<u16> for Pin {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl FromStr for Pin {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidPin(s.to_string()));
        }
        s.parse::<u16>()
            .map(Pin)
            .map_err(|_| ProtocolError::InvalidPin(s.to_string()))
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}
