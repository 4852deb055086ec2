//! Transport collaborator for talking to a device
//!
//! The client never touches a radio itself. It needs something that can
//! write to a GATT characteristic, deliver notifications from one, and tell
//! which characteristics exist. That is the [`BleTransport`] trait.
//!
//! - [`test_utils::MockTransport`](crate::test_utils::MockTransport) - in-memory peripheral for tests
//! - [`BtleplugTransport`] - adapter over a connected `btleplug` peripheral (requires `ble` feature)
//!
//! # Feature Requirements
//!
//! - `ble`: Requires BlueZ development files on Linux
//!   ```bash
//!   apt install libdbus-1-dev pkg-config
//!   ```

#[cfg(feature = "ble")]
mod btleplug;
#[cfg(feature = "ble")]
pub use self::btleplug::BtleplugTransport;

use async_trait::async_trait;
use nuki_protocol::DeviceType;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{NukiError, Result};

/// Maximum size of a single write or notification
pub const MTU: usize = 20;

/// Callback receiving raw notification chunks
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Trait for device transports
///
/// Implementations are shared between the general and the user channel, so
/// every method takes `&self`.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Check whether the peripheral exposes `characteristic`
    async fn has_characteristic(&self, characteristic: Uuid) -> Result<bool>;

    /// Enable notifications on `characteristic`, delivering each chunk to `handler`
    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()>;

    /// Disable notifications and drop the handler
    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()>;

    /// Write one chunk (at most [`MTU`] bytes)
    async fn write(&self, characteristic: Uuid, chunk: &[u8]) -> Result<()>;

    /// Close the underlying connection
    async fn close(&self) -> Result<()>;

    /// Get the transport name (for logging)
    fn name(&self) -> &str;
}

/// Logical channel of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Pre-authentication, plain commands
    General,
    /// Post-authentication, encrypted commands
    User,
}

impl ChannelKind {
    /// Short tag used in log lines
    pub fn tag(self) -> &'static str {
        match self {
            ChannelKind::General => "GDIO",
            ChannelKind::User => "UDIO",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::General => write!(f, "general data input output"),
            ChannelKind::User => write!(f, "user-specific data input output"),
        }
    }
}

/// Characteristic pair exposed by one device family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Family this profile identifies
    pub device_type: DeviceType,
    /// General data input/output characteristic
    pub general: Uuid,
    /// User-specific data input/output characteristic
    pub user: Uuid,
}

impl DeviceProfile {
    /// Characteristic carrying `kind`
    pub fn characteristic(&self, kind: ChannelKind) -> Uuid {
        match kind {
            ChannelKind::General => self.general,
            ChannelKind::User => self.user,
        }
    }
}

/// SmartLock characteristics
pub const SMARTLOCK_PROFILE: DeviceProfile = DeviceProfile {
    device_type: DeviceType::SmartLock,
    general: Uuid::from_u128(0xa92ee101_5501_11e4_916c_0800200c9a66),
    user: Uuid::from_u128(0xa92ee202_5501_11e4_916c_0800200c9a66),
};

/// Opener characteristics
pub const OPENER_PROFILE: DeviceProfile = DeviceProfile {
    device_type: DeviceType::Opener,
    general: Uuid::from_u128(0xa92ae101_5501_11e4_916c_0800200c9a66),
    user: Uuid::from_u128(0xa92ae202_5501_11e4_916c_0800200c9a66),
};

/// Known profiles, in lookup order
pub const PROFILES: [DeviceProfile; 2] = [SMARTLOCK_PROFILE, OPENER_PROFILE];

/// Profile for a device family
pub fn profile_for(device_type: DeviceType) -> Option<DeviceProfile> {
    PROFILES.into_iter().find(|p| p.device_type == device_type)
}

/// Find the characteristic for `kind`, trying SmartLock before Opener
///
/// The profile that matches decides the device type of the connection.
pub async fn discover<T>(transport: &T, kind: ChannelKind) -> Result<(Uuid, DeviceType)>
where
    T: BleTransport + ?Sized,
{
    for profile in PROFILES {
        let characteristic = profile.characteristic(kind);
        if transport.has_characteristic(characteristic).await? {
            return Ok((characteristic, profile.device_type));
        }
    }
    Err(NukiError::CharacteristicNotFound(kind.to_string()))
}

/// Split an outbound message into MTU-sized writes
///
/// A message whose length is an exact multiple of [`MTU`] gets a trailing
/// empty chunk, since only a short chunk ends a message.
pub fn split_chunks(message: &[u8]) -> Vec<&[u8]> {
    let mut chunks: Vec<&[u8]> = message.chunks(MTU).collect();
    if message.len() % MTU == 0 {
        chunks.push(&[]);
    }
    chunks
}
