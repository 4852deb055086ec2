//! Builders for commands sent by the client
//!
//! Challenge-protected requests take the device nonce as their last argument,
//! which keeps them usable as the builder closure of a two-phase action.

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, Timelike};

use super::time::put_timestamp;
use super::{put_padded_str, Command, CommandId};
use crate::types::{LockAction, LogSortOrder, OpenAction, Pin};

/// Width of the optional name suffix in lock actions
pub const NAME_SUFFIX_LEN: usize = 20;

/// Ask the device to send `id`
pub fn request_data(id: CommandId) -> Command {
    Command::new(CommandId::RequestData, &id.value().to_le_bytes())
}

/// Announce the client public key
pub fn public_key(key: &[u8; 32]) -> Command {
    Command::new(CommandId::PublicKey, key)
}

fn action_command(action: u8, app_id: u32, flags: u8, name_suffix: Option<&str>, nonce: &[u8]) -> Command {
    let mut buf = BytesMut::with_capacity(1 + 4 + 1 + NAME_SUFFIX_LEN + nonce.len());
    buf.put_u8(action);
    buf.put_u32_le(app_id);
    buf.put_u8(flags);
    if let Some(suffix) = name_suffix {
        put_padded_str(&mut buf, suffix, NAME_SUFFIX_LEN);
    }
    buf.put_slice(nonce);
    Command::new(CommandId::LockAction, &buf)
}

/// SmartLock action: `action ‖ app_id:4 ‖ flags ‖ [suffix:20] ‖ nonce`
pub fn lock_action(
    action: LockAction,
    app_id: u32,
    flags: u8,
    name_suffix: Option<&str>,
    nonce: &[u8],
) -> Command {
    action_command(action.into(), app_id, flags, name_suffix, nonce)
}

/// Opener action; same layout and command id as [`lock_action`]
pub fn open_action(
    action: OpenAction,
    app_id: u32,
    flags: u8,
    name_suffix: Option<&str>,
    nonce: &[u8],
) -> Command {
    action_command(action.into(), app_id, flags, name_suffix, nonce)
}

/// Request the device configuration
pub fn request_config(nonce: &[u8]) -> Command {
    Command::new(CommandId::RequestConfig, nonce)
}

fn log_entries_command(
    start_index: u32,
    count: u16,
    order: LogSortOrder,
    total_count: bool,
    pin: Pin,
    nonce: &[u8],
) -> Command {
    let mut buf = BytesMut::with_capacity(8 + nonce.len() + 2);
    buf.put_u32_le(start_index);
    buf.put_u16_le(count);
    buf.put_u8(order.into());
    buf.put_u8(u8::from(total_count));
    buf.put_slice(nonce);
    buf.put_slice(&pin.to_le_bytes());
    Command::new(CommandId::RequestLogEntries, &buf)
}

/// Request `count` log entries starting at `start_index`
pub fn request_log_entries(
    start_index: u32,
    count: u16,
    order: LogSortOrder,
    pin: Pin,
    nonce: &[u8],
) -> Command {
    log_entries_command(start_index, count, order, false, pin, nonce)
}

/// Request only the number of stored log entries
pub fn request_log_entry_count(pin: Pin, nonce: &[u8]) -> Command {
    log_entries_command(0, 0, LogSortOrder::Ascending, true, pin, nonce)
}

/// Switch logging on or off
pub fn enable_logging(enable: bool, pin: Pin, nonce: &[u8]) -> Command {
    let mut buf = BytesMut::with_capacity(1 + nonce.len() + 2);
    buf.put_u8(u8::from(enable));
    buf.put_slice(nonce);
    buf.put_slice(&pin.to_le_bytes());
    Command::new(CommandId::EnableLogging, &buf)
}

/// Set the device clock; `time` should be UTC
pub fn update_time<T: Datelike + Timelike>(time: &T, pin: Pin, nonce: &[u8]) -> Command {
    let mut buf = BytesMut::with_capacity(7 + nonce.len() + 2);
    put_timestamp(&mut buf, time);
    buf.put_slice(nonce);
    buf.put_slice(&pin.to_le_bytes());
    Command::new(CommandId::UpdateTime, &buf)
}

/// Reboot the device
pub fn request_reboot(pin: Pin, nonce: &[u8]) -> Command {
    let mut buf = BytesMut::with_capacity(nonce.len() + 2);
    buf.put_slice(nonce);
    buf.put_slice(&pin.to_le_bytes());
    Command::new(CommandId::RequestReboot, &buf)
}
