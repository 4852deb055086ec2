//! Async client for Nuki SmartLock and Opener devices
//!
//! This crate drives the Nuki BLE protocol on top of the wire layer in
//! [`nuki_protocol`] (re-exported as [`protocol`]). It does not scan for or
//! connect to devices itself; it talks through a [`BleTransport`] that the
//! caller provides for an already-connected peripheral.
//!
//! # Architecture
//!
//! 1. **Transport** - [`BleTransport`] writes chunks and delivers notifications
//! 2. **Reassembly** - [`Reassembler`] joins MTU-sized chunks and decodes them
//! 3. **Channels** - [`Channel`] sends commands and waits for responses
//! 4. **Orchestration** - [`Client`] runs pairing and the command exchanges
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // Enable the `ble` feature to use BtleplugTransport
//! use nuki_ble::{BtleplugTransport, Client, ClientConfigBuilder};
//! use nuki_ble::protocol::{ClientIdType, KeyPair};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let peripheral = connect_somehow().await?;
//!     let transport = Arc::new(BtleplugTransport::new(peripheral).await?);
//!
//!     let config = ClientConfigBuilder::new().label("front-door").build();
//!     let mut client = Client::new(config)?;
//!     client.connect(transport).await?;
//!
//!     // Put the lock into pairing mode first
//!     let cancel = CancellationToken::new();
//!     let credentials = client
//!         .pair(&KeyPair::generate(), 1, ClientIdType::App, "my app", &cancel)
//!         .await?;
//!     println!("{}", serde_json::to_string(&credentials)?);
//!
//!     client.perform_unlock(&cancel).await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `ble` - [`BtleplugTransport`] over `btleplug` (requires `libdbus-1-dev` on Linux)
//!
//! # Logging
//!
//! Every client carries a `nuki` tracing span with its configured label and
//! the discovered device type. Install any `tracing` subscriber to see it.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod reassembly;
pub mod transport;

pub mod test_utils;

pub use nuki_protocol as protocol;

pub use channel::Channel;
pub use client::{Client, ClientState};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_RESPONSE_TIMEOUT_MS};
pub use error::{NukiError, Result};
pub use reassembly::{Decoder, FrameAssembler, Reassembler};
pub use transport::{
    discover, split_chunks, BleTransport, ChannelKind, DeviceProfile, NotificationHandler, MTU,
    OPENER_PROFILE, SMARTLOCK_PROFILE,
};

#[cfg(feature = "ble")]
pub use transport::BtleplugTransport;

pub use test_utils::{MockFailure, MockResponder, MockTransport, ScriptedDevice};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_constants() {
        assert_eq!(MTU, 20);
        assert_eq!(DEFAULT_RESPONSE_TIMEOUT_MS, 10_000);
    }
}
