//! # ledger-apdu
//!
//! APDU exchange with hardware security devices over fixed-size packet
//! transports such as 64-byte HID reports.
//!
//! A command APDU is split into packets carrying a small header (channel,
//! tag, sequence index and, on the first packet, the total length). The
//! response is reassembled from inbound packets, its trailing status word is
//! checked, and failures are surfaced as [`error::LedgerError`].
//!
//! ## Layout
//! - [`core`]: frame encoder and decoder (the wire format)
//! - [`protocol`]: status registry, exchange orchestrator and command helpers
//! - [`transport`]: the `Transport` capability set and reference transports
//! - [`config`]: device, command and logging configuration
//! - [`utils`]: logging setup and metrics
//!
//! ## Example
//! ```rust
//! use ledger_apdu::config::DeviceConfig;
//! use ledger_apdu::protocol::exchange::LedgerDevice;
//! use ledger_apdu::transport::memory::MemoryDevice;
//!
//! let mut mock = MemoryDevice::new(DeviceConfig::default());
//! mock.insert_reply(vec![0xE0, 0x01, 0x00, 0x00, 0x00], vec![0x31, 0x10, 0x90, 0x00]);
//!
//! let mut device = LedgerDevice::new(mock);
//! let payload = device.exchange(&[0xE0, 0x01, 0x00, 0x00, 0x00]).unwrap();
//! assert_eq!(payload, vec![0x31, 0x10]);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::decoder::{unwrap_response_apdu, validate_prefix};
pub use crate::core::encoder::{packetize, wrap_command_apdu};
pub use crate::error::{LedgerError, Result};
pub use crate::protocol::exchange::LedgerDevice;
pub use crate::protocol::status::{StatusError, StatusWord};
pub use crate::transport::{FrameSource, Transport};
