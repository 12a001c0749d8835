//! # Error Types
//!
//! Every fallible operation in this crate returns [`Result`], carrying a
//! [`LedgerError`] on failure.
//!
//! ## Error Categories
//! - **Configuration**: packet sizes or settings the framing cannot work with
//! - **Command shape**: a command APDU whose length byte disagrees with its data
//! - **Protocol**: inbound frames that are short, mis-tagged, on the wrong
//!   channel or out of sequence
//! - **Transport**: write/read failures reported by the packet transport
//! - **Device status**: a well-formed response whose status word is not `0x9000`
//!
//! Protocol and transport errors abort the exchange in progress. Nothing in
//! the crate retries; the caller decides whether to start a fresh exchange.
//!
//! ## Example Usage
//! ```rust
//! use ledger_apdu::error::LedgerError;
//! use ledger_apdu::protocol::status::StatusWord;
//! use tracing::{info, warn};
//!
//! fn report(result: ledger_apdu::Result<Vec<u8>>) {
//!     match result {
//!         Ok(payload) => info!(len = payload.len(), "exchange succeeded"),
//!         Err(LedgerError::Status(status)) if status.word == StatusWord::ClaNotSupported => {
//!             warn!("wrong application open on the device")
//!         }
//!         Err(e) => warn!(error = %e, "exchange failed"),
//!     }
//! }
//! ```

use crate::protocol::status::StatusError;
use std::io;
use thiserror::Error;

/// Error message constants shared by transports and the orchestrator.
pub mod constants {
    pub const ERR_TRANSPORT_CLOSED: &str = "Transport is closed";
    pub const ERR_TRANSPORT_FAULTED: &str =
        "Transport faulted by an earlier read failure; reconnect the device";
    pub const ERR_FRAME_SOURCE_CLOSED: &str = "Inbound frame source closed";
    pub const ERR_FRAME_SOURCE_EMPTY: &str = "No inbound frame available";
    pub const ERR_READ_TIMEOUT: &str = "Timed out waiting for an inbound frame";
    pub const ERR_WRONG_PACKET_SIZE: &str = "Packet does not match the configured packet size";

    pub const ERR_PACKET_SIZE_TOO_SMALL: &str = "Packet size must be at least 3";
    pub const ERR_HEADER_DOES_NOT_FIT: &str = "Packet size too small for the frame header";
    pub const ERR_COMMAND_TOO_LONG: &str = "Command exceeds the 16-bit length field";
    pub const ERR_SEQUENCE_OVERFLOW: &str = "Sequence index overflow";
    pub const ERR_NO_PROGRESS: &str = "Packet carries no payload bytes";
}

/// LedgerError is the error type for all framing and exchange operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed command: declared data length {declared}, actual {actual}")]
    MalformedCommand { declared: usize, actual: usize },

    #[error("Frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    #[error("Invalid tag: expected 0x05, found {found:#04x}")]
    TagMismatch { found: u8 },

    #[error("Invalid channel: expected {expected:#06x}, found {found:#06x}")]
    ChannelMismatch { expected: u16, found: u16 },

    #[error("Invalid sequence: expected {expected}, found {found}")]
    SequenceMismatch { expected: u16, found: u16 },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection lost: response too short for a status word")]
    ConnectionLost,

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl LedgerError {
    /// True for framing violations detected by the decoder.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            LedgerError::FrameTooShort { .. }
                | LedgerError::TagMismatch { .. }
                | LedgerError::ChannelMismatch { .. }
                | LedgerError::SequenceMismatch { .. }
        )
    }

    /// Raw status word when the device answered with a failure code.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LedgerError::Status(status) => Some(status.code),
            _ => None,
        }
    }
}

/// Type alias for Results using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;
