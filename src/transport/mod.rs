//! # Transport Layer
//!
//! The packet transport an exchange runs over is a capability set of three
//! operations: write one packet, read inbound packets in arrival order, and
//! close. Anything that provides them (a USB HID handle, a BLE link, an
//! emulator bridge) can carry APDUs.
//!
//! ## Reference transports
//! - [`memory::MemoryDevice`]: in-process device emulation keyed by command
//! - [`channel::ChannelTransport`]: `std::sync::mpsc` bridge, the shape of a
//!   HID reader thread delivering input reports
//!
//! Transports do not interpret packets. Reads may block for as long as the
//! transport allows; a transport that bounds the wait reports expiry as
//! `LedgerError::TransportError`.

use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

use crate::error::{constants, LedgerError, Result};

pub mod channel;
pub mod memory;

/// Sequential, blocking source of inbound packets.
pub trait FrameSource {
    /// Next packet in arrival order.
    ///
    /// Blocks until one is available. End of stream or a transport fault is
    /// reported as `LedgerError::TransportError`.
    fn next_frame(&mut self) -> Result<Vec<u8>>;
}

/// Packet transport consumed by the exchange orchestrator.
pub trait Transport {
    /// Send exactly one packet.
    fn write(&mut self, packet: &[u8]) -> Result<()>;

    /// Inbound packets for the exchange in progress.
    fn read_frames(&mut self) -> &mut dyn FrameSource;

    /// Release the underlying handle. Closing twice is not an error.
    fn close(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, packet: &[u8]) -> Result<()> {
        (**self).write(packet)
    }

    fn read_frames(&mut self) -> &mut dyn FrameSource {
        (**self).read_frames()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl FrameSource for VecDeque<Vec<u8>> {
    fn next_frame(&mut self) -> Result<Vec<u8>> {
        self.pop_front().ok_or_else(|| {
            LedgerError::TransportError(constants::ERR_FRAME_SOURCE_EMPTY.to_string())
        })
    }
}

impl FrameSource for Receiver<Vec<u8>> {
    fn next_frame(&mut self) -> Result<Vec<u8>> {
        self.recv().map_err(|_| {
            LedgerError::TransportError(constants::ERR_FRAME_SOURCE_CLOSED.to_string())
        })
    }
}
