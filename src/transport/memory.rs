//! In-memory device emulation.
//!
//! [`MemoryDevice`] behaves like a device on the far side of the framing: it
//! reassembles written packets into a command, looks the command up in its
//! reply table and queues the framed reply for reading. Commands it does not
//! know are answered with `0x6D00` (instruction not supported).

use std::collections::{HashMap, VecDeque};

use bytes::Buf;
use tracing::{debug, trace};

use crate::config::DeviceConfig;
use crate::core::codec::FrameCodec;
use crate::core::decoder::validate_prefix;
use crate::core::packet::packet_count;
use crate::error::{constants, LedgerError, Result};
use crate::protocol::status::StatusWord;
use crate::transport::{FrameSource, Transport};

pub struct MemoryDevice {
    codec: FrameCodec,
    replies: HashMap<Vec<u8>, Vec<u8>>,
    /// Packets of the command currently being received
    pending: VecDeque<Vec<u8>>,
    expected_packets: usize,
    inbound: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    received: Vec<Vec<u8>>,
    /// `inbound` has been read from since the last command started
    read_since_command: bool,
    closed: bool,
}

impl MemoryDevice {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            codec: FrameCodec::from(&config),
            replies: HashMap::new(),
            pending: VecDeque::new(),
            expected_packets: 0,
            inbound: VecDeque::new(),
            written: Vec::new(),
            received: Vec::new(),
            read_since_command: false,
            closed: false,
        }
    }

    /// Register the full response APDU (payload and status word) for `command`.
    pub fn insert_reply(&mut self, command: impl Into<Vec<u8>>, response: impl Into<Vec<u8>>) {
        self.replies.insert(command.into(), response.into());
    }

    /// Builder form of [`insert_reply`](Self::insert_reply).
    pub fn with_reply(mut self, command: impl Into<Vec<u8>>, response: impl Into<Vec<u8>>) -> Self {
        self.insert_reply(command, response);
        self
    }

    /// Queue a raw inbound packet, bypassing the reply table.
    ///
    /// Frames left over from an earlier exchange are dropped first.
    pub fn push_inbound(&mut self, frame: Vec<u8>) {
        self.discard_stale();
        self.inbound.push_back(frame);
    }

    /// Frames queued for reading.
    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Drop replies an aborted exchange never consumed.
    fn discard_stale(&mut self) {
        if self.read_since_command {
            self.read_since_command = false;
            if !self.inbound.is_empty() {
                debug!(discarded = self.inbound.len(), "dropped stale inbound frames");
                self.inbound.clear();
            }
        }
    }

    /// Every packet written so far, in order.
    pub fn written_packets(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Every command reassembled so far, in order.
    pub fn received_commands(&self) -> &[Vec<u8>] {
        &self.received
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn accept_packet(&mut self, packet: &[u8]) -> Result<()> {
        if self.pending.is_empty() {
            self.discard_stale();
            let mut rest = validate_prefix(
                packet,
                self.codec.channel,
                0,
                self.codec.channel_implicit,
            )?;
            if rest.len() < 2 {
                return Err(LedgerError::FrameTooShort { len: packet.len() });
            }
            let total_len = rest.get_u16() as usize;
            self.expected_packets =
                packet_count(total_len, self.codec.packet_size, self.codec.channel_implicit)
                    .max(1);
            trace!(total_len, packets = self.expected_packets, "command started");
        }

        self.pending.push_back(packet.to_vec());
        if self.pending.len() < self.expected_packets {
            return Ok(());
        }

        let command = self.codec.decode(&mut self.pending);
        self.pending.clear();
        let command = command?;
        self.respond(command)
    }

    fn respond(&mut self, command: Vec<u8>) -> Result<()> {
        let reply = match self.replies.get(&command) {
            Some(reply) => reply.clone(),
            None => {
                debug!(len = command.len(), "no reply registered for command");
                StatusWord::InsNotSupported.code().to_be_bytes().to_vec()
            }
        };
        let frames = self.codec.encode_packets(&reply)?;
        self.inbound.extend(frames);
        self.received.push(command);
        Ok(())
    }
}

impl Transport for MemoryDevice {
    fn write(&mut self, packet: &[u8]) -> Result<()> {
        if self.closed {
            return Err(LedgerError::TransportError(
                constants::ERR_TRANSPORT_CLOSED.to_string(),
            ));
        }
        if packet.len() != self.codec.packet_size {
            return Err(LedgerError::TransportError(format!(
                "{}: {} bytes, expected {}",
                constants::ERR_WRONG_PACKET_SIZE,
                packet.len(),
                self.codec.packet_size
            )));
        }

        self.written.push(packet.to_vec());
        self.accept_packet(packet)
    }

    fn read_frames(&mut self) -> &mut dyn FrameSource {
        self.read_since_command = true;
        &mut self.inbound
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.pending.clear();
        self.inbound.clear();
        Ok(())
    }
}
