//! Frame encoder: command APDU → fixed-size packets.

use bytes::BufMut;
use tracing::trace;

use crate::core::packet::{FrameHeader, MIN_PACKET_SIZE};
use crate::error::{constants, LedgerError, Result};

/// Build the packet with index `sequence_idx` from the front of `command`.
///
/// `command` is the part of the message not yet sent; on sequence 0 its
/// length is written as the total length of the message. Returns the
/// `packet_size`-byte packet (zero padded) and how many bytes of `command`
/// it carries.
///
/// # Errors
/// `ConfigError` if `packet_size` is below 3, if the header does not fit in
/// `packet_size`, or if a first packet would announce more than 65535 bytes.
pub fn packetize(
    channel: u16,
    command: &[u8],
    packet_size: usize,
    sequence_idx: u16,
    channel_implicit: bool,
) -> Result<(Vec<u8>, usize)> {
    if packet_size < MIN_PACKET_SIZE {
        return Err(LedgerError::ConfigError(
            constants::ERR_PACKET_SIZE_TOO_SMALL.to_string(),
        ));
    }

    let channel = (!channel_implicit).then_some(channel);
    let header = if sequence_idx == 0 {
        let total_len = u16::try_from(command.len()).map_err(|_| {
            LedgerError::ConfigError(format!(
                "{}: {} bytes",
                constants::ERR_COMMAND_TOO_LONG,
                command.len()
            ))
        })?;
        FrameHeader::first(channel, total_len)
    } else {
        FrameHeader::continuation(channel, sequence_idx)
    };

    let header_len = header.encoded_len();
    if header_len > packet_size {
        return Err(LedgerError::ConfigError(format!(
            "{}: header {header_len} bytes, packet {packet_size} bytes",
            constants::ERR_HEADER_DOES_NOT_FIT
        )));
    }

    let mut packet = Vec::with_capacity(packet_size);
    header.write_to(&mut packet);

    let consumed = command.len().min(packet_size - header_len);
    packet.put_slice(&command[..consumed]);
    packet.resize(packet_size, 0);

    trace!(sequence = sequence_idx, consumed, "packetized");
    Ok((packet, consumed))
}

/// Split `command` into consecutive packets, concatenated.
///
/// The result is a whole number of `packet_size` packets with sequence
/// indices 0, 1, 2, ... An empty command produces no packets.
///
/// # Errors
/// Any error from [`packetize`]; no partial output is returned.
pub fn wrap_command_apdu(
    channel: u16,
    command: &[u8],
    packet_size: usize,
    channel_implicit: bool,
) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    let mut remaining = command;
    let mut sequence_idx: u16 = 0;

    while !remaining.is_empty() {
        let (packet, consumed) =
            packetize(channel, remaining, packet_size, sequence_idx, channel_implicit)?;
        if consumed == 0 {
            return Err(LedgerError::ConfigError(
                constants::ERR_NO_PROGRESS.to_string(),
            ));
        }
        remaining = &remaining[consumed..];
        blob.extend_from_slice(&packet);

        if !remaining.is_empty() {
            sequence_idx = sequence_idx.checked_add(1).ok_or_else(|| {
                LedgerError::ConfigError(constants::ERR_SEQUENCE_OVERFLOW.to_string())
            })?;
        }
    }

    Ok(blob)
}
