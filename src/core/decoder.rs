//! Frame decoder: inbound packets → response APDU.

use bytes::Buf;
use tracing::{trace, warn};

use crate::core::packet::{
    block_size, min_response_frame_len, CHANNEL_LEN, SEQUENCE_LEN, TAG, TAG_LEN,
};
use crate::error::{constants, LedgerError, Result};
use crate::transport::FrameSource;

/// Check the channel, tag and sequence index at the start of `packet`.
///
/// Returns the bytes following the sequence index. For a first packet this
/// starts with the 2-byte total length.
///
/// # Errors
/// `FrameTooShort` if the packet cannot hold the prefix, otherwise
/// `ChannelMismatch`, `TagMismatch` or `SequenceMismatch` for the first field
/// that disagrees.
pub fn validate_prefix(
    packet: &[u8],
    channel: u16,
    expected_sequence: u16,
    channel_implicit: bool,
) -> Result<&[u8]> {
    let channel_len = if channel_implicit { 0 } else { CHANNEL_LEN };
    let prefix_len = channel_len + TAG_LEN + SEQUENCE_LEN;
    if packet.len() < prefix_len {
        return Err(LedgerError::FrameTooShort { len: packet.len() });
    }

    let mut buf = packet;
    if !channel_implicit {
        let found = buf.get_u16();
        if found != channel {
            return Err(LedgerError::ChannelMismatch {
                expected: channel,
                found,
            });
        }
    }

    let tag = buf.get_u8();
    if tag != TAG {
        return Err(LedgerError::TagMismatch { found: tag });
    }

    let sequence = buf.get_u16();
    if sequence != expected_sequence {
        return Err(LedgerError::SequenceMismatch {
            expected: expected_sequence,
            found: sequence,
        });
    }

    Ok(buf)
}

/// Reassemble one response from `frames`.
///
/// Reads the first packet, takes the total length it announces, then reads
/// continuation packets until that many payload bytes are collected. Padding
/// beyond the announced length is discarded.
///
/// # Errors
/// The first validation or transport error encountered; nothing partial is
/// returned.
pub fn unwrap_response_apdu(
    channel: u16,
    frames: &mut dyn FrameSource,
    packet_size: usize,
    channel_implicit: bool,
) -> Result<Vec<u8>> {
    let frame = frames.next_frame()?;
    if frame.len() < min_response_frame_len(channel_implicit) {
        warn!(len = frame.len(), "first response frame too short");
        return Err(LedgerError::FrameTooShort { len: frame.len() });
    }

    let mut rest = validate_prefix(&frame, channel, 0, channel_implicit)?;
    let total_len = rest.get_u16() as usize;
    trace!(total_len, "response header");

    let mut response = Vec::with_capacity(total_len);
    let first = block_size(packet_size, 0, channel_implicit)
        .min(rest.len())
        .min(total_len);
    response.extend_from_slice(&rest[..first]);

    let mut sequence: u16 = 0;
    while response.len() < total_len {
        sequence = sequence.checked_add(1).ok_or_else(|| {
            LedgerError::ConfigError(constants::ERR_SEQUENCE_OVERFLOW.to_string())
        })?;

        let frame = frames.next_frame()?;
        let payload = validate_prefix(&frame, channel, sequence, channel_implicit)?;

        let block = block_size(packet_size, sequence, channel_implicit)
            .min(payload.len())
            .min(total_len - response.len());
        if block == 0 {
            return Err(LedgerError::FrameTooShort { len: frame.len() });
        }
        response.extend_from_slice(&payload[..block]);
        trace!(sequence, block, collected = response.len(), "continuation frame");
    }

    Ok(response)
}
