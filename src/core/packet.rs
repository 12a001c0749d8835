//! Packet header layout.
//!
//! ```text
//! first packet:         [channel(2)] [tag(1)=0x05] [sequence(2)=0] [total length(2)] [payload] [zero pad]
//! continuation packets: [channel(2)] [tag(1)=0x05] [sequence(2)=n]                   [payload] [zero pad]
//! ```
//!
//! All integers are big-endian. The channel is omitted on channel-implicit
//! transports.

use bytes::BufMut;

/// Tag byte identifying a framing packet
pub const TAG: u8 = 0x05;

/// Smallest packet size the encoder accepts
pub const MIN_PACKET_SIZE: usize = 3;

pub const CHANNEL_LEN: usize = 2;
pub const TAG_LEN: usize = 1;
pub const SEQUENCE_LEN: usize = 2;
pub const LENGTH_LEN: usize = 2;

/// Minimum bytes a first response packet must carry beyond its header
pub const MIN_FIRST_PAYLOAD: usize = 5;

/// Bytes of header on the packet with the given sequence index.
#[inline]
pub fn header_size(sequence_idx: u16, channel_implicit: bool) -> usize {
    let channel = if channel_implicit { 0 } else { CHANNEL_LEN };
    let length = if sequence_idx == 0 { LENGTH_LEN } else { 0 };
    channel + TAG_LEN + SEQUENCE_LEN + length
}

/// Shortest first packet the decoder accepts.
#[inline]
pub fn min_response_frame_len(channel_implicit: bool) -> usize {
    header_size(0, channel_implicit) + MIN_FIRST_PAYLOAD
}

/// Payload bytes available in a packet of `packet_size` at `sequence_idx`.
#[inline]
pub fn block_size(packet_size: usize, sequence_idx: u16, channel_implicit: bool) -> usize {
    packet_size.saturating_sub(header_size(sequence_idx, channel_implicit))
}

/// Number of packets needed to carry `len` bytes.
pub fn packet_count(len: usize, packet_size: usize, channel_implicit: bool) -> usize {
    if len == 0 {
        return 0;
    }
    let first = block_size(packet_size, 0, channel_implicit);
    let rest = block_size(packet_size, 1, channel_implicit);
    if len <= first || rest == 0 {
        return 1;
    }
    1 + (len - first).div_ceil(rest)
}

/// Header fields of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// `None` on channel-implicit transports
    pub channel: Option<u16>,
    pub sequence: u16,
    /// Present only on sequence 0
    pub total_len: Option<u16>,
}

impl FrameHeader {
    pub fn first(channel: Option<u16>, total_len: u16) -> Self {
        Self {
            channel,
            sequence: 0,
            total_len: Some(total_len),
        }
    }

    pub fn continuation(channel: Option<u16>, sequence: u16) -> Self {
        Self {
            channel,
            sequence,
            total_len: None,
        }
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.channel.map_or(0, |_| CHANNEL_LEN)
            + TAG_LEN
            + SEQUENCE_LEN
            + self.total_len.map_or(0, |_| LENGTH_LEN)
    }

    /// Append the header to `buf`.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        if let Some(channel) = self.channel {
            buf.put_u16(channel);
        }
        buf.put_u8(TAG);
        buf.put_u16(self.sequence);
        if let Some(total_len) = self.total_len {
            buf.put_u16(total_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes() {
        assert_eq!(header_size(0, false), 7);
        assert_eq!(header_size(1, false), 5);
        assert_eq!(header_size(0, true), 5);
        assert_eq!(header_size(9, true), 3);
        assert_eq!(min_response_frame_len(false), 12);
    }

    #[test]
    fn packet_counts_at_boundaries() {
        assert_eq!(packet_count(0, 64, false), 0);
        assert_eq!(packet_count(57, 64, false), 1);
        assert_eq!(packet_count(58, 64, false), 2);
        assert_eq!(packet_count(57 + 59, 64, false), 2);
        assert_eq!(packet_count(57 + 60, 64, false), 3);
    }

    #[test]
    fn header_bytes() {
        let mut buf = Vec::new();
        FrameHeader::first(Some(0x0101), 100).write_to(&mut buf);
        assert_eq!(buf, vec![0x01, 0x01, 0x05, 0x00, 0x00, 0x00, 0x64]);

        let mut buf = Vec::new();
        let header = FrameHeader::continuation(None, 0x0102);
        header.write_to(&mut buf);
        assert_eq!(buf, vec![0x05, 0x01, 0x02]);
        assert_eq!(header.encoded_len(), 3);
    }
}
