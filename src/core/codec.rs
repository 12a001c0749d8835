use crate::config::DeviceConfig;
use crate::core::decoder::unwrap_response_apdu;
use crate::core::encoder::wrap_command_apdu;
use crate::error::Result;
use crate::transport::FrameSource;

/// Framing parameters of one device, applied in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    pub channel: u16,
    pub packet_size: usize,
    pub channel_implicit: bool,
}

impl FrameCodec {
    pub fn new(channel: u16, packet_size: usize, channel_implicit: bool) -> Self {
        Self {
            channel,
            packet_size,
            channel_implicit,
        }
    }

    /// Wrap a message into concatenated packets.
    pub fn encode(&self, message: &[u8]) -> Result<Vec<u8>> {
        wrap_command_apdu(
            self.channel,
            message,
            self.packet_size,
            self.channel_implicit,
        )
    }

    /// Wrap a message and split the result into individual packets.
    pub fn encode_packets(&self, message: &[u8]) -> Result<Vec<Vec<u8>>> {
        let blob = self.encode(message)?;
        Ok(blob.chunks(self.packet_size).map(<[u8]>::to_vec).collect())
    }

    /// Reassemble one message from `frames`.
    pub fn decode(&self, frames: &mut dyn FrameSource) -> Result<Vec<u8>> {
        unwrap_response_apdu(
            self.channel,
            frames,
            self.packet_size,
            self.channel_implicit,
        )
    }
}

impl From<&DeviceConfig> for FrameCodec {
    fn from(config: &DeviceConfig) -> Self {
        Self::new(config.channel, config.packet_size, config.channel_implicit)
    }
}
