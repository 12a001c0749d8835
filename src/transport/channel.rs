//! `std::sync::mpsc` backed transport.
//!
//! HID stacks typically deliver input reports from a reader thread. The host
//! side here is a [`ChannelTransport`]: packets it writes go to an outbound
//! channel and inbound packets arrive on a receiver. The far side is a
//! [`DeviceEndpoint`], which tests and emulators drive from another thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::DeviceConfig;
use crate::core::codec::FrameCodec;
use crate::error::{constants, LedgerError, Result};
use crate::transport::{FrameSource, Transport};

/// Inbound half, optionally bounded by a read timeout.
///
/// A timeout or disconnect faults the transport: a reply may still arrive
/// late, so no further exchange may run on it.
pub struct InboundFrames {
    rx: Receiver<Vec<u8>>,
    timeout: Option<Duration>,
    faulted: bool,
    /// Set once an exchange has read from this half
    read_since_write: bool,
}

impl InboundFrames {
    fn new(rx: Receiver<Vec<u8>>, timeout: Option<Duration>) -> Self {
        Self {
            rx,
            timeout,
            faulted: false,
            read_since_write: false,
        }
    }

    /// Drop frames left over from an aborted exchange.
    fn discard_stale(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    fn fault(&mut self, err: LedgerError) -> LedgerError {
        self.faulted = true;
        warn!(error = %err, "channel transport faulted");
        err
    }
}

impl FrameSource for InboundFrames {
    fn next_frame(&mut self) -> Result<Vec<u8>> {
        if self.faulted {
            return Err(LedgerError::TransportError(
                constants::ERR_TRANSPORT_FAULTED.to_string(),
            ));
        }
        self.read_since_write = true;

        let received = match self.timeout {
            None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(timeout) => self.rx.recv_timeout(timeout),
        };
        received.map_err(|e| {
            let err = match e {
                RecvTimeoutError::Timeout => LedgerError::TransportError(format!(
                    "{} after {} ms",
                    constants::ERR_READ_TIMEOUT,
                    self.timeout.unwrap_or_default().as_millis()
                )),
                RecvTimeoutError::Disconnected => LedgerError::TransportError(
                    constants::ERR_FRAME_SOURCE_CLOSED.to_string(),
                ),
            };
            self.fault(err)
        })
    }
}

/// Host side of a channel pair.
pub struct ChannelTransport {
    outbound: Option<Sender<Vec<u8>>>,
    inbound: InboundFrames,
}

impl ChannelTransport {
    pub fn new(
        outbound: Sender<Vec<u8>>,
        inbound: Receiver<Vec<u8>>,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            inbound: InboundFrames::new(inbound, read_timeout),
        }
    }

    /// Connected host transport and device endpoint using `config`'s read timeout.
    pub fn pair(config: &DeviceConfig) -> (Self, DeviceEndpoint) {
        let (host_tx, device_rx) = mpsc::channel();
        let (device_tx, host_rx) = mpsc::channel();
        (
            Self::new(host_tx, host_rx, config.read_timeout()),
            DeviceEndpoint {
                rx: device_rx,
                tx: device_tx,
                codec: FrameCodec::from(config),
            },
        )
    }

    /// True once a read timed out or the device side went away.
    pub fn is_faulted(&self) -> bool {
        self.inbound.faulted
    }
}

impl Transport for ChannelTransport {
    fn write(&mut self, packet: &[u8]) -> Result<()> {
        if self.inbound.faulted {
            return Err(LedgerError::TransportError(
                constants::ERR_TRANSPORT_FAULTED.to_string(),
            ));
        }
        let outbound = self.outbound.as_ref().ok_or_else(|| {
            LedgerError::TransportError(constants::ERR_TRANSPORT_CLOSED.to_string())
        })?;

        if self.inbound.read_since_write {
            self.inbound.read_since_write = false;
            let discarded = self.inbound.discard_stale();
            if discarded > 0 {
                debug!(discarded, "dropped stale inbound frames");
            }
        }

        outbound
            .send(packet.to_vec())
            .map_err(|_| LedgerError::TransportError("Device endpoint disconnected".to_string()))
    }

    fn read_frames(&mut self) -> &mut dyn FrameSource {
        &mut self.inbound
    }

    fn close(&mut self) -> Result<()> {
        if self.outbound.take().is_some() {
            debug!("channel transport closed");
        }
        Ok(())
    }
}

/// Device side of a channel pair.
pub struct DeviceEndpoint {
    rx: Receiver<Vec<u8>>,
    tx: Sender<Vec<u8>>,
    codec: FrameCodec,
}

impl DeviceEndpoint {
    /// Next raw packet written by the host.
    pub fn recv_packet(&mut self) -> Result<Vec<u8>> {
        self.rx.next_frame()
    }

    /// Deliver a raw packet to the host.
    pub fn send_packet(&self, packet: Vec<u8>) -> Result<()> {
        self.tx
            .send(packet)
            .map_err(|_| LedgerError::TransportError("Host disconnected".to_string()))
    }

    /// Reassemble the next command written by the host.
    pub fn recv_command(&mut self) -> Result<Vec<u8>> {
        self.codec.decode(&mut self.rx)
    }

    /// Frame and deliver a full response APDU.
    pub fn send_response(&self, response: &[u8]) -> Result<()> {
        for packet in self.codec.encode_packets(response)? {
            self.send_packet(packet)?;
        }
        Ok(())
    }

    /// Answer commands with `handler` until the host closes its side.
    ///
    /// Returns the number of commands served. Framing errors from the host
    /// end the loop with that error.
    pub fn serve<F>(mut self, mut handler: F) -> Result<usize>
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        let mut served = 0;
        loop {
            let command = match self.recv_command() {
                Ok(command) => command,
                Err(LedgerError::TransportError(_)) => return Ok(served),
                Err(e) => return Err(e),
            };
            trace!(len = command.len(), "serving command");
            let response = handler(&command);
            if self.send_response(&response).is_err() {
                return Ok(served + 1);
            }
            served += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn host_and_device_exchange_packets() {
        let config = DeviceConfig::default();
        let codec = FrameCodec::from(&config);
        let (mut host, device) = ChannelTransport::pair(&config);

        let server = thread::spawn(move || {
            device.serve(|command| {
                let mut reply = command.to_vec();
                reply.extend_from_slice(&[0x90, 0x00]);
                reply
            })
        });

        let command = vec![0x55u8; 80];
        for packet in codec.encode_packets(&command).unwrap() {
            host.write(&packet).unwrap();
        }
        let reply = codec.decode(host.read_frames()).unwrap();
        assert_eq!(&reply[..80], &command[..]);
        assert_eq!(&reply[80..], &[0x90, 0x00]);

        host.close().unwrap();
        assert_eq!(server.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn read_timeout_is_reported() {
        let config = DeviceConfig {
            read_timeout: Duration::from_millis(20),
            ..DeviceConfig::default()
        };
        let (mut host, _device) = ChannelTransport::pair(&config);
        match host.read_frames().next_frame() {
            Err(LedgerError::TransportError(msg)) => assert!(msg.contains("Timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn writes_fail_after_close() {
        let (mut host, _device) = ChannelTransport::pair(&DeviceConfig::default());
        host.close().unwrap();
        assert!(matches!(
            host.write(&[0u8; 64]),
            Err(LedgerError::TransportError(_))
        ));
    }

    #[test]
    fn dropped_device_surfaces_on_read() {
        let (mut host, device) = ChannelTransport::pair(&DeviceConfig::default());
        drop(device);
        assert!(matches!(
            host.read_frames().next_frame(),
            Err(LedgerError::TransportError(_))
        ));
    }

    #[test]
    fn timeout_faults_the_transport() {
        let config = DeviceConfig {
            read_timeout: Duration::from_millis(20),
            ..DeviceConfig::default()
        };
        let (mut host, _device) = ChannelTransport::pair(&config);
        assert!(host.read_frames().next_frame().is_err());
        assert!(host.is_faulted());

        match host.write(&[0u8; 64]) {
            Err(LedgerError::TransportError(msg)) => assert!(msg.contains("faulted")),
            other => panic!("expected faulted transport, got {other:?}"),
        }
        assert!(host.read_frames().next_frame().is_err());
    }

    #[test]
    fn leftover_frames_are_dropped_before_next_command() {
        let (mut host, mut device) = ChannelTransport::pair(&DeviceConfig::default());
        device.send_packet(vec![1u8; 64]).unwrap();
        device.send_packet(vec![2u8; 64]).unwrap();

        // An aborted exchange read only the first of its frames.
        assert_eq!(host.read_frames().next_frame().unwrap(), vec![1u8; 64]);

        host.write(&[0u8; 64]).unwrap();
        assert_eq!(device.recv_packet().unwrap(), vec![0u8; 64]);
        device.send_packet(vec![3u8; 64]).unwrap();
        assert_eq!(host.read_frames().next_frame().unwrap(), vec![3u8; 64]);
    }
}
