//! # Exchange Orchestrator
//!
//! One synchronous request/response cycle: check the command shape, wrap it
//! into packets, write them in order, reassemble the reply and classify its
//! status word.
//!
//! ```text
//! command ──► validate ──► wrap ──► Transport::write × n
//!                                          │
//! payload ◄── status check ◄── unwrap ◄── Transport::read_frames
//! ```
//!
//! Exchanges take `&mut self`, so two cannot overlap on one device. Threads
//! sharing a device put it behind a `Mutex`.

use tracing::{debug, instrument, warn};

use crate::config::{CommandConfig, DeviceConfig, LedgerConfig};
use crate::core::codec::FrameCodec;
use crate::error::{LedgerError, Result};
use crate::protocol::commands::{CommandSet, VersionInfo};
use crate::protocol::status::check_status;
use crate::transport::{FrameSource, Transport};
use crate::utils::metrics::{global_metrics, Timer};

/// Offset of the Lc byte in a command APDU
pub const LC_OFFSET: usize = 4;

/// Length of the `CLA INS P1 P2 Lc` header
pub const COMMAND_HEADER_LEN: usize = 5;

/// Length of the trailing status word
pub const STATUS_WORD_LEN: usize = 2;

/// Anything that can run one APDU exchange.
pub trait Exchange {
    /// Send `command` and return the response payload without its status word.
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>>;
}

/// Check the `CLA INS P1 P2 Lc data` layout of a command.
///
/// With `strict` the Lc byte must equal the number of data bytes; without it
/// only the 5-byte header is required.
pub fn validate_command(command: &[u8], strict: bool) -> Result<()> {
    let actual = command.len().saturating_sub(COMMAND_HEADER_LEN);
    let Some(&lc) = command.get(LC_OFFSET) else {
        return Err(LedgerError::MalformedCommand {
            declared: 0,
            actual,
        });
    };

    if strict && lc as usize != actual {
        return Err(LedgerError::MalformedCommand {
            declared: lc as usize,
            actual,
        });
    }
    Ok(())
}

/// Split a response APDU into payload and status word, then check the status.
pub fn split_response(mut response: Vec<u8>) -> Result<Vec<u8>> {
    if response.len() < STATUS_WORD_LEN {
        return Err(LedgerError::ConnectionLost);
    }

    let sw_offset = response.len() - STATUS_WORD_LEN;
    let code = u16::from_be_bytes([response[sw_offset], response[sw_offset + 1]]);
    check_status(code)?;

    response.truncate(sw_offset);
    Ok(response)
}

/// Counts frames pulled through to the decoder.
struct CountingFrames<'a> {
    inner: &'a mut dyn FrameSource,
    count: u64,
}

impl FrameSource for CountingFrames<'_> {
    fn next_frame(&mut self) -> Result<Vec<u8>> {
        let frame = self.inner.next_frame()?;
        self.count += 1;
        debug!(len = frame.len(), index = self.count - 1, "frame read");
        Ok(frame)
    }
}

/// A hardware device reached through a packet transport.
pub struct LedgerDevice<T: Transport> {
    transport: T,
    config: DeviceConfig,
    commands: CommandSet,
    codec: FrameCodec,
}

impl<T: Transport> LedgerDevice<T> {
    /// Device with the default framing (channel `0x0101`, 64-byte packets).
    pub fn new(transport: T) -> Self {
        let config = DeviceConfig::default();
        Self {
            transport,
            codec: FrameCodec::from(&config),
            config,
            commands: CommandSet::from(&CommandConfig::default()),
        }
    }

    /// Device with explicit framing and command settings.
    ///
    /// # Errors
    /// `ConfigError` listing every validation failure of `config`.
    pub fn with_config(transport: T, config: &LedgerConfig) -> Result<Self> {
        config.validate_strict()?;
        Ok(Self {
            transport,
            codec: FrameCodec::from(&config.device),
            config: config.device,
            commands: CommandSet::from(&config.commands),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport without closing it.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Close the underlying transport.
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }

    /// Send one command APDU and return the response payload.
    ///
    /// # Errors
    /// - `MalformedCommand` if the command header is inconsistent
    /// - `TransportError` if a packet cannot be written or read
    /// - a protocol error if the reply frames are malformed
    /// - `ConnectionLost` if the reply has no room for a status word
    /// - `Status` if the status word is not `0x9000`
    #[instrument(skip(self, command), fields(command_len = command.len()))]
    pub fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        let metrics = global_metrics();
        let _timer = Timer::start("exchange");
        metrics.exchange_started(command.len() as u64);

        let result = self.run_exchange(command);
        match &result {
            Ok(payload) => {
                metrics.exchange_succeeded(payload.len() as u64);
                debug!(response_len = payload.len(), "exchange complete");
            }
            Err(e) => {
                metrics.exchange_failed();
                if e.is_protocol_error() {
                    metrics.protocol_error();
                } else if matches!(e, LedgerError::TransportError(_)) {
                    metrics.transport_error();
                } else if matches!(e, LedgerError::Status(_)) {
                    metrics.status_error();
                }
                warn!(error = %e, "exchange failed");
            }
        }
        result
    }

    fn run_exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        validate_command(command, self.config.strict_length_check)?;

        let blob = self.codec.encode(command)?;
        let mut written = 0u64;
        for packet in blob.chunks(self.codec.packet_size) {
            self.transport.write(packet).map_err(|e| match e {
                LedgerError::TransportError(_) => e,
                other => LedgerError::TransportError(other.to_string()),
            })?;
            written += 1;
            debug!(sequence = written - 1, "frame written");
        }
        global_metrics().record_frames_written(written);

        let mut frames = CountingFrames {
            inner: self.transport.read_frames(),
            count: 0,
        };
        let response = self.codec.decode(&mut frames);
        global_metrics().record_frames_read(frames.count);

        split_response(response?)
    }

    /// Application mode and version of the app running on the device.
    pub fn get_version(&mut self) -> Result<VersionInfo> {
        let commands = self.commands;
        commands.get_version(self)
    }

    /// Public key for a BIP32 derivation path.
    pub fn get_public_key(&mut self, path: &[u32]) -> Result<Vec<u8>> {
        let commands = self.commands;
        commands.get_public_key(self, path)
    }

    /// Sign `message`, chunked as needed. Returns the signature.
    pub fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        let commands = self.commands;
        commands.sign(self, message)
    }

    /// Ask the device to hash `message`, chunked as needed.
    pub fn hash(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        let commands = self.commands;
        commands.hash(self, message)
    }

    /// Round-trip `message` through the device, chunked as needed.
    pub fn echo(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        let commands = self.commands;
        commands.echo(self, message)
    }
}

impl<T: Transport> Exchange for LedgerDevice<T> {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        LedgerDevice::exchange(self, command)
    }
}

impl<E: Exchange + ?Sized> Exchange for &mut E {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        (**self).exchange(command)
    }
}
