//! Command helpers.
//!
//! Each helper builds `CLA INS P1 P2 Lc data` commands and runs them through
//! any [`Exchange`]. Messages longer than the chunk size are sent as a run of
//! commands with `P1 = chunk index` (1-based) and `P2 = chunk count`; only the
//! response to the last chunk is returned.

use bytes::BufMut;
use tracing::debug;

use crate::config::{CommandConfig, MAX_CHUNK_SIZE};
use crate::error::{LedgerError, Result};
use crate::protocol::exchange::Exchange;

pub const INS_GET_VERSION: u8 = 0x00;
pub const INS_GET_PUBLIC_KEY: u8 = 0x01;
pub const INS_SIGN: u8 = 0x02;
pub const INS_ECHO: u8 = 0x63;
pub const INS_HASH: u8 = 0x64;

/// Deepest BIP32 path accepted by `get_public_key`
pub const MAX_PATH_DEPTH: usize = 10;

/// Version reply of the device application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub app_mode: u8,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl VersionInfo {
    /// Parse the first four payload bytes.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        match payload {
            [app_mode, major, minor, patch, ..] => Ok(Self {
                app_mode: *app_mode,
                major: *major,
                minor: *minor,
                patch: *patch,
            }),
            _ => Err(LedgerError::MalformedResponse(format!(
                "version reply has {} bytes, expected at least 4",
                payload.len()
            ))),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Build one command APDU.
pub fn build_command(cla: u8, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Vec<u8>> {
    let lc = u8::try_from(data.len()).map_err(|_| {
        LedgerError::ConfigError(format!(
            "command data of {} bytes exceeds the {MAX_CHUNK_SIZE}-byte Lc limit",
            data.len()
        ))
    })?;

    let mut command = Vec::with_capacity(5 + data.len());
    command.put_u8(cla);
    command.put_u8(ins);
    command.put_u8(p1);
    command.put_u8(p2);
    command.put_u8(lc);
    command.put_slice(data);
    Ok(command)
}

/// Class byte and chunking shared by all helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSet {
    pub cla: u8,
    pub chunk_size: usize,
}

impl From<&CommandConfig> for CommandSet {
    fn from(config: &CommandConfig) -> Self {
        Self {
            cla: config.cla,
            chunk_size: config.chunk_size.clamp(1, MAX_CHUNK_SIZE),
        }
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::from(&CommandConfig::default())
    }
}

impl CommandSet {
    pub fn get_version<E: Exchange + ?Sized>(&self, device: &mut E) -> Result<VersionInfo> {
        let command = build_command(self.cla, INS_GET_VERSION, 0, 0, &[])?;
        let payload = device.exchange(&command)?;
        VersionInfo::from_payload(&payload)
    }

    /// Path is sent as a depth byte followed by little-endian components.
    pub fn get_public_key<E: Exchange + ?Sized>(
        &self,
        device: &mut E,
        path: &[u32],
    ) -> Result<Vec<u8>> {
        if path.is_empty() || path.len() > MAX_PATH_DEPTH {
            return Err(LedgerError::ConfigError(format!(
                "derivation path depth {} outside 1..={MAX_PATH_DEPTH}",
                path.len()
            )));
        }

        let mut data = Vec::with_capacity(1 + 4 * path.len());
        data.put_u8(path.len() as u8);
        for component in path {
            data.put_u32_le(*component);
        }

        let command = build_command(self.cla, INS_GET_PUBLIC_KEY, 0, 0, &data)?;
        device.exchange(&command)
    }

    pub fn sign<E: Exchange + ?Sized>(&self, device: &mut E, message: &[u8]) -> Result<Vec<u8>> {
        self.chunked_exchange(device, INS_SIGN, message)
    }

    pub fn hash<E: Exchange + ?Sized>(&self, device: &mut E, message: &[u8]) -> Result<Vec<u8>> {
        self.chunked_exchange(device, INS_HASH, message)
    }

    pub fn echo<E: Exchange + ?Sized>(&self, device: &mut E, message: &[u8]) -> Result<Vec<u8>> {
        self.chunked_exchange(device, INS_ECHO, message)
    }

    /// Send `message` as numbered chunks and return the final response.
    ///
    /// An empty message is sent as a single empty chunk `(1, 1)`. Any failing
    /// chunk aborts the run.
    pub fn chunked_exchange<E: Exchange + ?Sized>(
        &self,
        device: &mut E,
        ins: u8,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        let chunks: Vec<&[u8]> = if message.is_empty() {
            vec![message]
        } else {
            message.chunks(self.chunk_size).collect()
        };

        let count = u8::try_from(chunks.len()).map_err(|_| {
            LedgerError::ConfigError(format!(
                "message of {} bytes needs {} chunks (maximum: 255)",
                message.len(),
                chunks.len()
            ))
        })?;

        let mut response = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let index = idx as u8 + 1;
            debug!(ins, index, count, len = chunk.len(), "sending chunk");
            let command = build_command(self.cla, ins, index, count, chunk)?;
            response = device.exchange(&command)?;
        }
        Ok(response)
    }
}
