//! # APDU Protocol Layer
//!
//! Everything above the wire format: status word classification, the
//! request/response orchestrator and the command helpers built on it.
//!
//! ## Components
//! - **Status**: 16-bit status word → [`status::StatusWord`]
//! - **Exchange**: [`exchange::LedgerDevice`] and the [`exchange::Exchange`] trait
//! - **Commands**: get-version, get-public-key, sign, hash and echo

pub mod commands;
pub mod exchange;
pub mod status;
