//! # Core Framing Components
//!
//! Segmentation of APDUs into fixed-size packets and their reassembly.
//!
//! ## Components
//! - **Packet**: header layout and size arithmetic
//! - **Encoder**: command APDU → packets (`packetize`, `wrap_command_apdu`)
//! - **Decoder**: packets → response APDU (`validate_prefix`, `unwrap_response_apdu`)
//! - **Codec**: encoder and decoder bound to one device configuration
//!
//! ## Wire Format
//! ```text
//! [Channel(2)]? [Tag(1)=0x05] [Sequence(2)] [TotalLength(2), first packet only] [Payload] [Zero pad]
//! ```
//!
//! ## Guarantees
//! - Every encoded message is a whole number of packets
//! - Sequence indices start at 0 and increase by one per packet
//! - Decoding aborts on the first channel, tag, sequence or length violation

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod packet;
