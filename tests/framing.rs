//! Wire-format tests for the packet encoder and decoder
//!
//! Checks exact byte layouts, packet-count boundaries and sequencing
//! through the public API.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::VecDeque;

use ledger_apdu::core::packet::{packet_count, TAG};
use ledger_apdu::{packetize, unwrap_response_apdu, wrap_command_apdu, LedgerError};

fn split(blob: &[u8], packet_size: usize) -> VecDeque<Vec<u8>> {
    blob.chunks(packet_size).map(<[u8]>::to_vec).collect()
}

#[test]
fn test_hundred_zero_bytes_on_default_channel() {
    let blob = wrap_command_apdu(0x0101, &[0u8; 100], 64, false).expect("wrap should succeed");

    assert_eq!(blob.len(), 128);
    assert_eq!(&blob[..7], &[0x01, 0x01, 0x05, 0x00, 0x00, 0x00, 0x64]);
    assert_eq!(&blob[64..69], &[0x01, 0x01, 0x05, 0x00, 0x01]);
    // 57 + 43 payload bytes, rest of the second packet is padding
    assert!(blob[69 + 43..].iter().all(|&b| b == 0));
}

#[test]
fn test_packet_count_boundaries() {
    assert!(wrap_command_apdu(0x0101, &[], 64, false).unwrap().is_empty());
    assert_eq!(wrap_command_apdu(0x0101, &[1u8; 57], 64, false).unwrap().len(), 64);
    assert_eq!(wrap_command_apdu(0x0101, &[1u8; 58], 64, false).unwrap().len(), 128);

    assert_eq!(packet_count(57, 64, false), 1);
    assert_eq!(packet_count(58, 64, false), 2);
    assert_eq!(packet_count(59, 64, true), 1);
    assert_eq!(packet_count(60, 64, true), 2);
}

#[test]
fn test_sequence_indices_increase_by_one() {
    let blob = wrap_command_apdu(0x8001, &vec![0xEE; 1000], 64, false).unwrap();
    let packets = split(&blob, 64);
    assert_eq!(packets.len(), packet_count(1000, 64, false));

    for (idx, packet) in packets.iter().enumerate() {
        assert_eq!(&packet[..2], &[0x80, 0x01]);
        assert_eq!(packet[2], TAG);
        assert_eq!(u16::from_be_bytes([packet[3], packet[4]]), idx as u16);
    }
}

#[test]
fn test_packetize_reports_consumption() {
    let command: Vec<u8> = (0..100).collect();

    let (first, consumed) = packetize(0x0101, &command, 64, 0, false).unwrap();
    assert_eq!(first.len(), 64);
    assert_eq!(consumed, 57);

    let (second, consumed) = packetize(0x0101, &command[57..], 64, 1, false).unwrap();
    assert_eq!(consumed, 43);
    assert_eq!(&second[5..48], &command[57..]);
}

#[test]
fn test_packetize_rejects_tiny_packets() {
    assert!(matches!(
        packetize(0x0101, &[1, 2, 3], 2, 0, false),
        Err(LedgerError::ConfigError(_))
    ));
}

#[test]
fn test_round_trip_small_packets_channel_implicit() {
    let message: Vec<u8> = (0..=255u8).collect();
    let blob = wrap_command_apdu(0x0101, &message, 16, true).unwrap();
    assert_eq!(blob.len() % 16, 0);

    let mut frames = split(&blob, 16);
    let decoded = unwrap_response_apdu(0x0101, &mut frames, 16, true).unwrap();
    assert_eq!(decoded, message);
    assert!(frames.is_empty(), "decoder must not read past the message");
}

#[test]
fn test_decoder_ignores_trailing_frames() {
    let mut blob = wrap_command_apdu(0x0101, &[9u8; 10], 64, false).unwrap();
    blob.extend(wrap_command_apdu(0x0101, &[7u8; 10], 64, false).unwrap());

    let mut frames = split(&blob, 64);
    assert_eq!(unwrap_response_apdu(0x0101, &mut frames, 64, false).unwrap(), vec![9u8; 10]);
    assert_eq!(unwrap_response_apdu(0x0101, &mut frames, 64, false).unwrap(), vec![7u8; 10]);
}

#[test]
fn test_decoder_errors() {
    let blob = wrap_command_apdu(0x0101, &[3u8; 80], 64, false).unwrap();

    let mut frames = split(&blob, 64);
    frames[0][2] = 0x06;
    assert!(matches!(
        unwrap_response_apdu(0x0101, &mut frames, 64, false),
        Err(LedgerError::TagMismatch { found: 0x06 })
    ));

    let mut frames = split(&blob, 64);
    assert!(matches!(
        unwrap_response_apdu(0x8001, &mut frames, 64, false),
        Err(LedgerError::ChannelMismatch { .. })
    ));

    let mut frames = split(&blob, 64);
    frames[1][4] = 0x05;
    assert!(matches!(
        unwrap_response_apdu(0x0101, &mut frames, 64, false),
        Err(LedgerError::SequenceMismatch {
            expected: 1,
            found: 5
        })
    ));

    let mut frames: VecDeque<Vec<u8>> = VecDeque::new();
    assert!(matches!(
        unwrap_response_apdu(0x0101, &mut frames, 64, false),
        Err(LedgerError::TransportError(_))
    ));
}
