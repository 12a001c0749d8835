//! End-to-end exchange tests
//!
//! Drives `LedgerDevice` against the in-memory device and against a device
//! thread on the far side of a channel transport.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ledger_apdu::config::{DeviceConfig, LedgerConfig, LEGACY_CHANNEL};
use ledger_apdu::protocol::commands::{INS_ECHO, INS_SIGN};
use ledger_apdu::transport::channel::ChannelTransport;
use ledger_apdu::transport::memory::MemoryDevice;
use ledger_apdu::{LedgerDevice, LedgerError, StatusWord, Transport};

/// Device logic: echo returns its data, sign returns a fixed signature on the
/// last chunk, everything else is refused.
fn handle(command: &[u8]) -> Vec<u8> {
    let (ins, p1, p2) = (command[1], command[2], command[3]);
    let mut reply = match ins {
        INS_ECHO => command[5..].to_vec(),
        INS_SIGN if p1 == p2 => vec![0x30; 72],
        INS_SIGN => Vec::new(),
        _ => return StatusWord::InsNotSupported.code().to_be_bytes().to_vec(),
    };
    reply.extend_from_slice(&[0x90, 0x00]);
    reply
}

#[test]
fn test_exchange_over_channel_transport() {
    let config = DeviceConfig::default();
    let (host, endpoint) = ChannelTransport::pair(&config);
    let server = thread::spawn(move || endpoint.serve(handle));

    let mut device = LedgerDevice::new(host);
    let message: Vec<u8> = (0..200).collect();
    assert_eq!(device.echo(&message).unwrap(), message);

    let err = device.exchange(&[0x80, 0x7F, 0x00, 0x00, 0x00]).unwrap_err();
    assert_eq!(err.status_code(), Some(0x6D00));

    device.close().unwrap();
    assert_eq!(server.join().unwrap().unwrap(), 2);
}

#[test]
fn test_chunked_sign_over_legacy_channel() {
    let config = LedgerConfig::default_with_overrides(|c| {
        c.device.channel = LEGACY_CHANNEL;
        c.commands.chunk_size = 100;
    });
    let (host, endpoint) = ChannelTransport::pair(&config.device);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let server = thread::spawn(move || {
        endpoint.serve(move |command| {
            recorded.lock().unwrap().push((command[2], command[3]));
            handle(command)
        })
    });

    let mut device = LedgerDevice::with_config(host, &config).unwrap();
    let signature = device.sign(&[0xAB; 250]).unwrap();
    assert_eq!(signature, vec![0x30; 72]);

    device.close().unwrap();
    server.join().unwrap().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn test_shared_device_behind_mutex() {
    let mut mock = MemoryDevice::new(DeviceConfig::default());
    for ins in 0..8u8 {
        mock.insert_reply(vec![0x80, ins, 0, 0, 0], vec![ins, 0x90, 0x00]);
    }
    let device = Arc::new(Mutex::new(LedgerDevice::new(mock)));

    let workers: Vec<_> = (0..8u8)
        .map(|ins| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                for _ in 0..20 {
                    let payload = device
                        .lock()
                        .unwrap()
                        .exchange(&[0x80, ins, 0, 0, 0])
                        .expect("exchange should succeed");
                    assert_eq!(payload, vec![ins]);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let device = device.lock().unwrap();
    assert_eq!(device.transport().received_commands().len(), 160);
}

#[test]
fn test_silent_device_times_out() {
    let config = DeviceConfig {
        read_timeout: Duration::from_millis(50),
        ..DeviceConfig::default()
    };
    let (host, _endpoint) = ChannelTransport::pair(&config);
    let mut device = LedgerDevice::new(host);

    assert!(matches!(
        device.exchange(&[0x80, 0x00, 0x00, 0x00, 0x00]),
        Err(LedgerError::TransportError(_))
    ));
}

#[test]
fn test_closed_device_rejects_exchange() {
    let mut device = LedgerDevice::new(MemoryDevice::new(DeviceConfig::default()));
    device.close().unwrap();
    assert!(device.transport().is_closed());
    assert!(matches!(
        device.exchange(&[0x80, 0x00, 0x00, 0x00, 0x00]),
        Err(LedgerError::TransportError(_))
    ));

    let mut transport = device.into_inner();
    assert!(transport.close().is_ok());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = LedgerConfig::default_with_overrides(|c| c.device.packet_size = 8);
    let result = LedgerDevice::with_config(MemoryDevice::new(config.device), &config);
    assert!(matches!(result, Err(LedgerError::ConfigError(_))));
}

#[test]
fn test_late_reply_after_timeout_is_not_returned() {
    let config = DeviceConfig {
        read_timeout: Duration::from_millis(30),
        ..DeviceConfig::default()
    };
    let (host, endpoint) = ChannelTransport::pair(&config);
    let server = thread::spawn(move || {
        endpoint.serve(|command| {
            if command[1] == 0x01 {
                thread::sleep(Duration::from_millis(100));
            }
            vec![command[1], 0x90, 0x00]
        })
    });

    let mut device = LedgerDevice::new(host);
    assert!(matches!(
        device.exchange(&[0x80, 0x01, 0x00, 0x00, 0x00]),
        Err(LedgerError::TransportError(_))
    ));
    assert!(device.transport().is_faulted());
    assert!(matches!(
        device.exchange(&[0x80, 0x02, 0x00, 0x00, 0x00]),
        Err(LedgerError::TransportError(_))
    ));

    device.close().unwrap();
    drop(device);
    server.join().unwrap().unwrap();
}
