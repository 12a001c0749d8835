#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use ledger_apdu::unwrap_response_apdu;

fuzz_target!(|data: &[u8]| {
    // First byte picks the framing, the rest is cut into 64-byte reports.
    let Some((&mode, rest)) = data.split_first() else {
        return;
    };
    let channel_implicit = mode & 1 == 1;
    let mut frames: VecDeque<Vec<u8>> = rest.chunks(64).map(<[u8]>::to_vec).collect();
    let _ = unwrap_response_apdu(0x0101, &mut frames, 64, channel_implicit);
});
