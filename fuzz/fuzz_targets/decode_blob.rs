#![no_main]

use citadel_keyblob::wire;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(parts) = wire::parse(data) {
        assert_eq!(parts.covered_key.len() + wire::BLOB_OVERHEAD, data.len());
        assert!(parts.header.key_len as usize <= parts.covered_key.len());
        assert_eq!(&parts.header.to_bytes(), parts.header_bytes);
    }
    let _ = citadel_keyblob::inspect(data);
});
