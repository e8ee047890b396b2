use std::sync::Arc;
use std::thread;

use citadel_keyblob::{
    blob_len, Access, CipherContext, Command, CoverMode, EncryptOptions, KbData, KeyBuffer,
    Keyblob, KeyblobError, LocalTransport, MemoryClass, Permissions, Transport,
};

const KEYMOD: &[u8; 16] = b"test-mod-0000000";

fn transport(domain: MemoryClass) -> LocalTransport {
    let engine = Arc::new(Keyblob::new(CipherContext::from_bytes(&[0x21; 32]).unwrap()));
    LocalTransport::new(engine, Access::new(Permissions::BLOB, domain))
}

#[test]
fn descriptor_roundtrip_writes_lengths_back() {
    let t = transport(MemoryClass::General);
    let mut raw: Vec<u8> = (0u8..20).collect();
    let mut blob = vec![0u8; 128];

    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    t.submit(Command::Encrypt, &mut kb).unwrap();
    assert_eq!(kb.keyblob_len, blob_len(20));
    let blob_out = kb.keyblob().to_vec();

    let mut blob_in = blob_out.clone();
    let mut out = vec![0u8; 64];
    let mut kb = KbData::for_decrypt(&mut blob_in, &mut out, KEYMOD);
    t.submit(Command::Decrypt, &mut kb).unwrap();
    assert_eq!(kb.rawkey_len, 20);
    assert_eq!(kb.rawkey(), &(0u8..20).collect::<Vec<u8>>()[..]);
}

#[test]
fn short_output_buffers_rejected() {
    let t = transport(MemoryClass::General);
    let mut raw = vec![1u8; 17];
    let mut blob = vec![0u8; blob_len(17) - 1];
    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    assert!(matches!(
        t.submit(Command::Encrypt, &mut kb),
        Err(KeyblobError::InvalidArgument(_))
    ));
    assert_eq!(kb.keyblob_len, 0);

    let mut blob = vec![0u8; blob_len(17)];
    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    t.submit(Command::Encrypt, &mut kb).unwrap();

    let mut out = vec![0u8; 16];
    let mut kb = KbData::for_decrypt(&mut blob, &mut out, KEYMOD);
    assert!(matches!(
        t.submit(Command::Decrypt, &mut kb),
        Err(KeyblobError::InvalidArgument(_))
    ));
    assert_eq!(kb.rawkey_len, 0);
}

#[test]
fn partial_input_lengths_honoured() {
    let t = transport(MemoryClass::General);
    let mut raw = vec![0xAB; 32];
    let mut blob = vec![0u8; 256];
    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    kb.rawkey_len = 5;
    t.submit(Command::Encrypt, &mut kb).unwrap();
    assert_eq!(kb.keyblob_len, 64);

    let mut out = vec![0u8; 32];
    let mut kb = KbData::for_decrypt(&mut blob, &mut out, KEYMOD);
    kb.keyblob_len = 64;
    t.submit(Command::Decrypt, &mut kb).unwrap();
    assert_eq!(kb.rawkey(), &[0xAB; 5]);
}

#[test]
fn bogus_lengths_rejected() {
    let t = transport(MemoryClass::General);
    let mut raw = vec![0u8; 8];
    let mut blob = vec![0u8; 64];
    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    kb.rawkey_len = 9;
    assert!(matches!(
        t.submit(Command::Encrypt, &mut kb),
        Err(KeyblobError::InvalidArgument(_))
    ));
    kb.rawkey_len = 0;
    assert!(matches!(
        t.submit(Command::Encrypt, &mut kb),
        Err(KeyblobError::InvalidArgument(_))
    ));
}

#[test]
fn session_domain_applies_to_blobs() {
    let secure = transport(MemoryClass::Secure);
    let mut raw = vec![4u8; 16];
    let mut blob = vec![0u8; 64];
    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    secure.submit(Command::Encrypt, &mut kb).unwrap();
    assert_eq!(blob[3] & 0x08, 0x08);

    // Same engine key, general-memory session: refused.
    let general = transport(MemoryClass::General);
    let mut out = vec![0u8; 16];
    let mut kb = KbData::for_decrypt(&mut blob, &mut out, KEYMOD);
    assert!(matches!(
        general.submit(Command::Decrypt, &mut kb),
        Err(KeyblobError::PermissionDenied(_))
    ));
}

#[test]
fn explicit_options_override_session_defaults() {
    let t = transport(MemoryClass::General)
        .with_options(EncryptOptions::new().with_cover(CoverMode::Ccm));
    let mut raw = vec![4u8; 16];
    let mut blob = vec![0u8; 64];
    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    t.submit(Command::Encrypt, &mut kb).unwrap();
    assert_eq!(blob[1], 0x01);
}

#[test]
fn transport_is_object_safe() {
    let t: Box<dyn Transport> = Box::new(transport(MemoryClass::General));
    let mut raw = vec![1u8; 16];
    let mut blob = vec![0u8; 64];
    let mut kb = KbData::for_encrypt(&mut raw, &mut blob, KEYMOD);
    t.submit(Command::Encrypt, &mut kb).unwrap();
}

#[test]
fn concurrent_requests_share_one_engine() {
    let engine = Arc::new(Keyblob::new(CipherContext::generate()));
    let access = Access::new(Permissions::BLOB, MemoryClass::General);

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for n in 1..=20usize {
                    let key = vec![i; n];
                    let red = KeyBuffer::red(key.clone(), MemoryClass::General);
                    let opts = if n % 2 == 0 {
                        EncryptOptions::new().with_cover(CoverMode::Ccm)
                    } else {
                        EncryptOptions::new()
                    };
                    let blob = engine.encrypt(&red, KEYMOD, &opts, &access).unwrap();
                    let out = engine.decrypt(&blob, KEYMOD, &access).unwrap();
                    assert_eq!(out.as_bytes(), &key[..]);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
