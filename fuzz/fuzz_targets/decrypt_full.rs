#![no_main]

use citadel_keyblob::{
    Access, BlobFormat, CipherContext, KeyBuffer, Keyblob, KeyblobError, MemoryClass, Permissions,
};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static ENGINE: Lazy<Keyblob> = Lazy::new(|| Keyblob::new(CipherContext::generate()));

fuzz_target!(|data: &[u8]| {
    if data.len() < 17 {
        return;
    }

    let (keymod, blob) = data.split_at(16);
    let domain = if data[0] & 1 == 0 {
        MemoryClass::General
    } else {
        MemoryClass::Secure
    };
    let access = Access::new(Permissions::BLOB, domain);

    match ENGINE.decrypt(&KeyBuffer::black(blob.to_vec()), keymod, &access) {
        // Only test-format blobs are forgeable: their key is public.
        Ok(_) => {
            let info = citadel_keyblob::inspect(blob).expect("opened blob must parse");
            assert_eq!(info.flags.format(), Some(BlobFormat::Test));
        }
        Err(KeyblobError::MalformedBlob)
        | Err(KeyblobError::AuthenticationFailure)
        | Err(KeyblobError::PermissionDenied(_))
        | Err(KeyblobError::InvalidArgument(_)) => {}
        Err(e) => panic!("unexpected error: {}", e),
    }
});
