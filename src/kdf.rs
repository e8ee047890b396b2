//! Per-blob key derivation (v1)
//!
//! info = PROTOCOL_ID || b"|" || label || header || keymod_len[1] || keymod
//! okm  = HKDF-SHA256(kek, salt=blob_salt, info=info, len=N)
//!
//! ECB-cover takes 64 bytes (cover key || MAC key), CCM-cover takes 32.

extern crate alloc;
use alloc::vec::Vec;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{KeyblobError, Result};
use crate::wire::{HEADER_BYTES, MAX_KEYMOD_LEN, PROTOCOL_ID, SALT_BYTES};

pub const LABEL_ECB: &[u8] = b"ecb";
pub const LABEL_CCM: &[u8] = b"ccm";

/// Length-prefixed modifier. Shared by the KDF, the CCM associated data and
/// the authenticator.
pub fn bind_keymod(out: &mut Vec<u8>, keymod: &[u8]) -> Result<()> {
    if keymod.len() > MAX_KEYMOD_LEN {
        return Err(KeyblobError::InvalidArgument("key modifier too long"));
    }
    out.push(keymod.len() as u8);
    out.extend_from_slice(keymod);
    Ok(())
}

pub fn derive_keys<const N: usize>(
    kek: &[u8; 32],
    salt: &[u8; SALT_BYTES],
    label: &[u8],
    header: &[u8; HEADER_BYTES],
    keymod: &[u8],
) -> Result<Zeroizing<[u8; N]>> {
    let mut info =
        Vec::with_capacity(PROTOCOL_ID.len() + 1 + label.len() + HEADER_BYTES + 1 + keymod.len());
    info.extend_from_slice(PROTOCOL_ID);
    info.push(b'|');
    info.extend_from_slice(label);
    info.extend_from_slice(header);
    bind_keymod(&mut info, keymod)?;

    let hk = Hkdf::<Sha256>::new(Some(salt), kek);
    let mut out = Zeroizing::new([0u8; N]);
    hk.expand(&info, &mut out[..])
        .map_err(|_| KeyblobError::InvalidArgument("kdf output length"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEK: [u8; 32] = [0x42; 32];
    const SALT: [u8; SALT_BYTES] = [0x07; SALT_BYTES];
    const HEADER: [u8; HEADER_BYTES] = [1, 0, 0, 4, 0, 16, 0, 0];

    #[test]
    fn modifier_changes_output() {
        let a = derive_keys::<32>(&KEK, &SALT, LABEL_ECB, &HEADER, b"aaaaaaaaaaaaaaaa").unwrap();
        let b = derive_keys::<32>(&KEK, &SALT, LABEL_ECB, &HEADER, b"aaaaaaaaaaaaaaab").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn label_separates_modes() {
        let a = derive_keys::<32>(&KEK, &SALT, LABEL_ECB, &HEADER, b"m").unwrap();
        let b = derive_keys::<32>(&KEK, &SALT, LABEL_CCM, &HEADER, b"m").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn length_prefix_prevents_aliasing() {
        let mut short = Vec::new();
        bind_keymod(&mut short, b"ab").unwrap();
        let mut long = Vec::new();
        bind_keymod(&mut long, b"abc").unwrap();
        assert_ne!(short, long[..short.len()]);
    }

    #[test]
    fn oversized_modifier_rejected() {
        let mut out = Vec::new();
        assert!(bind_keymod(&mut out, &[0u8; MAX_KEYMOD_LEN + 1]).is_err());
    }
}
