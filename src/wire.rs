//! Blob wire format (v1)
//!
//! Format (v1):
//!   header[8] || salt[24] || covered_key[padded_len(n)] || tag[16]
//!
//! header = version[1] || cover_mode[1] || protinfo[2] || key_len[2] || reserved[2]
//!
//! header || salt fill the 32-byte slot reserved for blob key-encryption-key
//! material, so every blob costs BLOB_OVERHEAD = 32 + 16 bytes on top of the
//! padded key.

extern crate alloc;
use alloc::vec::Vec;

use crate::cover::CoverMode;
use crate::error::{KeyblobError, Result};
use crate::flags::BlobFlags;

/// Protocol identifier for KDF domain separation (v1)
pub const PROTOCOL_ID: &[u8] = b"citadel-kb-v1";

/// Version byte for v1
pub const PROTOCOL_VERSION: u8 = 0x01;

// ---------------------------------------------------------------------------
// Component sizes
// ---------------------------------------------------------------------------

/// AES block size; every covered key is padded to a multiple of it.
pub const BLOCK_SIZE: usize = 16;

/// Slot reserved for blob key-encryption-key material.
pub const BKEK_BYTES: usize = 32;

/// Authentication tag (HMAC truncation or CCM tag).
pub const TAG_BYTES: usize = 16;

pub const HEADER_BYTES: usize = 1 + 1 + 2 + 2 + 2; // 8
pub const SALT_BYTES: usize = BKEK_BYTES - HEADER_BYTES; // 24

/// Space required for BKEK + MAC tag storage in any blob.
pub const BLOB_OVERHEAD: usize = BKEK_BYTES + TAG_BYTES; // 48

pub const MAX_KEYBLOB_LEN: usize = 65535;
/// Largest raw key whose padded blob still fits in `MAX_KEYBLOB_LEN`.
pub const MAX_RAWKEY_LEN: usize = (MAX_KEYBLOB_LEN - BLOB_OVERHEAD) / BLOCK_SIZE * BLOCK_SIZE;

/// Key modifier length for general memory blobs.
pub const KEYMOD_LEN: usize = 16;
/// Key modifier length for secure memory blobs.
pub const SECMEM_KEYMOD_LEN: usize = 8;
pub const MAX_KEYMOD_LEN: usize = 32;

/// Round a key size up to an AES block boundary.
pub const fn padded_len(n: usize) -> usize {
    if n % BLOCK_SIZE != 0 {
        ((n >> 4) + 1) << 4
    } else {
        n
    }
}

/// Total blob length for a raw key of `n` bytes.
pub const fn blob_len(n: usize) -> usize {
    padded_len(n) + BLOB_OVERHEAD
}

/// Smallest blob `parse` will look at.
pub const MIN_KEYBLOB_LEN: usize = blob_len(0);

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobHeader {
    pub cover: CoverMode,
    pub flags: BlobFlags,
    /// Raw key length; tells decapsulation how much padding to strip.
    pub key_len: u16,
}

impl BlobHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        out[0] = PROTOCOL_VERSION;
        out[1] = self.cover.to_byte();
        out[2..4].copy_from_slice(&self.flags.bits().to_be_bytes());
        out[4..6].copy_from_slice(&self.key_len.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_BYTES]) -> Result<Self> {
        if bytes[0] != PROTOCOL_VERSION {
            return Err(KeyblobError::MalformedBlob);
        }
        let cover = CoverMode::from_byte(bytes[1]).ok_or(KeyblobError::MalformedBlob)?;
        let flags = BlobFlags::from_raw(u16::from_be_bytes([bytes[2], bytes[3]]));
        flags.validate().map_err(|_| KeyblobError::MalformedBlob)?;
        let key_len = u16::from_be_bytes([bytes[4], bytes[5]]);
        if bytes[6..8] != [0, 0] {
            return Err(KeyblobError::MalformedBlob);
        }
        Ok(Self { cover, flags, key_len })
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Borrowed view of a parsed blob.
#[derive(Debug, Clone, Copy)]
pub struct BlobParts<'a> {
    pub header: BlobHeader,
    pub header_bytes: &'a [u8; HEADER_BYTES],
    pub salt: &'a [u8; SALT_BYTES],
    pub covered_key: &'a [u8],
    pub tag: &'a [u8; TAG_BYTES],
}

pub fn parse(data: &[u8]) -> Result<BlobParts<'_>> {
    if data.len() < MIN_KEYBLOB_LEN || data.len() > MAX_KEYBLOB_LEN {
        return Err(KeyblobError::MalformedBlob);
    }
    let padded = data.len() - BLOB_OVERHEAD;
    if padded % BLOCK_SIZE != 0 {
        return Err(KeyblobError::MalformedBlob);
    }

    let header_bytes: &[u8; HEADER_BYTES] = data[..HEADER_BYTES]
        .try_into()
        .map_err(|_| KeyblobError::MalformedBlob)?;
    let header = BlobHeader::from_bytes(header_bytes)?;

    if header.key_len == 0 || padded_len(header.key_len as usize) != padded {
        return Err(KeyblobError::MalformedBlob);
    }

    let salt_end = HEADER_BYTES + SALT_BYTES;
    let key_end = salt_end + padded;

    let salt: &[u8; SALT_BYTES] = data[HEADER_BYTES..salt_end]
        .try_into()
        .map_err(|_| KeyblobError::MalformedBlob)?;
    let tag: &[u8; TAG_BYTES] = data[key_end..]
        .try_into()
        .map_err(|_| KeyblobError::MalformedBlob)?;

    Ok(BlobParts {
        header,
        header_bytes,
        salt,
        covered_key: &data[salt_end..key_end],
        tag,
    })
}

pub fn frame(
    header: &BlobHeader,
    salt: &[u8; SALT_BYTES],
    covered_key: &[u8],
    tag: &[u8; TAG_BYTES],
) -> Result<Vec<u8>> {
    if header.key_len == 0 || covered_key.len() != padded_len(header.key_len as usize) {
        return Err(KeyblobError::InvalidArgument("covered key length"));
    }

    let mut out = Vec::with_capacity(covered_key.len() + BLOB_OVERHEAD);
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(salt);
    out.extend_from_slice(covered_key);
    out.extend_from_slice(tag);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(key_len: u16) -> BlobHeader {
        BlobHeader {
            cover: CoverMode::Ecb,
            flags: BlobFlags::default(),
            key_len,
        }
    }

    #[test]
    fn padding_rule() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(15), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(17), 32);
        assert_eq!(padded_len(32), 32);
        assert_eq!(blob_len(16), 64);
        assert_eq!(MIN_KEYBLOB_LEN, 48);
    }

    #[test]
    fn frame_then_parse_exposes_regions() {
        let salt = [0x11u8; SALT_BYTES];
        let covered = [0x22u8; 32];
        let tag = [0x33u8; TAG_BYTES];
        let blob = frame(&header(17), &salt, &covered, &tag).unwrap();
        assert_eq!(blob.len(), 32 + BLOB_OVERHEAD);

        let parts = parse(&blob).unwrap();
        assert_eq!(parts.header, header(17));
        assert_eq!(parts.salt, &salt);
        assert_eq!(parts.covered_key, &covered[..]);
        assert_eq!(parts.tag, &tag);
    }

    #[test]
    fn frame_rejects_wrong_covered_length() {
        let r = frame(&header(17), &[0; SALT_BYTES], &[0; 16], &[0; TAG_BYTES]);
        assert!(matches!(r, Err(KeyblobError::InvalidArgument(_))));
    }

    #[test]
    fn parse_rejects_structural_damage() {
        let good = frame(&header(16), &[0; SALT_BYTES], &[0; 16], &[0; TAG_BYTES]).unwrap();

        assert_eq!(parse(&good[..47]).unwrap_err(), KeyblobError::MalformedBlob);
        assert_eq!(parse(&good[..63]).unwrap_err(), KeyblobError::MalformedBlob);
        assert_eq!(parse(&[]).unwrap_err(), KeyblobError::MalformedBlob);

        let mut bad = good.clone();
        bad[0] = 0x02;
        assert_eq!(parse(&bad).unwrap_err(), KeyblobError::MalformedBlob);

        let mut bad = good.clone();
        bad[1] = 0x07;
        assert_eq!(parse(&bad).unwrap_err(), KeyblobError::MalformedBlob);

        let mut bad = good.clone();
        bad[3] = 0x01; // FMT = 1 and BLACK cleared
        assert_eq!(parse(&bad).unwrap_err(), KeyblobError::MalformedBlob);

        let mut bad = good.clone();
        bad[5] = 40; // declared length needs 48 padded bytes
        assert_eq!(parse(&bad).unwrap_err(), KeyblobError::MalformedBlob);

        let mut bad = good.clone();
        bad[4] = 0;
        bad[5] = 0;
        assert_eq!(parse(&bad).unwrap_err(), KeyblobError::MalformedBlob);

        let mut bad = good;
        bad[7] = 0x01;
        assert_eq!(parse(&bad).unwrap_err(), KeyblobError::MalformedBlob);
    }
}
