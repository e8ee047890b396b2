//! Trusted cipher context: key-encryption-key material and salt source.
//!
//! The master KEK plays the role of the device-unique master key. Test-format
//! blobs are covered under [`TEST_KEK`] instead, a value identical on every
//! deployment, so they must never protect production keys.

use core::fmt;

use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeyblobError, Result};
use crate::flags::BlobFormat;
use crate::wire::SALT_BYTES;

pub const KEK_BYTES: usize = 32;

/// Public test key-encryption key.
pub const TEST_KEK: [u8; KEK_BYTES] = *b"citadel-kb test kek: not secret!";

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherContext {
    master: [u8; KEK_BYTES],
}

impl CipherContext {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let master: [u8; KEK_BYTES] = bytes
            .try_into()
            .map_err(|_| KeyblobError::InvalidArgument("master key must be 32 bytes"))?;
        Ok(Self { master })
    }

    /// Fresh random master key. Blobs made with it die with the context.
    pub fn generate() -> Self {
        let mut master = [0u8; KEK_BYTES];
        OsRng.fill_bytes(&mut master);
        Self { master }
    }

    /// Key-encryption key for a blob of the given format.
    pub(crate) fn kek(&self, format: BlobFormat) -> &[u8; KEK_BYTES] {
        match format {
            BlobFormat::Test => &TEST_KEK,
            BlobFormat::Normal | BlobFormat::Master => &self.master,
        }
    }
}

impl fmt::Debug for CipherContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherContext { .. }")
    }
}

/// Per-blob salt. Used during encapsulation only.
#[cfg(not(feature = "kat"))]
pub fn salt() -> Result<[u8; SALT_BYTES]> {
    let mut s = [0u8; SALT_BYTES];
    getrandom::getrandom(&mut s).map_err(|_| KeyblobError::UnsupportedOperation("entropy source"))?;
    Ok(s)
}

/// Deterministic salt for Known Answer Tests. NEVER use in production.
#[cfg(feature = "kat")]
pub fn salt() -> Result<[u8; SALT_BYTES]> {
    Ok([0x4B; SALT_BYTES])
}
