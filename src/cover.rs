//! Cover engine: the confidentiality transform over a padded key.
//!
//! Two covering modes, selected by the blob header:
//!
//! - ECB-cover: AES-256 per 16-byte block. No intrinsic authentication; the
//!   authenticator supplies the tag.
//! - CCM-cover: AES-256-CCM (16-byte tag, 13-byte nonce from the blob salt).
//!   The tag is intrinsic and the authenticator passes it through.
//!
//! Both operate in place on a caller-owned buffer that the orchestrator keeps
//! in `Zeroizing` storage.

use core::fmt;

use zeroize::Zeroizing;

use crate::error::{KeyblobError, Result};
use crate::kdf::{self, bind_keymod, LABEL_CCM, LABEL_ECB};
use crate::wire::{BLOCK_SIZE, HEADER_BYTES, SALT_BYTES, TAG_BYTES};

pub const KEY_COVER_ECB: u8 = 0;
pub const KEY_COVER_CCM: u8 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoverMode {
    #[default]
    Ecb,
    Ccm,
}

impl CoverMode {
    pub fn to_byte(self) -> u8 {
        match self {
            CoverMode::Ecb => KEY_COVER_ECB,
            CoverMode::Ccm => KEY_COVER_CCM,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            KEY_COVER_ECB => Some(CoverMode::Ecb),
            KEY_COVER_CCM => Some(CoverMode::Ccm),
            _ => None,
        }
    }

    /// Whether the mode authenticates on its own.
    pub fn is_authenticated(self) -> bool {
        matches!(self, CoverMode::Ccm)
    }
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverMode::Ecb => write!(f, "ECB"),
            CoverMode::Ccm => write!(f, "CCM"),
        }
    }
}

impl core::str::FromStr for CoverMode {
    type Err = KeyblobError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ecb" => Ok(CoverMode::Ecb),
            "ccm" => Ok(CoverMode::Ccm),
            _ => Err(KeyblobError::UnsupportedOperation("unknown covering mode")),
        }
    }
}

/// Everything a blob's keys are bound to.
#[derive(Clone, Copy)]
pub struct CoverContext<'a> {
    pub kek: &'a [u8; 32],
    pub header: &'a [u8; HEADER_BYTES],
    pub salt: &'a [u8; SALT_BYTES],
    pub keymod: &'a [u8],
}

/// Per-blob keys derived from the key-encryption key.
pub enum CoverKeys {
    Ecb {
        cover: Zeroizing<[u8; 32]>,
        mac: Zeroizing<[u8; 32]>,
    },
    Ccm {
        key: Zeroizing<[u8; 32]>,
    },
}

impl CoverKeys {
    pub fn derive(mode: CoverMode, ctx: &CoverContext<'_>) -> Result<Self> {
        match mode {
            CoverMode::Ecb => {
                let okm = kdf::derive_keys::<64>(ctx.kek, ctx.salt, LABEL_ECB, ctx.header, ctx.keymod)?;
                let mut cover = Zeroizing::new([0u8; 32]);
                let mut mac = Zeroizing::new([0u8; 32]);
                cover.copy_from_slice(&okm[..32]);
                mac.copy_from_slice(&okm[32..]);
                Ok(CoverKeys::Ecb { cover, mac })
            }
            CoverMode::Ccm => {
                let key = kdf::derive_keys::<32>(ctx.kek, ctx.salt, LABEL_CCM, ctx.header, ctx.keymod)?;
                Ok(CoverKeys::Ccm { key })
            }
        }
    }

    /// MAC key for the authenticator; `None` when the mode tags itself.
    pub fn mac_key(&self) -> Option<&[u8; 32]> {
        match self {
            CoverKeys::Ecb { mac, .. } => Some(&**mac),
            CoverKeys::Ccm { .. } => None,
        }
    }
}

/// Cover `buf` (padded key) in place. Returns the intrinsic tag for CCM.
pub fn cover(
    keys: &CoverKeys,
    ctx: &CoverContext<'_>,
    buf: &mut [u8],
) -> Result<Option<[u8; TAG_BYTES]>> {
    if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
        return Err(KeyblobError::InvalidArgument("key buffer not block aligned"));
    }
    match keys {
        CoverKeys::Ecb { cover, .. } => {
            ecb::encrypt(cover, buf);
            Ok(None)
        }
        CoverKeys::Ccm { key } => ccm_cover::seal(key, ctx, buf).map(Some),
    }
}

/// Uncover `buf` in place.
///
/// ECB-cover expects the caller to have verified the tag already. On any
/// failure the buffer is zeroed before returning.
pub fn uncover(
    keys: &CoverKeys,
    ctx: &CoverContext<'_>,
    buf: &mut [u8],
    tag: &[u8; TAG_BYTES],
) -> Result<()> {
    if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
        return Err(KeyblobError::AuthenticationFailure);
    }
    let result = match keys {
        CoverKeys::Ecb { cover, .. } => {
            ecb::decrypt(cover, buf);
            Ok(())
        }
        CoverKeys::Ccm { key } => ccm_cover::open(key, ctx, buf, tag),
    };
    if result.is_err() {
        zeroize::Zeroize::zeroize(buf);
    }
    result
}

mod ecb {
    use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
    use aes::Aes256;

    use crate::wire::BLOCK_SIZE;

    pub fn encrypt(key: &[u8; 32], buf: &mut [u8]) {
        let cipher = Aes256::new(GenericArray::from_slice(key));
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
    }

    pub fn decrypt(key: &[u8; 32], buf: &mut [u8]) {
        let cipher = Aes256::new(GenericArray::from_slice(key));
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
    }
}

mod ccm_cover {
    extern crate alloc;
    use alloc::vec::Vec;

    use aes::Aes256;
    use ccm::aead::generic_array::GenericArray;
    use ccm::aead::{AeadInPlace, KeyInit};
    use ccm::aead::consts::{U13, U16};
    use ccm::Ccm;

    use super::{bind_keymod, CoverContext};
    use crate::error::{KeyblobError, Result};
    use crate::wire::TAG_BYTES;

    type Aes256Ccm = Ccm<Aes256, U16, U13>;

    const NONCE_BYTES: usize = 13;

    fn associated_data(ctx: &CoverContext<'_>) -> Result<Vec<u8>> {
        let mut aad = Vec::with_capacity(ctx.header.len() + 1 + ctx.keymod.len());
        aad.extend_from_slice(ctx.header);
        bind_keymod(&mut aad, ctx.keymod)?;
        Ok(aad)
    }

    pub fn seal(key: &[u8; 32], ctx: &CoverContext<'_>, buf: &mut [u8]) -> Result<[u8; TAG_BYTES]> {
        let cipher = Aes256Ccm::new_from_slice(key)
            .map_err(|_| KeyblobError::InvalidArgument("cover key length"))?;
        let aad = associated_data(ctx)?;
        let nonce = GenericArray::from_slice(&ctx.salt[..NONCE_BYTES]);
        let tag = cipher
            .encrypt_in_place_detached(nonce, &aad, buf)
            .map_err(|_| KeyblobError::InvalidArgument("ccm cover"))?;
        let mut out = [0u8; TAG_BYTES];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    pub fn open(
        key: &[u8; 32],
        ctx: &CoverContext<'_>,
        buf: &mut [u8],
        tag: &[u8; TAG_BYTES],
    ) -> Result<()> {
        let cipher =
            Aes256Ccm::new_from_slice(key).map_err(|_| KeyblobError::AuthenticationFailure)?;
        let aad = associated_data(ctx).map_err(|_| KeyblobError::AuthenticationFailure)?;
        let nonce = GenericArray::from_slice(&ctx.salt[..NONCE_BYTES]);
        cipher
            .decrypt_in_place_detached(nonce, &aad, buf, GenericArray::from_slice(tag))
            .map_err(|_| KeyblobError::AuthenticationFailure)
    }
}
