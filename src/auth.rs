//! Authenticator: blob tag over the covered key.
//!
//! tag = HMAC-SHA256(mac_key, header || salt || covered_key || keymod_len[1] || keymod)[..16]
//!
//! Only ECB-cover needs it. For CCM-cover the cover engine's own tag is passed
//! through and verification is left to the CCM open.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::cover::{CoverContext, CoverKeys};
use crate::error::{KeyblobError, Result};
use crate::wire::TAG_BYTES;

type HmacSha256 = Hmac<Sha256>;

fn mac(mac_key: &[u8; 32], ctx: &CoverContext<'_>, covered: &[u8]) -> Result<[u8; TAG_BYTES]> {
    let mut m = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|_| KeyblobError::InvalidArgument("mac key length"))?;
    m.update(ctx.header);
    m.update(ctx.salt);
    m.update(covered);
    let len = u8::try_from(ctx.keymod.len())
        .map_err(|_| KeyblobError::InvalidArgument("key modifier too long"))?;
    m.update(&[len]);
    m.update(ctx.keymod);

    let full = m.finalize().into_bytes();
    let mut out = [0u8; TAG_BYTES];
    out.copy_from_slice(&full[..TAG_BYTES]);
    Ok(out)
}

/// Produce the blob tag. `intrinsic` is the tag returned by the cover engine.
pub fn tag(
    keys: &CoverKeys,
    ctx: &CoverContext<'_>,
    covered: &[u8],
    intrinsic: Option<[u8; TAG_BYTES]>,
) -> Result<[u8; TAG_BYTES]> {
    match (keys.mac_key(), intrinsic) {
        (Some(k), None) => mac(k, ctx, covered),
        (None, Some(t)) => Ok(t),
        _ => Err(KeyblobError::InvalidArgument("tag source does not match covering mode")),
    }
}

/// Constant-time tag check. Always passes for self-authenticating modes.
pub fn verify(
    keys: &CoverKeys,
    ctx: &CoverContext<'_>,
    covered: &[u8],
    expected: &[u8; TAG_BYTES],
) -> bool {
    let Some(k) = keys.mac_key() else {
        return true;
    };
    match mac(k, ctx, covered) {
        Ok(computed) => computed[..].ct_eq(&expected[..]).into(),
        Err(_) => false,
    }
}
