//! Encapsulation / decapsulation orchestrator.
//!
//! Encrypt: arguments → flag support → colour/permission legality → sizing
//! → cover → authenticate → frame.
//!
//! Decrypt: arguments → colour/read permission → parse → blob legality →
//! verify → uncover → strip padding.

extern crate alloc;
use alloc::vec::Vec;

use std::sync::{Mutex, MutexGuard, PoisonError};

use zeroize::Zeroizing;

use crate::auth;
use crate::color::{self, Access, KeyBuffer, MemoryClass};
use crate::config::EngineConfig;
use crate::context::{self, CipherContext};
use crate::cover::{self, CoverContext, CoverKeys, CoverMode};
use crate::error::{KeyblobError, Result};
use crate::flags::BlobFlags;
use crate::wire::{self, BlobHeader};

/// Per-request encapsulation choices. Decapsulation reads them from the blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncryptOptions {
    pub flags: BlobFlags,
    /// `None` uses the engine's configured default.
    pub cover: Option<CoverMode>,
}

impl EncryptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default flags with `PTXT_SECMEM` matching `domain`.
    pub fn for_domain(domain: MemoryClass) -> Self {
        Self {
            flags: BlobFlags::default().with_secure_memory(domain == MemoryClass::Secure),
            cover: None,
        }
    }

    pub fn with_flags(mut self, flags: BlobFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_cover(mut self, cover: CoverMode) -> Self {
        self.cover = Some(cover);
        self
    }
}

/// Key blob engine. Shareable across threads; requests serialise only on
/// access to the cipher context.
pub struct Keyblob {
    context: Mutex<CipherContext>,
    config: EngineConfig,
}

impl Keyblob {
    pub fn new(context: CipherContext) -> Self {
        Self {
            context: Mutex::new(context),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(context: CipherContext, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            context: Mutex::new(context),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CipherContext> {
        // The context is never mutated after construction, so a poisoned
        // lock still guards a consistent key.
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_keymod(&self, keymod: &[u8]) -> Result<()> {
        if keymod.len() != self.config.keymod_len {
            return Err(KeyblobError::InvalidArgument("key modifier length"));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // RED -> BLACK
    // -----------------------------------------------------------------------

    /// Encapsulate a red key into a black blob.
    pub fn encrypt(
        &self,
        key: &KeyBuffer,
        keymod: &[u8],
        opts: &EncryptOptions,
        access: &Access,
    ) -> Result<KeyBuffer> {
        let result = self.encapsulate(key, keymod, opts, access);
        match &result {
            Ok(blob) => tracing::debug!(
                key_len = key.len(),
                blob_len = blob.len(),
                flags = ?opts.flags,
                domain = %key.domain(),
                "key encapsulated"
            ),
            Err(e) => log_rejection("encrypt", e),
        }
        result
    }

    fn encapsulate(
        &self,
        key: &KeyBuffer,
        keymod: &[u8],
        opts: &EncryptOptions,
        access: &Access,
    ) -> Result<KeyBuffer> {
        if key.is_empty() {
            return Err(KeyblobError::InvalidArgument("empty key"));
        }
        if key.len() > self.config.max_rawkey_len() {
            return Err(KeyblobError::InvalidArgument("key exceeds maximum length"));
        }
        self.check_keymod(keymod)?;

        let format = opts.flags.validate()?;
        let next = color::authorize_encapsulate(key, opts.flags, format, access)?;

        let mode = opts.cover.unwrap_or(self.config.default_cover);
        let header = BlobHeader {
            cover: mode,
            flags: opts.flags,
            key_len: u16::try_from(key.len())
                .map_err(|_| KeyblobError::InvalidArgument("key exceeds maximum length"))?,
        };
        let header_bytes = header.to_bytes();
        let salt = context::salt()?;

        let mut padded = Zeroizing::new(vec![0u8; wire::padded_len(key.len())]);
        padded[..key.len()].copy_from_slice(key.as_bytes());

        let tag = {
            let guard = self.lock();
            let ctx = CoverContext {
                kek: guard.kek(format),
                header: &header_bytes,
                salt: &salt,
                keymod,
            };
            let keys = CoverKeys::derive(mode, &ctx)?;
            let intrinsic = cover::cover(&keys, &ctx, &mut padded)?;
            auth::tag(&keys, &ctx, &padded, intrinsic)?
        };

        let blob = wire::frame(&header, &salt, &padded, &tag)?;
        Ok(color::recolor(blob, next, MemoryClass::General))
    }

    // -----------------------------------------------------------------------
    // BLACK -> RED
    // -----------------------------------------------------------------------

    /// Decapsulate a black blob into a red key in `access.domain`.
    pub fn decrypt(&self, blob: &KeyBuffer, keymod: &[u8], access: &Access) -> Result<KeyBuffer> {
        let result = self.decapsulate(blob, keymod, access);
        match &result {
            Ok(key) => tracing::debug!(
                blob_len = blob.len(),
                key_len = key.len(),
                domain = %key.domain(),
                "key decapsulated"
            ),
            Err(e) => log_rejection("decrypt", e),
        }
        result
    }

    fn decapsulate(&self, blob: &KeyBuffer, keymod: &[u8], access: &Access) -> Result<KeyBuffer> {
        if blob.is_empty() {
            return Err(KeyblobError::InvalidArgument("empty blob"));
        }
        if blob.len() > self.config.max_blob_len {
            return Err(KeyblobError::InvalidArgument("blob exceeds maximum length"));
        }
        self.check_keymod(keymod)?;
        color::precheck_decapsulate(blob, access)?;

        let parts = wire::parse(blob.as_bytes())?;
        let flags = parts.header.flags;
        let format = flags.validate().map_err(|_| KeyblobError::MalformedBlob)?;
        let next = color::authorize_decapsulate(blob, flags, access)?;
        let mode = parts.header.cover;

        let mut plain = Zeroizing::new(parts.covered_key.to_vec());
        {
            let guard = self.lock();
            let ctx = CoverContext {
                kek: guard.kek(format),
                header: parts.header_bytes,
                salt: parts.salt,
                keymod,
            };
            let keys = CoverKeys::derive(mode, &ctx).map_err(|_| KeyblobError::AuthenticationFailure)?;
            if !auth::verify(&keys, &ctx, parts.covered_key, parts.tag) {
                return Err(KeyblobError::AuthenticationFailure);
            }
            cover::uncover(&keys, &ctx, &mut plain, parts.tag)
                .map_err(|_| KeyblobError::AuthenticationFailure)?;
        }

        plain.truncate(parts.header.key_len as usize);
        let key: Vec<u8> = core::mem::take(&mut *plain);
        Ok(color::recolor(key, next, access.domain))
    }
}

fn log_rejection(op: &'static str, err: &KeyblobError) {
    match err {
        KeyblobError::AuthenticationFailure | KeyblobError::PermissionDenied(_) => {
            tracing::warn!(op, error = %err, "key blob request rejected")
        }
        _ => tracing::debug!(op, error = %err, "key blob request rejected"),
    }
}
