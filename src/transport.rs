//! Descriptor-level surface: "submit descriptor, get result".
//!
//! A [`KbData`] mirrors the request block a driver would receive: the raw key,
//! blob and key modifier buffers with their lengths. The engine behind a
//! [`Transport`] fills the output buffer and sets its length.
//!
//! How a descriptor physically reaches the trusted module is the transport's
//! business. [`LocalTransport`] calls a [`Keyblob`] in-process, which is also
//! what the tests use.

extern crate alloc;
use alloc::sync::Arc;
use core::fmt;

use crate::color::{Access, KeyBuffer};
use crate::engine::{EncryptOptions, Keyblob};
use crate::error::{KeyblobError, Result};
use crate::wire;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Generate a key blob from a raw key.
    Encrypt,
    /// Recover the raw key from a key blob.
    Decrypt,
}

impl Command {
    pub fn nr(self) -> u8 {
        match self {
            Command::Encrypt => 0,
            Command::Decrypt => 1,
        }
    }

    pub fn from_nr(nr: u8) -> Option<Self> {
        match nr {
            0 => Some(Command::Encrypt),
            1 => Some(Command::Decrypt),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Encrypt => write!(f, "ENCRYPT"),
            Command::Decrypt => write!(f, "DECRYPT"),
        }
    }
}

/// Request descriptor.
///
/// Input lengths say how much of the input buffer is meaningful; output
/// buffers are sized by the caller and the output length is written back.
pub struct KbData<'a> {
    pub rawkey: &'a mut [u8],
    pub rawkey_len: usize,
    pub keyblob: &'a mut [u8],
    pub keyblob_len: usize,
    pub keymod: &'a [u8],
}

impl<'a> KbData<'a> {
    /// Descriptor for `Command::Encrypt`: the whole `rawkey` is input.
    pub fn for_encrypt(rawkey: &'a mut [u8], keyblob: &'a mut [u8], keymod: &'a [u8]) -> Self {
        let rawkey_len = rawkey.len();
        Self {
            rawkey,
            rawkey_len,
            keyblob,
            keyblob_len: 0,
            keymod,
        }
    }

    /// Descriptor for `Command::Decrypt`: the whole `keyblob` is input.
    pub fn for_decrypt(keyblob: &'a mut [u8], rawkey: &'a mut [u8], keymod: &'a [u8]) -> Self {
        let keyblob_len = keyblob.len();
        Self {
            rawkey,
            rawkey_len: 0,
            keyblob,
            keyblob_len,
            keymod,
        }
    }

    pub fn rawkey(&self) -> &[u8] {
        &self.rawkey[..self.rawkey_len.min(self.rawkey.len())]
    }

    pub fn keyblob(&self) -> &[u8] {
        &self.keyblob[..self.keyblob_len.min(self.keyblob.len())]
    }
}

impl fmt::Debug for KbData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KbData")
            .field("rawkey_cap", &self.rawkey.len())
            .field("rawkey_len", &self.rawkey_len)
            .field("keyblob_cap", &self.keyblob.len())
            .field("keyblob_len", &self.keyblob_len)
            .field("keymod_len", &self.keymod.len())
            .finish()
    }
}

/// Narrow seam to the trusted module.
pub trait Transport: Send + Sync {
    fn submit(&self, cmd: Command, data: &mut KbData<'_>) -> Result<()>;
}

/// In-process transport bound to a session's access context.
pub struct LocalTransport {
    engine: Arc<Keyblob>,
    access: Access,
    options: EncryptOptions,
}

impl LocalTransport {
    pub fn new(engine: Arc<Keyblob>, access: Access) -> Self {
        Self {
            engine,
            access,
            options: EncryptOptions::for_domain(access.domain),
        }
    }

    pub fn with_options(mut self, options: EncryptOptions) -> Self {
        self.options = options;
        self
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    fn encrypt(&self, data: &mut KbData<'_>) -> Result<()> {
        if data.rawkey_len == 0 || data.rawkey_len > data.rawkey.len() {
            return Err(KeyblobError::InvalidArgument("raw key length"));
        }
        if wire::blob_len(data.rawkey_len) > data.keyblob.len() {
            return Err(KeyblobError::InvalidArgument("key blob buffer too small"));
        }
        let key = KeyBuffer::red(&data.rawkey[..data.rawkey_len], self.access.domain);
        let blob = self
            .engine
            .encrypt(&key, data.keymod, &self.options, &self.access)?;
        data.keyblob[..blob.len()].copy_from_slice(blob.as_bytes());
        data.keyblob_len = blob.len();
        Ok(())
    }

    fn decrypt(&self, data: &mut KbData<'_>) -> Result<()> {
        if data.keyblob_len == 0 || data.keyblob_len > data.keyblob.len() {
            return Err(KeyblobError::InvalidArgument("key blob length"));
        }
        let blob = KeyBuffer::black(&data.keyblob[..data.keyblob_len]);
        let key = self.engine.decrypt(&blob, data.keymod, &self.access)?;
        if key.len() > data.rawkey.len() {
            return Err(KeyblobError::InvalidArgument("raw key buffer too small"));
        }
        data.rawkey[..key.len()].copy_from_slice(key.as_bytes());
        data.rawkey_len = key.len();
        Ok(())
    }
}

impl Transport for LocalTransport {
    fn submit(&self, cmd: Command, data: &mut KbData<'_>) -> Result<()> {
        tracing::debug!(cmd = %cmd, data = ?data, "submit");
        match cmd {
            Command::Encrypt => self.encrypt(data),
            Command::Decrypt => self.decrypt(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_numbers() {
        assert_eq!(Command::Encrypt.nr(), 0);
        assert_eq!(Command::Decrypt.nr(), 1);
        assert_eq!(Command::from_nr(1), Some(Command::Decrypt));
        assert_eq!(Command::from_nr(2), None);
    }

    #[test]
    fn descriptor_views_clamp_to_capacity() {
        let mut raw = [1u8; 4];
        let mut blob = [0u8; 8];
        let keymod = [0u8; 16];
        let mut kb = KbData::for_encrypt(&mut raw, &mut blob, &keymod);
        assert_eq!(kb.rawkey().len(), 4);
        assert!(kb.keyblob().is_empty());
        kb.keyblob_len = 100;
        assert_eq!(kb.keyblob().len(), 8);
    }

    #[test]
    fn debug_hides_contents() {
        let mut raw = [0xABu8; 4];
        let mut blob = [0u8; 8];
        let keymod = [0u8; 16];
        let kb = KbData::for_encrypt(&mut raw, &mut blob, &keymod);
        let s = format!("{:?}", kb);
        assert!(s.contains("rawkey_len: 4"));
        assert!(!s.contains("171"));
    }
}
