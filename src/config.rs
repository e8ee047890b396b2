//! Engine configuration.
//!
//! Environment variables (all optional):
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `CITADEL_KB_KEYMOD_LEN` | 16 | required key modifier length |
//! | `CITADEL_KB_MAX_BLOB_LEN` | 65535 | largest blob accepted or produced |
//! | `CITADEL_KB_COVER` | `ecb` | covering mode when a request names none |

use crate::cover::CoverMode;
use crate::error::{KeyblobError, Result};
use crate::wire::{BLOB_OVERHEAD, BLOCK_SIZE, KEYMOD_LEN, MAX_KEYBLOB_LEN, MAX_KEYMOD_LEN, SECMEM_KEYMOD_LEN};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub keymod_len: usize,
    pub max_blob_len: usize,
    pub default_cover: CoverMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keymod_len: KEYMOD_LEN,
            max_blob_len: MAX_KEYBLOB_LEN,
            default_cover: CoverMode::Ecb,
        }
    }
}

impl EngineConfig {
    pub fn with_keymod_len(mut self, len: usize) -> Self {
        self.keymod_len = len;
        self
    }

    pub fn with_max_blob_len(mut self, len: usize) -> Self {
        self.max_blob_len = len;
        self
    }

    pub fn with_default_cover(mut self, cover: CoverMode) -> Self {
        self.default_cover = cover;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(SECMEM_KEYMOD_LEN..=MAX_KEYMOD_LEN).contains(&self.keymod_len) {
            return Err(KeyblobError::InvalidArgument("keymod_len out of range"));
        }
        if !(BLOB_OVERHEAD + BLOCK_SIZE..=MAX_KEYBLOB_LEN).contains(&self.max_blob_len) {
            return Err(KeyblobError::InvalidArgument("max_blob_len out of range"));
        }
        Ok(())
    }

    /// Largest raw key this configuration can encapsulate.
    pub fn max_rawkey_len(&self) -> usize {
        // Round down so the padded key still fits.
        (self.max_blob_len - BLOB_OVERHEAD) / BLOCK_SIZE * BLOCK_SIZE
    }

    /// Defaults overridden by `CITADEL_KB_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = lookup("CITADEL_KB_KEYMOD_LEN") {
            cfg.keymod_len = v
                .trim()
                .parse()
                .map_err(|_| KeyblobError::InvalidArgument("CITADEL_KB_KEYMOD_LEN"))?;
        }
        if let Some(v) = lookup("CITADEL_KB_MAX_BLOB_LEN") {
            cfg.max_blob_len = v
                .trim()
                .parse()
                .map_err(|_| KeyblobError::InvalidArgument("CITADEL_KB_MAX_BLOB_LEN"))?;
        }
        if let Some(v) = lookup("CITADEL_KB_COVER") {
            cfg.default_cover = v.trim().parse()?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_protocol() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.keymod_len, 16);
        assert_eq!(cfg.max_blob_len, 65535);
        assert_eq!(cfg.default_cover, CoverMode::Ecb);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_rawkey_len() % BLOCK_SIZE, 0);
        assert!(cfg.max_rawkey_len() + BLOB_OVERHEAD <= cfg.max_blob_len);
    }

    #[test]
    fn env_overrides() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("CITADEL_KB_KEYMOD_LEN", "8"),
            ("CITADEL_KB_MAX_BLOB_LEN", "4096"),
            ("CITADEL_KB_COVER", "ccm"),
        ]))
        .unwrap();
        assert_eq!(cfg.keymod_len, 8);
        assert_eq!(cfg.max_blob_len, 4096);
        assert_eq!(cfg.default_cover, CoverMode::Ccm);
    }

    #[test]
    fn env_rejects_bad_values() {
        assert!(EngineConfig::from_lookup(lookup(&[("CITADEL_KB_KEYMOD_LEN", "4")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("CITADEL_KB_KEYMOD_LEN", "x")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("CITADEL_KB_MAX_BLOB_LEN", "70000")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("CITADEL_KB_COVER", "gcm")])).is_err());
    }
}
