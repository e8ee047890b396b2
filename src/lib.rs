//! # Citadel Keyblob
//!
//! Key blob encapsulation for keys that must live outside a trusted boundary.
//!
//! A red (plaintext) key goes in, a black, self-describing, authenticated blob
//! comes out. The blob can sit in general memory or on disk; only a holder of
//! the same cipher context and key modifier can turn it back into a red key.
//!
//! ## Quick Start
//!
//! ```rust
//! use citadel_keyblob::{
//!     Access, CipherContext, EncryptOptions, KeyBuffer, Keyblob, MemoryClass, Permissions,
//! };
//!
//! let kb = Keyblob::new(CipherContext::generate());
//! let access = Access::new(Permissions::BLOB, MemoryClass::General);
//! let keymod = b"test-mod-0000000";
//!
//! let key = KeyBuffer::red((0u8..16).collect::<Vec<u8>>(), MemoryClass::General);
//! let blob = kb.encrypt(&key, keymod, &EncryptOptions::new(), &access).unwrap();
//! assert_eq!(blob.len(), 64);
//!
//! let red = kb.decrypt(&blob, keymod, &access).unwrap();
//! assert_eq!(red.as_bytes(), key.as_bytes());
//! ```
//!
//! ## Security Properties
//!
//! - **Red/black discipline**: every buffer carries its colour; only
//!   encapsulation makes a key black and only decapsulation makes it red
//! - **Modifier binding**: a blob opens only under the modifier it was made with
//! - **Self-describing blobs**: header flags fully determine decapsulation
//! - **No oracles**: cover and tag failures all surface as `AuthenticationFailure`
//!
//! ## What's NOT Provided
//!
//! - Key generation
//! - Blob persistence
//! - A hardware transport (see [`Transport`] for the seam)

#![deny(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/citadel-keyblob/0.1.0")]

extern crate alloc;

// ---------------------------------------------------------------------------
// Internal modules (not part of public API)
// ---------------------------------------------------------------------------

mod auth;
mod context;
mod cover;
mod engine;
mod error;
mod kdf;

// Wire module is public for inspection tooling and fuzzing
// but should not be considered stable API
#[doc(hidden)]
pub mod wire;

pub mod color;
pub mod config;
pub mod flags;
pub mod transport;

// ---------------------------------------------------------------------------
// Public interface
// ---------------------------------------------------------------------------

pub use color::{Access, Color, KeyBuffer, MemoryClass, Permissions};
pub use config::EngineConfig;
pub use context::{CipherContext, TEST_KEK};
pub use cover::CoverMode;
pub use engine::{EncryptOptions, Keyblob};
pub use error::{KeyblobError, Result};
pub use flags::{BlobFlags, BlobFormat, K2kr};
pub use transport::{Command, KbData, LocalTransport, Transport};
pub use wire::{blob_len, padded_len, BLOB_OVERHEAD, KEYMOD_LEN, MAX_KEYBLOB_LEN, MAX_RAWKEY_LEN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Blob metadata readable without the cipher context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobInfo {
    pub cover: CoverMode,
    pub flags: BlobFlags,
    pub key_len: usize,
    pub blob_len: usize,
}

/// Inspect blob metadata (no decapsulation).
pub fn inspect(blob: &[u8]) -> Result<BlobInfo> {
    let parts = wire::parse(blob)?;
    Ok(BlobInfo {
        cover: parts.header.cover,
        flags: parts.header.flags,
        key_len: parts.header.key_len as usize,
        blob_len: blob.len(),
    })
}
