//! Red/black key colour state machine.
//!
//! ```text
//!           encapsulate (write)
//!   RED  ─────────────────────────▶  BLACK
//!        ◀─────────────────────────
//!           decapsulate (read)
//! ```
//!
//! Colour belongs to a buffer, not to a key value. Every [`KeyBuffer`] carries
//! its colour and memory class, and the orchestrator checks both before and
//! after each operation.

extern crate alloc;
use alloc::vec::Vec;
use core::fmt;

use zeroize::Zeroizing;

use crate::error::{KeyblobError, Result};
use crate::flags::{BlobFlags, BlobFormat};

// ---------------------------------------------------------------------------
// Permissions and memory class
// ---------------------------------------------------------------------------

pub const SM_PERM_READ: u8 = 0x01;
pub const SM_PERM_WRITE: u8 = 0x02;
pub const SM_PERM_BLOB: u8 = 0x03;

pub const SM_SECMEM: u8 = 0;
pub const SM_GENMEM: u8 = 1;

/// Storage access permissions consumed as request context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Permissions(u8);

impl Permissions {
    pub const READ: Self = Self(SM_PERM_READ);
    pub const WRITE: Self = Self(SM_PERM_WRITE);
    pub const BLOB: Self = Self(SM_PERM_BLOB);

    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !SM_PERM_BLOB != 0 {
            return Err(KeyblobError::InvalidArgument("undefined permission bits"));
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn can_read(self) -> bool {
        self.0 & SM_PERM_READ != 0
    }

    pub fn can_write(self) -> bool {
        self.0 & SM_PERM_WRITE != 0
    }

    /// Both read and write: required for master-format and trusted-key blobs.
    pub fn is_elevated(self) -> bool {
        self.0 & SM_PERM_BLOB == SM_PERM_BLOB
    }
}

/// Destination class for key material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryClass {
    Secure,
    General,
}

impl MemoryClass {
    pub fn to_byte(self) -> u8 {
        match self {
            MemoryClass::Secure => SM_SECMEM,
            MemoryClass::General => SM_GENMEM,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            SM_SECMEM => Some(MemoryClass::Secure),
            SM_GENMEM => Some(MemoryClass::General),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryClass::Secure => write!(f, "SECMEM"),
            MemoryClass::General => write!(f, "GENMEM"),
        }
    }
}

/// Permission and domain context for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    pub permissions: Permissions,
    pub domain: MemoryClass,
}

impl Access {
    pub fn new(permissions: Permissions, domain: MemoryClass) -> Self {
        Self { permissions, domain }
    }
}

// ---------------------------------------------------------------------------
// Colour
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Plaintext-equivalent; trusted domain only.
    Red,
    /// Covered; safe in general memory.
    Black,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Encapsulate,
    Decapsulate,
}

impl Color {
    /// Colour after `t`, or `None` if `t` is not legal from this colour.
    pub fn after(self, t: Transition) -> Option<Color> {
        match (self, t) {
            (Color::Red, Transition::Encapsulate) => Some(Color::Black),
            (Color::Black, Transition::Decapsulate) => Some(Color::Red),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "RED"),
            Color::Black => write!(f, "BLACK"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tagged buffer
// ---------------------------------------------------------------------------

/// Key material together with its colour and the memory class it lives in.
///
/// Bytes are wiped when the buffer is dropped.
pub struct KeyBuffer {
    bytes: Zeroizing<Vec<u8>>,
    color: Color,
    domain: MemoryClass,
}

impl KeyBuffer {
    /// A plaintext key resident in `domain`.
    pub fn red(bytes: impl Into<Vec<u8>>, domain: MemoryClass) -> Self {
        Self {
            bytes: Zeroizing::new(bytes.into()),
            color: Color::Red,
            domain,
        }
    }

    /// Blob bytes loaded from general memory. Decapsulation validates them.
    pub fn black(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes.into()),
            color: Color::Black,
            domain: MemoryClass::General,
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn domain(&self) -> MemoryClass {
        self.domain
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for KeyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBuffer")
            .field("len", &self.bytes.len())
            .field("color", &self.color)
            .field("domain", &self.domain)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Legality checks
// ---------------------------------------------------------------------------

fn require_elevation(flags: BlobFlags, access: &Access) -> Result<()> {
    if flags.requires_elevation() && !access.permissions.is_elevated() {
        return Err(KeyblobError::PermissionDenied(
            "master or trusted-key blobs require blob permission",
        ));
    }
    Ok(())
}

/// RED -> BLACK. Returns the colour of the produced buffer.
pub fn authorize_encapsulate(
    source: &KeyBuffer,
    flags: BlobFlags,
    format: BlobFormat,
    access: &Access,
) -> Result<Color> {
    let next = source
        .color
        .after(Transition::Encapsulate)
        .ok_or(KeyblobError::UnsupportedOperation("source key is already black"))?;
    if !access.permissions.can_write() {
        return Err(KeyblobError::PermissionDenied("write permission required"));
    }
    require_elevation(flags, access)?;
    if format == BlobFormat::Master && source.domain != MemoryClass::Secure {
        return Err(KeyblobError::UnsupportedOperation(
            "master blobs need a secure memory source",
        ));
    }
    if flags.is_secure_memory() != (source.domain == MemoryClass::Secure) {
        return Err(KeyblobError::UnsupportedOperation(
            "secure memory flag does not match source domain",
        ));
    }
    Ok(next)
}

/// The part of BLACK -> RED that needs no blob contents, so a caller without
/// read permission learns nothing about the blob.
pub fn precheck_decapsulate(blob: &KeyBuffer, access: &Access) -> Result<Color> {
    let next = blob
        .color
        .after(Transition::Decapsulate)
        .ok_or(KeyblobError::UnsupportedOperation("input is not a black blob"))?;
    if !access.permissions.can_read() {
        return Err(KeyblobError::PermissionDenied("read permission required"));
    }
    Ok(next)
}

/// BLACK -> RED. Checked against the flags of the parsed blob.
pub fn authorize_decapsulate(blob: &KeyBuffer, flags: BlobFlags, access: &Access) -> Result<Color> {
    let next = precheck_decapsulate(blob, access)?;
    require_elevation(flags, access)?;
    if flags.is_secure_memory() && access.domain != MemoryClass::Secure {
        return Err(KeyblobError::PermissionDenied(
            "secure memory blob cannot be released to general memory",
        ));
    }
    Ok(next)
}

/// Build the output buffer of a successful transition.
pub(crate) fn recolor(bytes: Vec<u8>, color: Color, domain: MemoryClass) -> KeyBuffer {
    KeyBuffer {
        bytes: Zeroizing::new(bytes),
        color,
        domain,
    }
}
