//! Blob protocol info flags.
//!
//! Bit layout (u16, big-endian on the wire):
//!
//! ```text
//!   0x0200  TK           trusted key
//!   0x0100  EKT          encrypted key table
//!   0x0070  K2KR mask    key-to-key-registry routing
//!   0x0008  PTXT_SECMEM  source key resided in secure memory
//!   0x0004  BLACK        key region is covered
//!   0x0003  FMT mask     normal / master / test
//! ```

use core::fmt;

use crate::error::{KeyblobError, Result};

pub const OP_PCL_BLOB_TK: u16 = 0x0200;
pub const OP_PCL_BLOB_EKT: u16 = 0x0100;

pub const OP_PCL_BLOB_K2KR_MASK: u16 = 0x0070;
pub const OP_PCL_BLOB_K2KR_MEM: u16 = 0x0000;
pub const OP_PCL_BLOB_K2KR_C1KR: u16 = 0x0010;
pub const OP_PCL_BLOB_K2KR_C2KR: u16 = 0x0030;
pub const OP_PCL_BLOB_K2KR_AFHAS: u16 = 0x0050;
pub const OP_PCL_BLOB_K2KR_C2KR_SPLIT: u16 = 0x0070;

pub const OP_PCL_BLOB_PTXT_SECMEM: u16 = 0x0008;
pub const OP_PCL_BLOB_BLACK: u16 = 0x0004;

pub const OP_PCL_BLOB_FMT_MASK: u16 = 0x0003;
pub const OP_PCL_BLOB_FMT_NORMAL: u16 = 0x0000;
pub const OP_PCL_BLOB_FMT_MSTR: u16 = 0x0002;
pub const OP_PCL_BLOB_FMT_TEST: u16 = 0x0003;

/// Every bit this protocol defines.
pub const OP_PCL_BLOB_DEFINED: u16 = OP_PCL_BLOB_TK
    | OP_PCL_BLOB_EKT
    | OP_PCL_BLOB_K2KR_MASK
    | OP_PCL_BLOB_PTXT_SECMEM
    | OP_PCL_BLOB_BLACK
    | OP_PCL_BLOB_FMT_MASK;

/// Blob classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobFormat {
    Normal,
    /// Requires the full blob permission.
    Master,
    /// Covered under the public test key. Never for production keys.
    Test,
}

impl BlobFormat {
    pub fn bits(self) -> u16 {
        match self {
            BlobFormat::Normal => OP_PCL_BLOB_FMT_NORMAL,
            BlobFormat::Master => OP_PCL_BLOB_FMT_MSTR,
            BlobFormat::Test => OP_PCL_BLOB_FMT_TEST,
        }
    }

    fn from_bits(bits: u16) -> Option<Self> {
        match bits & OP_PCL_BLOB_FMT_MASK {
            OP_PCL_BLOB_FMT_NORMAL => Some(BlobFormat::Normal),
            OP_PCL_BLOB_FMT_MSTR => Some(BlobFormat::Master),
            OP_PCL_BLOB_FMT_TEST => Some(BlobFormat::Test),
            _ => None,
        }
    }
}

impl fmt::Display for BlobFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobFormat::Normal => write!(f, "NORMAL"),
            BlobFormat::Master => write!(f, "MASTER"),
            BlobFormat::Test => write!(f, "TEST"),
        }
    }
}

/// Key-to-key-registry routing target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum K2kr {
    Memory,
    C1kr,
    C2kr,
    Afhas,
    C2krSplit,
}

impl K2kr {
    pub fn bits(self) -> u16 {
        match self {
            K2kr::Memory => OP_PCL_BLOB_K2KR_MEM,
            K2kr::C1kr => OP_PCL_BLOB_K2KR_C1KR,
            K2kr::C2kr => OP_PCL_BLOB_K2KR_C2KR,
            K2kr::Afhas => OP_PCL_BLOB_K2KR_AFHAS,
            K2kr::C2krSplit => OP_PCL_BLOB_K2KR_C2KR_SPLIT,
        }
    }

    fn from_bits(bits: u16) -> Option<Self> {
        match bits & OP_PCL_BLOB_K2KR_MASK {
            OP_PCL_BLOB_K2KR_MEM => Some(K2kr::Memory),
            OP_PCL_BLOB_K2KR_C1KR => Some(K2kr::C1kr),
            OP_PCL_BLOB_K2KR_C2KR => Some(K2kr::C2kr),
            OP_PCL_BLOB_K2KR_AFHAS => Some(K2kr::Afhas),
            OP_PCL_BLOB_K2KR_C2KR_SPLIT => Some(K2kr::C2krSplit),
            _ => None,
        }
    }
}

/// Protocol info flag set carried in every blob header.
///
/// The default value is a normal-format black blob routed to memory, which
/// is the only combination most callers need.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlobFlags(u16);

impl Default for BlobFlags {
    fn default() -> Self {
        Self(OP_PCL_BLOB_BLACK | OP_PCL_BLOB_FMT_NORMAL)
    }
}

impl BlobFlags {
    /// Raw flag word, unchecked. Use [`BlobFlags::validate`] before trusting it.
    pub const fn from_raw(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn with_format(self, format: BlobFormat) -> Self {
        Self((self.0 & !OP_PCL_BLOB_FMT_MASK) | format.bits())
    }

    pub fn with_routing(self, routing: K2kr) -> Self {
        Self((self.0 & !OP_PCL_BLOB_K2KR_MASK) | routing.bits())
    }

    pub fn with_trusted_key(self, on: bool) -> Self {
        self.toggle(OP_PCL_BLOB_TK, on)
    }

    pub fn with_encrypted_key_table(self, on: bool) -> Self {
        self.toggle(OP_PCL_BLOB_EKT, on)
    }

    pub fn with_secure_memory(self, on: bool) -> Self {
        self.toggle(OP_PCL_BLOB_PTXT_SECMEM, on)
    }

    pub fn with_black(self, on: bool) -> Self {
        self.toggle(OP_PCL_BLOB_BLACK, on)
    }

    fn toggle(self, bit: u16, on: bool) -> Self {
        if on {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }

    /// Blob format. `None` only for the undefined FMT value `1`.
    pub fn format(self) -> Option<BlobFormat> {
        BlobFormat::from_bits(self.0)
    }

    pub fn routing(self) -> Option<K2kr> {
        K2kr::from_bits(self.0)
    }

    pub fn is_trusted_key(self) -> bool {
        self.0 & OP_PCL_BLOB_TK != 0
    }

    pub fn is_encrypted_key_table(self) -> bool {
        self.0 & OP_PCL_BLOB_EKT != 0
    }

    pub fn is_secure_memory(self) -> bool {
        self.0 & OP_PCL_BLOB_PTXT_SECMEM != 0
    }

    pub fn is_black(self) -> bool {
        self.0 & OP_PCL_BLOB_BLACK != 0
    }

    /// Whether this flag set demands the full blob permission.
    pub fn requires_elevation(self) -> bool {
        self.is_trusted_key() || self.format() == Some(BlobFormat::Master)
    }

    /// Check that this is a supported combination.
    ///
    /// Returns `UnsupportedOperation`; the framer maps it to `MalformedBlob`
    /// when the flags come from a stored blob.
    pub fn validate(self) -> Result<BlobFormat> {
        if self.0 & !OP_PCL_BLOB_DEFINED != 0 {
            return Err(KeyblobError::UnsupportedOperation("undefined flag bits"));
        }
        let format = self
            .format()
            .ok_or(KeyblobError::UnsupportedOperation("undefined blob format"))?;
        let routing = self
            .routing()
            .ok_or(KeyblobError::UnsupportedOperation("undefined k2kr routing"))?;
        if !self.is_black() {
            return Err(KeyblobError::UnsupportedOperation("red key blobs"));
        }
        if self.is_encrypted_key_table() && routing == K2kr::Memory {
            return Err(KeyblobError::UnsupportedOperation(
                "encrypted key table without a registry target",
            ));
        }
        if format == BlobFormat::Test && self.is_trusted_key() {
            return Err(KeyblobError::UnsupportedOperation("trusted key in test format"));
        }
        Ok(format)
    }
}

impl fmt::Debug for BlobFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobFlags({:#06x})", self.0)
    }
}
