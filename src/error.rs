//! Unified error type for key blob operations.
//!
//! No variant ever carries key bytes, covered or raw. Failures inside the
//! cover engine or the authenticator are collapsed into
//! [`KeyblobError::AuthenticationFailure`] before they leave the crate.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyblobError {
    /// Null, empty or oversized buffer, or a malformed modifier length.
    InvalidArgument(&'static str),
    /// Structural parse failure.
    MalformedBlob,
    /// Tag mismatch on decapsulation.
    AuthenticationFailure,
    /// Requested transition not allowed under the supplied permission bits.
    PermissionDenied(&'static str),
    /// Requested covering mode, format or flag combination not implemented.
    UnsupportedOperation(&'static str),
}

impl fmt::Display for KeyblobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::MalformedBlob => write!(f, "malformed blob"),
            Self::AuthenticationFailure => write!(f, "authentication failed"),
            Self::PermissionDenied(msg) => write!(f, "permission denied: {}", msg),
            Self::UnsupportedOperation(msg) => write!(f, "unsupported operation: {}", msg),
        }
    }
}

impl std::error::Error for KeyblobError {}

pub type Result<T> = core::result::Result<T, KeyblobError>;
