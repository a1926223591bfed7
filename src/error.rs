//! Shared error classification.
//!
//! Each module keeps its own `thiserror` enum; this module only provides the
//! coarse category every one of those enums maps into so callers can react
//! to a failure without matching on module-specific variants.

use std::fmt;

/// Coarse category of a failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Bad or ambiguous input or remote state, or an unsupported platform.
    Invalid,
    /// An app, device, or storage provider lookup missed.
    NotFound,
    /// Filesystem, storage, or network transfer failure.
    Io,
    /// Unexpected failure of a local API or external tool.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Invalid => "invalid",
            Self::NotFound => "not found",
            Self::Io => "io",
            Self::Internal => "internal",
        };
        formatter.write_str(label)
    }
}

/// Implemented by every error type in the crate.
pub trait Classify {
    /// Returns the category of this error.
    fn kind(&self) -> ErrorKind;
}
