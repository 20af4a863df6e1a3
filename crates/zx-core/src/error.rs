//! Shared error type for host-facing failures.
//!
//! Internal recovery (undefined opcodes, malformed port writes) is never
//! modelled as `Result` — the hardware itself never raises an exception for
//! these, so neither do we. This type exists for the boundary operations
//! that *can* fail: applying external state (snapshots) and host IO hooks.

use std::fmt;

/// An error crossing the boundary between the emulator core and its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A field supplied by a snapshot or external hook was out of range.
    InvalidField {
        /// Dot-path of the field, matching [`crate::Observable::query`].
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// A host IO callback reported failure.
    HostIo(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidField { field, reason } => {
                write!(f, "invalid field `{field}`: {reason}")
            }
            CoreError::HostIo(reason) => write!(f, "host IO error: {reason}"),
        }
    }
}

impl std::error::Error for CoreError {}
