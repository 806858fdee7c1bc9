//! Collector error types.
//!
//! Only allocation exhaustion is a runtime error. Invalid dereferences
//! (reading through a forwarding record, reading a payload through the wrong
//! shape) are invariant violations checked by debug assertions.

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

/// Which space an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    Nursery,
    SemiSpace,
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceKind::Nursery => f.write_str("nursery"),
            SpaceKind::SemiSpace => f.write_str("semispace"),
        }
    }
}

/// Errors reported by allocation and evacuation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GcError {
    /// The space has no room for the request. Recoverable: evacuate or
    /// collect, then retry.
    #[error("{space} exhausted: requested {requested} words, {available} available")]
    OutOfMemory {
        space: SpaceKind,
        requested: usize,
        available: usize,
    },

    /// The semispace epoch was closed; call `init` before allocating again.
    #[error("semispace is closed")]
    SpaceClosed,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl GcError {
    /// True for exhaustion errors, which callers answer by collecting.
    #[inline]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, GcError::OutOfMemory { .. })
    }
}

/// Result alias for collector operations.
pub type GcResult<T> = Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GcError::OutOfMemory {
            space: SpaceKind::Nursery,
            requested: 3,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "nursery exhausted: requested 3 words, 1 available"
        );
        assert!(err.is_out_of_memory());
        assert!(!GcError::SpaceClosed.is_out_of_memory());
    }

    #[test]
    fn test_config_error_converts() {
        let err: GcError = ConfigError::NurseryTooSmall.into();
        assert!(matches!(err, GcError::Config(ConfigError::NurseryTooSmall)));
    }
}
