//! GC configuration parameters.
//!
//! Sizes are in words. The build-time defaults are exported as constants so
//! callers and tests can reason about exact capacities.

use thiserror::Error;

/// Default nursery capacity in words.
pub const NURSERY_SIZE: usize = 4096;

/// Default capacity of each semispace buffer in words.
pub const SEMISPACE_SIZE: usize = 4 * NURSERY_SIZE;

/// Smallest nursery accepted by [`GcConfig::validate`].
pub const MIN_NURSERY_SIZE: usize = 16;

/// Configuration for the collector.
///
/// # Example
///
/// ```
/// use semigen_gc::GcConfig;
///
/// let config = GcConfig {
///     nursery_size: 1024,
///     ..GcConfig::low_memory()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    // =========================================================================
    // Nursery
    // =========================================================================
    /// Nursery capacity in words.
    ///
    /// Allocation succeeds until exactly this many words are in use.
    ///
    /// Default: [`NURSERY_SIZE`]
    pub nursery_size: usize,

    // =========================================================================
    // SemiSpace
    // =========================================================================
    /// Capacity of each semispace buffer in words.
    ///
    /// Total semispace memory is 2x this value. Must be at least the nursery
    /// size so that promoting a full nursery cannot fail.
    ///
    /// Default: [`SEMISPACE_SIZE`]
    pub semispace_size: usize,

    // =========================================================================
    // Debugging
    // =========================================================================
    /// Log a summary line for every collection episode.
    ///
    /// Default: false
    pub trace: bool,

    /// Walk the semispace after each minor collection and check that nothing
    /// still points into the nursery.
    ///
    /// Default: false (enabled in debug builds)
    pub verify_heap: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            nursery_size: NURSERY_SIZE,
            semispace_size: SEMISPACE_SIZE,
            trace: false,
            verify_heap: cfg!(debug_assertions),
        }
    }
}

impl GcConfig {
    /// Create a configuration optimized for low memory usage.
    pub fn low_memory() -> Self {
        Self {
            nursery_size: 512,
            semispace_size: 2048,
            ..Default::default()
        }
    }

    /// Create a configuration optimized for high throughput.
    pub fn high_throughput() -> Self {
        Self {
            nursery_size: 64 * 1024,
            semispace_size: 256 * 1024,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nursery_size < MIN_NURSERY_SIZE {
            return Err(ConfigError::NurseryTooSmall);
        }
        if self.semispace_size < self.nursery_size {
            return Err(ConfigError::SemiSpaceSmallerThanNursery {
                nursery: self.nursery_size,
                semispace: self.semispace_size,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("nursery size must be at least {} words", MIN_NURSERY_SIZE)]
    NurseryTooSmall,

    #[error("semispace buffers ({semispace} words) must hold a full nursery ({nursery} words)")]
    SemiSpaceSmallerThanNursery { nursery: usize, semispace: usize },
}
