//! Heap memory management.
//!
//! The heap is divided into two spaces:
//! - Nursery: Young generation with bump-pointer allocation
//! - SemiSpace: Tenured generation, two buffers with copying collection
//!
//! Every space owns a disjoint range of the address space, so the space an
//! [`Address`] belongs to is a range check.

mod nursery;
mod semispace;
mod space;

pub use nursery::Nursery;
pub use semispace::SemiSpace;

use crate::config::{ConfigError, GcConfig};
use crate::error::GcResult;
use crate::object::{Address, Object, ObjectStore, ObjectStoreMut, Word, INFO_TABLE};
use crate::stats::GcStats;
use crate::Generation;

/// Main heap structure managing all memory spaces.
pub struct GcHeap {
    /// Configuration parameters.
    config: GcConfig,

    /// Young generation (bump-pointer allocation).
    nursery: Nursery,

    /// Old generation (copying semispace).
    semispace: SemiSpace,

    /// GC statistics.
    stats: GcStats,
}

impl GcHeap {
    /// Create a new heap with the given configuration.
    pub fn new(config: GcConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a heap with default configuration.
    pub fn with_defaults() -> Self {
        Self::build(GcConfig::default())
    }

    fn build(config: GcConfig) -> Self {
        log::debug!(
            "heap: nursery {} words, semispace 2 x {} words",
            config.nursery_size,
            config.semispace_size
        );
        Self {
            nursery: Nursery::new(config.nursery_size),
            semispace: SemiSpace::new(config.semispace_size),
            stats: GcStats::new(),
            config,
        }
    }

    /// Empty both spaces and start a fresh epoch. Statistics are kept.
    pub fn init(&mut self) {
        self.nursery.init();
        self.semispace.init();
    }

    /// Finish the current semispace epoch.
    ///
    /// Allocation fails with [`GcError::SpaceClosed`](crate::GcError::SpaceClosed)
    /// until the next [`init`](Self::init).
    pub fn close(&mut self) {
        self.semispace.close(&mut self.stats);
        if self.config.trace {
            self.stats.log_summary();
        }
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate and construct an object.
    ///
    /// Allocation never collects. On
    /// [`GcError::OutOfMemory`](crate::GcError::OutOfMemory) the caller
    /// runs a minor collection and retries.
    #[inline]
    pub fn alloc(&mut self, object: impl Into<Object>) -> GcResult<Address> {
        let object = object.into();
        let size = object.size_words();
        let addr = self.nursery.allocate(Some(&mut self.semispace), object)?;
        self.stats.record_allocation(size);
        Ok(addr)
    }

    /// Build new objects directly in the semispace.
    pub fn set_bypass(&mut self, enabled: bool) {
        self.nursery.set_bypass(enabled);
    }

    // =========================================================================
    // Space Queries
    // =========================================================================

    /// Check if an address is in the nursery.
    #[inline]
    pub fn is_young(&self, addr: Address) -> bool {
        self.nursery.member(addr)
    }

    /// Check if an address is in the semispace.
    #[inline]
    pub fn is_old(&self, addr: Address) -> bool {
        self.semispace.contains(addr)
    }

    /// Get the generation of an object.
    ///
    /// Reads the header, so bypass allocations report
    /// [`Generation::Nursery`] until promoted. Forwarding records report the
    /// generation of their target.
    pub fn generation_of(&self, addr: Address) -> Option<Generation> {
        if !self.contains(addr) {
            return None;
        }
        let header = self.read_header(addr);
        if header.is_forward_ptr() {
            Some(Generation::SemiSpace)
        } else {
            Some(header.generation())
        }
    }

    // =========================================================================
    // Collection Triggers
    // =========================================================================

    /// Check if a minor GC should be triggered: the nursery may not fit the
    /// largest object shape.
    #[inline]
    pub fn should_minor_collect(&self) -> bool {
        let largest = INFO_TABLE.iter().map(|info| info.size_words()).max().unwrap_or(1);
        self.nursery.free() < largest
    }

    /// Check if a major GC should be triggered: promoting a full nursery
    /// may not fit in the semispace.
    pub fn should_major_collect(&self) -> bool {
        self.semispace.free() < self.nursery.size()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration.
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Get GC statistics.
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Get mutable statistics access.
    pub fn stats_mut(&mut self) -> &mut GcStats {
        &mut self.stats
    }

    /// Get the nursery.
    pub fn nursery(&self) -> &Nursery {
        &self.nursery
    }

    /// Get mutable nursery access.
    pub fn nursery_mut(&mut self) -> &mut Nursery {
        &mut self.nursery
    }

    /// Get the semispace.
    pub fn semispace(&self) -> &SemiSpace {
        &self.semispace
    }

    /// Get mutable semispace access.
    pub fn semispace_mut(&mut self) -> &mut SemiSpace {
        &mut self.semispace
    }

    /// Borrow every space and the statistics sink at once.
    pub fn parts_mut(&mut self) -> (&mut Nursery, &mut SemiSpace, &mut GcStats) {
        (&mut self.nursery, &mut self.semispace, &mut self.stats)
    }
}

impl Default for GcHeap {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ObjectStore for GcHeap {
    #[inline]
    fn contains(&self, addr: Address) -> bool {
        self.nursery.contains(addr) || self.semispace.contains(addr)
    }

    #[inline]
    fn load(&self, addr: Address) -> Word {
        if self.nursery.contains(addr) {
            self.nursery.load(addr)
        } else {
            self.semispace.load(addr)
        }
    }
}

impl ObjectStoreMut for GcHeap {
    #[inline]
    fn store(&mut self, addr: Address, word: Word) {
        if self.nursery.contains(addr) {
            self.nursery.store(addr, word)
        } else {
            self.semispace.store(addr, word)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GcError;
    use crate::object::{MkBranch, MkLeaf, MkUnit};

    fn small_heap() -> GcHeap {
        GcHeap::new(GcConfig {
            nursery_size: 16,
            semispace_size: 64,
            ..GcConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_heap_creation() {
        let heap = GcHeap::with_defaults();
        assert!(!heap.should_minor_collect());
        assert!(!heap.should_major_collect());
        assert_eq!(heap.nursery().size(), crate::config::NURSERY_SIZE);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GcConfig {
            nursery_size: 1,
            ..GcConfig::default()
        };
        assert!(matches!(GcHeap::new(config), Err(ConfigError::NurseryTooSmall)));
    }

    #[test]
    fn test_alloc_records_stats() {
        let mut heap = small_heap();
        let leaf = heap.alloc(MkLeaf { n: 4 }).unwrap();
        heap.alloc(MkBranch { left: leaf, right: leaf }).unwrap();

        assert_eq!(heap.stats().objects_allocated, 2);
        assert_eq!(heap.stats().words_allocated, 5);
        assert!(heap.is_young(leaf));
        assert!(!heap.is_old(leaf));
        assert_eq!(heap.generation_of(leaf), Some(Generation::Nursery));
    }

    #[test]
    fn test_should_minor_collect() {
        let mut heap = small_heap();
        for _ in 0..14 {
            heap.alloc(MkUnit).unwrap();
        }
        assert!(heap.should_minor_collect());
    }

    #[test]
    fn test_bypass_allocates_old() {
        let mut heap = small_heap();
        heap.set_bypass(true);
        let leaf = heap.alloc(MkLeaf { n: 1 }).unwrap();

        assert!(heap.is_old(leaf));
        assert_eq!(heap.generation_of(leaf), Some(Generation::Nursery));
        assert_eq!(heap.read_as::<MkLeaf>(leaf).n, 1);
    }

    #[test]
    fn test_generation_of_foreign_address() {
        let heap = small_heap();
        assert_eq!(heap.generation_of(Address::NULL), None);
    }

    #[test]
    fn test_close_then_init() {
        let mut heap = small_heap();
        heap.set_bypass(true);
        heap.close();
        assert_eq!(heap.alloc(MkUnit), Err(GcError::SpaceClosed));

        heap.init();
        assert!(heap.alloc(MkUnit).is_ok());
        assert!(!heap.nursery().is_bypassing());
    }
}
