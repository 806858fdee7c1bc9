//! Minor (nursery) garbage collection.
//!
//! A minor collection promotes everything reachable from the roots out of
//! the nursery, then empties it:
//! 1. Start the `gen0` timer
//! 2. Evacuate every root; each evacuation promotes transitively
//! 3. Reset the nursery, recording promotions and semispace occupancy
//! 4. Optionally verify that no semispace object still points at the nursery
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NURSERY                       │  SEMISPACE (to)                        │
//! │  ┌─────┬─────┬─────┬───────┐   │  ┌─────┬─────┬───────────────────────┐ │
//! │  │  A  │  B  │  C  │ free  │   │  │  A' │  C' │      free             │ │
//! │  │root │dead │A→C  │       │──▶│  │black│black│                       │ │
//! │  └─────┴─────┴─────┴───────┘   │  └─────┴─────┴───────────────────────┘ │
//! │                                │                                        │
//! │  B is unreachable, not copied  │  Only live objects are promoted        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Time is O(live nursery data), not O(nursery size).

use crate::error::GcResult;
use crate::heap::{GcHeap, Nursery, SemiSpace};
use crate::object::{Address, ObjectStore};
use crate::roots::RootProvider;
use crate::stats::TimerKey;
use crate::trace::Tracer;

/// Result of a minor collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MinorResult {
    /// Root slots visited.
    pub roots_traced: usize,
    /// Objects promoted to the semispace.
    pub objects_promoted: usize,
    /// Words promoted to the semispace.
    pub words_promoted: usize,
    /// Nursery words that died.
    pub words_freed: usize,
    /// Semispace occupancy after the collection.
    pub semispace_words: usize,
}

/// Minor collector for the nursery.
pub struct MinorCollector {
    /// Overrides `GcConfig::verify_heap` when set.
    verify: Option<bool>,
}

impl MinorCollector {
    /// Create a new minor collector that follows the heap's configuration.
    #[inline]
    pub fn new() -> Self {
        Self { verify: None }
    }

    /// Create a collector that always (or never) verifies the heap.
    #[inline]
    pub fn with_verify(verify: bool) -> Self {
        Self {
            verify: Some(verify),
        }
    }

    /// Perform a minor collection.
    ///
    /// Root slots are rewritten to the promoted copies. When the semispace
    /// is closed or cannot hold the whole nursery, the collection fails
    /// before any root, object or timer is touched; freeing semispace room
    /// (a scavenge) and collecting again then succeeds.
    pub fn collect(
        &mut self,
        heap: &mut GcHeap,
        roots: &mut dyn RootProvider,
    ) -> GcResult<MinorResult> {
        let verify = self.verify.unwrap_or(heap.config().verify_heap);
        let trace = heap.config().trace;
        let (nursery, semi, stats) = heap.parts_mut();
        nursery.check_reserve(semi)?;

        let words_before = nursery.allocated();
        stats.timer_begin(TimerKey::Gen0);

        let mut tracer = EvacuateTracer {
            nursery: &mut *nursery,
            semi: &mut *semi,
            roots_traced: 0,
        };
        roots.trace_roots(&mut tracer)?;
        let roots_traced = tracer.roots_traced;

        let result = MinorResult {
            roots_traced,
            objects_promoted: nursery.promoted_objects(),
            words_promoted: nursery.promoted_words(),
            words_freed: words_before.saturating_sub(nursery.promoted_words()),
            semispace_words: 0,
        };
        nursery.reset(semi, stats);

        if verify {
            verify_no_nursery_refs(nursery, semi);
        }

        let result = MinorResult {
            semispace_words: semi.size(),
            ..result
        };
        if trace {
            log::debug!(
                "minor gc: {} roots, promoted {} objects ({} words), freed {} words",
                result.roots_traced,
                result.objects_promoted,
                result.words_promoted,
                result.words_freed
            );
        }
        Ok(result)
    }
}

impl Default for MinorCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the active semispace buffer and assert that no pointer field refers
/// into the nursery.
///
/// # Panics
///
/// Panics on the first offending field.
pub fn verify_no_nursery_refs(nursery: &Nursery, semi: &SemiSpace) {
    let mut checked = 0usize;
    semi.for_each_object(|addr, header| {
        for i in 0..header.tag().info().ptrs {
            let child = Address::from_word(semi.read_field(addr, i));
            assert!(
                !nursery.member(child),
                "heap verification failed: {:?} field {} points into the nursery at {:?}",
                addr,
                i,
                child
            );
        }
        checked += 1;
    });
    log::trace!("heap verification: {} objects checked", checked);
}

// =============================================================================
// Evacuate Tracer
// =============================================================================

/// Tracer that promotes each root's referent out of the nursery.
struct EvacuateTracer<'a> {
    nursery: &'a mut Nursery,
    semi: &'a mut SemiSpace,
    roots_traced: usize,
}

impl<'a> Tracer for EvacuateTracer<'a> {
    #[inline]
    fn trace_slot(&mut self, slot: &mut Address) -> GcResult<()> {
        self.roots_traced += 1;
        self.nursery.evacuate(self.semi, slot)
    }
}

// =============================================================================
// Tests
// =============================================================================
