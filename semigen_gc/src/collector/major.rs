//! Major (semispace) garbage collection.
//!
//! Major GC is a tri-color copying scavenge of the semispace:
//! 1. Empty the nursery first (a minor collection) so no young object can
//!    refer into the buffer about to be discarded
//! 2. Evacuate every root: previous-epoch objects are copied grey
//! 3. Scavenge: trace grey objects until none remain, then flip
//!
//! # Tri-Color Invariant
//!
//! - **White**: In the previous-epoch buffer, not yet copied
//! - **Grey**: Copied (or registered), children not yet scanned
//! - **Black**: Copied and all children scanned
//!
//! The invariant: No black object points directly to a white object.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FROM                          TO                                       │
//! │  ┌─────┐     ┌─────┐          ┌─────┐                                   │
//! │  │  A  │────▶│  B  │   ───▶   │  A' │ grey                              │
//! │  │white│     │white│          └─────┘                                   │
//! │  └─────┘     └─────┘             │ scavenge                              │
//! │     A→A'                         ▼                                       │
//! │                               ┌─────┬─────┐                             │
//! │                               │  A' │  B' │ black                       │
//! │                               └─────┴─────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The flip at the end of the scavenge toggles the parity bit, so survivors
//! become the next epoch's white objects without a clearing pass.

use super::minor::{MinorCollector, MinorResult};
use crate::error::GcResult;
use crate::heap::{GcHeap, SemiSpace};
use crate::object::Address;
use crate::roots::RootProvider;
use crate::trace::Tracer;

/// Result of a major collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MajorResult {
    /// The nursery collection that preceded the scavenge, if the nursery
    /// held anything.
    pub minor: Option<MinorResult>,
    /// Root slots visited by the scavenge.
    pub roots_traced: usize,
    /// Semispace words before the scavenge.
    pub words_before: usize,
    /// Semispace words surviving the scavenge.
    pub live_words: usize,
    /// Words discarded with the previous epoch.
    pub words_freed: usize,
}

/// Major (copying) collector for the semispace.
pub struct MajorCollector {
    /// Empties the nursery before each scavenge.
    minor: MinorCollector,
}

impl MajorCollector {
    /// Create a new major collector.
    #[inline]
    pub fn new() -> Self {
        Self {
            minor: MinorCollector::new(),
        }
    }

    /// Perform a full scavenge.
    pub fn collect(
        &mut self,
        heap: &mut GcHeap,
        roots: &mut dyn RootProvider,
    ) -> GcResult<MajorResult> {
        let minor = if heap.nursery().allocated() > 0 {
            Some(self.minor.collect(heap, roots)?)
        } else {
            None
        };

        let trace = heap.config().trace;
        let (_, semi, stats) = heap.parts_mut();
        let words_before = semi.size();

        let mut tracer = ScavengeTracer {
            semi: &mut *semi,
            roots_traced: 0,
        };
        roots.trace_roots(&mut tracer)?;
        let roots_traced = tracer.roots_traced;

        semi.scavenge(stats)?;

        let live_words = semi.size();
        let result = MajorResult {
            minor,
            roots_traced,
            words_before,
            live_words,
            words_freed: words_before.saturating_sub(live_words),
        };
        if trace {
            log::debug!(
                "major gc: {} roots, {} -> {} words",
                result.roots_traced,
                result.words_before,
                result.live_words
            );
        }
        Ok(result)
    }
}

impl Default for MajorCollector {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Scavenge Tracer
// =============================================================================

/// Tracer that adds each root to the current scavenge.
struct ScavengeTracer<'a> {
    semi: &'a mut SemiSpace,
    roots_traced: usize,
}

impl<'a> Tracer for ScavengeTracer<'a> {
    #[inline]
    fn trace_slot(&mut self, slot: &mut Address) -> GcResult<()> {
        self.roots_traced += 1;
        self.semi.evacuate(slot)
    }
}

// =============================================================================
// Tests
// =============================================================================
