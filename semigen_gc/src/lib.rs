//! Semigen Garbage Collector
//!
//! A two-generation copying collector over a simulated word-addressed heap.
//!
//! # Architecture
//!
//! The GC uses a generational design with two spaces:
//!
//! - **Nursery (Young Generation)**: Bump-pointer allocation. Allocation never
//!   collects; when it fails, the live nursery is evacuated into the
//!   semispace and the nursery is reset wholesale.
//!
//! - **SemiSpace (Old Generation)**: Two buffers and a tri-color copying
//!   scavenger. Liveness is a parity bit that flips after each scavenge, so
//!   survivors never need their marks cleared.
//!
//! Objects are fixed-shape records described by an info table indexed by
//! tag. Every object begins with a single packed header word, which the
//! collector overwrites with a forwarding record once the object has moved.
//!
//! # Usage
//!
//! ```
//! use semigen_gc::collector::MinorCollector;
//! use semigen_gc::object::{MkBranch, MkLeaf, ObjectStore};
//! use semigen_gc::{GcConfig, GcHeap};
//!
//! let mut heap = GcHeap::new(GcConfig::low_memory()).unwrap();
//!
//! // Allocate objects
//! let leaf = heap.alloc(MkLeaf { n: 10 }).unwrap();
//! let branch = heap.alloc(MkBranch { left: leaf, right: leaf }).unwrap();
//!
//! // Collect the nursery; roots are rewritten in place
//! let mut roots = vec![branch];
//! MinorCollector::new().collect(&mut heap, &mut roots).unwrap();
//!
//! let branch = heap.read_as::<MkBranch>(roots[0]);
//! assert_eq!(heap.read_as::<MkLeaf>(branch.left).n, 10);
//! ```
//!
//! # Handles
//!
//! Handles are [`Address`]es. A collection invalidates every handle it does
//! not rewrite, so mutators keep long-lived handles in a root set.

#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod error;
pub mod heap;
pub mod object;
pub mod roots;
pub mod stats;
pub mod trace;

// Re-exports for convenient access
pub use collector::{MajorCollector, MinorCollector};
pub use config::{GcConfig, NURSERY_SIZE, SEMISPACE_SIZE};
pub use error::{GcError, GcResult};
pub use heap::{GcHeap, Nursery, SemiSpace};
pub use object::{Address, Header, ObjectStore, ObjectStoreMut, Tag, INFO_TABLE, TAG_MAX};
pub use roots::{RootProvider, RootSet};
pub use stats::{GcStats, TimerKey};
pub use trace::{Trace, Tracer};

/// GC color for tri-color marking algorithm.
///
/// The tri-color invariant states that no black object may point
/// directly to a white object. This is maintained by:
/// - Marking objects grey when discovered
/// - Marking objects black after all children are processed
/// - Shading promoted objects grey when they point at unscanned objects
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcColor {
    /// Not yet visited (potentially dead).
    White = 0,
    /// In the work queue (reachable, children not yet scanned).
    Grey = 1,
    /// Fully scanned (reachable, all children processed).
    Black = 2,
}

/// Generation identifier, stored as one header bit.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Generation {
    /// Young generation (nursery), including bypass allocations not yet
    /// promoted.
    Nursery = 0,
    /// Old generation (semispace).
    SemiSpace = 1,
}

impl Generation {
    /// Decode the header bit.
    #[inline]
    pub fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Generation::Nursery
        } else {
            Generation::SemiSpace
        }
    }

    /// Check if this generation is the young space.
    #[inline]
    pub fn is_young(self) -> bool {
        matches!(self, Generation::Nursery)
    }

    /// Check if this generation is the old space.
    #[inline]
    pub fn is_old(self) -> bool {
        matches!(self, Generation::SemiSpace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_bit() {
        assert_eq!(Generation::from_bit(0), Generation::Nursery);
        assert_eq!(Generation::from_bit(1), Generation::SemiSpace);
        assert_eq!(Generation::from_bit(Generation::SemiSpace as u8), Generation::SemiSpace);
        assert!(Generation::Nursery.is_young());
        assert!(Generation::SemiSpace.is_old());
    }
}
