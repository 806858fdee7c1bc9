//! Reference tracing for collection.
//!
//! A [`Tracer`] visits handle *slots*, not handle values: copying moves
//! objects, so every visit may rewrite the slot with the object's new
//! address. Types holding handles implement [`Trace`] to report each slot.

use crate::error::GcResult;
use crate::object::{Address, MkBranch, MkLeaf, MkNode, MkUnit, Object};

/// Visitor for handle slots during collection.
///
/// # Example
///
/// ```
/// use semigen_gc::object::Address;
/// use semigen_gc::trace::Tracer;
/// use semigen_gc::GcResult;
///
/// struct Clearing;
///
/// impl Tracer for Clearing {
///     fn trace_slot(&mut self, slot: &mut Address) -> GcResult<()> {
///         *slot = Address::NULL;
///         Ok(())
///     }
/// }
/// ```
pub trait Tracer {
    /// Visit one slot. The implementation may overwrite it with the
    /// referent's new address. Null slots are never passed in.
    fn trace_slot(&mut self, slot: &mut Address) -> GcResult<()>;
}

/// Types that hold handles.
pub trait Trace {
    /// Report every non-null handle slot to `tracer`.
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()>;
}

// =============================================================================
// Trace implementations for handles and containers
// =============================================================================

impl Trace for Address {
    #[inline]
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        if self.is_null() {
            return Ok(());
        }
        tracer.trace_slot(self)
    }
}

impl<T: Trace> Trace for Option<T> {
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        match self {
            Some(inner) => inner.trace(tracer),
            None => Ok(()),
        }
    }
}

impl<T: Trace> Trace for [T] {
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        for item in self {
            item.trace(tracer)?;
        }
        Ok(())
    }
}

impl<T: Trace> Trace for Vec<T> {
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        self.as_mut_slice().trace(tracer)
    }
}

// =============================================================================
// Trace implementations for object payloads
// =============================================================================

impl Trace for MkUnit {
    #[inline]
    fn trace(&mut self, _tracer: &mut dyn Tracer) -> GcResult<()> {
        Ok(())
    }
}

impl Trace for MkLeaf {
    #[inline]
    fn trace(&mut self, _tracer: &mut dyn Tracer) -> GcResult<()> {
        Ok(())
    }
}

impl Trace for MkBranch {
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        self.left.trace(tracer)?;
        self.right.trace(tracer)
    }
}

impl Trace for MkNode {
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        self.next.trace(tracer)
    }
}

impl Trace for Object {
    fn trace(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        match self {
            Object::Unit(unit) => unit.trace(tracer),
            Object::Leaf(leaf) => leaf.trace(tracer),
            Object::Branch(branch) => branch.trace(tracer),
            Object::Node(node) => node.trace(tracer),
        }
    }
}

// =============================================================================
// Counting tracer
// =============================================================================

/// A counting tracer for debugging and statistics.
#[derive(Debug, Default)]
pub struct CountingTracer {
    /// Number of slots visited.
    pub slot_count: usize,
}

impl CountingTracer {
    /// Create a new counting tracer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for CountingTracer {
    fn trace_slot(&mut self, _slot: &mut Address) -> GcResult<()> {
        self.slot_count += 1;
        Ok(())
    }
}
