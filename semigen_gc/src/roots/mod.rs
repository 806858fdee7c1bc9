//! Root tracking.
//!
//! GC roots are the starting points for tracing. The mutator registers each
//! handle it wants to keep and reads it back after every collection, since
//! evacuation rewrites the registered copy.

use crate::error::GcResult;
use crate::object::Address;
use crate::trace::{Trace, Tracer};

/// Identifies a registered root. Stays valid until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(usize);

/// Root set for garbage collection.
pub struct RootSet {
    /// Registered handles. Removed entries are null.
    slots: Vec<Address>,
    /// Indices of removed entries available for reuse.
    free: Vec<usize>,
}

impl RootSet {
    /// Create a new empty root set.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Register a handle as a root.
    pub fn add(&mut self, handle: Address) -> RootId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = handle;
                RootId(index)
            }
            None => {
                self.slots.push(handle);
                RootId(self.slots.len() - 1)
            }
        }
    }

    /// Current value of a root.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never returned by this set.
    #[inline]
    pub fn get(&self, id: RootId) -> Address {
        self.slots[id.0]
    }

    /// Replace the handle stored under `id`.
    #[inline]
    pub fn set(&mut self, id: RootId, handle: Address) {
        self.slots[id.0] = handle;
    }

    /// Unregister a root, returning its last value.
    ///
    /// Removing an id that is already free does nothing and returns null.
    pub fn remove(&mut self, id: RootId) -> Address {
        if self.free.contains(&id.0) {
            return Address::NULL;
        }
        let handle = std::mem::replace(&mut self.slots[id.0], Address::NULL);
        self.free.push(id.0);
        handle
    }

    /// Unregister every root.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    /// Get number of registered roots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Check if no roots are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for types that can provide roots to the GC.
pub trait RootProvider {
    /// Trace all roots held by this provider.
    fn trace_roots(&mut self, tracer: &mut dyn Tracer) -> GcResult<()>;
}

impl RootProvider for RootSet {
    fn trace_roots(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        self.slots.trace(tracer)
    }
}

impl<T: Trace> RootProvider for [T] {
    fn trace_roots(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        self.trace(tracer)
    }
}

impl<T: Trace> RootProvider for Vec<T> {
    fn trace_roots(&mut self, tracer: &mut dyn Tracer) -> GcResult<()> {
        self.trace(tracer)
    }
}
