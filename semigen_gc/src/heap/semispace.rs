//! Two-buffer semispace with a tri-color copying scavenger.
//!
//! The semispace holds a *from* buffer (survivors of the previous epoch) and
//! a *to* buffer (the active buffer receiving allocations and copies).
//!
//! ```text
//!   evacuate(from obj)              scavenge()
//! ┌───────────────┐   copy   ┌───────────────┐        ┌───────────────┐
//! │ FROM  A  B  C │ ───────▶ │ TO  A'(grey)  │  ───▶  │ TO  A' B'     │
//! │  A→fwd        │          │               │  trace │  black        │
//! └───────────────┘          └───────────────┘        └───────────────┘
//!                                                      flip: TO becomes FROM,
//!                                                      black_bit toggles
//! ```
//!
//! Liveness uses a parity bit instead of clearing marks: an object is
//! current-black when its header is not grey and its black bit equals
//! `black_bit`. Flipping `black_bit` at the end of a scavenge turns every
//! black survivor back into "unmarked" for the next epoch without rewriting a
//! single header.
//!
//! Grey objects are tracked twice: by the grey header bit and by an explicit
//! worklist that the scavenger drains.

use super::space::Space;
use crate::config::SEMISPACE_SIZE;
use crate::error::{GcError, GcResult, SpaceKind};
use crate::object::{Address, Header, Object, ObjectStore, ObjectStoreMut, Tag, Word};
use crate::stats::{GcStats, GcTimer, TimerKey};
use crate::Generation;
use std::time::Instant;

/// Parity a fresh semispace starts with. Cleared mark bits never read as
/// current-black in the first epoch.
const INITIAL_BLACK_BIT: bool = true;

/// Semispace (tenured generation) with copying collection.
pub struct SemiSpace {
    /// Survivors of the previous epoch.
    from_space: Space,
    /// Active buffer: allocation and copy destination.
    to_space: Space,
    /// Mark value that currently means "fully traced".
    black_bit: bool,
    /// Grey objects in the active buffer awaiting tracing.
    grey: Vec<Address>,
    /// Set by `close`; allocation fails until the next `init`.
    closed: bool,
    /// When the current epoch began.
    epoch_start: Instant,
}

impl SemiSpace {
    /// Create a semispace with two buffers of `size` words each.
    pub fn new(size: usize) -> Self {
        Self {
            from_space: Space::new(size),
            to_space: Space::new(size),
            black_bit: INITIAL_BLACK_BIT,
            grey: Vec::new(),
            closed: false,
            epoch_start: Instant::now(),
        }
    }

    /// Create a semispace of the default size.
    pub fn with_defaults() -> Self {
        Self::new(SEMISPACE_SIZE)
    }

    /// Empty both buffers and restore the initial parity.
    pub fn init(&mut self) {
        self.from_space.reset();
        self.to_space.reset();
        self.black_bit = INITIAL_BLACK_BIT;
        self.grey.clear();
        self.closed = false;
        self.epoch_start = Instant::now();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The mark value that currently means "black".
    #[inline]
    pub fn black_bit(&self) -> bool {
        self.black_bit
    }

    /// Words occupied across both buffers, grey and black objects alike.
    #[inline]
    pub fn size(&self) -> usize {
        self.from_space.allocated() + self.to_space.allocated()
    }

    /// Capacity of each buffer in words.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.to_space.capacity()
    }

    /// Free words in the active buffer.
    #[inline]
    pub fn free(&self) -> usize {
        self.to_space.free()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of grey objects awaiting tracing.
    #[inline]
    pub fn grey_count(&self) -> usize {
        self.grey.len()
    }

    /// Check if an address is in the active buffer.
    #[inline]
    pub fn in_to_space(&self, addr: Address) -> bool {
        self.to_space.contains(addr)
    }

    /// Check if an address is in the previous-epoch buffer.
    #[inline]
    pub fn in_from_space(&self, addr: Address) -> bool {
        self.from_space.contains(addr)
    }

    /// True when the object at `addr` is already grey or black in this
    /// epoch and needs no further evacuation.
    pub fn is_current(&self, addr: Address) -> bool {
        if !self.to_space.contains(addr) {
            return false;
        }
        let header = self.read_header(addr);
        header.is_grey() || header.black() == self.black_bit
    }

    /// True when `addr` refers to a semispace object that the next scavenge
    /// has yet to reach.
    #[inline]
    pub fn needs_scan(&self, addr: Address) -> bool {
        self.contains(addr) && !self.is_current(addr)
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Reserve `size` words in the active buffer.
    pub(crate) fn alloc(&mut self, size: usize) -> GcResult<Address> {
        if self.closed {
            return Err(GcError::SpaceClosed);
        }
        self.to_space.alloc(size).ok_or(GcError::OutOfMemory {
            space: SpaceKind::SemiSpace,
            requested: size,
            available: self.to_space.free(),
        })
    }

    /// Construct `object` directly in the active buffer, unmarked.
    pub(crate) fn alloc_object(
        &mut self,
        object: &Object,
        generation: Generation,
    ) -> GcResult<Address> {
        let size = object.size_words();
        let addr = self.alloc(size)?;
        self.write_header(
            addr,
            Header::object(object.tag(), generation, false, !self.black_bit),
        );
        if size > 1 {
            object.encode(self.to_space.slice_mut(addr.field(0), size - 1));
        }
        Ok(addr)
    }

    /// Copy a whole object (header included) into the active buffer and give
    /// it `header`.
    pub(crate) fn copy_in(&mut self, words: &[Word], header: Header) -> GcResult<Address> {
        let addr = self.alloc(words.len())?;
        self.to_space
            .slice_mut(addr, words.len())
            .copy_from_slice(words);
        self.write_header(addr, header);
        Ok(addr)
    }

    // =========================================================================
    // Marking
    // =========================================================================

    /// Mark an active-buffer object grey and queue it for tracing.
    pub(crate) fn shade_grey(&mut self, addr: Address) {
        debug_assert!(self.to_space.contains(addr), "shading {:?} outside to-space", addr);
        let header = self.read_header(addr);
        if header.is_grey() {
            return;
        }
        self.write_header(addr, header.with_grey(true).with_black(!self.black_bit));
        self.grey.push(addr);
    }

    /// Promote a bypass-allocated object without moving it.
    pub(crate) fn promote_in_place(&mut self, addr: Address) {
        let header = self.read_header(addr);
        self.write_header(
            addr,
            header
                .with_generation(Generation::SemiSpace)
                .with_grey(false)
                .with_black(self.black_bit),
        );
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Add a reference to the current collection episode.
    ///
    /// Previous-epoch objects are copied into the active buffer grey and the
    /// old copy becomes a forwarding record. Unmarked objects already in the
    /// active buffer are shaded grey in place. Forwarded objects only have
    /// the handle rewritten, so every reference to one object converges on
    /// one copy. Handles outside the semispace are left untouched.
    pub fn evacuate(&mut self, handle: &mut Address) -> GcResult<()> {
        let obj = *handle;
        if obj.is_null() || !self.contains(obj) {
            return Ok(());
        }

        let header = self.read_header(obj);
        if let Some(to) = header.forward_ptr() {
            log::trace!("semispace: {:?} already forwarded to {:?}", obj, to);
            *handle = to;
            return Ok(());
        }

        if self.to_space.contains(obj) {
            if !header.is_grey() && header.black() != self.black_bit {
                self.shade_grey(obj);
            }
            return Ok(());
        }

        let size = header.tag().info().size_words();
        let copy = self.alloc(size)?;
        self.to_space
            .slice_mut(copy, size)
            .copy_from_slice(self.from_space.slice(obj, size));
        self.write_header(copy, header.with_grey(true).with_black(!self.black_bit));
        self.grey.push(copy);
        self.write_indirection(obj, copy);

        log::trace!("semispace: copied {:?} -> {:?} ({} words)", obj, copy, size);
        *handle = copy;
        Ok(())
    }

    /// Evacuate the pointer fields of a grey object, then blacken it.
    ///
    /// Fields already rewritten are forwarded copies, so repeating a
    /// partial scan is harmless.
    fn blacken(&mut self, obj: Address) -> GcResult<()> {
        let header = self.read_header(obj);
        debug_assert!(header.is_grey(), "non-grey {:?} on grey worklist", obj);

        for i in 0..header.tag().info().ptrs {
            let mut child = Address::from_word(self.read_field(obj, i));
            if !self.contains(child) {
                continue;
            }
            self.evacuate(&mut child)?;
            self.write_field(obj, i, child.to_word());
        }

        self.write_header(obj, header.with_grey(false).with_black(self.black_bit));
        Ok(())
    }

    /// Drain the grey set, then flip buffers.
    ///
    /// Each grey object has its pointer fields evacuated and is blackened.
    /// Terminates because every object enters the worklist at most once per
    /// epoch. Afterwards the survivors sit in the from buffer, the active
    /// buffer is empty and `black_bit` has toggled.
    pub fn scavenge(&mut self, stats: &mut GcStats) -> GcResult<()> {
        let timer = GcTimer::start("scavenge");
        let mut traced = 0usize;

        while let Some(obj) = self.grey.pop() {
            if let Err(err) = self.blacken(obj) {
                // Still grey: a later scavenge resumes from here
                self.grey.push(obj);
                return Err(err);
            }
            traced += 1;
        }

        self.flip();

        let elapsed = timer.stop();
        stats.record_elapsed(TimerKey::Gen1, elapsed);
        stats.record_size(TimerKey::Gen1, self.size());
        log::debug!(
            "scavenge: traced {} objects, {} words live, {:?}",
            traced,
            self.size(),
            elapsed
        );
        Ok(())
    }

    /// Finish the epoch: report occupancy and lifetime, refuse further
    /// allocation until [`init`](Self::init).
    pub fn close(&mut self, stats: &mut GcStats) {
        if !self.grey.is_empty() {
            log::warn!("semispace closed with {} grey objects", self.grey.len());
        }
        stats.record_elapsed(TimerKey::Close, self.epoch_start.elapsed());
        stats.record_size(TimerKey::Close, self.size());
        self.closed = true;
    }

    /// Reset the previous epoch, swap roles, toggle parity.
    fn flip(&mut self) {
        debug_assert!(self.grey.is_empty(), "flip with pending grey objects");
        self.from_space.reset();
        std::mem::swap(&mut self.from_space, &mut self.to_space);
        self.black_bit = !self.black_bit;
    }

    /// Visit every object in the active buffer in allocation order.
    pub fn for_each_object<F>(&self, mut f: F)
    where
        F: FnMut(Address, Header),
    {
        let mut addr = self.to_space.start();
        let end = self.to_space.alloc_ptr();
        while addr < end {
            let header = self.read_header(addr);
            f(addr, header);
            addr = addr.offset(header.tag().info().size_words());
        }
    }

    /// Tags and addresses of the active buffer, mainly for tests.
    pub fn objects(&self) -> Vec<(Address, Tag)> {
        let mut out = Vec::new();
        self.for_each_object(|addr, header| out.push((addr, header.tag())));
        out
    }
}

impl Default for SemiSpace {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ObjectStore for SemiSpace {
    #[inline]
    fn contains(&self, addr: Address) -> bool {
        self.to_space.contains(addr) || self.from_space.contains(addr)
    }

    #[inline]
    fn load(&self, addr: Address) -> Word {
        if self.to_space.contains(addr) {
            self.to_space.load(addr)
        } else {
            self.from_space.load(addr)
        }
    }
}

impl ObjectStoreMut for SemiSpace {
    #[inline]
    fn store(&mut self, addr: Address, word: Word) {
        if self.to_space.contains(addr) {
            self.to_space.store(addr, word)
        } else {
            self.from_space.store(addr, word)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{MkBranch, MkLeaf, MkNode, MkUnit};

    fn promoted(semi: &mut SemiSpace, object: impl Into<Object>) -> Address {
        let addr = semi
            .alloc_object(&object.into(), Generation::SemiSpace)
            .unwrap();
        semi.promote_in_place(addr);
        addr
    }

    #[test]
    fn test_semispace_creation() {
        let semi = SemiSpace::new(64);
        assert_eq!(semi.size(), 0);
        assert_eq!(semi.capacity(), 64);
        assert_eq!(semi.black_bit(), INITIAL_BLACK_BIT);
        assert!(!semi.is_closed());
    }

    #[test]
    fn test_alloc_object_is_unmarked() {
        let mut semi = SemiSpace::new(64);
        let leaf = semi
            .alloc_object(&MkLeaf { n: 5 }.into(), Generation::Nursery)
            .unwrap();
        let header = semi.read_header(leaf);
        assert_eq!(header.generation(), Generation::Nursery);
        assert!(!header.is_grey());
        assert_ne!(header.black(), semi.black_bit());
        assert!(!semi.is_current(leaf));
        assert_eq!(semi.read_as::<MkLeaf>(leaf).n, 5);
    }

    #[test]
    fn test_scavenge_flips_parity_and_buffers() {
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();
        let leaf = promoted(&mut semi, MkLeaf { n: 1 });
        let parity = semi.black_bit();
        assert!(semi.in_to_space(leaf));

        semi.scavenge(&mut stats).unwrap();

        assert_eq!(semi.black_bit(), !parity);
        assert!(semi.in_from_space(leaf));
        assert_eq!(semi.size(), 2);
        assert_eq!(stats.episodes(TimerKey::Gen1), 1);
    }

    #[test]
    fn test_evacuate_from_space_copies_grey() {
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();
        let mut leaf = promoted(&mut semi, MkLeaf { n: 3 });
        semi.scavenge(&mut stats).unwrap();
        let old = leaf;

        semi.evacuate(&mut leaf).unwrap();

        assert_ne!(leaf, old);
        assert!(semi.in_to_space(leaf));
        assert!(semi.read_header(leaf).is_grey());
        assert_eq!(semi.read_header(old).forward_ptr(), Some(leaf));
        assert_eq!(semi.grey_count(), 1);
        assert_eq!(semi.size(), 4);
    }

    #[test]
    fn test_evacuate_twice_converges() {
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();
        let leaf = promoted(&mut semi, MkLeaf { n: 3 });
        semi.scavenge(&mut stats).unwrap();

        let (mut a, mut b) = (leaf, leaf);
        semi.evacuate(&mut a).unwrap();
        semi.evacuate(&mut b).unwrap();

        assert_eq!(a, b);
        assert_eq!(semi.grey_count(), 1);
        assert_eq!(semi.size(), 4);
    }

    #[test]
    fn test_scavenge_traces_children_once() {
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();
        let leaf = promoted(&mut semi, MkLeaf { n: 9 });
        let branch = promoted(&mut semi, MkBranch { left: leaf, right: leaf });
        semi.scavenge(&mut stats).unwrap();

        let mut root = branch;
        semi.evacuate(&mut root).unwrap();
        semi.scavenge(&mut stats).unwrap();

        // Branch (3 words) and one shared leaf (2 words) survive.
        assert_eq!(semi.size(), 5);
        let copy = semi.read_as::<MkBranch>(root);
        assert_eq!(copy.left, copy.right);
        assert_eq!(semi.read_as::<MkLeaf>(copy.left).n, 9);
        assert_eq!(semi.grey_count(), 0);
    }

    #[test]
    fn test_unreached_objects_are_dropped() {
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();
        let keep = promoted(&mut semi, MkLeaf { n: 1 });
        let _garbage = promoted(&mut semi, MkLeaf { n: 2 });
        semi.scavenge(&mut stats).unwrap();
        assert_eq!(semi.size(), 4);

        let mut root = keep;
        semi.evacuate(&mut root).unwrap();
        semi.scavenge(&mut stats).unwrap();

        assert_eq!(semi.size(), 2);
        assert_eq!(semi.read_as::<MkLeaf>(root).n, 1);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();
        let node = promoted(&mut semi, MkNode { next: Address::NULL, value: 1 });
        semi.write_field(node, 0, node.to_word());
        semi.scavenge(&mut stats).unwrap();

        let mut root = node;
        semi.evacuate(&mut root).unwrap();
        semi.scavenge(&mut stats).unwrap();

        assert_eq!(semi.size(), 3);
        assert_eq!(semi.read_as::<MkNode>(root).next, root);
    }

    #[test]
    fn test_unmarked_to_space_object_is_registered_in_place() {
        let mut semi = SemiSpace::new(64);
        let mut handle = semi
            .alloc_object(&MkLeaf { n: 4 }.into(), Generation::Nursery)
            .unwrap();
        let before = handle;

        semi.evacuate(&mut handle).unwrap();

        assert_eq!(handle, before);
        assert!(semi.read_header(handle).is_grey());
        assert_eq!(semi.size(), 2);
    }

    #[test]
    fn test_foreign_handle_untouched() {
        let mut semi = SemiSpace::new(16);
        let mut handle = Address::from_usize(0x10);
        semi.evacuate(&mut handle).unwrap();
        assert_eq!(handle, Address::from_usize(0x10));
        let mut null = Address::NULL;
        semi.evacuate(&mut null).unwrap();
        assert!(null.is_null());
    }

    #[test]
    fn test_exhaustion() {
        let mut semi = SemiSpace::new(4);
        semi.alloc_object(&MkLeaf { n: 1 }.into(), Generation::SemiSpace)
            .unwrap();
        semi.alloc_object(&MkLeaf { n: 2 }.into(), Generation::SemiSpace)
            .unwrap();
        let err = semi
            .alloc_object(&MkLeaf { n: 3 }.into(), Generation::SemiSpace)
            .unwrap_err();
        assert_eq!(
            err,
            GcError::OutOfMemory {
                space: SpaceKind::SemiSpace,
                requested: 2,
                available: 0
            }
        );
    }

    #[test]
    fn test_failed_scavenge_keeps_object_grey() {
        let mut semi = SemiSpace::new(16);
        let mut stats = GcStats::new();
        let leaf = promoted(&mut semi, MkLeaf { n: 42 });
        let mut branch = promoted(&mut semi, MkBranch { left: leaf, right: leaf });
        semi.scavenge(&mut stats).unwrap();

        for _ in 0..12 {
            semi.alloc_object(&MkUnit.into(), Generation::Nursery)
                .unwrap();
        }
        semi.evacuate(&mut branch).unwrap();
        assert_eq!(semi.free(), 1);

        // The copy fits but its leaf does not, on every attempt
        for _ in 0..2 {
            let err = semi.scavenge(&mut stats).unwrap_err();
            assert_eq!(
                err,
                GcError::OutOfMemory {
                    space: SpaceKind::SemiSpace,
                    requested: 2,
                    available: 1
                }
            );
            assert_eq!(semi.grey_count(), 1);
            assert!(semi.read_header(branch).is_grey());
        }

        let copy = semi.read_as::<MkBranch>(branch);
        assert!(semi.in_from_space(copy.left));
        assert_eq!(copy.left, copy.right);
        assert_eq!(semi.read_as::<MkLeaf>(copy.left).n, 42);
    }

    #[test]
    fn test_close_blocks_allocation_until_init() {
        let mut semi = SemiSpace::new(16);
        let mut stats = GcStats::new();
        promoted(&mut semi, MkLeaf { n: 1 });

        semi.close(&mut stats);

        assert!(semi.is_closed());
        assert_eq!(stats.last_size(TimerKey::Close), Some(2));
        assert_eq!(
            semi.alloc_object(&MkLeaf { n: 2 }.into(), Generation::SemiSpace),
            Err(GcError::SpaceClosed)
        );

        semi.init();
        assert!(!semi.is_closed());
        assert_eq!(semi.size(), 0);
    }

    #[test]
    fn test_for_each_object_walks_active_buffer() {
        let mut semi = SemiSpace::new(64);
        let a = promoted(&mut semi, MkLeaf { n: 1 });
        let b = promoted(&mut semi, MkBranch { left: a, right: a });
        assert_eq!(semi.objects(), vec![(a, Tag::Leaf), (b, Tag::Branch)]);
    }
}
