//! Nursery (young generation) with bump-pointer allocation.
//!
//! New objects are bump-allocated until the nursery is full. Allocation
//! never collects: on exhaustion the caller evacuates its roots into the
//! semispace, resets the nursery and retries.
//!
//! Evacuation leaves a forwarding record in each promoted object's old
//! header, so a second reference to the same object only has its handle
//! rewritten:
//!
//! ```text
//!   NURSERY                           SEMISPACE (to)
//! ┌────────┬────────┬──────┐        ┌────────┬────────┐
//! │ leaf   │ branch │ free │  ───▶  │ branch'│ leaf'  │
//! │ →leaf' │→branch'│      │        │ l,r ─────▶     │
//! └────────┴────────┴──────┘        └────────┴────────┘
//! ```
//!
//! In bypass mode objects are built straight in the semispace and still
//! report generation 0; promoting them only flips the generation bit.

use super::semispace::SemiSpace;
use super::space::Space;
use crate::config::NURSERY_SIZE;
use crate::error::{GcError, GcResult, SpaceKind};
use crate::object::{Address, Header, Object, ObjectStore, ObjectStoreMut, Word};
use crate::stats::{GcStats, TimerKey};
use crate::Generation;
use smallvec::SmallVec;

/// Promoted objects whose pointer fields still need fixing up.
type PendingList = SmallVec<[Address; 16]>;

/// Nursery (young generation).
pub struct Nursery {
    /// Allocation buffer.
    space: Space,
    /// Build new objects directly in the semispace.
    bypass: bool,
    /// Objects promoted since the last reset.
    promoted_objects: usize,
    /// Words promoted since the last reset.
    promoted_words: usize,
}

impl Nursery {
    /// Create a new nursery of `size` words.
    pub fn new(size: usize) -> Self {
        Self {
            space: Space::new(size),
            bypass: false,
            promoted_objects: 0,
            promoted_words: 0,
        }
    }

    /// Create a nursery of [`NURSERY_SIZE`] words.
    pub fn with_defaults() -> Self {
        Self::new(NURSERY_SIZE)
    }

    /// Empty the nursery and leave bypass mode.
    pub fn init(&mut self) {
        self.space.reset();
        self.bypass = false;
        self.promoted_objects = 0;
        self.promoted_words = 0;
    }

    /// Enter bypass mode.
    #[inline]
    pub fn bypass(&mut self) {
        self.set_bypass(true);
    }

    #[inline]
    pub fn set_bypass(&mut self, enabled: bool) {
        self.bypass = enabled;
    }

    #[inline]
    pub fn is_bypassing(&self) -> bool {
        self.bypass
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate and construct an object.
    ///
    /// With bypass on and a semispace supplied, the object is built in the
    /// semispace's active buffer. Otherwise it is bump-allocated here; the
    /// request fails with [`GcError::OutOfMemory`] exactly when it would
    /// exceed the nursery's capacity.
    pub fn allocate(
        &mut self,
        semi: Option<&mut SemiSpace>,
        object: impl Into<Object>,
    ) -> GcResult<Address> {
        let object = object.into();

        if self.bypass {
            if let Some(semi) = semi {
                return semi.alloc_object(&object, Generation::Nursery);
            }
        }

        let size = object.size_words();
        let Some(addr) = self.space.alloc(size) else {
            return Err(GcError::OutOfMemory {
                space: SpaceKind::Nursery,
                requested: size,
                available: self.space.free(),
            });
        };

        self.write_header(addr, Header::object(object.tag(), Generation::Nursery, false, false));
        if size > 1 {
            object.encode(self.space.slice_mut(addr.field(0), size - 1));
        }
        Ok(addr)
    }

    // =========================================================================
    // Evacuation
    // =========================================================================

    /// Check if a handle points into the nursery.
    #[inline]
    pub fn member(&self, handle: Address) -> bool {
        self.space.contains(handle)
    }

    /// Promote the object behind `handle` into `semi` and rewrite `handle`.
    ///
    /// Every nursery object reachable from it through nursery-resident
    /// pointers is promoted too. An object promoted earlier is never copied
    /// again: its forwarding record supplies the new address. Promoted
    /// objects are black, except those pointing at semispace objects the
    /// next scavenge has not reached, which are shaded grey.
    ///
    /// Fails before touching the heap unless the semispace is open and can
    /// hold every nursery word not yet promoted, so a failed evacuation can
    /// be retried once space is available.
    pub fn evacuate(&mut self, semi: &mut SemiSpace, handle: &mut Address) -> GcResult<()> {
        self.check_reserve(semi)?;

        let mut pending = PendingList::new();
        *handle = self.promote(semi, *handle, &mut pending)?;

        while let Some(obj) = pending.pop() {
            let ptrs = semi.read_header(obj).tag().info().ptrs;
            let mut needs_scan = false;

            for i in 0..ptrs {
                let child = Address::from_word(semi.read_field(obj, i));
                if child.is_null() {
                    continue;
                }
                let moved = self.promote(semi, child, &mut pending)?;
                if moved != child {
                    semi.write_field(obj, i, moved.to_word());
                }
                needs_scan |= semi.needs_scan(moved);
            }

            if needs_scan && semi.in_to_space(obj) {
                semi.shade_grey(obj);
            }
        }
        Ok(())
    }

    /// Ensure promotion cannot run out of room partway through.
    ///
    /// Every copy moves words from the unpromoted remainder into the
    /// semispace, so `free >= remainder` holds across a whole episode once
    /// it holds at the start.
    pub fn check_reserve(&self, semi: &SemiSpace) -> GcResult<()> {
        if semi.is_closed() {
            return Err(GcError::SpaceClosed);
        }
        let remainder = self.space.allocated() - self.promoted_words;
        if semi.free() < remainder {
            return Err(GcError::OutOfMemory {
                space: SpaceKind::SemiSpace,
                requested: remainder,
                available: semi.free(),
            });
        }
        Ok(())
    }

    /// Move one object out of the nursery, or return where it already is.
    fn promote(
        &mut self,
        semi: &mut SemiSpace,
        obj: Address,
        pending: &mut PendingList,
    ) -> GcResult<Address> {
        if !self.member(obj) {
            return Ok(Self::promote_resident(semi, obj, pending));
        }

        let header = self.read_header(obj);
        if let Some(to) = header.forward_ptr() {
            log::trace!("nursery: {:?} already forwarded to {:?}", obj, to);
            return Ok(to);
        }

        let info = header.tag().info();
        let size = info.size_words();
        let promoted = Header::object(header.tag(), Generation::SemiSpace, false, semi.black_bit());
        let copy = semi.copy_in(self.space.slice(obj, size), promoted)?;
        self.write_indirection(obj, copy);

        self.promoted_objects += 1;
        self.promoted_words += size;
        if info.has_pointers() {
            pending.push(copy);
        }

        log::trace!("nursery: promoted {:?} -> {:?} ({} words)", obj, copy, size);
        Ok(copy)
    }

    /// Handle a reference that does not point into the nursery: follow a
    /// semispace forwarding record, or promote a bypass object in place.
    fn promote_resident(semi: &mut SemiSpace, obj: Address, pending: &mut PendingList) -> Address {
        if !semi.contains(obj) {
            return obj;
        }
        let header = semi.read_header(obj);
        if let Some(to) = header.forward_ptr() {
            return to;
        }
        if header.generation() == Generation::Nursery {
            semi.promote_in_place(obj);
            if header.tag().info().has_pointers() {
                pending.push(obj);
            }
            log::trace!("nursery: promoted bypass object {:?} in place", obj);
        }
        obj
    }

    /// Empty the nursery after every root has been evacuated.
    ///
    /// Ends the [`TimerKey::Gen0`] timer and records the semispace occupancy
    /// and this episode's promotions.
    pub fn reset(&mut self, semi: &SemiSpace, stats: &mut GcStats) {
        let elapsed = stats.timer_end(TimerKey::Gen0);
        stats.record_size(TimerKey::Gen0, semi.size());
        stats.record_promotion(self.promoted_objects, self.promoted_words);

        log::debug!(
            "nursery reset: {} of {} words promoted ({} objects), {:?}",
            self.promoted_words,
            self.space.allocated(),
            self.promoted_objects,
            elapsed
        );

        self.space.reset();
        self.promoted_objects = 0;
        self.promoted_words = 0;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get words allocated.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.space.allocated()
    }

    /// Get remaining free words.
    #[inline]
    pub fn free(&self) -> usize {
        self.space.free()
    }

    /// Get the capacity in words.
    #[inline]
    pub fn size(&self) -> usize {
        self.space.capacity()
    }

    /// Words promoted since the last reset.
    #[inline]
    pub fn promoted_words(&self) -> usize {
        self.promoted_words
    }

    /// Objects promoted since the last reset.
    #[inline]
    pub fn promoted_objects(&self) -> usize {
        self.promoted_objects
    }

    /// Check if nursery is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.space.free() == 0
    }

    /// Get usage ratio (0.0 to 1.0).
    #[inline]
    pub fn usage_ratio(&self) -> f64 {
        self.allocated() as f64 / self.size() as f64
    }
}

impl Default for Nursery {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ObjectStore for Nursery {
    #[inline]
    fn contains(&self, addr: Address) -> bool {
        self.space.contains(addr)
    }

    #[inline]
    fn load(&self, addr: Address) -> Word {
        self.space.load(addr)
    }
}

impl ObjectStoreMut for Nursery {
    #[inline]
    fn store(&mut self, addr: Address, word: Word) {
        self.space.store(addr, word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{MkBranch, MkLeaf, MkNode, MkUnit, Tag};

    #[test]
    fn test_nursery_creation() {
        let nursery = Nursery::new(64);
        assert_eq!(nursery.size(), 64);
        assert_eq!(nursery.allocated(), 0);
        assert!(!nursery.is_bypassing());
    }

    #[test]
    fn test_nursery_allocation() {
        let mut nursery = Nursery::new(64);

        let a1 = nursery.allocate(None, MkLeaf { n: 1 }).unwrap();
        assert_eq!(nursery.allocated(), 2);

        let a2 = nursery.allocate(None, MkBranch { left: a1, right: a1 }).unwrap();
        assert_eq!(nursery.allocated(), 5);

        // Objects should be consecutive
        assert_eq!(a2.words_since(a1), 2);
    }

    #[test]
    fn test_allocate_read_round_trip() {
        let mut nursery = Nursery::new(64);
        let leaf = nursery.allocate(None, MkLeaf { n: 10 }).unwrap();

        let header = nursery.read_header(leaf);
        assert_eq!(header.tag(), Tag::Leaf);
        assert_eq!(header.generation(), Generation::Nursery);
        assert!(!header.is_grey());
        assert_eq!(nursery.read_as::<MkLeaf>(leaf).n, 10);
        assert_eq!(nursery.read_object(leaf), Object::Leaf(MkLeaf { n: 10 }));
    }

    #[test]
    fn test_nursery_exhaustion() {
        let mut nursery = Nursery::new(16);

        for _ in 0..16 {
            nursery.allocate(None, MkUnit).unwrap();
        }

        // Should fail - nursery is full
        let err = nursery.allocate(None, MkUnit).unwrap_err();
        assert!(err.is_out_of_memory());
        assert!(nursery.is_full());
    }

    #[test]
    fn test_partial_fit_fails() {
        let mut nursery = Nursery::new(16);
        for _ in 0..5 {
            nursery.allocate(None, MkBranch::default()).unwrap();
        }
        assert_eq!(nursery.free(), 1);
        assert!(nursery.allocate(None, MkLeaf { n: 0 }).is_err());
        assert!(nursery.allocate(None, MkUnit).is_ok());
    }

    #[test]
    fn test_nursery_member() {
        let mut nursery = Nursery::new(64);
        let addr = nursery.allocate(None, MkUnit).unwrap();
        assert!(nursery.member(addr));
        assert!(!nursery.member(Address::NULL));
    }

    #[test]
    fn test_evacuate_promotes() {
        let mut nursery = Nursery::new(64);
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();
        let mut leaf = nursery.allocate(Some(&mut semi), MkLeaf { n: 10 }).unwrap();

        stats.timer_begin(TimerKey::Gen0);
        nursery.evacuate(&mut semi, &mut leaf).unwrap();
        nursery.reset(&semi, &mut stats);

        assert!(!nursery.member(leaf));
        let header = semi.read_header(leaf);
        assert_eq!(header.generation(), Generation::SemiSpace);
        assert!(header.is_black(semi.black_bit()));
        assert_eq!(semi.read_as::<MkLeaf>(leaf).n, 10);
        assert_eq!(stats.episodes(TimerKey::Gen0), 1);
        assert_eq!(stats.objects_promoted, 1);
        assert_eq!(stats.words_promoted, 2);
        assert_eq!(nursery.allocated(), 0);
    }

    #[test]
    fn test_evacuate_forwards_children() {
        let mut nursery = Nursery::new(64);
        let mut semi = SemiSpace::new(64);
        let leaf = nursery.allocate(None, MkLeaf { n: 10 }).unwrap();
        let mut branch = nursery.allocate(None, MkBranch { left: leaf, right: leaf }).unwrap();

        nursery.evacuate(&mut semi, &mut branch).unwrap();

        assert!(nursery.read_header(leaf).is_forward_ptr());
        let copy = semi.read_as::<MkBranch>(branch);
        assert_eq!(copy.left, copy.right);
        assert!(!nursery.member(copy.left));
        assert_eq!(semi.size(), 5);
        assert_eq!(nursery.promoted_objects(), 2);
    }

    #[test]
    fn test_evacuate_forwarded_rewrites_only() {
        let mut nursery = Nursery::new(64);
        let mut semi = SemiSpace::new(64);
        let mut a = nursery.allocate(None, MkLeaf { n: 1 }).unwrap();
        let mut b = a;

        nursery.evacuate(&mut semi, &mut a).unwrap();
        nursery.evacuate(&mut semi, &mut b).unwrap();

        assert_eq!(a, b);
        assert_eq!(semi.size(), 2);
    }

    #[test]
    fn test_evacuate_list_promotes_whole_chain() {
        let mut nursery = Nursery::new(64);
        let mut semi = SemiSpace::new(64);
        let mut head = Address::NULL;
        for value in 0..4 {
            head = nursery.allocate(None, MkNode { next: head, value }).unwrap();
        }

        nursery.evacuate(&mut semi, &mut head).unwrap();

        let mut values = Vec::new();
        let mut cursor = head;
        while !cursor.is_null() {
            assert!(semi.contains(cursor));
            let node = semi.read_as::<MkNode>(cursor);
            values.push(node.value);
            cursor = node.next;
        }
        assert_eq!(values, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_pointer_into_from_space_shades_grey() {
        let mut nursery = Nursery::new(64);
        let mut semi = SemiSpace::new(64);
        let mut stats = GcStats::new();

        let mut old = nursery.allocate(None, MkLeaf { n: 1 }).unwrap();
        nursery.evacuate(&mut semi, &mut old).unwrap();
        nursery.reset(&semi, &mut stats);
        semi.scavenge(&mut stats).unwrap();
        assert!(semi.in_from_space(old));

        let mut young = nursery.allocate(None, MkNode { next: old, value: 2 }).unwrap();
        nursery.evacuate(&mut semi, &mut young).unwrap();

        assert!(semi.read_header(young).is_grey());
        assert_eq!(semi.grey_count(), 1);
    }

    #[test]
    fn test_bypass_allocates_in_semispace() {
        let mut nursery = Nursery::new(64);
        let mut semi = SemiSpace::new(64);
        nursery.bypass();

        let mut leaf = nursery.allocate(Some(&mut semi), MkLeaf { n: 10 }).unwrap();
        let before = leaf;
        assert_eq!(nursery.allocated(), 0);
        assert!(semi.in_to_space(leaf));
        assert_eq!(semi.read_header(leaf).generation(), Generation::Nursery);

        nursery.evacuate(&mut semi, &mut leaf).unwrap();

        assert_eq!(leaf, before);
        let header = semi.read_header(leaf);
        assert_eq!(header.generation(), Generation::SemiSpace);
        assert!(!header.is_grey());
        assert_eq!(header.black(), semi.black_bit());
    }

    #[test]
    fn test_evacuate_without_room_leaves_graph_intact() {
        let mut nursery = Nursery::new(16);
        let mut semi = SemiSpace::new(16);
        nursery.bypass();
        for _ in 0..12 {
            nursery.allocate(Some(&mut semi), MkUnit).unwrap();
        }
        nursery.set_bypass(false);

        let leaf = nursery.allocate(None, MkLeaf { n: 42 }).unwrap();
        let branch = nursery.allocate(None, MkBranch { left: leaf, right: leaf }).unwrap();
        let mut handle = branch;

        let err = nursery.evacuate(&mut semi, &mut handle).unwrap_err();

        assert!(err.is_out_of_memory());
        assert_eq!(handle, branch);
        assert_eq!(semi.free(), 4);
        assert_eq!(nursery.promoted_words(), 0);
        assert!(!nursery.read_header(branch).is_forward_ptr());
        assert!(!nursery.read_header(leaf).is_forward_ptr());
        assert_eq!(nursery.read_as::<MkBranch>(branch).left, leaf);
        assert_eq!(nursery.read_as::<MkLeaf>(leaf).n, 42);
    }

    #[test]
    fn test_bypass_without_semispace_uses_nursery() {
        let mut nursery = Nursery::new(64);
        nursery.bypass();
        let leaf = nursery.allocate(None, MkLeaf { n: 1 }).unwrap();
        assert!(nursery.member(leaf));
    }

    #[test]
    fn test_init_clears_bypass() {
        let mut nursery = Nursery::new(64);
        nursery.bypass();
        nursery.allocate(None, MkUnit).unwrap();
        nursery.init();
        assert!(!nursery.is_bypassing());
        assert_eq!(nursery.allocated(), 0);
    }
}
