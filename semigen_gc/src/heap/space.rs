//! Bump-allocated word buffer.
//!
//! Each space owns a boxed slice of words and a disjoint range of the
//! collector's address space. Allocation is O(1):
//!
//! ```text
//! cursor += size;
//! return start + cursor - size;
//! ```

use crate::object::{Address, Word};
use std::sync::atomic::{AtomicUsize, Ordering};

/// First address handed out. Keeps [`Address::NULL`] outside every space.
const FIRST_ADDRESS: usize = 0x1000;

/// Words left unmapped between consecutive spaces.
const GUARD_WORDS: usize = 0x100;

static NEXT_ADDRESS: AtomicUsize = AtomicUsize::new(FIRST_ADDRESS);

/// Reserve `words` addresses that no other space will ever use.
fn reserve(words: usize) -> Address {
    let span = words + GUARD_WORDS;
    Address::from_usize(NEXT_ADDRESS.fetch_add(span, Ordering::Relaxed))
}

/// A contiguous word buffer with a bump cursor.
pub(crate) struct Space {
    /// First address of the buffer.
    start: Address,
    /// Backing words.
    words: Box<[Word]>,
    /// Words in use.
    cursor: usize,
}

impl Space {
    /// Allocate a new zeroed space of `capacity` words.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            start: reserve(capacity),
            words: vec![0; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Try to allocate `size` words.
    #[inline]
    pub(crate) fn alloc(&mut self, size: usize) -> Option<Address> {
        let end = self.cursor + size;
        if end > self.words.len() {
            return None; // Space exhausted
        }
        let addr = self.start.offset(self.cursor);
        self.cursor = end;
        Some(addr)
    }

    /// Check if an address is within this space.
    #[inline]
    pub(crate) fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr.words_since(self.start) < self.words.len()
    }

    #[inline]
    fn index(&self, addr: Address) -> usize {
        assert!(
            self.contains(addr),
            "invalid dereference: {:?} outside space {:?}+{}",
            addr,
            self.start,
            self.words.len()
        );
        addr.words_since(self.start)
    }

    #[inline]
    pub(crate) fn load(&self, addr: Address) -> Word {
        self.words[self.index(addr)]
    }

    #[inline]
    pub(crate) fn store(&mut self, addr: Address, word: Word) {
        let i = self.index(addr);
        self.words[i] = word;
    }

    /// Borrow `len` words starting at `addr`.
    #[inline]
    pub(crate) fn slice(&self, addr: Address, len: usize) -> &[Word] {
        let i = self.index(addr);
        &self.words[i..i + len]
    }

    /// Mutably borrow `len` words starting at `addr`.
    #[inline]
    pub(crate) fn slice_mut(&mut self, addr: Address, len: usize) -> &mut [Word] {
        let i = self.index(addr);
        &mut self.words[i..i + len]
    }

    /// Get words allocated in this space.
    #[inline]
    pub(crate) fn allocated(&self) -> usize {
        self.cursor
    }

    /// Get remaining free words.
    #[inline]
    pub(crate) fn free(&self) -> usize {
        self.words.len() - self.cursor
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub(crate) fn start(&self) -> Address {
        self.start
    }

    /// Current allocation pointer.
    #[inline]
    pub(crate) fn alloc_ptr(&self) -> Address {
        self.start.offset(self.cursor)
    }

    /// Reset the space for reuse.
    pub(crate) fn reset(&mut self) {
        // Zero memory so stale handles fail loudly in debug builds
        #[cfg(debug_assertions)]
        self.words[..self.cursor].fill(0);

        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_allocation() {
        let mut space = Space::new(16);

        let a1 = space.alloc(4).unwrap();
        assert_eq!(space.allocated(), 4);

        let a2 = space.alloc(4).unwrap();
        assert_eq!(space.allocated(), 8);

        // Allocations should be consecutive
        assert_eq!(a2.words_since(a1), 4);
        assert_eq!(space.alloc_ptr(), a2.offset(4));
    }

    #[test]
    fn test_space_exhaustion() {
        let mut space = Space::new(8);

        assert!(space.alloc(8).is_some());
        assert_eq!(space.free(), 0);
        assert!(space.alloc(1).is_none());
    }

    #[test]
    fn test_spaces_are_disjoint() {
        let a = Space::new(32);
        let b = Space::new(32);
        assert!(!a.contains(b.start()));
        assert!(!b.contains(a.start()));
        assert!(!a.contains(Address::NULL));
        assert!(!a.contains(a.start().offset(a.capacity())));
    }

    #[test]
    fn test_load_store() {
        let mut space = Space::new(4);
        let addr = space.alloc(2).unwrap();
        space.store(addr.offset(1), 99);
        assert_eq!(space.load(addr.offset(1)), 99);
        assert_eq!(space.slice(addr, 2), &[0, 99]);
    }

    #[test]
    fn test_reset() {
        let mut space = Space::new(4);
        space.alloc(4).unwrap();
        space.reset();
        assert_eq!(space.allocated(), 0);
        assert_eq!(space.free(), 4);
    }

    #[test]
    #[should_panic(expected = "invalid dereference")]
    fn test_foreign_address_panics() {
        let space = Space::new(4);
        space.load(Address::NULL);
    }
}
