//! Object model: word addresses, headers, per-tag layouts and payload shapes.
//!
//! Every heap object is a header word followed by a fixed number of payload
//! words determined by its tag:
//!
//! ```text
//! ┌──────────┬───────────────┬────────────────┐
//! │  header  │ pointer words │ primitive words│
//! └──────────┴───────────────┴────────────────┘
//!  ▲ handle    InfoTable[tag].ptrs  InfoTable[tag].prims
//! ```
//!
//! Handles are [`Address`]es of the header word. Spaces own the words and
//! expose them through [`ObjectStore`] / [`ObjectStoreMut`]; nothing outside
//! [`header`] touches raw header bits.

pub mod header;
pub mod layout;
pub mod shapes;

pub use header::Header;
pub use layout::{ObjectInfo, Tag, INFO_TABLE, TAG_MAX};
pub use shapes::{MkBranch, MkLeaf, MkNode, MkUnit, Object, Shape};

use std::fmt;

/// One heap word.
pub type Word = u64;

/// A word address in the collector's address space.
///
/// Addresses count words, not bytes. Each space reserves a disjoint range of
/// addresses when it is created, so an address identifies both the space and
/// the slot inside it. [`Address::NULL`] never belongs to any space.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(usize);

impl Address {
    /// The null address (empty pointer field).
    pub const NULL: Address = Address(0);

    /// Build an address from a raw word index.
    #[inline]
    pub const fn from_usize(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw word index.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Decode an address stored in a pointer field.
    #[inline]
    pub const fn from_word(word: Word) -> Self {
        Self(word as usize)
    }

    /// Encode this address for storage in a pointer field.
    #[inline]
    pub const fn to_word(self) -> Word {
        self.0 as Word
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `words` words past this one.
    #[inline]
    pub const fn offset(self, words: usize) -> Self {
        Self(self.0 + words)
    }

    /// Address of payload word `index` of the object whose header is here.
    #[inline]
    pub const fn field(self, index: usize) -> Self {
        self.offset(1 + index)
    }

    /// Number of words from `base` up to this address.
    #[inline]
    pub const fn words_since(self, base: Address) -> usize {
        self.0 - base.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:#x}", self.0)
    }
}

/// Read access to heap words.
///
/// Implemented by each space and by the [`GcHeap`](crate::GcHeap) facade.
/// Reading an address the store does not contain is an invalid dereference
/// and panics.
pub trait ObjectStore {
    /// Check whether `addr` lies inside this store.
    fn contains(&self, addr: Address) -> bool;

    /// Load the word at `addr`.
    fn load(&self, addr: Address) -> Word;

    /// Decode the header of the object at `handle`.
    #[inline]
    fn read_header(&self, handle: Address) -> Header {
        Header::from_raw(self.load(handle))
    }

    /// Read payload word `index` of the object at `handle`.
    #[inline]
    fn read_field(&self, handle: Address, index: usize) -> Word {
        self.load(handle.field(index))
    }

    /// Read the object at `handle` as its tag's shape.
    fn read_object(&self, handle: Address) -> Object {
        let header = self.read_header(handle);
        debug_assert!(
            !header.is_forward_ptr(),
            "read_object through forwarding stub at {:?}",
            handle
        );
        let tag = header.tag();
        let words: Vec<Word> = (0..tag.info().payload_words())
            .map(|i| self.read_field(handle, i))
            .collect();
        Object::decode(tag, &words)
    }

    /// Read the object at `handle` as shape `S`.
    ///
    /// The object's tag must be `S::TAG`; reading through the wrong shape is
    /// checked in debug builds only.
    fn read_as<S: Shape>(&self, handle: Address) -> S
    where
        Self: Sized,
    {
        let header = self.read_header(handle);
        debug_assert!(!header.is_forward_ptr(), "read_as through forwarding stub at {:?}", handle);
        debug_assert_eq!(header.tag(), S::TAG, "shape mismatch at {:?}", handle);
        let words: Vec<Word> = (0..S::TAG.info().payload_words())
            .map(|i| self.read_field(handle, i))
            .collect();
        S::decode(&words)
    }
}

/// Write access to heap words.
pub trait ObjectStoreMut: ObjectStore {
    /// Store `word` at `addr`.
    fn store(&mut self, addr: Address, word: Word);

    /// Overwrite the header of the object at `handle`.
    #[inline]
    fn write_header(&mut self, handle: Address, header: Header) {
        self.store(handle, header.raw());
    }

    /// Replace the header at `from` with a forwarding record pointing at `to`.
    ///
    /// The tag, generation and mark bits at `from` are lost; readers must
    /// check [`Header::forward_ptr`] before interpreting the object.
    #[inline]
    fn write_indirection(&mut self, from: Address, to: Address) {
        self.write_header(from, Header::forwarding(to));
    }

    /// Write payload word `index` of the object at `handle`.
    #[inline]
    fn write_field(&mut self, handle: Address, index: usize, word: Word) {
        self.store(handle.field(index), word);
    }
}
