//! Per-tag object layout table.
//!
//! The table is indexed by [`Tag`] and gives the number of pointer and
//! primitive payload words of each shape. It drives allocation sizing and
//! reference tracing; there is no other source of object size.
//!
//! ```text
//! ┌────────┬──────┬───────┬────────────┐
//! │ Tag    │ ptrs │ prims │ size words │
//! ├────────┼──────┼───────┼────────────┤
//! │ Unit   │  0   │   0   │     1      │
//! │ Leaf   │  0   │   1   │     2      │
//! │ Branch │  2   │   0   │     3      │
//! │ Node   │  1   │   1   │     3      │
//! └────────┴──────┴───────┴────────────┘
//! ```

/// Number of distinct object tags.
pub const TAG_MAX: usize = 4;

/// Object shape identifier stored in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// No payload.
    Unit = 0,
    /// One primitive word.
    Leaf = 1,
    /// Two pointer words.
    Branch = 2,
    /// A list cell: one pointer word (`next`) and one primitive word.
    Node = 3,
}

impl Tag {
    /// All tags in index order.
    pub const ALL: [Tag; TAG_MAX] = [Tag::Unit, Tag::Leaf, Tag::Branch, Tag::Node];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decode a tag stored in a header.
    #[inline]
    pub const fn from_index(index: u8) -> Option<Tag> {
        if (index as usize) < TAG_MAX {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Layout of objects with this tag.
    #[inline]
    pub fn info(self) -> &'static ObjectInfo {
        &INFO_TABLE[self.index()]
    }
}

/// Layout entry for one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Pointer-typed payload words (traced, stored first).
    pub ptrs: usize,
    /// Primitive payload words (never traced, stored after the pointers).
    pub prims: usize,
}

impl ObjectInfo {
    pub const fn new(ptrs: usize, prims: usize) -> Self {
        Self { ptrs, prims }
    }

    /// Payload size in words, header excluded.
    #[inline]
    pub const fn payload_words(&self) -> usize {
        self.ptrs + self.prims
    }

    /// Allocation size in words, header included.
    #[inline]
    pub const fn size_words(&self) -> usize {
        1 + self.payload_words()
    }

    /// Whether objects of this shape have references to trace.
    #[inline]
    pub const fn has_pointers(&self) -> bool {
        self.ptrs > 0
    }
}

/// The layout table. One entry per tag, in tag order.
pub static INFO_TABLE: [ObjectInfo; TAG_MAX] = [
    ObjectInfo::new(0, 0), // Unit
    ObjectInfo::new(0, 1), // Leaf
    ObjectInfo::new(2, 0), // Branch
    ObjectInfo::new(1, 1), // Node
];
