//! Typed payloads for each tag.
//!
//! A shape knows how to lay its fields out in payload words: pointer fields
//! first, in declaration order, then primitive fields. Field counts always
//! match [`INFO_TABLE`](super::INFO_TABLE).

use super::layout::Tag;
use super::{Address, Word};

/// A fixed payload layout bound to one tag.
pub trait Shape: Sized {
    /// The tag objects of this shape carry.
    const TAG: Tag;

    /// Write the payload into `out` (exactly the tag's payload words).
    fn encode(&self, out: &mut [Word]);

    /// Rebuild the payload from its words.
    fn decode(words: &[Word]) -> Self;
}

/// Header-only object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MkUnit;

/// A boxed integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MkLeaf {
    pub n: i64,
}

/// Two child references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MkBranch {
    pub left: Address,
    pub right: Address,
}

/// A list cell. `next` may be [`Address::NULL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MkNode {
    pub next: Address,
    pub value: i64,
}

impl Shape for MkUnit {
    const TAG: Tag = Tag::Unit;

    fn encode(&self, _out: &mut [Word]) {}

    fn decode(_words: &[Word]) -> Self {
        MkUnit
    }
}

impl Shape for MkLeaf {
    const TAG: Tag = Tag::Leaf;

    fn encode(&self, out: &mut [Word]) {
        out[0] = self.n as Word;
    }

    fn decode(words: &[Word]) -> Self {
        Self { n: words[0] as i64 }
    }
}

impl Shape for MkBranch {
    const TAG: Tag = Tag::Branch;

    fn encode(&self, out: &mut [Word]) {
        out[0] = self.left.to_word();
        out[1] = self.right.to_word();
    }

    fn decode(words: &[Word]) -> Self {
        Self {
            left: Address::from_word(words[0]),
            right: Address::from_word(words[1]),
        }
    }
}

impl Shape for MkNode {
    const TAG: Tag = Tag::Node;

    fn encode(&self, out: &mut [Word]) {
        out[0] = self.next.to_word();
        out[1] = self.value as Word;
    }

    fn decode(words: &[Word]) -> Self {
        Self {
            next: Address::from_word(words[0]),
            value: words[1] as i64,
        }
    }
}

/// Constructor payload for any tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Object {
    Unit(MkUnit),
    Leaf(MkLeaf),
    Branch(MkBranch),
    Node(MkNode),
}

impl Object {
    /// Tag of this payload.
    #[inline]
    pub fn tag(&self) -> Tag {
        match self {
            Object::Unit(_) => Tag::Unit,
            Object::Leaf(_) => Tag::Leaf,
            Object::Branch(_) => Tag::Branch,
            Object::Node(_) => Tag::Node,
        }
    }

    /// Allocation size in words, header included.
    #[inline]
    pub fn size_words(&self) -> usize {
        self.tag().info().size_words()
    }

    /// Write the payload words into `out`.
    pub fn encode(&self, out: &mut [Word]) {
        debug_assert_eq!(out.len(), self.tag().info().payload_words());
        match self {
            Object::Unit(s) => s.encode(out),
            Object::Leaf(s) => s.encode(out),
            Object::Branch(s) => s.encode(out),
            Object::Node(s) => s.encode(out),
        }
    }

    /// Rebuild a payload of `tag` from its words.
    pub fn decode(tag: Tag, words: &[Word]) -> Self {
        debug_assert_eq!(words.len(), tag.info().payload_words());
        match tag {
            Tag::Unit => Object::Unit(MkUnit::decode(words)),
            Tag::Leaf => Object::Leaf(MkLeaf::decode(words)),
            Tag::Branch => Object::Branch(MkBranch::decode(words)),
            Tag::Node => Object::Node(MkNode::decode(words)),
        }
    }
}

impl From<MkUnit> for Object {
    fn from(s: MkUnit) -> Self {
        Object::Unit(s)
    }
}

impl From<MkLeaf> for Object {
    fn from(s: MkLeaf) -> Self {
        Object::Leaf(s)
    }
}

impl From<MkBranch> for Object {
    fn from(s: MkBranch) -> Self {
        Object::Branch(s)
    }
}

impl From<MkNode> for Object {
    fn from(s: MkNode) -> Self {
        Object::Node(s)
    }
}
