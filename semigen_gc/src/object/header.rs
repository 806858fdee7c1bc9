//! Packed single-word object header.
//!
//! A header word has two interpretations, selected by bit 0:
//!
//! ```text
//!  object header (bit 0 = 0)
//!  63                      12   11    10    9    8        1   0
//! ┌──────────────────────────┬─────┬─────┬─────┬──────────┬───┐
//! │         reserved         │black│grey │ gen │   tag    │ 0 │
//! └──────────────────────────┴─────┴─────┴─────┴──────────┴───┘
//!
//!  forwarding record (bit 0 = 1)
//!  63                                                   1   0
//! ┌──────────────────────────────────────────────────────┬───┐
//! │                relocation target address             │ 1 │
//! └──────────────────────────────────────────────────────┴───┘
//! ```
//!
//! The two views never coexist: writing a forwarding record destroys the
//! tag, generation and mark bits. Decoding object fields from a forwarding
//! record is an invalid dereference and trips a debug assertion.

use super::layout::Tag;
use super::{Address, Word};
use crate::{GcColor, Generation};
use bitfield_struct::bitfield;
use std::fmt;

/// Object view of a header word.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
struct ObjectBits {
    is_forward: bool,
    #[bits(8)]
    tag: u8,
    #[bits(1)]
    generation: u8,
    grey: bool,
    black: bool,
    #[bits(52)]
    __: u64,
}

/// Forwarding view of a header word.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
struct ForwardBits {
    is_forward: bool,
    #[bits(63)]
    target: u64,
}

/// A decoded header word.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Header(Word);

impl Header {
    /// Build an object header.
    #[inline]
    pub fn object(tag: Tag, generation: Generation, grey: bool, black: bool) -> Self {
        let bits = ObjectBits::new()
            .with_tag(tag as u8)
            .with_generation(generation as u8)
            .with_grey(grey)
            .with_black(black);
        Self(bits.into_bits())
    }

    /// Build a forwarding record pointing at `to`.
    #[inline]
    pub fn forwarding(to: Address) -> Self {
        debug_assert!(!to.is_null(), "forwarding to null");
        let bits = ForwardBits::new()
            .with_is_forward(true)
            .with_target(to.to_word());
        Self(bits.into_bits())
    }

    #[inline]
    pub const fn from_raw(raw: Word) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> Word {
        self.0
    }

    /// True when this word is a forwarding record.
    #[inline]
    pub fn is_forward_ptr(self) -> bool {
        ObjectBits::from_bits(self.0).is_forward()
    }

    /// The relocation target, if this word is a forwarding record.
    #[inline]
    pub fn forward_ptr(self) -> Option<Address> {
        let bits = ForwardBits::from_bits(self.0);
        bits.is_forward()
            .then(|| Address::from_word(bits.target()))
    }

    #[inline]
    fn bits(self) -> ObjectBits {
        debug_assert!(
            !self.is_forward_ptr(),
            "object field read from forwarding record {:#x}",
            self.0
        );
        ObjectBits::from_bits(self.0)
    }

    /// The object's tag.
    ///
    /// # Panics
    ///
    /// Panics if the tag bits do not name a known tag (a corrupted or
    /// forwarded header).
    #[inline]
    pub fn tag(self) -> Tag {
        let raw = self.bits().tag();
        match Tag::from_index(raw) {
            Some(tag) => tag,
            None => panic!("invalid tag {} in header {:#x}", raw, self.0),
        }
    }

    #[inline]
    pub fn generation(self) -> Generation {
        Generation::from_bit(self.bits().generation())
    }

    #[inline]
    pub fn is_grey(self) -> bool {
        self.bits().grey()
    }

    /// Raw black bit. Only meaningful compared against a space's parity.
    #[inline]
    pub fn black(self) -> bool {
        self.bits().black()
    }

    /// True when the object is fully traced for the epoch whose parity is
    /// `black_bit`.
    #[inline]
    pub fn is_black(self, black_bit: bool) -> bool {
        let bits = self.bits();
        !bits.grey() && bits.black() == black_bit
    }

    /// Tri-color state under parity `black_bit`.
    #[inline]
    pub fn color(self, black_bit: bool) -> GcColor {
        if self.is_grey() {
            GcColor::Grey
        } else if self.black() == black_bit {
            GcColor::Black
        } else {
            GcColor::White
        }
    }

    #[inline]
    pub fn with_generation(self, generation: Generation) -> Self {
        Self(self.bits().with_generation(generation as u8).into_bits())
    }

    #[inline]
    pub fn with_grey(self, grey: bool) -> Self {
        Self(self.bits().with_grey(grey).into_bits())
    }

    #[inline]
    pub fn with_black(self, black: bool) -> Self {
        Self(self.bits().with_black(black).into_bits())
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.forward_ptr() {
            Some(to) => f.debug_tuple("Forward").field(&to).finish(),
            None => f
                .debug_struct("Header")
                .field("tag", &self.tag())
                .field("gen", &self.generation())
                .field("grey", &self.is_grey())
                .field("black", &self.black())
                .finish(),
        }
    }
}
