//! Interned symbol identifier.

use std::fmt;
use std::num::NonZeroU32;

/// Interned name identifier.
///
/// The raw value is never zero: the symbol table uses zero to mark an empty
/// bucket, so making the niche part of the type keeps that invariant out of
/// every probe loop (and gives `Option<Symbol>` the size of a `u32`).
///
/// Values below [`Symbol::FIRST_INTERNED`] are reserved for names the host
/// registers with fixed ids; the interner mints ids from there upward.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Symbol(NonZeroU32);

impl Symbol {
    /// First id handed out by the interner.
    pub const FIRST_INTERNED: u32 = 500;

    /// Create from a raw id. Returns `None` for zero.
    #[inline]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(raw) => Some(Symbol(raw)),
            None => None,
        }
    }

    /// Get raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0.get()
    }

    /// Whether this id is in the host-reserved range.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        self.0.get() < Self::FIRST_INTERNED
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.raw())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw())
    }
}
