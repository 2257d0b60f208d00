// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The fixed catalog of primitive datatypes.
//!
//! There are exactly 5 + 14*3 = 47 predefined primitives, numbered 1..50:
//!
//! ```text
//!      1  |u1  |i1  |b1  |S1  |U1
//!      6  |u2  |i2  |f2  |c4  |U2
//!     11  |u4  |i4  |f4  |c8  |U4
//!     16  |u8  |i8  |f8  |c16  -
//!     21  <u2  <i2  <f2  <c4  <U2
//!     26  <u4  <i4  <f4  <c8  <U4
//!     31  <u8  <i8  <f8  <c16  -
//!     36  >u2  >i2  >f2  >c4  >U2
//!     41  >u4  >i4  >f4  >c8  >U4
//!     46  >u8  >i8  >f8  >c16  -
//! ```
//!
//! With this numbering an indeterminate multibyte type 5 < id < 21 resolves
//! to little-endian by adding 15, or to big-endian by adding 30.  Ids 20,
//! 35, and 50 are reserved for a quad precision `f16`.  Id 0 is not a
//! primitive at all: it denotes the empty compound `{}`, which occupies no
//! space in the data stream.
//!
//! The catalog is a pure constant table; nothing here is process-global
//! state.

/// Byte-order tag of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// `|` - indeterminate (single-byte types, or order fixed later).
    #[default]
    Indeterminate,
    /// `<` - least significant byte first.
    Little,
    /// `>` - most significant byte first.
    Big,
}

impl Order {
    /// The single-character spelling used in Dudley source.
    pub fn mark(self) -> char {
        match self {
            Order::Indeterminate => '|',
            Order::Little => '<',
            Order::Big => '>',
        }
    }

    /// Parse an order mark character.
    pub fn from_mark(c: char) -> Option<Order> {
        match c {
            '|' => Some(Order::Indeterminate),
            '<' => Some(Order::Little),
            '>' => Some(Order::Big),
            _ => None,
        }
    }
}

/// Value kind of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    /// `u` - unsigned integer.
    Unsigned,
    /// `i` - signed integer (two's complement).
    Signed,
    /// `f` - IEEE 754 floating point.
    Float,
    /// `c` - complex (pair of floats).
    Complex,
    /// `S` - ASCII (or CP1252/Latin1) character.
    Char,
    /// `U` - unicode (UTF-8 byte, UTF-16, or UTF-32).
    Unicode,
    /// `b` - boolean byte.
    Bool,
}

impl PrimKind {
    /// The single-character spelling used in Dudley source.
    pub fn code(self) -> char {
        match self {
            PrimKind::Unsigned => 'u',
            PrimKind::Signed => 'i',
            PrimKind::Float => 'f',
            PrimKind::Complex => 'c',
            PrimKind::Char => 'S',
            PrimKind::Unicode => 'U',
            PrimKind::Bool => 'b',
        }
    }
}

/// One primitive datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prim {
    /// Full spelling with order prefix, e.g. `"<f8"`.
    pub name: &'static str,
    pub order: Order,
    pub kind: PrimKind,
    /// Bytes per scalar value.
    pub size: u32,
    /// Default alignment: size, except complex whose alignment is the size
    /// of one of its two floats.
    pub align: u32,
}

/// Largest assigned primitive id (20, 35, 50 are reserved holes).
pub const MAX_PRIM_ID: u32 = 50;

const fn p(
    name: &'static str,
    order: Order,
    kind: PrimKind,
    size: u32,
    align: u32,
) -> Option<Prim> {
    Some(Prim {
        name,
        order,
        kind,
        size,
        align,
    })
}

use Order::{Big, Indeterminate as Ind, Little};
use PrimKind::{Bool, Char, Complex, Float, Signed, Unicode, Unsigned};

/// The catalog, indexed by primitive id.  Index 0 and the reserved ids are
/// `None`.
static CATALOG: [Option<Prim>; 51] = [
    None,
    // 1..5: single byte, order is irrelevant
    p("|u1", Ind, Unsigned, 1, 1),
    p("|i1", Ind, Signed, 1, 1),
    p("|b1", Ind, Bool, 1, 1),
    p("|S1", Ind, Char, 1, 1),
    p("|U1", Ind, Unicode, 1, 1),
    // 6..19: indeterminate order
    p("|u2", Ind, Unsigned, 2, 2),
    p("|i2", Ind, Signed, 2, 2),
    p("|f2", Ind, Float, 2, 2),
    p("|c4", Ind, Complex, 4, 2),
    p("|U2", Ind, Unicode, 2, 2),
    p("|u4", Ind, Unsigned, 4, 4),
    p("|i4", Ind, Signed, 4, 4),
    p("|f4", Ind, Float, 4, 4),
    p("|c8", Ind, Complex, 8, 4),
    p("|U4", Ind, Unicode, 4, 4),
    p("|u8", Ind, Unsigned, 8, 8),
    p("|i8", Ind, Signed, 8, 8),
    p("|f8", Ind, Float, 8, 8),
    p("|c16", Ind, Complex, 16, 8),
    None, // 20 reserved for |f16
    // 21..34: little-endian
    p("<u2", Little, Unsigned, 2, 2),
    p("<i2", Little, Signed, 2, 2),
    p("<f2", Little, Float, 2, 2),
    p("<c4", Little, Complex, 4, 2),
    p("<U2", Little, Unicode, 2, 2),
    p("<u4", Little, Unsigned, 4, 4),
    p("<i4", Little, Signed, 4, 4),
    p("<f4", Little, Float, 4, 4),
    p("<c8", Little, Complex, 8, 4),
    p("<U4", Little, Unicode, 4, 4),
    p("<u8", Little, Unsigned, 8, 8),
    p("<i8", Little, Signed, 8, 8),
    p("<f8", Little, Float, 8, 8),
    p("<c16", Little, Complex, 16, 8),
    None, // 35 reserved for <f16
    // 36..49: big-endian
    p(">u2", Big, Unsigned, 2, 2),
    p(">i2", Big, Signed, 2, 2),
    p(">f2", Big, Float, 2, 2),
    p(">c4", Big, Complex, 4, 2),
    p(">U2", Big, Unicode, 2, 2),
    p(">u4", Big, Unsigned, 4, 4),
    p(">i4", Big, Signed, 4, 4),
    p(">f4", Big, Float, 4, 4),
    p(">c8", Big, Complex, 8, 4),
    p(">U4", Big, Unicode, 4, 4),
    p(">u8", Big, Unsigned, 8, 8),
    p(">i8", Big, Signed, 8, 8),
    p(">f8", Big, Float, 8, 8),
    p(">c16", Big, Complex, 16, 8),
    None, // 50 reserved for >f16
];

/// Look up a primitive by id.  O(1); `None` for 0, reserved, or
/// out-of-range ids.
pub fn by_id(id: u32) -> Option<&'static Prim> {
    CATALOG.get(id as usize).and_then(Option::as_ref)
}

/// Look up a primitive id by its full prefixed spelling, e.g. `"<f8"`.
pub fn id_of(name: &str) -> Option<u32> {
    // 47 entries, called on the cold path only (interning, HDF5 type
    // mapping); a linear scan beats carrying a lazy map.
    CATALOG
        .iter()
        .position(|e| matches!(e, Some(prim) if prim.name == name))
        .map(|i| i as u32)
}

/// Resolve an unprefixed spelling such as `"i4"` against a default order.
///
/// The unprefixed form names one of the 19 `|`-row kinds; a multibyte kind
/// is then shifted into the default order's row (`+15` little, `+30` big).
/// Single-byte kinds ignore the order.
pub fn unprefixed_id(name: &str, default_order: Order) -> Option<u32> {
    let mut prefixed = String::with_capacity(name.len() + 1);
    prefixed.push('|');
    prefixed.push_str(name);
    let id = id_of(&prefixed)?;
    if id < 6 {
        return Some(id); // order irrelevant for single-byte kinds
    }
    Some(match default_order {
        Order::Indeterminate => id,
        Order::Little => id + 15,
        Order::Big => id + 30,
    })
}

/// True when the id names a scalar integer primitive (`u` or `i` kind),
/// the only datatypes legal for a dynamic parameter.
pub fn is_integer(id: u32) -> bool {
    matches!(
        by_id(id),
        Some(prim) if matches!(prim.kind, PrimKind::Unsigned | PrimKind::Signed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_exactly_47_entries() {
        let n = CATALOG.iter().filter(|e| e.is_some()).count();
        assert_eq!(n, 47);
        assert!(CATALOG[0].is_none());
        assert!(CATALOG[20].is_none());
        assert!(CATALOG[35].is_none());
        assert!(CATALOG[50].is_none());
    }

    #[test]
    fn names_round_trip_through_id_of() {
        for (id, entry) in CATALOG.iter().enumerate() {
            if let Some(prim) = entry {
                assert_eq!(id_of(prim.name), Some(id as u32), "{}", prim.name);
            }
        }
    }

    #[test]
    fn order_shift_matches_numbering() {
        // |f8 is 18; <f8 must be 18+15, >f8 must be 18+30.
        assert_eq!(id_of("|f8"), Some(18));
        assert_eq!(id_of("<f8"), Some(33));
        assert_eq!(id_of(">f8"), Some(48));
        assert_eq!(unprefixed_id("f8", Order::Little), Some(33));
        assert_eq!(unprefixed_id("f8", Order::Big), Some(48));
        assert_eq!(unprefixed_id("f8", Order::Indeterminate), Some(18));
        // Single-byte kinds never shift.
        assert_eq!(unprefixed_id("S1", Order::Big), Some(4));
    }

    #[test]
    fn complex_alignment_is_half_size() {
        let c16 = by_id(id_of("<c16").unwrap()).unwrap();
        assert_eq!(c16.size, 16);
        assert_eq!(c16.align, 8);
    }

    #[test]
    fn integer_check_covers_u_and_i_only() {
        assert!(is_integer(id_of("<i4").unwrap()));
        assert!(is_integer(id_of("|u8").unwrap()));
        assert!(!is_integer(id_of("<f4").unwrap()));
        assert!(!is_integer(id_of("|b1").unwrap()));
        assert!(!is_integer(0));
        assert!(!is_integer(20));
    }
}
