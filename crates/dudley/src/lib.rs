// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Dudley - self-describing binary data layouts
//!
//! A *layout* is a declarative description of how a binary stream
//! decomposes into a tree of named n-dimensional arrays of primitive or
//! compound values, parameterized by symbolic array dimensions.  This
//! crate implements the compact, index-addressed layout model and its two
//! producers:
//!
//! - the **Dudley language**: a small textual schema language, with a
//!   hand-written tokenizer and a recursive-descent parser that recovers
//!   from errors instead of aborting ([`dud`]);
//! - the **HDF5 metadata reader**: a version-tolerant walker over HDF5
//!   superblocks, object headers, B-trees, local heaps, and fractal heaps
//!   that reconstructs the same logical tree without an HDF5 library
//!   ([`hdf5`]).
//!
//! ## Quick start
//!
//! ```rust
//! use dudley::dud;
//!
//! let result = dud::parse("n : <i4 @0\nv = <f8 [n] @4\n");
//! assert!(result.is_clean());
//! let root = result.arena.root();
//! let v = root.get("v").unwrap().as_datum().unwrap();
//! assert_eq!(v.address().at(), Some(4));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      Producers                               |
//! |   dud::parse (layout text)   |   hdf5::read (HDF5 metadata)  |
//! +--------------------------------------------------------------+
//! |                      Layout facade                           |
//! |   Dict / List / Datum / Param / DataType handles             |
//! +--------------------------------------------------------------+
//! |                      Layout arena                            |
//! |   flat item sequence, id = position, sidecar sequences       |
//! +--------------------------------------------------------------+
//! |   Primitive catalog  |  Address type  |  Shape codec         |
//! +--------------------------------------------------------------+
//! ```
//!
//! The arena is build-once, read-many: producers hold exclusive use of
//! the arena they build; a finished arena is immutable and freely
//! shareable across threads.  The crate only *describes* where data
//! lies - it never reads array payloads, decompresses filters, or
//! resolves external references.

pub mod addr;
pub mod attr;
pub mod dud;
pub mod error;
pub mod hdf5;
pub mod layout;
pub mod prim;
pub mod shape;

pub use addr::Addr;
pub use attr::{AttrMap, AttrValue};
pub use error::{Hdf5Error, LayoutError, ParseError, ParseErrorKind};
pub use layout::handle::{DataType, Datum, Dict, List, Node, Param, TypeRef};
pub use layout::{DatumSpec, Filter, FilterArg, FilterDir, ItemId, LayoutArena, TypeId};
pub use shape::{DimValue, ParamRef};
