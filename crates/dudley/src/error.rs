// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the layout model, the Dudley parser, and the HDF5 reader.
//!
//! Two distinct failure channels exist (see also the parser docs):
//!
//! - Semantic violations (`Redeclaration`, `UndefinedName`, ...) surface
//!   immediately as [`LayoutError`] from the facade call that caused them.
//! - Lexical and grammatical problems in Dudley source are *recorded*, not
//!   raised: the tokenizer and parser accumulate [`ParseError`] entries and
//!   keep going, so a damaged layout file still yields every well-formed
//!   item it contains.

use thiserror::Error;

/// Result alias for layout-model operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors raised eagerly by layout construction and facade mutation.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Item, parameter, or type name already present in the target scope.
    #[error("name previously declared: {0}")]
    Redeclaration(String),

    /// Type or parameter name not found after recursing through enclosing
    /// dicts.
    #[error("name not found in scope: {0}")]
    UndefinedName(String),

    /// Value has the wrong kind for its slot (non-integer parameter type,
    /// alignment not a power of two, unsupported shape value, ...).
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Operation illegal in the item's current state (mutating a closed
    /// type, closing a type that is not open, reading unfinished fields).
    #[error("invalid state: {0}")]
    State(String),

    /// Underlying stream failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the HDF5 metadata walk.
///
/// `Corrupt` is recoverable at entry granularity: the reader logs the
/// problem, skips the group entry it was working on, and continues.
/// `Unsupported` and `Io` are terminal for the whole read.
#[derive(Debug, Error)]
pub enum Hdf5Error {
    /// Recognized structural corruption (missing block signature,
    /// incoherent sizes, inconsistent B-tree node counts).
    #[error("corrupt HDF5 structure: {0}")]
    Corrupt(String),

    /// Well-formed but unreadable by this walker (unknown superblock
    /// version, filtered fractal heap).
    #[error("unsupported HDF5 feature: {0}")]
    Unsupported(String),

    /// Underlying stream failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether a recorded source error came from the tokenizer or the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed token; the tokenizer emitted an error token and advanced
    /// one character.
    Lex,
    /// Grammar violation; the parser ran its recovery protocol.
    Syntax,
}

/// One recorded problem in a Dudley source text.
///
/// Line and column are 1-based. These are accumulated on the parse result
/// rather than raised, so callers decide whether to reject the layout.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.kind {
            ParseErrorKind::Lex => "lex error",
            ParseErrorKind::Syntax => "syntax error",
        };
        write!(
            f,
            "{}:{}: {}: {}",
            self.line, self.column, what, self.message
        )
    }
}
