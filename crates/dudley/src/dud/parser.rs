// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive-descent parser for the Dudley layout language.
//!
//! The parser is driven by one-token lookahead from the tokenizer and
//! builds directly into a [`LayoutArena`].  It never aborts on bad input:
//! a grammar violation is recorded as a [`ParseError`], tokens are skipped
//! to the next synchronizing token for the failing production, and parsing
//! resumes.  Further reports are suppressed until three tokens have been
//! consumed cleanly, which keeps one mistake from producing a cascade
//! (the standard yacc discipline).
//!
//! Semantic violations raised by the arena during a parse rule
//! (redeclarations, bad parameter types, addresses inside typedefs) are
//! demoted to recorded errors as well; the offending declaration is
//! dropped and parsing continues.

use log::debug;

use crate::addr::Addr;
use crate::error::{ParseError, ParseErrorKind};
use crate::layout::{DatumSpec, Filter, FilterArg, FilterDir, ItemId, LayoutArena, TypeId, ROOT};
use crate::prim::{self, Order};
use crate::shape::{self, Dim, ParamRef};

use super::token::{Tok, Token, Tokenizer};

/// Outcome of parsing a Dudley source text.
///
/// `errors` holds every recorded lexical and syntactic problem in source
/// order; an empty list means the text parsed cleanly.  The arena always
/// contains whatever well-formed items the text declared.
#[derive(Debug)]
pub struct ParseResult {
    pub arena: LayoutArena,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    /// True when no errors were recorded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse a Dudley source text into a fresh arena.
pub fn parse(source: &str) -> ParseResult {
    let mut arena = LayoutArena::new();
    let errors = parse_into(&mut arena, source);
    ParseResult { arena, errors }
}

/// Parse a Dudley source text into an existing arena, returning the
/// recorded errors.
pub fn parse_into(arena: &mut LayoutArena, source: &str) -> Vec<ParseError> {
    let mut p = Parser {
        tk: Tokenizer::new(source),
        arena,
        errors: Vec::new(),
        streak: 0,
        recovering: false,
    };
    p.layout();
    let mut errors = p.errors;
    errors.extend(p.tk.take_errors());
    errors.sort_by_key(|e| (e.line, e.column));
    errors
}

struct Parser<'s, 'a> {
    tk: Tokenizer<'s>,
    arena: &'a mut LayoutArena,
    errors: Vec<ParseError>,
    /// Tokens consumed cleanly since the last error.
    streak: u32,
    /// Suppress reports until the streak reaches three.
    recovering: bool,
}

impl<'s, 'a> Parser<'s, 'a> {
    // ---- token plumbing --------------------------------------------------

    fn peek(&mut self) -> &Token {
        self.tk.peek()
    }

    fn next(&mut self) -> Token {
        let t = self.tk.next();
        if t.tok != Tok::Eof {
            self.streak += 1;
            if self.recovering && self.streak >= 3 {
                self.recovering = false;
            }
        }
        t
    }

    /// Consume without crediting the recovery streak (used while skipping
    /// to a synchronizing token).
    fn next_raw(&mut self) -> Token {
        self.tk.next()
    }

    fn error_at(&mut self, line: u32, column: u32, message: impl Into<String>) {
        if !self.recovering {
            self.errors.push(ParseError {
                kind: ParseErrorKind::Syntax,
                line,
                column,
                message: message.into(),
            });
        }
        self.recovering = true;
        self.streak = 0;
    }

    fn error_tok(&mut self, tok: &Token, message: impl Into<String>) {
        self.error_at(tok.line, tok.col, message);
    }

    /// Skip tokens until `sync` accepts the lookahead (which is left
    /// unconsumed) or the input ends.
    fn recover(&mut self, sync: impl Fn(&Tok) -> bool) {
        loop {
            let t = self.peek();
            if t.tok == Tok::Eof || sync(&t.tok) {
                break;
            }
            let skipped = self.next_raw();
            debug!(
                "parser: discarding {:?} at {}:{} during recovery",
                skipped.tok, skipped.line, skipped.col
            );
        }
    }

    fn sync_dict(tok: &Tok) -> bool {
        matches!(
            tok,
            Tok::Slash
                | Tok::DotDot
                | Tok::Symbol(_)
                | Tok::Quoted(_)
                | Tok::Amp
                | Tok::RBracket
                | Tok::RBrace
        )
    }

    /// Attach pending doc and attribute comments to a freshly created
    /// item.
    fn attach(&mut self, id: ItemId) {
        for line in self.tk.take_docs() {
            self.arena.add_doc(id, line);
        }
        let attrs = self.tk.take_attrs();
        self.arena.merge_attrs(id, attrs);
    }

    // ---- layout ----------------------------------------------------------

    fn layout(&mut self) {
        self.preamble();
        self.dict_island(ROOT, true);
        // Trailing doc/attribute comments describe the layout itself.
        self.attach(ROOT);
    }

    /// `preamble ::= ['<' | '>' | '|'] ['{' template_params '}']`
    fn preamble(&mut self) {
        match self.peek().tok {
            Tok::Lt => {
                self.next();
                self.arena.set_default_order(Order::Little);
            }
            Tok::Gt => {
                self.next();
                self.arena.set_default_order(Order::Big);
            }
            Tok::Pipe => {
                self.next();
                self.arena.set_default_order(Order::Indeterminate);
            }
            _ => {}
        }
        if self.peek().tok != Tok::LBrace {
            return;
        }
        self.next();
        loop {
            let t = self.peek().clone();
            match t.tok {
                Tok::RBrace => {
                    self.next();
                    return;
                }
                Tok::Eof => {
                    self.error_tok(&t, "unclosed template parameter block");
                    return;
                }
                Tok::Comma => {
                    self.next();
                }
                Tok::Symbol(ref name) | Tok::Quoted(ref name) => {
                    let name = name.clone();
                    self.next();
                    let colon = self.next();
                    if colon.tok != Tok::Colon {
                        self.error_tok(&colon, "expecting : after template parameter name");
                        self.recover(|t| {
                            matches!(t, Tok::Comma | Tok::RBrace | Tok::Symbol(_))
                        });
                        continue;
                    }
                    let ty = self.next();
                    let Tok::Prim(spelling) = &ty.tok else {
                        self.error_tok(&ty, "template parameter needs a primitive type");
                        self.recover(|t| {
                            matches!(t, Tok::Comma | Tok::RBrace | Tok::Symbol(_))
                        });
                        continue;
                    };
                    let Some(pid) = prim::id_of(spelling) else {
                        self.error_tok(&ty, format!("unknown primitive {}", spelling));
                        continue;
                    };
                    let place = self.placement().unwrap_or(Addr::Unspecified);
                    match self
                        .arena
                        .def_dynamic_param(ROOT, &name, -(pid as TypeId), place)
                    {
                        Ok(id) => self.attach(id),
                        Err(e) => self.error_tok(&t, e.to_string()),
                    }
                }
                _ => {
                    let bad = self.next();
                    self.error_tok(&bad, "expecting template parameter name");
                    self.recover(|t| matches!(t, Tok::Comma | Tok::RBrace | Tok::Symbol(_)));
                }
            }
        }
    }

    /// Parse dict items with `island` as the dict that `/` pops to.  For
    /// the top level the island is the root dict and input ends at EOF;
    /// for an inline dict inside a list, a `/` at the island level closes
    /// the island and returns.
    fn dict_island(&mut self, island: ItemId, top_level: bool) {
        let mut cur = island;
        loop {
            let t = self.peek().clone();
            match t.tok {
                Tok::Eof => {
                    if !top_level {
                        self.error_tok(&t, "input ends inside a list dict");
                    }
                    return;
                }
                Tok::Slash => {
                    self.next();
                    if cur == island && !top_level {
                        return; // closing '/' of an inline dict
                    }
                    cur = island;
                }
                Tok::DotDot => {
                    self.next();
                    if cur == island {
                        // No-op at the root dict; an inline dict's parent
                        // is a list, which `..` cannot reach.
                        if !top_level {
                            self.error_tok(&t, ".. cannot ascend out of a list dict");
                        }
                    } else {
                        match self.arena.item(cur).parent() {
                            Some(p) => cur = self.arena.enclosing_dict(p),
                            None => cur = island,
                        }
                    }
                }
                Tok::Amp => {
                    self.next();
                    if let Some(spec) = self.data_item(cur) {
                        match self.arena.anonymous_datum(ROOT, spec) {
                            Ok(id) => self.attach(id),
                            Err(e) => {
                                self.error_tok(&t, e.to_string());
                                self.recover(Self::sync_dict);
                            }
                        }
                    } else {
                        self.recover(Self::sync_dict);
                    }
                }
                Tok::Symbol(ref name) | Tok::Quoted(ref name) => {
                    let name = name.clone();
                    self.next();
                    self.named_item(&mut cur, &name, &t);
                }
                Tok::RBracket | Tok::RBrace => {
                    if top_level {
                        self.next();
                        self.error_tok(&t, "unmatched closing bracket");
                        self.recover(Self::sync_dict);
                    } else {
                        // Let the enclosing list see the bracket; the
                        // inline dict closes implicitly.
                        return;
                    }
                }
                Tok::Error(_) => {
                    self.next();
                }
                _ => {
                    self.next();
                    self.error_tok(&t, "expecting a dict item");
                    self.recover(Self::sync_dict);
                }
            }
        }
    }

    /// Everything that can follow a name at dict level.
    fn named_item(&mut self, cur: &mut ItemId, name: &str, at: &Token) {
        let t = self.peek().clone();
        match t.tok {
            Tok::Equals => {
                self.next();
                if self.peek().tok == Tok::Equals {
                    self.next();
                    self.typedef(*cur, name, at);
                    return;
                }
                let Some(spec) = self.data_item(*cur) else {
                    self.recover(Self::sync_dict);
                    return;
                };
                match self.arena.dict_set_datum(*cur, name, spec) {
                    Ok(id) => self.attach(id),
                    Err(e) => {
                        self.error_tok(at, e.to_string());
                        self.recover(Self::sync_dict);
                    }
                }
            }
            Tok::Colon => {
                self.next();
                self.parameter(*cur, name, at);
            }
            Tok::Slash => {
                self.next();
                match self.arena.dict_subdict(*cur, name) {
                    Ok(id) => {
                        self.attach(id);
                        *cur = id;
                    }
                    Err(e) => {
                        self.error_tok(at, e.to_string());
                        self.recover(Self::sync_dict);
                    }
                }
            }
            Tok::LBracket => {
                self.next();
                match self.arena.dict_sublist(*cur, name) {
                    Ok(id) => {
                        self.attach(id);
                        self.list_items(id, *cur);
                    }
                    Err(e) => {
                        self.error_tok(at, e.to_string());
                        self.recover(Self::sync_dict);
                    }
                }
            }
            Tok::LBrace => {
                self.next();
                self.struct_def(*cur, Some(name));
            }
            Tok::At | Tok::Percent => {
                // Ragged extension: further addresses for an existing
                // datum or list.
                let mut places = Vec::new();
                while matches!(self.peek().tok, Tok::At | Tok::Percent) {
                    match self.placement() {
                        Some(p) => places.push(p),
                        None => break,
                    }
                }
                if places.is_empty() {
                    self.recover(Self::sync_dict);
                    return;
                }
                match self.arena.extend_list(*cur, name, &places) {
                    Ok(id) => self.attach(id),
                    Err(e) => {
                        self.error_tok(at, e.to_string());
                        self.recover(Self::sync_dict);
                    }
                }
            }
            _ => {
                self.error_tok(
                    &t,
                    format!("expecting = : / [ {{ or placement after name {}", name),
                );
                self.recover(Self::sync_dict);
            }
        }
    }

    /// `SYMBOL ':' INTEGER` (fixed) or `SYMBOL ':' type placement`
    /// (dynamic parameter).
    fn parameter(&mut self, cur: ItemId, name: &str, at: &Token) {
        let t = self.peek().clone();
        let result = match t.tok {
            Tok::Int(v) => {
                self.next();
                self.arena.def_fixed_param(cur, name, v)
            }
            Tok::Prim(ref spelling) => {
                self.next();
                match prim::id_of(spelling) {
                    Some(pid) => {
                        let place = self.placement_or_none();
                        self.arena
                            .def_dynamic_param(cur, name, -(pid as TypeId), place)
                    }
                    None => {
                        self.error_tok(&t, format!("unknown primitive {}", spelling));
                        self.recover(Self::sync_dict);
                        return;
                    }
                }
            }
            Tok::Symbol(ref tname) | Tok::Quoted(ref tname) => {
                self.next();
                match self.arena.resolve_type(cur, tname) {
                    Ok(tid) => {
                        let place = self.placement_or_none();
                        self.arena.def_dynamic_param(cur, name, tid, place)
                    }
                    Err(e) => {
                        self.error_tok(&t, e.to_string());
                        self.recover(Self::sync_dict);
                        return;
                    }
                }
            }
            _ => {
                self.error_tok(&t, "expecting integer or datatype after :");
                self.recover(Self::sync_dict);
                return;
            }
        };
        match result {
            Ok(id) => self.attach(id),
            Err(e) => {
                self.error_tok(at, e.to_string());
                self.recover(Self::sync_dict);
            }
        }
    }

    /// `name == type [shape] [%align]`: a typedef, or a named compound
    /// when the right-hand side is a bare struct.
    fn typedef(&mut self, cur: ItemId, name: &str, at: &Token) {
        let Some(spec) = self.data_item(cur) else {
            self.recover(Self::sync_dict);
            return;
        };
        let mut align = None;
        let mut spec = spec;
        match spec.place {
            Addr::Align(n) => {
                align = Some(n);
                spec.place = Addr::Unspecified;
            }
            Addr::At(_) | Addr::Unallocated => {
                self.error_tok(at, "cannot specify @address in typedef");
                spec.place = Addr::Unspecified;
            }
            Addr::Unspecified => {}
        }
        // A bare struct with no shape is the compound itself, not a
        // typedef wrapping it.
        if spec.typeid > 0 && spec.shape.is_empty() && align.is_none() && spec.filt.is_none() {
            let tid = spec.typeid as ItemId;
            if self.arena.item(tid).name().is_none() {
                match self.arena.adopt_type(cur, name, tid) {
                    Ok(()) => self.attach(tid),
                    Err(e) => self.error_tok(at, e.to_string()),
                }
                return;
            }
        }
        match self.arena.def_typedef(cur, name, spec, align) {
            Ok(id) => self.attach(id),
            Err(e) => {
                self.error_tok(at, e.to_string());
                self.recover(Self::sync_dict);
            }
        }
    }

    // ---- data items ------------------------------------------------------

    /// `data_item ::= (PRIMTYPE | SYMBOL | struct_def) [shape] [filter]
    /// [placement]`
    fn data_item(&mut self, scope: ItemId) -> Option<DatumSpec> {
        let t = self.next();
        let typeid = match t.tok {
            Tok::Prim(ref spelling) => match prim::id_of(spelling) {
                Some(pid) => -(pid as TypeId),
                None => {
                    self.error_tok(&t, format!("unknown primitive {}", spelling));
                    return None;
                }
            },
            Tok::Symbol(ref name) | Tok::Quoted(ref name) => {
                match self.arena.resolve_type(scope, name) {
                    Ok(tid) => tid,
                    Err(e) => {
                        self.error_tok(&t, e.to_string());
                        return None;
                    }
                }
            }
            Tok::LBrace => self.struct_def(scope, None)?,
            _ => {
                self.error_tok(&t, "expecting a datatype");
                return None;
            }
        };
        let mut spec = DatumSpec::scalar(typeid);
        if self.peek().tok == Tok::LBracket {
            self.next();
            spec.shape = self.shape_def(scope);
        }
        if matches!(self.peek().tok, Tok::RArrow | Tok::LArrow) {
            spec.filt = self.filter_def();
        }
        if let Some(place) = self.placement() {
            spec.place = place;
        }
        Some(spec)
    }

    /// `shape ::= '[' dimension {',' dimension}* ']'` with the opening
    /// bracket already consumed.
    fn shape_def(&mut self, scope: ItemId) -> Vec<Dim> {
        let mut dims = Vec::new();
        loop {
            let t = self.next();
            match t.tok {
                Tok::Int(n) => {
                    if n < -1 {
                        self.error_tok(&t, "array dimension < -1 has no meaning");
                    } else {
                        dims.push(n);
                    }
                }
                Tok::Symbol(ref name) | Tok::Quoted(ref name) => {
                    let offset = match self.peek().tok {
                        Tok::ParamSfx(k) => {
                            self.next();
                            k
                        }
                        _ => 0,
                    };
                    match self.arena.resolve_param(scope, name) {
                        Ok(pid) => match ParamRef::with_offset(pid, offset) {
                            Ok(r) => dims.push(shape::encode_ref(r)),
                            Err(e) => self.error_tok(&t, e.to_string()),
                        },
                        Err(e) => self.error_tok(&t, e.to_string()),
                    }
                }
                Tok::RBracket => return dims, // tolerate trailing comma
                Tok::Eof => {
                    self.error_tok(&t, "unclosed shape");
                    return dims;
                }
                _ => {
                    self.error_tok(&t, "expecting dimension");
                    self.recover(|t| matches!(t, Tok::Comma | Tok::RBracket));
                }
            }
            let sep = self.next();
            match sep.tok {
                Tok::Comma => {}
                Tok::RBracket => return dims,
                Tok::Eof => {
                    self.error_tok(&sep, "unclosed shape");
                    return dims;
                }
                _ => {
                    self.error_tok(&sep, "expecting , or ] in shape");
                    self.recover(|t| matches!(t, Tok::Comma | Tok::RBracket));
                    if self.peek().tok == Tok::Comma {
                        self.next();
                    } else if self.peek().tok == Tok::RBracket {
                        self.next();
                        return dims;
                    }
                }
            }
        }
    }

    /// `filter ::= ('->' | '<-') SYMBOL ['(' args ')']`
    fn filter_def(&mut self) -> Option<Filter> {
        let arrow = self.next();
        let dir = if arrow.tok == Tok::RArrow {
            FilterDir::Write
        } else {
            FilterDir::Read
        };
        let t = self.next();
        let name = match t.tok {
            Tok::Symbol(name) | Tok::Quoted(name) => name,
            _ => {
                self.error_tok(&t, "expecting filter name after arrow");
                return None;
            }
        };
        let mut args = Vec::new();
        if self.peek().tok == Tok::LParen {
            self.next();
            loop {
                let a = self.next();
                match a.tok {
                    Tok::RParen => break,
                    Tok::Int(v) => args.push(FilterArg::Int(v)),
                    Tok::Float(v) => args.push(FilterArg::Float(v)),
                    Tok::Comma => {}
                    Tok::Eof => {
                        self.error_tok(&a, "unclosed filter arguments");
                        break;
                    }
                    _ => {
                        self.error_tok(&a, "filter arguments must be numbers");
                        self.recover(|t| matches!(t, Tok::Comma | Tok::RParen));
                    }
                }
            }
        }
        Some(Filter { name, dir, args })
    }

    /// `placement ::= '@' INTEGER | '%' INTEGER`, or `None` when the
    /// lookahead is no placement at all.
    fn placement(&mut self) -> Option<Addr> {
        let which = self.peek().tok.clone();
        if !matches!(which, Tok::At | Tok::Percent) {
            return None;
        }
        let lead = self.next();
        let t = self.next();
        let Tok::Int(n) = t.tok else {
            self.error_tok(&t, "expecting integer after placement mark");
            return None;
        };
        let made = if which == Tok::At {
            Addr::address(n)
        } else if n >= 0 {
            Addr::alignment(n as u64)
        } else {
            Addr::alignment(0) // negative alignment: same rejection path
        };
        match made {
            Ok(a) => Some(a),
            Err(e) => {
                self.error_tok(&lead, e.to_string());
                None
            }
        }
    }

    fn placement_or_none(&mut self) -> Addr {
        self.placement().unwrap_or(Addr::Unspecified)
    }

    // ---- structs ---------------------------------------------------------

    /// `struct_def ::= '{' ['%' INTEGER] struct_item* '}'` with the brace
    /// already consumed.  Returns the new type id, the empty-compound id
    /// for an anonymous `{}`, or `None` after unrecoverable damage.
    fn struct_def(&mut self, scope: ItemId, name: Option<&str>) -> Option<TypeId> {
        // `{}` in datatype position is the empty compound, not a new type.
        if name.is_none() && self.peek().tok == Tok::RBrace {
            self.next();
            return Some(crate::layout::EMPTY_TYPE);
        }
        let mut floor = None;
        if self.peek().tok == Tok::Percent {
            let at = self.peek().clone();
            if let Some(Addr::Align(n)) = self.placement() {
                floor = Some(n);
            } else {
                self.error_tok(&at, "struct alignment must be a power of two");
            }
        }
        let tid = match self.arena.open_compound(scope, name, floor) {
            Ok(id) => id,
            Err(e) => {
                // Redeclared name: keep parsing the members into an
                // anonymous compound so the rest of the layout survives.
                let at = self.peek().clone();
                self.error_tok(&at, e.to_string());
                match self.arena.open_compound(scope, None, floor) {
                    Ok(id) => id,
                    Err(_) => return None,
                }
            }
        };
        self.attach(tid);
        loop {
            let t = self.peek().clone();
            match t.tok {
                Tok::RBrace => {
                    self.next();
                    break;
                }
                Tok::Eof => {
                    self.error_tok(&t, "unclosed struct");
                    break;
                }
                Tok::Comma => {
                    self.next();
                }
                Tok::Symbol(ref mname) | Tok::Quoted(ref mname) => {
                    self.next();
                    let sep = self.next();
                    match sep.tok {
                        Tok::Equals => {
                            let Some(spec) = self.data_item(scope) else {
                                self.recover(|t| {
                                    matches!(
                                        t,
                                        Tok::Comma | Tok::RBrace | Tok::Symbol(_) | Tok::Quoted(_)
                                    )
                                });
                                continue;
                            };
                            match self.arena.compound_set_member(tid, mname, spec) {
                                Ok(id) => self.attach(id),
                                Err(e) => self.error_tok(&t, e.to_string()),
                            }
                        }
                        Tok::Colon => {
                            // Parameters declared inside a struct attach
                            // to the nearest enclosing dict.
                            let dict = self.arena.enclosing_dict(scope);
                            self.parameter(dict, mname, &t);
                        }
                        _ => {
                            self.error_tok(&sep, "expecting = or : in struct member");
                            self.recover(|t| {
                                matches!(
                                    t,
                                    Tok::Comma | Tok::RBrace | Tok::Symbol(_) | Tok::Quoted(_)
                                )
                            });
                        }
                    }
                }
                Tok::Error(_) => {
                    self.next();
                }
                _ => {
                    self.next();
                    self.error_tok(&t, "expecting struct member");
                    self.recover(|t| {
                        matches!(t, Tok::Comma | Tok::RBrace | Tok::Symbol(_) | Tok::Quoted(_))
                    });
                }
            }
        }
        match self.arena.close_compound(tid) {
            Ok(()) => Some(tid as TypeId),
            Err(_) => Some(tid as TypeId),
        }
    }

    // ---- lists -----------------------------------------------------------

    /// `list_def ::= '[' [list_item {',' list_item}*] ']'` with the
    /// bracket already consumed.  `scope` is the dict whose names are
    /// visible to member datatypes and shapes.
    fn list_items(&mut self, list: ItemId, scope: ItemId) {
        loop {
            let t = self.peek().clone();
            match t.tok {
                Tok::RBracket => {
                    self.next();
                    return;
                }
                Tok::Eof => {
                    self.error_tok(&t, "unclosed list");
                    return;
                }
                Tok::Comma => {
                    self.next();
                }
                Tok::Slash => {
                    // `'/' dict_item* '/'`: an inline dict member.
                    self.next();
                    match self.arena.list_append_dict(list) {
                        Ok(dict) => {
                            self.attach(dict);
                            self.dict_island(dict, false);
                        }
                        Err(e) => {
                            self.error_tok(&t, e.to_string());
                            self.recover(|t| matches!(t, Tok::Comma | Tok::RBracket));
                        }
                    }
                }
                Tok::LBracket => {
                    self.next();
                    match self.arena.list_append_list(list) {
                        Ok(sub) => {
                            self.attach(sub);
                            self.list_items(sub, scope);
                        }
                        Err(e) => {
                            self.error_tok(&t, e.to_string());
                            self.recover(|t| matches!(t, Tok::Comma | Tok::RBracket));
                        }
                    }
                }
                Tok::Error(_) => {
                    self.next();
                }
                _ => {
                    let Some(spec) = self.data_item(scope) else {
                        self.recover(|t| matches!(t, Tok::Comma | Tok::RBracket));
                        continue;
                    };
                    match self.arena.list_append_datum(list, spec) {
                        Ok(id) => self.attach(id),
                        Err(e) => {
                            self.error_tok(&t, e.to_string());
                            self.recover(|t| matches!(t, Tok::Comma | Tok::RBracket));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::handle::Node;

    #[test]
    fn slash_pops_to_root_and_dotdot_pops_one() {
        let r = parse("a/\nb/\nx = <i4\n/\ny = <i4\na/\n..\nz = <i4\n");
        assert!(r.is_clean(), "{:?}", r.errors);
        let root = r.arena.root();
        // x landed in a/b, y and z at the root after '/' and '..'.
        let a = root.get("a").unwrap().as_dict().unwrap();
        let b = a.get("b").unwrap().as_dict().unwrap();
        assert!(b.get("x").is_some());
        assert!(root.get("y").is_some());
        assert!(root.get("z").is_some());
    }

    #[test]
    fn dotdot_at_root_is_a_noop() {
        let r = parse("..\nx = <i4\n");
        assert!(r.is_clean(), "{:?}", r.errors);
        assert!(r.arena.root().get("x").is_some());
    }

    #[test]
    fn anonymous_reference_hangs_off_the_root() {
        let r = parse("& <f8 [10] @256\n");
        assert!(r.is_clean(), "{:?}", r.errors);
        // Not in the root's name map, but present in the arena.
        assert_eq!(r.arena.root().len(), 0);
        let anon = (1..r.arena.len())
            .filter_map(|id| r.arena.node(id))
            .find_map(|n| match n {
                Node::Datum(d) => Some(d),
                _ => None,
            })
            .expect("anonymous datum exists");
        assert!(anon.name().is_none());
        assert_eq!(anon.address().at(), Some(256));
    }

    #[test]
    fn named_struct_declares_a_type() {
        let r = parse("vec { x = <f4, y = <f4, z = <f4 }\np = vec\n");
        assert!(r.is_clean(), "{:?}", r.errors);
        let root = r.arena.root();
        assert!(root.datatype("vec").is_some());
        let p = root.get("p").unwrap().as_datum().unwrap();
        assert_eq!(p.size().unwrap(), Some(12));
    }

    #[test]
    fn empty_braces_are_the_empty_compound() {
        let r = parse("nothing = {}\n");
        assert!(r.is_clean(), "{:?}", r.errors);
        let d = r.arena.root().get("nothing").unwrap().as_datum().unwrap();
        assert_eq!(d.size().unwrap(), Some(0));
        assert_eq!(d.alignment().unwrap(), None);
    }

    #[test]
    fn lex_errors_reach_the_error_list() {
        let r = parse("x = <i4 ?\n");
        assert_eq!(r.errors.len(), 1);
        assert!(matches!(r.errors[0].kind, crate::error::ParseErrorKind::Lex));
    }
}
