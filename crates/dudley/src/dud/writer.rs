// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Render a layout arena back to Dudley source text.
//!
//! The output is normalized: each dict emits its parameters, then its
//! types, then its items, so re-parsing produces an arena isomorphic to
//! the original (same tree, same names, same shapes and placements; item
//! ids may differ).  Serializing twice through a parse is a fixed point.

use std::fmt::Write as _;

use crate::addr::Addr;
use crate::attr::AttrValue;
use crate::layout::handle::TypeRef;
use crate::layout::{
    DatumItem, Filter, FilterArg, FilterDir, Item, ItemId, LayoutArena, Members, ParamKind,
    TypeId, ROOT,
};
use crate::prim::Order;
use crate::shape::{self, DimValue};

/// Serialize an arena to Dudley source.
pub fn write(arena: &LayoutArena) -> String {
    let mut w = Writer {
        arena,
        out: String::new(),
        depth: 0,
    };
    if arena.default_order() != Order::Indeterminate {
        w.out.push(arena.default_order().mark());
        w.out.push('\n');
    }
    w.dict_body(ROOT);
    w.anonymous_data();
    w.out
}

struct Writer<'a> {
    arena: &'a LayoutArena,
    out: String,
    depth: usize,
}

impl<'a> Writer<'a> {
    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn comments(&mut self, id: ItemId) {
        for line in self.arena.docs(id) {
            self.indent();
            let _ = writeln!(self.out, "##{}", line);
        }
        if let Some(attrs) = self.arena.attrs(id) {
            self.indent();
            self.out.push_str("#:");
            let mut first = true;
            for (name, value) in attrs.iter() {
                if !first {
                    self.out.push(',');
                }
                first = false;
                let _ = write!(self.out, " {}", name);
                match value {
                    AttrValue::Bool(_) => {}
                    AttrValue::Int(v) => {
                        let _ = write!(self.out, " = {}", v);
                    }
                    AttrValue::Float(v) => {
                        let _ = write!(self.out, " = {:?}", v);
                    }
                    AttrValue::Str(v) => {
                        let _ = write!(self.out, " = {}", quoted(v));
                    }
                    AttrValue::IntArray(vs) => {
                        let body: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                        let _ = write!(self.out, " = [{}]", body.join(", "));
                    }
                    AttrValue::FloatArray(vs) => {
                        let body: Vec<String> = vs.iter().map(|v| format!("{:?}", v)).collect();
                        let _ = write!(self.out, " = [{}]", body.join(", "));
                    }
                    AttrValue::StrArray(vs) => {
                        let body: Vec<String> =
                            vs.iter().map(|v| quoted(v).to_string()).collect();
                        let _ = write!(self.out, " = [{}]", body.join(", "));
                    }
                }
            }
            self.out.push('\n');
        }
    }

    /// Parameters, types, then items of one dict.
    fn dict_body(&mut self, dict: ItemId) {
        let (params, types, items) = match self.arena.item(dict) {
            Item::Dict(d) => (
                d.params.iter().map(|(n, v)| (n.to_string(), v)).collect::<Vec<_>>(),
                d.types.iter().map(|(n, v)| (n.to_string(), v)).collect::<Vec<_>>(),
                d.items.iter().map(|(n, v)| (n.to_string(), v)).collect::<Vec<_>>(),
            ),
            _ => return,
        };
        for (name, pid) in params {
            self.parameter(&name, pid as ItemId);
        }
        for (name, tid) in types {
            self.typedecl(&name, tid);
        }
        for (name, id) in items {
            self.dict_item(&name, id as ItemId);
        }
    }

    fn parameter(&mut self, name: &str, pid: ItemId) {
        let Item::Param(p) = self.arena.item(pid) else {
            return;
        };
        self.comments(pid);
        self.indent();
        match &p.kind {
            ParamKind::Fixed(v) => {
                let _ = writeln!(self.out, "{} : {}", symbol(name), v);
            }
            ParamKind::Dynamic { typeid, align, .. } => {
                let _ = write!(self.out, "{} : {}", symbol(name), self.type_name(*typeid));
                self.placement(self.arena.address(pid), *align);
                self.out.push('\n');
            }
        }
    }

    fn typedecl(&mut self, name: &str, tid: TypeId) {
        // Interned unprefixed primitives re-intern on parse; skip them.
        if tid <= 0 {
            return;
        }
        let Item::Type(t) = self.arena.item(tid as ItemId) else {
            return;
        };
        self.comments(tid as ItemId);
        match &t.members {
            Members::Compound(_) => {
                self.indent();
                let _ = write!(self.out, "{} == ", symbol(name));
                self.compound_body(tid as ItemId);
                self.out.push('\n');
            }
            Members::Typedef(member) => {
                let Item::Datum(d) = self.arena.item(*member) else {
                    return;
                };
                self.indent();
                let _ = write!(self.out, "{} == ", symbol(name));
                self.datum_type_and_shape(d);
                let malign = self
                    .arena
                    .datum_alignment(*member)
                    .ok()
                    .flatten()
                    .unwrap_or(0);
                let talign = t.align as u64;
                if talign > 0 && talign != malign {
                    let _ = write!(self.out, " %{}", talign);
                }
                self.out.push('\n');
            }
        }
    }

    fn compound_body(&mut self, tid: ItemId) {
        let members: Vec<(String, ItemId)> = match self.arena.item(tid) {
            Item::Type(t) => match &t.members {
                Members::Compound(m) => m
                    .iter()
                    .map(|(n, v)| (n.to_string(), v as ItemId))
                    .collect(),
                Members::Typedef(_) => Vec::new(),
            },
            _ => return,
        };
        self.out.push('{');
        let mut first = true;
        for (name, member) in members {
            if !first {
                self.out.push(',');
            }
            first = false;
            let Item::Datum(d) = self.arena.item(member) else {
                continue;
            };
            let _ = write!(self.out, " {} = ", symbol(&name));
            self.datum_type_and_shape(d);
            let place = self.arena.address(member);
            self.placement(place, d.align);
        }
        self.out.push_str(" }");
    }

    fn dict_item(&mut self, name: &str, id: ItemId) {
        match self.arena.item(id) {
            Item::Datum(d) => {
                self.comments(id);
                self.indent();
                let _ = write!(self.out, "{} = ", symbol(name));
                self.datum_type_and_shape(d);
                self.datum_tail(id, d);
                self.out.push('\n');
            }
            Item::Dict(_) => {
                self.comments(id);
                self.indent();
                let _ = writeln!(self.out, "{}/", symbol(name));
                self.depth += 1;
                self.dict_body(id);
                self.depth -= 1;
                self.indent();
                self.out.push_str("..\n");
            }
            Item::List(l) => {
                let members = l.items.clone();
                self.comments(id);
                self.indent();
                let _ = write!(self.out, "{} [", symbol(name));
                self.list_body(&members);
                self.out.push_str(" ]\n");
            }
            _ => {}
        }
    }

    fn list_body(&mut self, members: &[ItemId]) {
        let mut first = true;
        for &m in members {
            if !first {
                self.out.push(',');
            }
            first = false;
            match self.arena.item(m) {
                Item::Datum(d) => {
                    self.out.push(' ');
                    self.datum_type_and_shape(d);
                    self.datum_tail(m, d);
                }
                Item::List(l) => {
                    let inner = l.items.clone();
                    self.out.push_str(" [");
                    self.list_body(&inner);
                    self.out.push_str(" ]");
                }
                Item::Dict(_) => {
                    self.out.push_str(" /\n");
                    self.depth += 1;
                    self.dict_body(m);
                    self.depth -= 1;
                    self.indent();
                    self.out.push('/');
                }
                _ => {}
            }
        }
    }

    /// Anonymous reference targets hang off the root dict without a name.
    fn anonymous_data(&mut self) {
        for id in 1..self.arena.len() {
            if let Item::Datum(d) = self.arena.item(id) {
                if d.name.is_none() && d.parent == ROOT {
                    self.comments(id);
                    self.out.push_str("& ");
                    self.datum_type_and_shape(d);
                    self.datum_tail(id, d);
                    self.out.push('\n');
                }
            }
        }
    }

    fn datum_type_and_shape(&mut self, d: &DatumItem) {
        let tyname = self.type_name(d.typeid);
        self.out.push_str(&tyname);
        if !d.shape.is_empty() {
            self.out.push_str(" [");
            let mut first = true;
            for &dim in &d.shape {
                if !first {
                    self.out.push(',');
                }
                first = false;
                match shape::decode(dim) {
                    Ok(DimValue::Fixed(n)) => {
                        let _ = write!(self.out, " {}", n);
                    }
                    Ok(DimValue::Unlimited) => {
                        self.out.push_str(" -1");
                    }
                    Ok(DimValue::Ref(r)) => {
                        let pname = self
                            .arena
                            .item(r.param)
                            .name()
                            .unwrap_or("_")
                            .to_string();
                        let _ = write!(self.out, " {}", symbol(&pname));
                        let k = r.offset;
                        let mark = if k < 0 { '-' } else { '+' };
                        for _ in 0..k.abs() {
                            self.out.push(mark);
                        }
                    }
                    Err(_) => {
                        self.out.push_str(" 0");
                    }
                }
            }
            self.out.push_str(" ]");
        }
    }

    fn datum_tail(&mut self, id: ItemId, d: &DatumItem) {
        if let Some(f) = &d.filt {
            self.filter(f);
        }
        self.placement(self.arena.address(id), d.align);
    }

    fn filter(&mut self, f: &Filter) {
        let arrow = match f.dir {
            FilterDir::Write => "->",
            FilterDir::Read => "<-",
        };
        let _ = write!(self.out, " {} {}", arrow, symbol(&f.name));
        if !f.args.is_empty() {
            self.out.push('(');
            let mut first = true;
            for a in &f.args {
                if !first {
                    self.out.push_str(", ");
                }
                first = false;
                match a {
                    FilterArg::Int(v) => {
                        let _ = write!(self.out, "{}", v);
                    }
                    FilterArg::Float(v) => {
                        let _ = write!(self.out, "{:?}", v);
                    }
                }
            }
            self.out.push(')');
        }
    }

    fn placement(&mut self, addr: Addr, align: u64) {
        match addr {
            Addr::At(n) => {
                let _ = write!(self.out, " @{}", n);
            }
            Addr::Unallocated => {
                self.out.push_str(" @-1");
            }
            Addr::Align(n) => {
                let _ = write!(self.out, " %{}", n);
            }
            Addr::Unspecified => {
                if align > 0 {
                    let _ = write!(self.out, " %{}", align);
                }
            }
        }
    }

    fn type_name(&self, typeid: TypeId) -> String {
        match TypeRef::wrap(self.arena, typeid) {
            TypeRef::Empty => "{}".to_string(),
            TypeRef::Prim(p) => p.name.to_string(),
            TypeRef::Type(_) => match self.arena.item(typeid as ItemId).name() {
                Some(name) => symbol(name),
                None => {
                    // Anonymous compound: expand inline.
                    let mut w = Writer {
                        arena: self.arena,
                        out: String::new(),
                        depth: 0,
                    };
                    match self.arena.item(typeid as ItemId) {
                        Item::Type(t) => match &t.members {
                            Members::Compound(_) => {
                                w.compound_body(typeid as ItemId);
                                w.out
                            }
                            Members::Typedef(m) => {
                                if let Item::Datum(d) = self.arena.item(*m) {
                                    w.datum_type_and_shape(d);
                                }
                                w.out
                            }
                        },
                        _ => "{}".to_string(),
                    }
                }
            },
        }
    }
}

/// Quote a name when it is not a plain identifier.
fn symbol(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        quoted(name)
    }
}

fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}
