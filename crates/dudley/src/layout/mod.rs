// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The layout arena: a flat, append-only sequence of items.
//!
//! Every item - dict, list, datum, parameter, or datatype - occupies one
//! slot of a single flat sequence, and its position in that sequence is
//! its stable id.  Items refer to each other (parents, member lists,
//! datatypes, parameter references in shapes) exclusively through these
//! ids, which avoids a tangle of circular references: the arena owns
//! everything, and the handle objects in [`crate::layout::handle`] are
//! non-owning `(arena, id)` pairs.
//!
//! The arena is build-once, read-many.  Items are appended in creation
//! order and never move; the only post-append mutation is growth of an
//! open compound type and updates to the sidecar sequences (addresses,
//! dynamic parameter values, doc lines, attribute maps), which are grown
//! on demand to match the arena length.
//!
//! Item 0 is always the root dict.

pub mod handle;

use std::collections::HashMap;

use crate::addr::Addr;
use crate::attr::AttrMap;
use crate::error::{LayoutError, Result};
use crate::prim::{self, Order};
use crate::shape::{self, Dim, DimValue};

/// Arena index of an item; stable for the arena's lifetime.
pub type ItemId = usize;

/// Datatype reference: negative is a primitive id (negated), zero is the
/// empty compound `{}`, positive is the arena id of a `Type` item.
pub type TypeId = i64;

/// The empty compound, `{}`: no value, no space.
pub const EMPTY_TYPE: TypeId = 0;

/// Direction of a datum filter: `->` applies writing, `<-` applies reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDir {
    Write,
    Read,
}

/// One filter argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterArg {
    Int(i64),
    Float(f64),
}

/// A named transformation (compression, checksum) attached to a datum.
/// The layout records it; the core never applies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub dir: FilterDir,
    pub args: Vec<FilterArg>,
}

/// An insertion-ordered name map.  Values are `i64` because type maps may
/// hold negated primitive ids next to arena ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NameMap {
    entries: Vec<(String, i64)>,
}

impl NameMap {
    pub(crate) fn get(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: i64) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

/// Named container item.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DictItem {
    pub parent: Option<ItemId>,
    pub name: Option<String>,
    /// Child arrays, dicts, and lists.
    pub items: NameMap,
    /// Parameters declared here; resolvable from inner dicts.
    pub params: NameMap,
    /// Types declared here; resolvable from inner dicts.
    pub types: NameMap,
}

/// Ordered sequence of unnamed children (dict, list, or datum).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListItem {
    pub parent: ItemId,
    pub name: Option<String>,
    pub items: Vec<ItemId>,
}

/// Array leaf item.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DatumItem {
    pub parent: ItemId,
    pub name: Option<String>,
    pub typeid: TypeId,
    /// Encoded dimension slots; empty means scalar.
    pub shape: Vec<Dim>,
    /// Explicit alignment, or 0 when unset.
    pub align: u64,
    pub filt: Option<Filter>,
}

/// Fixed or dynamic integer parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParamKind {
    /// Literal value known from the layout text.
    Fixed(i64),
    /// Value lives in the data stream; `slot` indexes the arena's dynamic
    /// value sidecar.
    Dynamic {
        typeid: TypeId,
        /// Explicit alignment, or 0 when unset.
        align: u64,
        slot: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParamItem {
    pub parent: ItemId,
    pub name: String,
    pub kind: ParamKind,
}

/// Members of a datatype item.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Members {
    /// A typedef: one anonymous member carrying the aliased type and shape.
    Typedef(ItemId),
    /// A compound: ordered name-keyed members.
    Compound(NameMap),
}

/// Compound or typedef datatype item.
///
/// While a compound is open, `align` holds the negated running maximum of
/// member alignments and `size` the byte just past the last member.
/// Closing negates `align` back; a non-negative `align` marks the type
/// closed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TypeItem {
    pub parent: ItemId,
    pub name: Option<String>,
    pub members: Members,
    pub size: Option<u64>,
    pub align: i64,
}

impl TypeItem {
    pub(crate) fn is_open(&self) -> bool {
        self.align < 0
    }
}

/// The five item variants.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    Dict(DictItem),
    List(ListItem),
    Datum(DatumItem),
    Param(ParamItem),
    Type(TypeItem),
}

impl Item {
    pub(crate) fn parent(&self) -> Option<ItemId> {
        match self {
            Item::Dict(d) => d.parent,
            Item::List(l) => Some(l.parent),
            Item::Datum(d) => Some(d.parent),
            Item::Param(p) => Some(p.parent),
            Item::Type(t) => Some(t.parent),
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        match self {
            Item::Dict(d) => d.name.as_deref(),
            Item::List(l) => l.name.as_deref(),
            Item::Datum(d) => d.name.as_deref(),
            Item::Param(p) => Some(&p.name),
            Item::Type(t) => t.name.as_deref(),
        }
    }
}

/// Everything needed to declare a datum: datatype, shape, placement,
/// filter.  Used for dict items, list appends, and type members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatumSpec {
    pub typeid: TypeId,
    pub shape: Vec<Dim>,
    pub place: Addr,
    pub filt: Option<Filter>,
}

impl DatumSpec {
    /// Scalar of the given type, no placement.
    pub fn scalar(typeid: TypeId) -> DatumSpec {
        DatumSpec {
            typeid,
            ..DatumSpec::default()
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: Vec<Dim>) -> DatumSpec {
        self.shape = shape;
        self
    }

    #[must_use]
    pub fn with_place(mut self, place: Addr) -> DatumSpec {
        self.place = place;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filt: Filter) -> DatumSpec {
        self.filt = Some(filt);
        self
    }
}

/// The arena.  See the module docs for the data model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutArena {
    items: Vec<Item>,
    /// Sidecar: per-item stream address, grown on demand.
    addrs: Vec<Addr>,
    /// Sidecar: per-item doc comment lines, grown on demand.
    docs: Vec<Vec<String>>,
    /// Sidecar: per-item attribute maps, grown on demand.
    attrs: Vec<AttrMap>,
    /// Dynamic parameter slots: `dynamic[slot]` is the parameter item id.
    dynamic: Vec<ItemId>,
    /// Current value of each dynamic parameter slot, once bound.
    values: Vec<Option<i64>>,
    /// Side channel binding an unlimited leading dimension to a concrete
    /// extent, keyed by datum id.
    dim0: HashMap<ItemId, u64>,
    /// Default byte order for interning unprefixed primitive names; set by
    /// a leading `<` or `>` in Dudley source.
    default_order: Order,
}

/// Id of the root dict in every arena.
pub const ROOT: ItemId = 0;

impl LayoutArena {
    /// New arena holding only the root dict.
    pub fn new() -> LayoutArena {
        LayoutArena {
            items: vec![Item::Dict(DictItem {
                parent: None,
                name: None,
                items: NameMap::default(),
                params: NameMap::default(),
                types: NameMap::default(),
            })],
            ..LayoutArena::default()
        }
    }

    /// Number of items, including the root dict.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn default_order(&self) -> Order {
        self.default_order
    }

    /// Set the default byte order; legal once, before any unprefixed
    /// primitive has been interned.
    pub fn set_default_order(&mut self, order: Order) {
        self.default_order = order;
    }

    pub(crate) fn item(&self, id: ItemId) -> &Item {
        &self.items[id]
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> &mut Item {
        &mut self.items[id]
    }

    pub(crate) fn get_item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    fn push(&mut self, item: Item) -> ItemId {
        let id = self.items.len();
        self.items.push(item);
        id
    }

    fn dict(&self, id: ItemId) -> Result<&DictItem> {
        match &self.items[id] {
            Item::Dict(d) => Ok(d),
            _ => Err(LayoutError::State(format!("item {} is not a dict", id))),
        }
    }

    fn dict_mut(&mut self, id: ItemId) -> Result<&mut DictItem> {
        match &mut self.items[id] {
            Item::Dict(d) => Ok(d),
            _ => Err(LayoutError::State(format!("item {} is not a dict", id))),
        }
    }

    fn list_mut(&mut self, id: ItemId) -> Result<&mut ListItem> {
        match &mut self.items[id] {
            Item::List(l) => Ok(l),
            _ => Err(LayoutError::State(format!("item {} is not a list", id))),
        }
    }

    fn type_mut(&mut self, id: ItemId) -> Result<&mut TypeItem> {
        match &mut self.items[id] {
            Item::Type(t) => Ok(t),
            _ => Err(LayoutError::State(format!("item {} is not a type", id))),
        }
    }

    /// Nearest enclosing dict of an item (the item itself if it is one).
    /// Walks over lists and types; always terminates at the root dict.
    pub(crate) fn enclosing_dict(&self, mut id: ItemId) -> ItemId {
        loop {
            match &self.items[id] {
                Item::Dict(_) => return id,
                other => match other.parent() {
                    Some(p) => id = p,
                    None => return ROOT,
                },
            }
        }
    }

    // ---- name resolution -------------------------------------------------

    /// Look up an item by name in a dict.  Unlike parameters and types,
    /// item names never resolve through enclosing dicts.
    pub fn dict_get(&self, dict: ItemId, name: &str) -> Option<ItemId> {
        match &self.items[dict] {
            Item::Dict(d) => d.items.get(name).map(|v| v as ItemId),
            _ => None,
        }
    }

    /// Resolve a type name from a scope, recursing through enclosing
    /// dicts, then falling back to the primitive catalog at the root.  An
    /// unprefixed primitive name is interned into the root dict's type map
    /// under the layout's default order on first use.
    pub fn resolve_type(&mut self, scope: ItemId, name: &str) -> Result<TypeId> {
        let mut dict = self.enclosing_dict(scope);
        loop {
            let d = self.dict(dict)?;
            if let Some(tid) = d.types.get(name) {
                return Ok(tid);
            }
            match d.parent {
                Some(p) => dict = self.enclosing_dict(p),
                None => break,
            }
        }
        // At the root: check for a primitive.
        if name.starts_with(['<', '>', '|']) {
            if let Some(id) = prim::id_of(name) {
                return Ok(-(id as TypeId));
            }
        } else if let Some(id) = prim::unprefixed_id(name, self.default_order) {
            let tid = -(id as TypeId);
            self.dict_mut(ROOT)?.types.insert(name, tid);
            return Ok(tid);
        }
        Err(LayoutError::UndefinedName(name.to_string()))
    }

    /// Non-interning variant of [`resolve_type`](Self::resolve_type) for
    /// read-only consumers.
    pub fn lookup_type(&self, scope: ItemId, name: &str) -> Option<TypeId> {
        let mut dict = self.enclosing_dict(scope);
        loop {
            let d = self.dict(dict).ok()?;
            if let Some(tid) = d.types.get(name) {
                return Some(tid);
            }
            dict = self.enclosing_dict(d.parent?);
        }
    }

    /// Resolve a parameter name from a scope, recursing through enclosing
    /// dicts.
    pub fn resolve_param(&self, scope: ItemId, name: &str) -> Result<ItemId> {
        let mut dict = self.enclosing_dict(scope);
        loop {
            let d = self.dict(dict)?;
            if let Some(pid) = d.params.get(name) {
                return Ok(pid as ItemId);
            }
            match d.parent {
                Some(p) => dict = self.enclosing_dict(p),
                None => return Err(LayoutError::UndefinedName(name.to_string())),
            }
        }
    }

    // ---- dict mutations --------------------------------------------------

    /// Declare a named datum in a dict.
    pub fn dict_set_datum(
        &mut self,
        dict: ItemId,
        name: &str,
        spec: DatumSpec,
    ) -> Result<ItemId> {
        self.dict(dict)?;
        if self.dict(dict)?.items.contains(name) {
            return Err(LayoutError::Redeclaration(name.to_string()));
        }
        let id = self.new_datum(dict, Some(name.to_string()), spec)?;
        self.dict_mut(dict)?.items.insert(name, id as i64);
        Ok(id)
    }

    /// Declare an anonymous datum (an `&` reference target).  The datum
    /// hangs off the dict but is reachable only by id.
    pub fn anonymous_datum(&mut self, dict: ItemId, spec: DatumSpec) -> Result<ItemId> {
        self.dict(dict)?;
        self.new_datum(dict, None, spec)
    }

    /// Give a previously anonymous type a name in a dict's type map.
    pub fn adopt_type(&mut self, dict: ItemId, name: &str, tid: ItemId) -> Result<()> {
        let dict = self.enclosing_dict(dict);
        if self.dict(dict)?.types.contains(name) {
            return Err(LayoutError::Redeclaration(name.to_string()));
        }
        match &mut self.items[tid] {
            Item::Type(t) => {
                if t.name.is_none() {
                    t.name = Some(name.to_string());
                }
            }
            _ => {
                return Err(LayoutError::TypeMismatch(format!(
                    "item {} is not a datatype",
                    tid
                )))
            }
        }
        self.dict_mut(dict)?.types.insert(name, tid as i64);
        Ok(())
    }

    /// Get an existing subdict or create one.  Fails with `TypeMismatch`
    /// if the name exists but is not a dict.
    pub fn dict_subdict(&mut self, dict: ItemId, name: &str) -> Result<ItemId> {
        if let Some(id) = self.dict_get(dict, name) {
            return match &self.items[id] {
                Item::Dict(_) => Ok(id),
                _ => Err(LayoutError::TypeMismatch(format!(
                    "item exists but is not a dict: {}",
                    name
                ))),
            };
        }
        self.dict(dict)?;
        let id = self.push(Item::Dict(DictItem {
            parent: Some(dict),
            name: Some(name.to_string()),
            items: NameMap::default(),
            params: NameMap::default(),
            types: NameMap::default(),
        }));
        self.dict_mut(dict)?.items.insert(name, id as i64);
        Ok(id)
    }

    /// Get an existing sublist or create one.  Fails with `TypeMismatch`
    /// if the name exists but is not a list.
    pub fn dict_sublist(&mut self, dict: ItemId, name: &str) -> Result<ItemId> {
        if let Some(id) = self.dict_get(dict, name) {
            return match &self.items[id] {
                Item::List(_) => Ok(id),
                _ => Err(LayoutError::TypeMismatch(format!(
                    "item exists but is not a list: {}",
                    name
                ))),
            };
        }
        self.dict(dict)?;
        let id = self.push(Item::List(ListItem {
            parent: dict,
            name: Some(name.to_string()),
            items: Vec::new(),
        }));
        self.dict_mut(dict)?.items.insert(name, id as i64);
        Ok(id)
    }

    /// Declare a fixed parameter.  Re-declaring a parameter name in the
    /// same dict updates the map (the old item stays in the arena);
    /// parameters shadow but are never deleted.
    pub fn def_fixed_param(&mut self, dict: ItemId, name: &str, value: i64) -> Result<ItemId> {
        if value < -1 {
            return Err(LayoutError::TypeMismatch(format!(
                "fixed parameter value must not be negative: {}",
                value
            )));
        }
        self.dict(dict)?;
        let id = self.push(Item::Param(ParamItem {
            parent: dict,
            name: name.to_string(),
            kind: ParamKind::Fixed(value),
        }));
        self.dict_mut(dict)?.params.insert(name, id as i64);
        Ok(id)
    }

    /// Declare a dynamic parameter whose value lives in the data stream.
    /// The datatype must be (or alias, through typedefs) a scalar integer
    /// primitive.
    pub fn def_dynamic_param(
        &mut self,
        dict: ItemId,
        name: &str,
        typeid: TypeId,
        place: Addr,
    ) -> Result<ItemId> {
        self.check_param_type(name, typeid)?;
        self.dict(dict)?;
        let align = match place {
            Addr::Align(n) => n,
            _ => 0,
        };
        let slot = self.dynamic.len();
        let id = self.push(Item::Param(ParamItem {
            parent: dict,
            name: name.to_string(),
            kind: ParamKind::Dynamic {
                typeid,
                align,
                slot,
            },
        }));
        self.dynamic.push(id);
        self.values.push(None);
        if matches!(place, Addr::At(_) | Addr::Unallocated) {
            self.set_address(id, place);
        }
        self.dict_mut(dict)?.params.insert(name, id as i64);
        Ok(id)
    }

    /// Verify a parameter datatype aliases a scalar integer primitive.
    fn check_param_type(&self, name: &str, typeid: TypeId) -> Result<()> {
        let mut tid = typeid;
        while tid > 0 {
            if tid as usize >= self.items.len() {
                return Err(LayoutError::TypeMismatch(format!(
                    "datatype id {} out of range",
                    tid
                )));
            }
            let member = match &self.items[tid as ItemId] {
                Item::Type(TypeItem {
                    members: Members::Typedef(m),
                    ..
                }) => *m,
                _ => {
                    return Err(LayoutError::TypeMismatch(format!(
                        "parameter {} datatype cannot be compound",
                        name
                    )))
                }
            };
            match &self.items[member] {
                Item::Datum(d) => {
                    if !d.shape.is_empty() || d.filt.is_some() {
                        return Err(LayoutError::TypeMismatch(format!(
                            "parameter {} datatype must be scalar",
                            name
                        )));
                    }
                    tid = d.typeid;
                }
                _ => {
                    return Err(LayoutError::TypeMismatch(format!(
                        "parameter {} datatype cannot be compound",
                        name
                    )))
                }
            }
        }
        if tid >= 0 || !prim::is_integer((-tid) as u32) {
            return Err(LayoutError::TypeMismatch(format!(
                "parameter {} datatype must be integer",
                name
            )));
        }
        Ok(())
    }

    /// Open a new compound type in a dict.  `align_floor`, if given, is a
    /// minimum alignment the closed compound will honor.  Anonymous types
    /// (`name` of `None`) are reachable only by id.
    pub fn open_compound(
        &mut self,
        dict: ItemId,
        name: Option<&str>,
        align_floor: Option<u64>,
    ) -> Result<ItemId> {
        let dict = self.enclosing_dict(dict);
        if let Some(name) = name {
            if self.dict(dict)?.types.contains(name) {
                return Err(LayoutError::Redeclaration(name.to_string()));
            }
        }
        let floor = match align_floor {
            Some(n) => {
                Addr::alignment(n)?;
                n as i64
            }
            None => 1,
        };
        let id = self.push(Item::Type(TypeItem {
            parent: dict,
            name: name.map(str::to_string),
            members: Members::Compound(NameMap::default()),
            size: Some(0),
            align: -floor,
        }));
        if let Some(name) = name {
            self.dict_mut(dict)?.types.insert(name, id as i64);
        }
        Ok(id)
    }

    /// Append a member to an open compound, updating the running size and
    /// alignment.
    pub fn compound_set_member(
        &mut self,
        type_id: ItemId,
        name: &str,
        spec: DatumSpec,
    ) -> Result<ItemId> {
        {
            let t = match &self.items[type_id] {
                Item::Type(t) => t,
                _ => {
                    return Err(LayoutError::State(format!(
                        "item {} is not a type",
                        type_id
                    )))
                }
            };
            if !t.is_open() {
                return Err(LayoutError::State(
                    "cannot add a member to a closed type".to_string(),
                ));
            }
            match &t.members {
                Members::Compound(m) if m.contains(name) => {
                    return Err(LayoutError::Redeclaration(name.to_string()));
                }
                Members::Compound(_) => {}
                Members::Typedef(_) => {
                    return Err(LayoutError::State(
                        "cannot add a member to a typedef".to_string(),
                    ));
                }
            }
        }
        let member = self.new_datum(type_id, Some(name.to_string()), spec)?;
        let malign = self.datum_alignment(member)?.unwrap_or(1);
        let msize = self.datum_size(member)?;
        let t = self.type_mut(type_id)?;
        if let Members::Compound(m) = &mut t.members {
            m.insert(name, member as i64);
        }
        let mut align = -t.align; // negated open marker
        if malign as i64 > align {
            align = malign as i64;
        }
        t.align = -align;
        t.size = match (t.size, msize) {
            (Some(size), Some(msize)) => {
                let rem = size % malign;
                let size = if rem == 0 { size } else { size + malign - rem };
                Some(size + msize)
            }
            _ => None,
        };
        Ok(member)
    }

    /// Running byte size of an open compound: the byte just past its last
    /// member, before any final alignment.  Used by builders that must
    /// reproduce explicit member offsets.
    pub(crate) fn compound_running_size(&self, id: ItemId) -> Result<Option<u64>> {
        match &self.items[id] {
            Item::Type(t) if t.is_open() => Ok(t.size),
            Item::Type(_) => Err(LayoutError::State(
                "compound is already closed".to_string(),
            )),
            _ => Err(LayoutError::State(format!("item {} is not a type", id))),
        }
    }

    /// Close an open compound, freezing membership and its size and
    /// alignment.
    pub fn close_compound(&mut self, type_id: ItemId) -> Result<()> {
        let t = self.type_mut(type_id)?;
        if !t.is_open() {
            return Err(LayoutError::State(
                "attempt to close a type that is not open".to_string(),
            ));
        }
        t.align = -t.align;
        Ok(())
    }

    /// Declare a typedef: a named type with a single anonymous member.
    /// The typedef inherits the member's alignment unless `align`
    /// overrides it; addresses are illegal in typedefs.
    pub fn def_typedef(
        &mut self,
        dict: ItemId,
        name: &str,
        spec: DatumSpec,
        align: Option<u64>,
    ) -> Result<ItemId> {
        let dict = self.enclosing_dict(dict);
        if self.dict(dict)?.types.contains(name) {
            return Err(LayoutError::Redeclaration(name.to_string()));
        }
        if let Some(n) = align {
            Addr::alignment(n)?;
        }
        if matches!(spec.place, Addr::At(_) | Addr::Unallocated) {
            return Err(LayoutError::TypeMismatch(
                "cannot specify @address in typedef".to_string(),
            ));
        }
        let id = self.push(Item::Type(TypeItem {
            parent: dict,
            name: Some(name.to_string()),
            members: Members::Typedef(0), // patched below
            size: None,
            align: 0,
        }));
        let member = self.new_datum(id, None, spec)?;
        let msize = self.datum_size(member)?;
        let malign = self.datum_alignment(member)?.unwrap_or(1);
        let t = self.type_mut(id)?;
        t.members = Members::Typedef(member);
        t.size = msize;
        t.align = align.unwrap_or(malign) as i64;
        self.dict_mut(dict)?.types.insert(name, id as i64);
        Ok(id)
    }

    // ---- list mutations --------------------------------------------------

    /// Append a datum to a list.
    pub fn list_append_datum(&mut self, list: ItemId, spec: DatumSpec) -> Result<ItemId> {
        self.list_mut(list)?;
        let id = self.new_datum(list, None, spec)?;
        self.list_mut(list)?.items.push(id);
        Ok(id)
    }

    /// Append an anonymous dict to a list.
    pub fn list_append_dict(&mut self, list: ItemId) -> Result<ItemId> {
        self.list_mut(list)?;
        let id = self.push(Item::Dict(DictItem {
            parent: Some(list),
            name: None,
            items: NameMap::default(),
            params: NameMap::default(),
            types: NameMap::default(),
        }));
        self.list_mut(list)?.items.push(id);
        Ok(id)
    }

    /// Append an anonymous sublist to a list.
    pub fn list_append_list(&mut self, list: ItemId) -> Result<ItemId> {
        self.list_mut(list)?;
        let id = self.push(Item::List(ListItem {
            parent: list,
            name: None,
            items: Vec::new(),
        }));
        self.list_mut(list)?.items.push(id);
        Ok(id)
    }

    /// Ragged extension: `name @a @b ...` after an existing datum or list.
    ///
    /// A datum is first converted in place to a one-member list (the dict
    /// re-points the name at the new list; the datum keeps its id).  Then
    /// one datum per placement is appended, copying the template's type,
    /// shape, alignment, and filter.
    pub fn extend_list(&mut self, dict: ItemId, name: &str, places: &[Addr]) -> Result<ItemId> {
        let id = self
            .dict_get(dict, name)
            .ok_or_else(|| LayoutError::UndefinedName(name.to_string()))?;
        let list = match &self.items[id] {
            Item::Datum(_) => {
                let list = self.push(Item::List(ListItem {
                    parent: dict,
                    name: Some(name.to_string()),
                    items: vec![id],
                }));
                if let Item::Datum(d) = &mut self.items[id] {
                    d.parent = list;
                    d.name = None;
                }
                self.dict_mut(dict)?.items.insert(name, list as i64);
                list
            }
            Item::List(_) => id,
            _ => {
                return Err(LayoutError::TypeMismatch(format!(
                    "item exists but is not extendable: {}",
                    name
                )))
            }
        };
        // Template is the first datum member.
        let template = {
            let l = match &self.items[list] {
                Item::List(l) => l,
                _ => unreachable!(),
            };
            let first = *l.items.first().ok_or_else(|| {
                LayoutError::State(format!("list {} has no template member", name))
            })?;
            match &self.items[first] {
                Item::Datum(d) => DatumSpec {
                    typeid: d.typeid,
                    shape: d.shape.clone(),
                    place: if d.align > 0 {
                        Addr::Align(d.align)
                    } else {
                        Addr::Unspecified
                    },
                    filt: d.filt.clone(),
                },
                _ => {
                    return Err(LayoutError::State(format!(
                        "list {} first member is not a datum",
                        name
                    )))
                }
            }
        };
        for place in places {
            let spec = DatumSpec {
                place: *place,
                ..template.clone()
            };
            self.list_append_datum(list, spec)?;
        }
        Ok(list)
    }

    // ---- datum construction and queries ----------------------------------

    fn new_datum(
        &mut self,
        parent: ItemId,
        name: Option<String>,
        spec: DatumSpec,
    ) -> Result<ItemId> {
        let align = match spec.place {
            Addr::Align(n) => {
                Addr::alignment(n)?;
                n
            }
            _ => 0,
        };
        // Validate the shape: -1 only leads, references must point at
        // parameter items.
        for (i, &d) in spec.shape.iter().enumerate() {
            match shape::decode(d)? {
                DimValue::Unlimited if i != 0 => {
                    return Err(LayoutError::TypeMismatch(
                        "unlimited dimension is only permitted first".to_string(),
                    ));
                }
                DimValue::Ref(r) => match self.items.get(r.param) {
                    Some(Item::Param(_)) => {}
                    _ => {
                        return Err(LayoutError::TypeMismatch(format!(
                            "shape references item {} which is not a parameter",
                            r.param
                        )));
                    }
                },
                _ => {}
            }
        }
        if spec.typeid > 0 && spec.typeid as usize >= self.items.len() {
            return Err(LayoutError::TypeMismatch(format!(
                "datatype id {} out of range",
                spec.typeid
            )));
        }
        if spec.typeid < 0 && prim::by_id((-spec.typeid) as u32).is_none() {
            return Err(LayoutError::TypeMismatch(format!(
                "unknown primitive id {}",
                -spec.typeid
            )));
        }
        let id = self.push(Item::Datum(DatumItem {
            parent,
            name,
            typeid: spec.typeid,
            shape: spec.shape,
            align,
            filt: spec.filt,
        }));
        if matches!(spec.place, Addr::At(_) | Addr::Unallocated) {
            self.set_address(id, spec.place);
        }
        Ok(id)
    }

    /// Byte size of one instance of a datatype.  `Ok(None)` when the size
    /// is indeterminate (typedef over a dynamic shape); `State` error when
    /// the type is still open.
    pub fn type_size(&self, typeid: TypeId) -> Result<Option<u64>> {
        if typeid == EMPTY_TYPE {
            return Ok(Some(0));
        }
        if typeid < 0 {
            let p = prim::by_id((-typeid) as u32).ok_or_else(|| {
                LayoutError::TypeMismatch(format!("unknown primitive id {}", -typeid))
            })?;
            return Ok(Some(p.size as u64));
        }
        match &self.items[typeid as ItemId] {
            Item::Type(t) => {
                if t.is_open() {
                    return Err(LayoutError::State(
                        "size of an open type is not final".to_string(),
                    ));
                }
                Ok(t.size)
            }
            _ => Err(LayoutError::TypeMismatch(format!(
                "item {} is not a datatype",
                typeid
            ))),
        }
    }

    /// Alignment of a datatype; `None` for the empty compound.
    pub fn type_align(&self, typeid: TypeId) -> Result<Option<u64>> {
        if typeid == EMPTY_TYPE {
            return Ok(None);
        }
        if typeid < 0 {
            let p = prim::by_id((-typeid) as u32).ok_or_else(|| {
                LayoutError::TypeMismatch(format!("unknown primitive id {}", -typeid))
            })?;
            return Ok(Some(p.align as u64));
        }
        match &self.items[typeid as ItemId] {
            Item::Type(t) => {
                if t.is_open() {
                    return Err(LayoutError::State(
                        "alignment of an open type is not final".to_string(),
                    ));
                }
                Ok(Some(t.align as u64))
            }
            _ => Err(LayoutError::TypeMismatch(format!(
                "item {} is not a datatype",
                typeid
            ))),
        }
    }

    /// Effective alignment of a datum: its explicit alignment, else its
    /// type's.  `None` for the empty compound.
    pub fn datum_alignment(&self, id: ItemId) -> Result<Option<u64>> {
        let d = match &self.items[id] {
            Item::Datum(d) => d,
            _ => return Err(LayoutError::State(format!("item {} is not a datum", id))),
        };
        if d.align > 0 {
            return Ok(Some(d.align));
        }
        self.type_align(d.typeid)
    }

    /// Byte size of a datum: type size times the product of its fixed
    /// dimensions.  `Ok(None)` when any dimension is an unresolved dynamic
    /// parameter or an unbound unlimited marker.
    pub fn datum_size(&self, id: ItemId) -> Result<Option<u64>> {
        let d = match &self.items[id] {
            Item::Datum(d) => d,
            _ => return Err(LayoutError::State(format!("item {} is not a datum", id))),
        };
        let Some(mut size) = self.type_size(d.typeid)? else {
            return Ok(None);
        };
        for (i, &dim) in d.shape.iter().enumerate() {
            let n = match shape::decode(dim)? {
                DimValue::Fixed(n) => n,
                DimValue::Unlimited => match (i, self.dim0.get(&id)) {
                    (0, Some(&n)) => n,
                    _ => return Ok(None),
                },
                DimValue::Ref(r) => match self.param_value(r.param)? {
                    Some(v) => {
                        let v = v + r.offset as i64;
                        if v > 0 {
                            v as u64
                        } else {
                            0
                        }
                    }
                    None => return Ok(None),
                },
            };
            size *= n;
        }
        Ok(Some(size))
    }

    // ---- parameter values ------------------------------------------------

    /// Current value of a parameter: a fixed parameter's literal, or a
    /// dynamic parameter's bound value (`None` until bound).
    pub fn param_value(&self, id: ItemId) -> Result<Option<i64>> {
        match &self.items[id] {
            Item::Param(p) => Ok(match p.kind {
                ParamKind::Fixed(v) => Some(v),
                ParamKind::Dynamic { slot, .. } => self.values[slot],
            }),
            _ => Err(LayoutError::State(format!(
                "item {} is not a parameter",
                id
            ))),
        }
    }

    /// Bind a dynamic parameter's current value (the sidecar updated when
    /// the layout is attached to a concrete data stream).
    pub fn set_param_value(&mut self, id: ItemId, value: i64) -> Result<()> {
        match &self.items[id] {
            Item::Param(ParamItem {
                kind: ParamKind::Dynamic { slot, .. },
                ..
            }) => {
                let slot = *slot;
                self.values[slot] = Some(value);
                Ok(())
            }
            Item::Param(_) => Err(LayoutError::State(
                "cannot assign a value to a fixed parameter".to_string(),
            )),
            _ => Err(LayoutError::State(format!(
                "item {} is not a parameter",
                id
            ))),
        }
    }

    /// Bind an unlimited leading dimension to a concrete extent.
    pub fn bind_unlimited(&mut self, datum: ItemId, extent: u64) -> Result<()> {
        match &self.items[datum] {
            Item::Datum(d) if d.shape.first() == Some(&shape::UNLIMITED) => {
                self.dim0.insert(datum, extent);
                Ok(())
            }
            Item::Datum(_) => Err(LayoutError::State(
                "datum has no unlimited dimension to bind".to_string(),
            )),
            _ => Err(LayoutError::State(format!(
                "item {} is not a datum",
                datum
            ))),
        }
    }

    // ---- sidecars --------------------------------------------------------

    /// Stream address of an item, `Addr::Unspecified` when never set.
    pub fn address(&self, id: ItemId) -> Addr {
        self.addrs.get(id).copied().unwrap_or_default()
    }

    /// Record an item's stream address in the address sidecar.
    pub fn set_address(&mut self, id: ItemId, addr: Addr) {
        if self.addrs.len() < self.items.len() {
            self.addrs.resize(self.items.len(), Addr::Unspecified);
        }
        self.addrs[id] = addr;
    }

    /// Doc comment lines recorded for an item.
    pub fn docs(&self, id: ItemId) -> &[String] {
        self.docs.get(id).map_or(&[], Vec::as_slice)
    }

    /// Append one doc comment line to an item.
    pub fn add_doc(&mut self, id: ItemId, line: impl Into<String>) {
        if self.docs.len() < self.items.len() {
            self.docs.resize(self.items.len(), Vec::new());
        }
        self.docs[id].push(line.into());
    }

    /// Attribute map recorded for an item, if any.
    pub fn attrs(&self, id: ItemId) -> Option<&AttrMap> {
        self.attrs.get(id).filter(|m| !m.is_empty())
    }

    /// Merge attributes into an item's map.
    pub fn merge_attrs(&mut self, id: ItemId, attrs: AttrMap) {
        if attrs.is_empty() {
            return;
        }
        if self.attrs.len() < self.items.len() {
            self.attrs.resize(self.items.len(), AttrMap::new());
        }
        self.attrs[id].merge(attrs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{encode_fixed, encode_ref, ParamRef};

    fn i4(arena: &mut LayoutArena) -> TypeId {
        arena.resolve_type(ROOT, "<i4").unwrap()
    }

    #[test]
    fn ids_are_stable_and_sequential() {
        let mut arena = LayoutArena::new();
        let tid = i4(&mut arena);
        let first = arena.len();
        let a = arena
            .dict_set_datum(ROOT, "a", DatumSpec::scalar(tid))
            .unwrap();
        let b = arena
            .dict_set_datum(ROOT, "b", DatumSpec::scalar(tid))
            .unwrap();
        assert_eq!(a, first);
        assert_eq!(b, first + 1);
        assert_eq!(arena.dict_get(ROOT, "a"), Some(a));
        assert_eq!(arena.dict_get(ROOT, "b"), Some(b));
    }

    #[test]
    fn redeclaration_is_rejected() {
        let mut arena = LayoutArena::new();
        let tid = i4(&mut arena);
        arena
            .dict_set_datum(ROOT, "x", DatumSpec::scalar(tid))
            .unwrap();
        let err = arena
            .dict_set_datum(ROOT, "x", DatumSpec::scalar(tid))
            .unwrap_err();
        assert!(matches!(err, LayoutError::Redeclaration(_)));
    }

    #[test]
    fn parameter_scope_recurses_through_dicts() {
        let mut arena = LayoutArena::new();
        let n = arena.def_fixed_param(ROOT, "n", 10).unwrap();
        let sub = arena.dict_subdict(ROOT, "sub").unwrap();
        let inner = arena.dict_subdict(sub, "inner").unwrap();
        assert_eq!(arena.resolve_param(inner, "n").unwrap(), n);
        // Shadowing in an inner dict wins without deleting the outer.
        let n2 = arena.def_fixed_param(sub, "n", 20).unwrap();
        assert_eq!(arena.resolve_param(inner, "n").unwrap(), n2);
        assert_eq!(arena.resolve_param(ROOT, "n").unwrap(), n);
    }

    #[test]
    fn compound_size_and_alignment() {
        let mut arena = LayoutArena::new();
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        let i2 = arena.resolve_type(ROOT, "<i2").unwrap();
        let t = arena.open_compound(ROOT, Some("rec"), None).unwrap();
        arena
            .compound_set_member(t, "tag", DatumSpec::scalar(i2))
            .unwrap();
        arena
            .compound_set_member(t, "val", DatumSpec::scalar(f8))
            .unwrap();
        // Reads before close are state errors.
        assert!(matches!(
            arena.type_size(t as TypeId),
            Err(LayoutError::State(_))
        ));
        arena.close_compound(t).unwrap();
        // 2 bytes, padded to 8, plus 8 = 16; alignment 8.
        assert_eq!(arena.type_size(t as TypeId).unwrap(), Some(16));
        assert_eq!(arena.type_align(t as TypeId).unwrap(), Some(8));
        // Close of a closed type is a state error.
        assert!(matches!(
            arena.close_compound(t),
            Err(LayoutError::State(_))
        ));
    }

    #[test]
    fn typedef_inherits_member_alignment() {
        let mut arena = LayoutArena::new();
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        let t = arena
            .def_typedef(ROOT, "vec3", DatumSpec::scalar(f8).with_shape(vec![3]), None)
            .unwrap();
        assert_eq!(arena.type_size(t as TypeId).unwrap(), Some(24));
        assert_eq!(arena.type_align(t as TypeId).unwrap(), Some(8));
    }

    #[test]
    fn datum_size_with_dynamic_parameter() {
        let mut arena = LayoutArena::new();
        let i4t = i4(&mut arena);
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        let n = arena
            .def_dynamic_param(ROOT, "n", i4t, Addr::At(0))
            .unwrap();
        let v = arena
            .dict_set_datum(
                ROOT,
                "v",
                DatumSpec::scalar(f8)
                    .with_shape(vec![encode_ref(ParamRef::new(n))])
                    .with_place(Addr::At(4)),
            )
            .unwrap();
        assert_eq!(arena.datum_size(v).unwrap(), None);
        arena.set_param_value(n, 5).unwrap();
        assert_eq!(arena.datum_size(v).unwrap(), Some(40));
        assert_eq!(arena.address(v), Addr::At(4));
        assert_eq!(arena.address(n), Addr::At(0));
    }

    #[test]
    fn unlimited_dimension_binds_through_side_channel() {
        let mut arena = LayoutArena::new();
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        let t = arena
            .dict_set_datum(
                ROOT,
                "t",
                DatumSpec::scalar(f8).with_shape(vec![shape::UNLIMITED, encode_fixed(4)]),
            )
            .unwrap();
        assert_eq!(arena.datum_size(t).unwrap(), None);
        arena.bind_unlimited(t, 7).unwrap();
        assert_eq!(arena.datum_size(t).unwrap(), Some(7 * 4 * 8));
    }

    #[test]
    fn unlimited_must_lead() {
        let mut arena = LayoutArena::new();
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        let err = arena
            .dict_set_datum(
                ROOT,
                "t",
                DatumSpec::scalar(f8).with_shape(vec![encode_fixed(4), shape::UNLIMITED]),
            )
            .unwrap_err();
        assert!(matches!(err, LayoutError::TypeMismatch(_)));
    }

    #[test]
    fn dynamic_parameter_requires_integer_type() {
        let mut arena = LayoutArena::new();
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        let err = arena
            .def_dynamic_param(ROOT, "n", f8, Addr::Unspecified)
            .unwrap_err();
        assert!(matches!(err, LayoutError::TypeMismatch(_)));
        // But a typedef chain ending in an integer is fine.
        let i8t = arena.resolve_type(ROOT, "<i8").unwrap();
        let alias = arena
            .def_typedef(ROOT, "index", DatumSpec::scalar(i8t), None)
            .unwrap();
        arena
            .def_dynamic_param(ROOT, "m", alias as TypeId, Addr::Unspecified)
            .unwrap();
    }

    #[test]
    fn ragged_extension_builds_a_list() {
        let mut arena = LayoutArena::new();
        let i4t = i4(&mut arena);
        let w = arena
            .dict_set_datum(
                ROOT,
                "w",
                DatumSpec::scalar(i4t)
                    .with_shape(vec![encode_fixed(2)])
                    .with_place(Addr::At(16)),
            )
            .unwrap();
        let list = arena
            .extend_list(ROOT, "w", &[Addr::At(32), Addr::At(48)])
            .unwrap();
        assert_eq!(arena.dict_get(ROOT, "w"), Some(list));
        let members: Vec<ItemId> = match arena.item(list) {
            Item::List(l) => l.items.clone(),
            _ => panic!("expected list"),
        };
        assert_eq!(members.len(), 3);
        assert_eq!(members[0], w);
        let addrs: Vec<Addr> = members.iter().map(|&m| arena.address(m)).collect();
        assert_eq!(addrs, [Addr::At(16), Addr::At(32), Addr::At(48)]);
        for &m in &members[1..] {
            match arena.item(m) {
                Item::Datum(d) => assert_eq!(d.shape, vec![encode_fixed(2)]),
                _ => panic!("expected datum"),
            }
        }
    }

    #[test]
    fn unprefixed_primitive_interns_at_root() {
        let mut arena = LayoutArena::new();
        arena.set_default_order(Order::Little);
        let tid = arena.resolve_type(ROOT, "f8").unwrap();
        assert_eq!(tid, -(prim::id_of("<f8").unwrap() as TypeId));
        // Interned: a second resolution hits the root type map directly.
        assert_eq!(arena.lookup_type(ROOT, "f8"), Some(tid));
    }
}
