// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lightweight handles over `(arena, id)` pairs.
//!
//! Handles are the user-facing interface to a layout.  A handle borrows
//! the arena and carries an item id; its kind is checked when the handle
//! is produced, so accessors can index the arena directly.  Read handles
//! (`Dict`, `List`, `Datum`, `Param`, `DataType`) share the navigation
//! surface (`root`, `parent`, `name`, `docs`, `attrs`); mutable wrappers
//! (`DictMut`, `ListMut`, `CompoundMut`) expose the few mutations the
//! build phase needs and delegate to the arena.

use crate::addr::Addr;
use crate::attr::AttrMap;
use crate::error::{LayoutError, Result};
use crate::layout::{
    DatumSpec, Filter, Item, ItemId, LayoutArena, Members, ParamKind, TypeId, EMPTY_TYPE, ROOT,
};
use crate::prim::{self, Prim};
use crate::shape::{self, DimValue};

/// Any item, tagged by kind.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Dict(Dict<'a>),
    List(List<'a>),
    Datum(Datum<'a>),
    Param(Param<'a>),
    Type(DataType<'a>),
}

impl<'a> Node<'a> {
    pub(crate) fn wrap(arena: &'a LayoutArena, id: ItemId) -> Node<'a> {
        match arena.item(id) {
            Item::Dict(_) => Node::Dict(Dict { arena, id }),
            Item::List(_) => Node::List(List { arena, id }),
            Item::Datum(_) => Node::Datum(Datum { arena, id }),
            Item::Param(_) => Node::Param(Param { arena, id }),
            Item::Type(_) => Node::Type(DataType { arena, id }),
        }
    }

    pub fn id(&self) -> ItemId {
        match self {
            Node::Dict(h) => h.id,
            Node::List(h) => h.id,
            Node::Datum(h) => h.id,
            Node::Param(h) => h.id,
            Node::Type(h) => h.id,
        }
    }

    pub fn as_dict(self) -> Option<Dict<'a>> {
        match self {
            Node::Dict(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_list(self) -> Option<List<'a>> {
        match self {
            Node::List(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_datum(self) -> Option<Datum<'a>> {
        match self {
            Node::Datum(h) => Some(h),
            _ => None,
        }
    }
}

macro_rules! impl_navigation {
    ($handle:ident) => {
        impl<'a> $handle<'a> {
            /// Arena id of this item.
            pub fn id(&self) -> ItemId {
                self.id
            }

            /// The arena this handle borrows.
            pub fn arena(&self) -> &'a LayoutArena {
                self.arena
            }

            /// Root dict of the whole layout.
            pub fn root(&self) -> Dict<'a> {
                Dict {
                    arena: self.arena,
                    id: ROOT,
                }
            }

            /// Parent container, `None` for the root dict.
            pub fn parent(&self) -> Option<Node<'a>> {
                self.arena
                    .item(self.id)
                    .parent()
                    .map(|p| Node::wrap(self.arena, p))
            }

            /// Item name, `None` for anonymous items.
            pub fn name(&self) -> Option<&'a str> {
                self.arena.item(self.id).name()
            }

            /// Doc comment lines recorded for this item.
            pub fn docs(&self) -> &'a [String] {
                self.arena.docs(self.id)
            }

            /// Attribute map recorded for this item, if any.
            pub fn attrs(&self) -> Option<&'a AttrMap> {
                self.arena.attrs(self.id)
            }
        }
    };
}

/// Handle on a dict item.
#[derive(Debug, Clone, Copy)]
pub struct Dict<'a> {
    arena: &'a LayoutArena,
    id: ItemId,
}

impl_navigation!(Dict);

impl<'a> Dict<'a> {
    /// Child item by name (no recursion through enclosing dicts).
    pub fn get(&self, name: &str) -> Option<Node<'a>> {
        self.arena
            .dict_get(self.id, name)
            .map(|id| Node::wrap(self.arena, id))
    }

    /// Number of child items.
    pub fn len(&self) -> usize {
        match self.arena.item(self.id) {
            Item::Dict(d) => d.items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(name, child)` in declaration order.
    pub fn items(&self) -> impl Iterator<Item = (&'a str, Node<'a>)> + '_ {
        let arena = self.arena;
        match arena.item(self.id) {
            Item::Dict(d) => d.items.iter(),
            _ => unreachable!("Dict handle on non-dict item"),
        }
        .map(move |(name, id)| (name, Node::wrap(arena, id as ItemId)))
    }

    /// Parameters declared in this dict (not inherited ones).
    pub fn params(&self) -> impl Iterator<Item = (&'a str, Param<'a>)> + '_ {
        let arena = self.arena;
        match arena.item(self.id) {
            Item::Dict(d) => d.params.iter(),
            _ => unreachable!("Dict handle on non-dict item"),
        }
        .map(move |(name, id)| {
            (
                name,
                Param {
                    arena,
                    id: id as ItemId,
                },
            )
        })
    }

    /// Types declared in this dict (not inherited ones).  Interned
    /// primitives resolve as `TypeRef::Prim`.
    pub fn types(&self) -> impl Iterator<Item = (&'a str, TypeRef<'a>)> + '_ {
        let arena = self.arena;
        match arena.item(self.id) {
            Item::Dict(d) => d.types.iter(),
            _ => unreachable!("Dict handle on non-dict item"),
        }
        .map(move |(name, tid)| (name, TypeRef::wrap(arena, tid)))
    }

    /// Resolve a parameter name from this scope, recursing through
    /// enclosing dicts.
    pub fn param(&self, name: &str) -> Option<Param<'a>> {
        let id = self.arena.resolve_param(self.id, name).ok()?;
        Some(Param {
            arena: self.arena,
            id,
        })
    }

    /// Resolve a type name from this scope, recursing through enclosing
    /// dicts.  Does not intern unprefixed primitives.
    pub fn datatype(&self, name: &str) -> Option<TypeRef<'a>> {
        let tid = self.arena.lookup_type(self.id, name)?;
        Some(TypeRef::wrap(self.arena, tid))
    }
}

/// Handle on a list item.
#[derive(Debug, Clone, Copy)]
pub struct List<'a> {
    arena: &'a LayoutArena,
    id: ItemId,
}

impl_navigation!(List);

impl<'a> List<'a> {
    pub fn len(&self) -> usize {
        match self.arena.item(self.id) {
            Item::List(l) => l.items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member by index.
    pub fn get(&self, index: usize) -> Option<Node<'a>> {
        match self.arena.item(self.id) {
            Item::List(l) => l.items.get(index).map(|&id| Node::wrap(self.arena, id)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Node<'a>> + '_ {
        let arena = self.arena;
        match arena.item(self.id) {
            Item::List(l) => l.items.iter(),
            _ => unreachable!("List handle on non-list item"),
        }
        .map(move |&id| Node::wrap(arena, id))
    }
}

/// A datum's datatype: primitive, defined type, or the empty compound.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'a> {
    /// The empty compound `{}`.
    Empty,
    /// One of the 47 predefined primitives.
    Prim(&'static Prim),
    /// A compound or typedef defined in the layout.
    Type(DataType<'a>),
}

impl<'a> TypeRef<'a> {
    pub(crate) fn wrap(arena: &'a LayoutArena, tid: TypeId) -> TypeRef<'a> {
        if tid == EMPTY_TYPE {
            TypeRef::Empty
        } else if tid < 0 {
            match prim::by_id((-tid) as u32) {
                Some(p) => TypeRef::Prim(p),
                None => TypeRef::Empty,
            }
        } else {
            TypeRef::Type(DataType {
                arena,
                id: tid as ItemId,
            })
        }
    }

    /// Byte size of one value, `None` when indeterminate.
    pub fn size(&self) -> Result<Option<u64>> {
        match self {
            TypeRef::Empty => Ok(Some(0)),
            TypeRef::Prim(p) => Ok(Some(p.size as u64)),
            TypeRef::Type(t) => t.arena.type_size(t.id as TypeId),
        }
    }

    /// Alignment, `None` for the empty compound.
    pub fn align(&self) -> Result<Option<u64>> {
        match self {
            TypeRef::Empty => Ok(None),
            TypeRef::Prim(p) => Ok(Some(p.align as u64)),
            TypeRef::Type(t) => t.arena.type_align(t.id as TypeId),
        }
    }
}

/// Handle on a defined datatype (compound or typedef).
#[derive(Debug, Clone, Copy)]
pub struct DataType<'a> {
    arena: &'a LayoutArena,
    id: ItemId,
}

impl_navigation!(DataType);

impl<'a> DataType<'a> {
    fn item(&self) -> &'a super::TypeItem {
        match self.arena.item(self.id) {
            Item::Type(t) => t,
            _ => unreachable!("DataType handle on non-type item"),
        }
    }

    fn check_closed(&self) -> Result<&'a super::TypeItem> {
        let t = self.item();
        if t.is_open() {
            return Err(LayoutError::State(
                "type is still open; membership not final".to_string(),
            ));
        }
        Ok(t)
    }

    /// True for a typedef (single anonymous member).
    pub fn is_typedef(&self) -> bool {
        matches!(self.item().members, Members::Typedef(_))
    }

    /// The typedef's anonymous member (key 0), `None` for compounds.
    pub fn typedef_member(&self) -> Result<Option<Datum<'a>>> {
        let t = self.check_closed()?;
        Ok(match t.members {
            Members::Typedef(m) => Some(Datum {
                arena: self.arena,
                id: m,
            }),
            Members::Compound(_) => None,
        })
    }

    /// Compound member by name.
    pub fn get(&self, name: &str) -> Result<Option<Datum<'a>>> {
        let t = self.check_closed()?;
        Ok(match &t.members {
            Members::Compound(m) => m.get(name).map(|id| Datum {
                arena: self.arena,
                id: id as ItemId,
            }),
            Members::Typedef(_) => None,
        })
    }

    /// Number of members (1 for a typedef).
    pub fn len(&self) -> Result<usize> {
        let t = self.check_closed()?;
        Ok(match &t.members {
            Members::Typedef(_) => 1,
            Members::Compound(m) => m.len(),
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterate members in declaration order; a typedef yields its one
    /// anonymous member under an empty name.
    pub fn members(&self) -> Result<Vec<(&'a str, Datum<'a>)>> {
        let t = self.check_closed()?;
        Ok(match &t.members {
            Members::Typedef(m) => vec![(
                "",
                Datum {
                    arena: self.arena,
                    id: *m,
                },
            )],
            Members::Compound(m) => m
                .iter()
                .map(|(name, id)| {
                    (
                        name,
                        Datum {
                            arena: self.arena,
                            id: id as ItemId,
                        },
                    )
                })
                .collect(),
        })
    }

    /// Total byte size, `None` when indeterminate.
    pub fn size(&self) -> Result<Option<u64>> {
        self.arena.type_size(self.id as TypeId)
    }

    /// Alignment (maximum of member alignments, or as declared).
    pub fn align(&self) -> Result<u64> {
        self.check_closed().map(|t| t.align as u64)
    }
}

/// Handle on a datum item.
#[derive(Debug, Clone, Copy)]
pub struct Datum<'a> {
    arena: &'a LayoutArena,
    id: ItemId,
}

impl_navigation!(Datum);

impl<'a> Datum<'a> {
    fn item(&self) -> &'a super::DatumItem {
        match self.arena.item(self.id) {
            Item::Datum(d) => d,
            _ => unreachable!("Datum handle on non-datum item"),
        }
    }

    /// The datum's datatype.
    pub fn datatype(&self) -> TypeRef<'a> {
        TypeRef::wrap(self.arena, self.item().typeid)
    }

    /// Decoded shape; empty for scalars.
    pub fn shape(&self) -> Result<Vec<DimValue>> {
        self.item().shape.iter().map(|&d| shape::decode(d)).collect()
    }

    /// Effective alignment: explicit, else the type's, else `None` for
    /// the empty compound.
    pub fn alignment(&self) -> Result<Option<u64>> {
        self.arena.datum_alignment(self.id)
    }

    /// Stream address, `Addr::Unspecified` when never placed.
    pub fn address(&self) -> Addr {
        self.arena.address(self.id)
    }

    /// Attached filter, if any.
    pub fn filter(&self) -> Option<&'a Filter> {
        self.item().filt.as_ref()
    }

    /// Total byte size, `None` while any dimension is unresolved.
    pub fn size(&self) -> Result<Option<u64>> {
        self.arena.datum_size(self.id)
    }
}

/// Handle on a parameter item.
#[derive(Debug, Clone, Copy)]
pub struct Param<'a> {
    arena: &'a LayoutArena,
    id: ItemId,
}

impl_navigation!(Param);

impl<'a> Param<'a> {
    fn item(&self) -> &'a super::ParamItem {
        match self.arena.item(self.id) {
            Item::Param(p) => p,
            _ => unreachable!("Param handle on non-param item"),
        }
    }

    /// True when the parameter's value lives in the data stream.
    pub fn is_dynamic(&self) -> bool {
        matches!(self.item().kind, ParamKind::Dynamic { .. })
    }

    /// Datatype of a dynamic parameter, `None` for fixed ones.
    pub fn datatype(&self) -> Option<TypeRef<'a>> {
        match self.item().kind {
            ParamKind::Dynamic { typeid, .. } => Some(TypeRef::wrap(self.arena, typeid)),
            ParamKind::Fixed(_) => None,
        }
    }

    /// Fixed value, or a dynamic parameter's bound value.
    pub fn value(&self) -> Option<i64> {
        self.arena.param_value(self.id).ok().flatten()
    }

    /// Effective alignment: explicit, else the datatype's; `None` for
    /// fixed parameters.
    pub fn alignment(&self) -> Result<Option<u64>> {
        match self.item().kind {
            ParamKind::Fixed(_) => Ok(None),
            ParamKind::Dynamic { typeid, align, .. } => {
                if align > 0 {
                    Ok(Some(align))
                } else {
                    self.arena.type_align(typeid)
                }
            }
        }
    }

    /// Stream address of a dynamic parameter's integer.
    pub fn address(&self) -> Addr {
        self.arena.address(self.id)
    }

    /// Byte size of the stored value (0 for fixed parameters).
    pub fn size(&self) -> Result<u64> {
        match self.item().kind {
            ParamKind::Fixed(_) => Ok(0),
            ParamKind::Dynamic { typeid, .. } => {
                Ok(self.arena.type_size(typeid)?.unwrap_or(0))
            }
        }
    }
}

impl LayoutArena {
    /// Read handle on the root dict.
    pub fn root(&self) -> Dict<'_> {
        Dict {
            arena: self,
            id: ROOT,
        }
    }

    /// Read handle on any item.
    pub fn node(&self, id: ItemId) -> Option<Node<'_>> {
        self.get_item(id).map(|_| Node::wrap(self, id))
    }
}

/// Mutable wrapper for dict construction.
pub struct DictMut<'a> {
    arena: &'a mut LayoutArena,
    id: ItemId,
}

impl<'a> DictMut<'a> {
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Declare a named datum; `Redeclaration` if the name exists.
    pub fn set(&mut self, name: &str, spec: DatumSpec) -> Result<ItemId> {
        self.arena.dict_set_datum(self.id, name, spec)
    }

    /// Get or create a subdict.
    pub fn subdict(&mut self, name: &str) -> Result<DictMut<'_>> {
        let id = self.arena.dict_subdict(self.id, name)?;
        Ok(DictMut {
            arena: &mut *self.arena,
            id,
        })
    }

    /// Get or create a sublist.
    pub fn sublist(&mut self, name: &str) -> Result<ListMut<'_>> {
        let id = self.arena.dict_sublist(self.id, name)?;
        Ok(ListMut {
            arena: &mut *self.arena,
            id,
        })
    }

    /// Declare a fixed parameter.
    pub fn fixed_param(&mut self, name: &str, value: i64) -> Result<ItemId> {
        self.arena.def_fixed_param(self.id, name, value)
    }

    /// Declare a dynamic parameter.
    pub fn dynamic_param(&mut self, name: &str, typeid: TypeId, place: Addr) -> Result<ItemId> {
        self.arena.def_dynamic_param(self.id, name, typeid, place)
    }

    /// Open a compound type declared in this dict.
    pub fn compound(&mut self, name: Option<&str>, align: Option<u64>) -> Result<CompoundMut<'_>> {
        let id = self.arena.open_compound(self.id, name, align)?;
        Ok(CompoundMut {
            arena: &mut *self.arena,
            id,
        })
    }

    /// Declare a typedef.
    pub fn typedef(&mut self, name: &str, spec: DatumSpec, align: Option<u64>) -> Result<ItemId> {
        self.arena.def_typedef(self.id, name, spec, align)
    }
}

/// Mutable wrapper for list construction.
pub struct ListMut<'a> {
    arena: &'a mut LayoutArena,
    id: ItemId,
}

impl<'a> ListMut<'a> {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn append(&mut self, spec: DatumSpec) -> Result<ItemId> {
        self.arena.list_append_datum(self.id, spec)
    }

    pub fn append_dict(&mut self) -> Result<DictMut<'_>> {
        let id = self.arena.list_append_dict(self.id)?;
        Ok(DictMut {
            arena: &mut *self.arena,
            id,
        })
    }

    pub fn append_list(&mut self) -> Result<ListMut<'_>> {
        let id = self.arena.list_append_list(self.id)?;
        Ok(ListMut {
            arena: &mut *self.arena,
            id,
        })
    }
}

/// Mutable wrapper for an open compound type.
pub struct CompoundMut<'a> {
    arena: &'a mut LayoutArena,
    id: ItemId,
}

impl<'a> CompoundMut<'a> {
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Append a member; only legal while the compound is open.
    pub fn set(&mut self, name: &str, spec: DatumSpec) -> Result<ItemId> {
        self.arena.compound_set_member(self.id, name, spec)
    }

    /// Freeze membership and finalize size and alignment.
    pub fn close(self) -> Result<ItemId> {
        self.arena.close_compound(self.id)?;
        Ok(self.id)
    }
}

impl LayoutArena {
    /// Mutable handle on the root dict.
    pub fn root_mut(&mut self) -> DictMut<'_> {
        DictMut {
            arena: self,
            id: ROOT,
        }
    }

    /// Mutable dict handle on an arbitrary dict item.
    pub fn dict_mut_handle(&mut self, id: ItemId) -> Result<DictMut<'_>> {
        match self.item(id) {
            Item::Dict(_) => Ok(DictMut { arena: self, id }),
            _ => Err(LayoutError::State(format!("item {} is not a dict", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::encode_fixed;

    #[test]
    fn handles_navigate_and_query() {
        let mut arena = LayoutArena::new();
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        {
            let mut root = arena.root_mut();
            let mut c = root.compound(Some("pt"), None).unwrap();
            c.set("x", DatumSpec::scalar(f8)).unwrap();
            c.set("y", DatumSpec::scalar(f8)).unwrap();
            c.close().unwrap();
        }
        let pt = arena.lookup_type(ROOT, "pt").unwrap();
        arena
            .dict_set_datum(
                ROOT,
                "p",
                DatumSpec::scalar(pt).with_shape(vec![encode_fixed(3)]),
            )
            .unwrap();

        let root = arena.root();
        let p = root.get("p").unwrap().as_datum().unwrap();
        assert_eq!(p.name(), Some("p"));
        assert_eq!(p.shape().unwrap(), vec![DimValue::Fixed(3)]);
        assert_eq!(p.alignment().unwrap(), Some(8));
        assert_eq!(p.size().unwrap(), Some(48));
        match p.datatype() {
            TypeRef::Type(t) => {
                assert!(!t.is_typedef());
                assert_eq!(t.len().unwrap(), 2);
                assert_eq!(t.size().unwrap(), Some(16));
                assert_eq!(t.align().unwrap(), 8);
                let names: Vec<&str> =
                    t.members().unwrap().into_iter().map(|(n, _)| n).collect();
                assert_eq!(names, ["x", "y"]);
            }
            _ => panic!("expected a defined type"),
        }
        assert!(p.root().get("pt").is_none(), "types are not dict items");
    }

    #[test]
    fn open_compound_rejects_final_reads() {
        let mut arena = LayoutArena::new();
        let f8 = arena.resolve_type(ROOT, "<f8").unwrap();
        let t = arena.open_compound(ROOT, Some("open"), None).unwrap();
        arena
            .compound_set_member(t, "x", DatumSpec::scalar(f8))
            .unwrap();
        let root = arena.root();
        let (_, tref) = root.types().next().unwrap();
        if let TypeRef::Type(dt) = tref {
            assert!(dt.members().is_err());
            assert!(dt.align().is_err());
        } else {
            panic!("expected defined type");
        }
    }
}
