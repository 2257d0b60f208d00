// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pure-metadata HDF5 reader.
//!
//! Walks an HDF5 file's on-disk structures - superblock, object headers,
//! B-trees (v1 and v2), local heaps, fractal heaps - and produces a
//! [`LayoutArena`] describing where every dataset's bytes lie.  The reader
//! never touches array payloads and never calls an external HDF5 library.
//!
//! Groups become dicts, datasets become datums; HDF5 datatypes map onto
//! the primitive catalog or onto anonymous compound types.  Information
//! the arena cannot hold (chunk inventories, external-storage marks,
//! whole filter pipelines) rides in side tables on [`Hdf5Layout`].
//!
//! Failure policy: recognized corruption inside one group entry is logged
//! and that entry is skipped; damage to the file skeleton (no superblock,
//! filtered fractal heap, incoherent B-tree) ends the read with an error.

mod btree;
mod cursor;
mod dtype;
mod heap;
mod message;
mod oheader;
mod superblock;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, warn};

use crate::addr::Addr;
use crate::attr::{AttrMap, AttrValue};
use crate::error::Hdf5Error;
use crate::layout::{DatumSpec, Filter, FilterArg, FilterDir, ItemId, LayoutArena, TypeId, ROOT};
use crate::prim;
use crate::shape;

use self::dtype::H5Type;
use self::message::{DataLayout, Link};
use self::oheader::Message;

/// Undefined-address sentinel (all ones on disk).
pub(crate) const UNDEF: i64 = -1;

/// One decoded filter-pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H5Filter {
    pub id: u16,
    pub name: String,
    pub flags: u16,
    pub cdata: Vec<u32>,
}

/// Per-chunk inventory of a chunked dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    /// Absolute address of the chunk's bytes.
    pub addr: i64,
    /// Stored byte size of the chunk (after filters).
    pub nbytes: u32,
    pub filter_mask: u32,
    /// Element offsets of the chunk within the dataset, one per dimension.
    pub offsets: Vec<u64>,
}

/// Chunk map of one dataset: chunk dimensions plus every chunk's address
/// and B-tree key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkMap {
    pub dims: Vec<u32>,
    pub entries: Vec<ChunkEntry>,
}

/// The reader's product: the arena plus side tables for what the arena
/// cannot hold.
#[derive(Debug, Default)]
pub struct Hdf5Layout {
    pub arena: LayoutArena,
    /// Chunk inventories, keyed by datum id.
    pub chunks: HashMap<ItemId, ChunkMap>,
    /// Datums whose data is external or virtual (address is the
    /// not-allocated sentinel).
    pub external: HashSet<ItemId>,
    /// Full filter pipelines, keyed by datum id (the datum's own filter
    /// descriptor carries only the primary stage).
    pub pipelines: HashMap<ItemId, Vec<H5Filter>>,
}

/// Read the layout of an HDF5 file on disk.
pub fn read_file(path: impl AsRef<Path>) -> Result<Hdf5Layout, Hdf5Error> {
    let file = File::open(path)?;
    read(BufReader::new(file))
}

/// Read the layout of an HDF5 file from any seekable stream.
pub fn read<R: Read + Seek>(mut f: R) -> Result<Hdf5Layout, Hdf5Error> {
    let sb = superblock::locate(&mut f)?;
    let mut r = Reader {
        f,
        offsz: sb.offsz as usize,
        lensz: sb.lensz as usize,
        base: sb.base,
        kleaf: sb.kleaf,
        kint: sb.kint,
        kintis: sb.kintis,
        sharetab: UNDEF,
    };
    if sb.ext != UNDEF {
        r.superblock_extension(sb.ext)?;
    }
    let mut out = Hdf5Layout {
        arena: LayoutArena::new(),
        ..Hdf5Layout::default()
    };
    let mut visited = HashSet::new();
    visited.insert(sb.root);
    let msgs = r.object_header(sb.root, false)?;
    let meta = classify(&r, &msgs)?;
    match meta {
        ObjectMeta::Group(g) => r.build_group(&mut out, &mut visited, ROOT, &g, 0)?,
        _ => {
            return Err(Hdf5Error::Corrupt(
                "root object header is not a group".to_string(),
            ))
        }
    }
    Ok(out)
}

/// File walker: the open stream plus the superblock-derived geometry that
/// every structure decoder needs.
pub(crate) struct Reader<R> {
    pub(crate) f: R,
    /// Size of offsets, 4 or 8 bytes.
    pub(crate) offsz: usize,
    /// Size of lengths, 4 or 8 bytes.
    pub(crate) lensz: usize,
    /// Base address added to every stored file address.
    pub(crate) base: u64,
    /// Superblock B-tree K values, kept for diagnostics; the walk itself
    /// never needs them.
    #[allow(dead_code)]
    pub(crate) kleaf: u16,
    #[allow(dead_code)]
    pub(crate) kint: u16,
    #[allow(dead_code)]
    pub(crate) kintis: u16,
    /// Shared-message table address from the superblock extension.
    #[allow(dead_code)]
    pub(crate) sharetab: i64,
}

impl<R: Read + Seek> Reader<R> {
    pub(crate) fn seek_to(&mut self, addr: u64) -> Result<(), Hdf5Error> {
        self.f.seek(SeekFrom::Start(addr))?;
        Ok(())
    }

    /// Seek to a stored (base-relative) address.
    pub(crate) fn seek_rel(&mut self, addr: i64) -> Result<(), Hdf5Error> {
        if addr < 0 {
            return Err(Hdf5Error::Corrupt(
                "attempt to follow an undefined address".to_string(),
            ));
        }
        self.seek_to(addr as u64 + self.base)
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, Hdf5Error> {
        let mut buf = vec![0u8; n];
        self.f.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Hdf5Error> {
        let mut b = [0u8; 1];
        self.f.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, Hdf5Error> {
        let mut b = [0u8; 2];
        self.f.read_exact(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, Hdf5Error> {
        let mut b = [0u8; 4];
        self.f.read_exact(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    /// Little-endian unsigned integer of 1..=8 bytes from the stream.
    pub(crate) fn read_uint(&mut self, width: usize) -> Result<u64, Hdf5Error> {
        let mut b = [0u8; 8];
        self.f.read_exact(&mut b[..width])?;
        Ok(u64::from_le_bytes(b))
    }

    /// Signed (sign-extended) integer of `width` bytes; all-ones is -1.
    pub(crate) fn read_sint(&mut self, width: usize) -> Result<i64, Hdf5Error> {
        let v = self.read_uint(width)?;
        let shift = 64 - 8 * width as u32;
        Ok(((v << shift) as i64) >> shift)
    }

    /// A stored file offset (`size-of-offsets` bytes).
    pub(crate) fn read_offset(&mut self) -> Result<i64, Hdf5Error> {
        self.read_sint(self.offsz)
    }

    /// A stored length (`size-of-lengths` bytes).
    pub(crate) fn read_length(&mut self) -> Result<i64, Hdf5Error> {
        self.read_sint(self.lensz)
    }

    pub(crate) fn expect_signature(&mut self, sig: &[u8; 4], what: &str) -> Result<(), Hdf5Error> {
        let got = self.read_bytes(4)?;
        if got != sig {
            return Err(Hdf5Error::Corrupt(format!(
                "missing {} - {}",
                String::from_utf8_lossy(sig),
                what
            )));
        }
        Ok(())
    }

    // ---- group assembly --------------------------------------------------

    fn build_group(
        &mut self,
        out: &mut Hdf5Layout,
        visited: &mut HashSet<i64>,
        dict: ItemId,
        meta: &GroupMeta,
        depth: u32,
    ) -> Result<(), Hdf5Error> {
        if depth > 128 {
            return Err(Hdf5Error::Corrupt("group nesting too deep".to_string()));
        }
        let links = self.group_links(meta)?;
        for (name, target) in links {
            if target == UNDEF {
                continue;
            }
            if !visited.insert(target) {
                debug!("hdf5: {} links to an already-visited object, skipped", name);
                continue;
            }
            match self.build_entry(out, visited, dict, &name, target, depth) {
                Ok(()) => {}
                Err(Hdf5Error::Corrupt(msg)) => {
                    warn!("hdf5: skipping {}: {}", name, msg);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn build_entry(
        &mut self,
        out: &mut Hdf5Layout,
        visited: &mut HashSet<i64>,
        dict: ItemId,
        name: &str,
        target: i64,
        depth: u32,
    ) -> Result<(), Hdf5Error> {
        let msgs = self.object_header(target, false)?;
        match classify(self, &msgs)? {
            ObjectMeta::Group(g) => {
                let sub = out
                    .arena
                    .dict_subdict(dict, name)
                    .map_err(|e| Hdf5Error::Corrupt(e.to_string()))?;
                self.build_group(out, visited, sub, &g, depth + 1)
            }
            ObjectMeta::Dataset(d) => self.build_dataset(out, dict, name, &d),
            ObjectMeta::Other => {
                // An object header with neither group nor dataset
                // messages still names something; record it as an empty
                // datum so the tree keeps its shape.
                out.arena
                    .dict_set_datum(dict, name, DatumSpec::default())
                    .map_err(|e| Hdf5Error::Corrupt(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Collect `(name, object-header-address)` pairs for a group, in
    /// creation order when the file tracks it.
    fn group_links(&mut self, meta: &GroupMeta) -> Result<Vec<(String, i64)>, Hdf5Error> {
        if let Some((btree, heapaddr)) = meta.v1 {
            return self.btree1_symbols(btree, heapaddr);
        }
        let mut links: Vec<Link> = meta.compact.clone();
        if let Some(info) = &meta.link_info {
            if info.btree != UNDEF {
                let otree = match info.corder_btree {
                    Some(addr) if addr != UNDEF => Some(self.btree2_corder(addr)?),
                    _ => None,
                };
                links.extend(self.btree2_links(info.btree, info.fheap, otree.as_ref())?);
                if otree.is_some() {
                    links.sort_by_key(|l| l.corder.unwrap_or(i64::MAX));
                }
            }
        }
        Ok(links
            .into_iter()
            .filter_map(|l| {
                if let Some(soft) = &l.soft {
                    debug!("hdf5: soft link {} -> {} not followed", l.name, soft);
                    return None;
                }
                Some((l.name, l.target))
            })
            .collect())
    }

    // ---- dataset conversion ----------------------------------------------

    fn build_dataset(
        &mut self,
        out: &mut Hdf5Layout,
        dict: ItemId,
        name: &str,
        meta: &DatasetMeta,
    ) -> Result<(), Hdf5Error> {
        let Some(h5ty) = &meta.dtype else {
            return Err(Hdf5Error::Corrupt("dataset has no datatype message".to_string()));
        };
        let (typeid, extra) = intern_type(&mut out.arena, h5ty)?;

        // Host shape from the dataspace, then trailing dims the datatype
        // contributes (array element dims, string/opaque byte counts).
        let mut dims: Vec<i64> = Vec::new();
        let mut bind0 = None;
        if let Some(space) = &meta.space {
            for (i, &d) in space.dims.iter().enumerate() {
                dims.push(shape::encode_fixed(d));
                if i == 0 {
                    if let Some(maxdims) = &space.maxdims {
                        if maxdims.first() == Some(&-1) {
                            // Unlimited leading dimension; the current
                            // extent binds through the side channel.
                            dims[0] = shape::UNLIMITED;
                            bind0 = Some(d);
                        }
                    }
                }
            }
        }
        dims.extend(extra.iter().map(|&d| shape::encode_fixed(d)));

        let mut spec = DatumSpec::scalar(typeid).with_shape(dims);
        let mut chunkmap = None;
        let mut external = meta.external;
        match &meta.layout {
            Some(DataLayout::Contiguous { addr }) => {
                spec.place = if *addr == UNDEF {
                    Addr::Unallocated
                } else {
                    Addr::At(*addr as u64 + self.base)
                };
            }
            Some(DataLayout::Compact { addr }) => {
                spec.place = Addr::At(*addr);
            }
            Some(DataLayout::Chunked { addr, dims }) => {
                spec.place = Addr::Unallocated;
                let entries = if *addr == UNDEF {
                    Vec::new()
                } else {
                    self.btree1_chunks(*addr, dims.len())?
                };
                chunkmap = Some(ChunkMap {
                    dims: dims.clone(),
                    entries,
                });
            }
            Some(DataLayout::Virtual) => {
                spec.place = Addr::Unallocated;
                external = true;
            }
            None => {}
        }
        if external {
            spec.place = Addr::Unallocated;
        }
        if let Some(f) = meta.filters.first() {
            spec.filt = Some(Filter {
                name: f.name.clone(),
                dir: FilterDir::Write,
                args: f.cdata.iter().map(|&v| FilterArg::Int(v as i64)).collect(),
            });
            if meta.filters.len() > 1 {
                warn!(
                    "hdf5: dataset {} has {} filter stages; layout records the first",
                    name,
                    meta.filters.len()
                );
            }
        }

        let id = out
            .arena
            .dict_set_datum(dict, name, spec)
            .map_err(|e| Hdf5Error::Corrupt(e.to_string()))?;
        if let Some(extent) = bind0 {
            let _ = out.arena.bind_unlimited(id, extent);
        }
        if let Some(map) = chunkmap {
            out.chunks.insert(id, map);
        }
        if external {
            out.external.insert(id);
        }
        if !meta.filters.is_empty() {
            out.pipelines.insert(id, meta.filters.clone());
        }
        out.arena.merge_attrs(id, type_attrs(h5ty));
        Ok(())
    }
}

/// Attributes describing datatype details the arena cannot express.
fn type_attrs(h5ty: &H5Type) -> AttrMap {
    let mut attrs = AttrMap::new();
    match h5ty {
        H5Type::Enum { names, values, .. } => {
            attrs.set("enum_names", AttrValue::StrArray(names.clone()));
            attrs.set("enum_values", AttrValue::IntArray(values.clone()));
        }
        H5Type::Opaque { tag, .. } => {
            attrs.set("h5class", AttrValue::Str("opaque".to_string()));
            if !tag.is_empty() {
                attrs.set("h5tag", AttrValue::Str(tag.clone()));
            }
        }
        H5Type::Reference { region, .. } => {
            attrs.set(
                "h5class",
                AttrValue::Str(if *region { "refreg" } else { "refobj" }.to_string()),
            );
        }
        H5Type::VarLen { .. } => {
            attrs.set("h5class", AttrValue::Str("vlen".to_string()));
        }
        _ => {}
    }
    attrs
}

/// Map a decoded HDF5 datatype to an arena type id plus trailing
/// dimensions appended to the host shape.
fn intern_type(
    arena: &mut LayoutArena,
    h5ty: &H5Type,
) -> Result<(TypeId, Vec<u64>), Hdf5Error> {
    fn prim_or_bytes(name: &str, size: u32) -> (TypeId, Vec<u64>) {
        match prim::id_of(name) {
            Some(id) => (-(id as TypeId), Vec::new()),
            None => bytes_fallback(size),
        }
    }
    fn bytes_fallback(size: u32) -> (TypeId, Vec<u64>) {
        let u1 = prim::id_of("|u1").expect("|u1 is in the catalog");
        let dims = if size > 1 { vec![size as u64] } else { Vec::new() };
        (-(u1 as TypeId), dims)
    }

    Ok(match h5ty {
        H5Type::Int { big, signed, size } => {
            let name = format!(
                "{}{}{}",
                if *big { '>' } else { '<' },
                if *signed { 'i' } else { 'u' },
                size
            );
            prim_or_bytes(&name, *size)
        }
        H5Type::Float { big, size } => {
            let name = format!("{}f{}", if *big { '>' } else { '<' }, size);
            prim_or_bytes(&name, *size)
        }
        H5Type::Time { big, size } | H5Type::BitField { big, size } => {
            let name = format!("{}u{}", if *big { '>' } else { '<' }, size);
            prim_or_bytes(&name, *size)
        }
        H5Type::Str { utf8, size } => {
            let id = prim::id_of(if *utf8 { "|U1" } else { "|S1" }).expect("catalog");
            let dims = if *size > 1 { vec![*size as u64] } else { Vec::new() };
            (-(id as TypeId), dims)
        }
        H5Type::Opaque { size, .. }
        | H5Type::Reference { size, .. }
        | H5Type::VarLen { size, .. } => bytes_fallback(*size),
        H5Type::Enum { base, .. } => {
            let (tid, dims) = intern_type(arena, base)?;
            (tid, dims)
        }
        H5Type::Array { dims, base } => {
            let (tid, inner) = intern_type(arena, base)?;
            let mut all: Vec<u64> = dims.iter().map(|&d| d as u64).collect();
            all.extend(inner);
            (tid, all)
        }
        H5Type::Compound { size, members } => {
            (intern_compound(arena, *size, members)?, Vec::new())
        }
    })
}

/// Build an anonymous closed compound matching the HDF5 member offsets,
/// inserting byte padding members where the natural packing would land a
/// member short of its stored offset.
fn intern_compound(
    arena: &mut LayoutArena,
    total: u32,
    members: &[dtype::H5Member],
) -> Result<TypeId, Hdf5Error> {
    let u1: TypeId = -(prim::id_of("|u1").expect("catalog") as TypeId);
    let corrupt = |e: crate::error::LayoutError| Hdf5Error::Corrupt(e.to_string());
    let tid = arena.open_compound(ROOT, None, None).map_err(corrupt)?;
    let mut ordered: Vec<&dtype::H5Member> = members.iter().collect();
    ordered.sort_by_key(|m| m.offset);
    let mut npad = 0usize;
    let mut pad_to = |arena: &mut LayoutArena, target: u64| -> Result<(), Hdf5Error> {
        let cursize = arena
            .compound_running_size(tid)
            .map_err(corrupt)?
            .unwrap_or(0);
        if target > cursize {
            let pad = DatumSpec::scalar(u1)
                .with_shape(vec![shape::encode_fixed(target - cursize)]);
            let pname = format!("__pad{}", npad);
            npad += 1;
            arena.compound_set_member(tid, &pname, pad).map_err(corrupt)?;
        }
        Ok(())
    };
    for m in ordered {
        let (mtid, extra) = intern_type(arena, &m.ty)?;
        let malign = arena.type_align(mtid).map_err(corrupt)?.unwrap_or(1);
        let cursize = arena
            .compound_running_size(tid)
            .map_err(corrupt)?
            .unwrap_or(0);
        let natural = cursize.div_ceil(malign) * malign;
        match (m.offset as u64).cmp(&natural) {
            std::cmp::Ordering::Greater => pad_to(arena, m.offset as u64)?,
            std::cmp::Ordering::Less => warn!(
                "hdf5: compound member {} at offset {} overlaps natural packing at {}",
                m.name, m.offset, natural
            ),
            std::cmp::Ordering::Equal => {}
        }
        let mut dims: Vec<i64> = m
            .dims
            .iter()
            .map(|&d| shape::encode_fixed(d as u64))
            .collect();
        dims.extend(extra.iter().map(|&d| shape::encode_fixed(d)));
        let spec = DatumSpec::scalar(mtid).with_shape(dims);
        arena
            .compound_set_member(tid, &m.name, spec)
            .map_err(corrupt)?;
    }
    pad_to(arena, total as u64)?;
    arena.close_compound(tid).map_err(corrupt)?;
    Ok(tid as TypeId)
}

// ---- object header classification ---------------------------------------

pub(crate) struct LinkInfo {
    pub fheap: i64,
    pub btree: i64,
    pub corder_btree: Option<i64>,
}

#[derive(Default)]
pub(crate) struct GroupMeta {
    /// v1 group: symbol-table B-tree and local-heap addresses.
    pub v1: Option<(i64, i64)>,
    pub link_info: Option<LinkInfo>,
    pub compact: Vec<Link>,
}

#[derive(Default)]
pub(crate) struct DatasetMeta {
    pub space: Option<message::Dataspace>,
    pub dtype: Option<H5Type>,
    pub layout: Option<DataLayout>,
    pub filters: Vec<H5Filter>,
    pub external: bool,
}

pub(crate) enum ObjectMeta {
    Group(GroupMeta),
    Dataset(DatasetMeta),
    Other,
}

/// Dispatch an object's messages into group or dataset metadata.
pub(crate) fn classify<R: Read + Seek>(
    r: &Reader<R>,
    msgs: &[Message],
) -> Result<ObjectMeta, Hdf5Error> {
    let mut group = GroupMeta::default();
    let mut data = DatasetMeta::default();
    let mut is_group = false;
    let mut is_data = false;
    for m in msgs {
        match m.mtype {
            1 => {
                is_data = true;
                data.space = Some(message::decode_dataspace(&m.body, r.lensz)?);
            }
            2 => {
                is_group = true;
                group.link_info = Some(message::decode_link_info(&m.body, r.offsz)?);
            }
            3 => {
                is_data = true;
                data.dtype = Some(dtype::decode(&m.body)?);
            }
            6 => {
                is_group = true;
                group.compact.push(message::decode_link(&m.body, r.offsz)?);
            }
            7 => {
                is_data = true;
                data.external = true;
            }
            8 => {
                is_data = true;
                data.layout = Some(message::decode_layout(&m.body, m.at, r.offsz)?);
            }
            10 => {
                is_group = true;
            }
            11 => {
                data.filters = message::decode_filter_pipeline(&m.body)?;
            }
            17 => {
                is_group = true;
                let mut c = cursor::Cur::new(&m.body);
                let btree = c.read_sint(r.offsz)?;
                let heap = c.read_sint(r.offsz)?;
                group.v1 = Some((btree, heap));
            }
            _ => {}
        }
    }
    if is_group && is_data {
        return Err(Hdf5Error::Corrupt(
            "object header mixes group and dataset messages".to_string(),
        ));
    }
    Ok(if is_group {
        ObjectMeta::Group(group)
    } else if is_data {
        ObjectMeta::Dataset(data)
    } else {
        ObjectMeta::Other
    })
}

/// Well-known filter names by id (HDF5 registered filters).
pub(crate) fn filter_name(id: u16) -> &'static str {
    match id {
        1 => "deflate",
        2 => "shuffle",
        3 => "fletcher32",
        4 => "szip",
        5 => "nbit",
        6 => "scaleoffset",
        32000 => "lzf",
        32001 => "blosc",
        32004 => "lz4",
        32015 => "zstd",
        _ => "unknown",
    }
}
