// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! B-tree walking, version 1 and version 2.
//!
//! v1 trees link all nodes of one level through sibling pointers, so the
//! walk descends to the leftmost level-zero node and then follows right
//! siblings.  Group trees lead to `SNOD` symbol-table nodes whose names
//! live in a local heap; chunk trees carry `(size, mask, offsets...)`
//! keys beside each child address.
//!
//! v2 trees (`BTHD`/`BTIN`/`BTLF`) store per-level child counts in the
//! minimum number of bytes able to represent the maximum possible count
//! at that depth; records reference link messages stored in a fractal
//! heap.

use std::io::{Read, Seek};

use crate::error::Hdf5Error;

use super::message::{decode_link, Link};
use super::{ChunkEntry, Reader, UNDEF};

/// Sanity bound on nodes visited in one tree walk.
const MAX_NODES: usize = 1 << 20;

struct NodeHeader {
    ntype: u8,
    level: u8,
    nent: usize,
    left: i64,
    right: i64,
}

impl<R: Read + Seek> Reader<R> {
    fn btree1_node_header(&mut self, addr: i64) -> Result<NodeHeader, Hdf5Error> {
        self.seek_rel(addr)?;
        self.expect_signature(b"TREE", "v1 B-tree node")?;
        let ntype = self.read_u8()?;
        let level = self.read_u8()?;
        let nent = self.read_u16()? as usize;
        let left = self.read_offset()?;
        let right = self.read_offset()?;
        Ok(NodeHeader {
            ntype,
            level,
            nent,
            left,
            right,
        })
    }

    /// Walk a v1 group B-tree and its local heap into an ordered
    /// `(name, object-header-address)` list.
    pub(crate) fn btree1_symbols(
        &mut self,
        btree: i64,
        heap_addr: i64,
    ) -> Result<Vec<(String, i64)>, Hdf5Error> {
        let heap = self.local_heap(heap_addr)?;
        let keysize = self.offsz; // group keys are link-name offsets
        let leaves = self.btree1_leaves(btree, keysize, 0)?.0;

        let mut symbols = Vec::new();
        for snod in leaves {
            self.seek_rel(snod)?;
            self.expect_signature(b"SNOD", "symbol table node")?;
            let _version = self.read_u8()?;
            let _reserved = self.read_u8()?;
            let nsyms = self.read_u16()? as usize;
            if nsyms > MAX_NODES {
                return Err(Hdf5Error::Corrupt(
                    "symbol table node count out of range".to_string(),
                ));
            }
            let mut entry_addr = snod as u64 + self.base + 8;
            for _ in 0..nsyms {
                self.seek_to(entry_addr)?;
                let name_off = self.read_sint(self.offsz)?;
                let oheader = self.read_offset()?;
                entry_addr += 2 * self.offsz as u64 + 24; // cache + scratch
                let name = heap.name_at(name_off as usize)?;
                symbols.push((name, oheader));
            }
        }
        Ok(symbols)
    }

    /// Walk a v1 chunk B-tree into per-chunk entries.  `rank` is the
    /// dataset rank; each key carries `rank + 1` offsets, the last always
    /// the element-size dimension.
    pub(crate) fn btree1_chunks(
        &mut self,
        btree: i64,
        rank: usize,
    ) -> Result<Vec<ChunkEntry>, Hdf5Error> {
        let keysize = 8 * (rank + 2);
        let (leaves, keys) = self.btree1_leaves(btree, keysize, rank)?;
        Ok(leaves
            .into_iter()
            .zip(keys)
            .map(|(addr, key)| ChunkEntry {
                addr: if addr == UNDEF {
                    UNDEF
                } else {
                    addr + self.base as i64
                },
                nbytes: key.0,
                filter_mask: key.1,
                offsets: key.2,
            })
            .collect())
    }

    /// Descend to level zero and collect all child addresses (plus chunk
    /// keys when `rank > 0`-style keys are in use).
    #[allow(clippy::type_complexity)]
    fn btree1_leaves(
        &mut self,
        btree: i64,
        keysize: usize,
        rank: usize,
    ) -> Result<(Vec<i64>, Vec<(u32, u32, Vec<u64>)>), Hdf5Error> {
        let mut addr = btree;
        let mut hdr = self.btree1_node_header(addr)?;
        if hdr.left != UNDEF {
            return Err(Hdf5Error::Corrupt(
                "v1 B-tree top level node has sibling".to_string(),
            ));
        }
        // Descend along child 0 to the leftmost level-zero node.
        while hdr.level > 0 {
            self.seek_to(addr as u64 + self.base + 8 + 2 * self.offsz as u64 + keysize as u64)?;
            addr = self.read_offset()?;
            if addr == UNDEF {
                return Err(Hdf5Error::Corrupt(
                    "v1 B-tree internal node has no children".to_string(),
                ));
            }
            hdr = self.btree1_node_header(addr)?;
        }
        let chunked = hdr.ntype != 0;
        let entrysz = (keysize + self.offsz) as u64;
        let mut leaves = Vec::new();
        let mut keys = Vec::new();
        let mut visited = 0usize;
        loop {
            visited += 1;
            if visited > MAX_NODES {
                return Err(Hdf5Error::Corrupt("v1 B-tree node cycle".to_string()));
            }
            let mut pos = addr as u64 + self.base + 8 + 2 * self.offsz as u64;
            for _ in 0..hdr.nent {
                self.seek_to(pos)?;
                if chunked {
                    keys.push(self.read_chunk_key(rank)?);
                } else {
                    self.seek_to(pos + keysize as u64)?;
                }
                leaves.push(self.read_offset()?);
                pos += entrysz;
            }
            if hdr.right == UNDEF {
                break;
            }
            addr = hdr.right;
            hdr = self.btree1_node_header(addr)?;
        }
        Ok((leaves, keys))
    }

    /// One chunk key: stored byte size, filter mask, and `rank` element
    /// offsets (the trailing element-size entry is dropped).
    fn read_chunk_key(&mut self, rank: usize) -> Result<(u32, u32, Vec<u64>), Hdf5Error> {
        let nbytes = self.read_u32()?;
        let mask = self.read_u32()?;
        let mut offsets = Vec::with_capacity(rank);
        for _ in 0..rank {
            offsets.push(self.read_uint(8)?);
        }
        let _element_dim = self.read_uint(8)?;
        Ok((nbytes, mask, offsets))
    }

    // ---- version 2 -------------------------------------------------------

    /// Read a v2 B-tree and return its leaf records in tree order.
    pub(crate) fn btree2_records(&mut self, addr: i64) -> Result<(u8, Vec<Vec<u8>>), Hdf5Error> {
        self.seek_rel(addr)?;
        self.expect_signature(b"BTHD", "v2 B-tree header")?;
        let _version = self.read_u8()?;
        let btype = self.read_u8()?;
        let nodesz = self.read_u32()? as u64;
        let recsz = self.read_u16()? as usize;
        let depth = self.read_u16()? as usize;
        let _split = self.read_u8()?;
        let _merge = self.read_u8()?;
        let root = self.read_offset()?;
        let nroot = self.read_u16()? as usize;
        let nrecs = self.read_length()?;
        if recsz == 0 || nodesz < 10 {
            return Err(Hdf5Error::Corrupt("v2 B-tree geometry invalid".to_string()));
        }

        // Per-level maximum record counts decide how many bytes encode
        // the child counts at each depth.
        let max_leaf = ((nodesz - 10) / recsz as u64).max(1);
        let max_nrec_sz = min_nbytes(max_leaf);
        let mut cum = max_leaf;
        let mut cum_sz = vec![0usize; depth + 1];
        for d in 1..=depth {
            let entry = self.offsz as u64 + max_nrec_sz as u64 + cum_sz[d - 1] as u64;
            let max_internal = ((nodesz - 10).saturating_sub(entry)) / (recsz as u64 + entry);
            cum = max_internal + (max_internal + 1) * cum;
            cum_sz[d] = min_nbytes(cum);
        }

        let mut records = Vec::new();
        if root != UNDEF {
            let total = if nrecs < 0 { usize::MAX } else { nrecs as usize };
            self.btree2_node(
                root,
                nroot,
                total,
                recsz,
                depth,
                max_nrec_sz,
                &cum_sz,
                nodesz,
                &mut records,
            )?;
        }
        Ok((btype, records))
    }

    #[allow(clippy::too_many_arguments)]
    fn btree2_node(
        &mut self,
        addr: i64,
        nrec: usize,
        _ntotal: usize,
        recsz: usize,
        depth: usize,
        max_nrec_sz: usize,
        cum_sz: &[usize],
        nodesz: u64,
        out: &mut Vec<Vec<u8>>,
    ) -> Result<(), Hdf5Error> {
        if out.len() > MAX_NODES {
            return Err(Hdf5Error::Corrupt("v2 B-tree record explosion".to_string()));
        }
        self.seek_rel(addr)?;
        let sig = self.read_bytes(4)?;
        let is_leaf = sig == b"BTLF";
        if !is_leaf && sig != b"BTIN" {
            return Err(Hdf5Error::Corrupt(
                "missing BTIN or BTLF - v2 B-tree node".to_string(),
            ));
        }
        if (is_leaf && depth != 0) || (!is_leaf && depth == 0) {
            return Err(Hdf5Error::Corrupt(
                "v2 B-tree node depth inconsistent".to_string(),
            ));
        }
        let _version = self.read_u8()?;
        let _btype = self.read_u8()?;
        if nrec * recsz > nodesz as usize {
            return Err(Hdf5Error::Corrupt(
                "v2 B-tree node record count out of range".to_string(),
            ));
        }
        let mut records = Vec::with_capacity(nrec);
        for _ in 0..nrec {
            records.push(self.read_bytes(recsz)?);
        }
        if is_leaf {
            out.extend(records);
            return Ok(());
        }
        // Internal node: nrec+1 children interleaved with the records.
        let ntsz = cum_sz[depth - 1];
        let mut children = Vec::with_capacity(nrec + 1);
        for _ in 0..=nrec {
            let child = self.read_offset()?;
            let child_nrec = self.read_uint(max_nrec_sz)? as usize;
            let child_total = if ntsz > 0 {
                self.read_uint(ntsz)? as usize
            } else {
                child_nrec
            };
            children.push((child, child_nrec, child_total));
        }
        for (i, (child, child_nrec, child_total)) in children.into_iter().enumerate() {
            self.btree2_node(
                child,
                child_nrec,
                child_total,
                recsz,
                depth - 1,
                max_nrec_sz,
                cum_sz,
                nodesz,
                out,
            )?;
            if i < nrec {
                out.push(std::mem::take(&mut records[i]));
            }
        }
        Ok(())
    }

    /// Type-5 (name index) records resolved through the group's fractal
    /// heap into link messages.
    pub(crate) fn btree2_links(
        &mut self,
        btree: i64,
        fheap: i64,
        otree: Option<&std::collections::HashMap<u64, i64>>,
    ) -> Result<Vec<Link>, Hdf5Error> {
        let (btype, records) = self.btree2_records(btree)?;
        if btype != 5 {
            return Err(Hdf5Error::Corrupt(format!(
                "expected name-index B-tree (type 5), found type {}",
                btype
            )));
        }
        let heap = self.fractal_heap(fheap)?;
        let mut links = Vec::with_capacity(records.len());
        for rec in records {
            if rec.len() < 5 {
                return Err(Hdf5Error::Corrupt("name-index record too short".to_string()));
            }
            // Record: 4-byte name hash, then a heap id.
            let heapid = heap_id(&rec[4..]);
            let idtype = (heapid >> 4) & 0x3;
            if idtype != 0 {
                return Err(Hdf5Error::Corrupt(
                    "tiny or huge object in name-index B-tree".to_string(),
                ));
            }
            let hoff = ((heapid >> 8) & 0xffff_ffff) as usize;
            let hlen = ((heapid >> 40) & 0xffff) as usize;
            if hoff + hlen > heap.len() {
                return Err(Hdf5Error::Corrupt(
                    "heap id points outside the fractal heap".to_string(),
                ));
            }
            let mut link = decode_link(&heap[hoff..hoff + hlen], self.offsz)?;
            if link.corder.is_none() {
                if let Some(map) = otree {
                    link.corder = map.get(&(heapid & 0xff_ffff_ffff_ffff)).copied();
                }
            }
            links.push(link);
        }
        Ok(links)
    }

    /// Type-6 (creation order) records: a map from heap id to creation
    /// order.
    pub(crate) fn btree2_corder(
        &mut self,
        btree: i64,
    ) -> Result<std::collections::HashMap<u64, i64>, Hdf5Error> {
        let (btype, records) = self.btree2_records(btree)?;
        if btype != 6 {
            return Err(Hdf5Error::Corrupt(format!(
                "expected creation-order B-tree (type 6), found type {}",
                btype
            )));
        }
        let mut map = std::collections::HashMap::with_capacity(records.len());
        for rec in records {
            if rec.len() < 9 {
                return Err(Hdf5Error::Corrupt(
                    "creation-order record too short".to_string(),
                ));
            }
            let corder = i64::from_le_bytes(rec[..8].try_into().expect("8 bytes"));
            let heapid = heap_id(&rec[8..]);
            map.insert(heapid & 0xff_ffff_ffff_ffff, corder);
        }
        Ok(map)
    }
}

/// Zero-extend up to eight little-endian bytes into a u64.
fn heap_id(bytes: &[u8]) -> u64 {
    let mut out = [0u8; 8];
    let n = bytes.len().min(8);
    out[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(out)
}

/// Minimum bytes needed to represent a value.
pub(crate) fn min_nbytes(x: u64) -> usize {
    let mut n = 1;
    let mut limit = 0x100u64;
    while n < 8 && x >= limit {
        n += 1;
        limit = limit.saturating_mul(0x100);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_nbytes_thresholds() {
        assert_eq!(min_nbytes(0), 1);
        assert_eq!(min_nbytes(0xff), 1);
        assert_eq!(min_nbytes(0x100), 2);
        assert_eq!(min_nbytes(0xffff), 2);
        assert_eq!(min_nbytes(0x10000), 3);
        assert_eq!(min_nbytes(u64::MAX), 8);
    }

    #[test]
    fn heap_id_zero_extends() {
        assert_eq!(heap_id(&[1, 0, 0]), 1);
        assert_eq!(heap_id(&[0, 1]), 0x100);
    }
}
