// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local heaps (`HEAP`) and fractal heaps (`FRHP`/`FHDB`/`FHIB`).
//!
//! A local heap is a single contiguous block of NUL-terminated names.  A
//! fractal heap reassembles its managed space by concatenating direct
//! blocks row by row (doubling sizes), recursing into child indirect
//! blocks for rows beyond the max-direct threshold.  Filtered heaps are
//! refused outright.

use std::io::{Read, Seek};

use crate::error::Hdf5Error;

use super::{Reader, UNDEF};

/// A local heap's data block.
pub(crate) struct LocalHeap {
    data: Vec<u8>,
}

impl LocalHeap {
    /// NUL-terminated name starting at a heap offset.
    pub(crate) fn name_at(&self, offset: usize) -> Result<String, Hdf5Error> {
        if offset >= self.data.len() {
            return Err(Hdf5Error::Corrupt(format!(
                "local heap offset {} beyond heap of {} bytes",
                offset,
                self.data.len()
            )));
        }
        let rest = &self.data[offset..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
    }
}

/// Heap geometry lifted from an `FRHP` header.
struct FractalGeometry {
    width: usize,
    start_size: u64,
    max_direct_rows: usize,
    block_offset_size: usize,
    has_checksum: bool,
}

impl<R: Read + Seek> Reader<R> {
    /// Read a local heap: header, then the data block it points at.
    pub(crate) fn local_heap(&mut self, addr: i64) -> Result<LocalHeap, Hdf5Error> {
        self.seek_rel(addr)?;
        self.expect_signature(b"HEAP", "local heap")?;
        let _version = self.read_u8()?;
        self.read_bytes(3)?; // reserved
        let size = self.read_length()?;
        let _free_head = self.read_length()?;
        let data_addr = self.read_offset()?;
        if size < 0 || data_addr == UNDEF {
            return Err(Hdf5Error::Corrupt("local heap geometry invalid".to_string()));
        }
        self.seek_rel(data_addr)?;
        let data = self.read_bytes(size as usize)?;
        Ok(LocalHeap { data })
    }

    /// Reassemble a fractal heap's managed space into one buffer.
    pub(crate) fn fractal_heap(&mut self, addr: i64) -> Result<Vec<u8>, Hdf5Error> {
        self.seek_rel(addr)?;
        self.expect_signature(b"FRHP", "fractal heap")?;
        let _version = self.read_u8()?;
        let _id_len = self.read_u16()?;
        let filter_len = self.read_u16()?;
        let flags = self.read_u8()?;
        let _max_managed = self.read_u32()?;
        let _next_huge_id = self.read_length()?;
        let _huge_btree = self.read_offset()?;
        let _free_space = self.read_length()?;
        let _fs_manager = self.read_offset()?;
        let _managed_space = self.read_length()?;
        let _alloc_space = self.read_length()?;
        let _iterator = self.read_length()?;
        let _managed_nobj = self.read_length()?;
        let _huge_size = self.read_length()?;
        let _huge_nobj = self.read_length()?;
        let _tiny_size = self.read_length()?;
        let _tiny_nobj = self.read_length()?;
        let width = self.read_u16()? as usize;
        let start_size = self.read_length()?;
        let max_direct = self.read_length()?;
        let max_heap_bits = self.read_u16()?;
        let _start_rows = self.read_u16()?;
        let root = self.read_offset()?;
        let root_rows = self.read_u16()? as usize;

        if filter_len != 0 {
            return Err(Hdf5Error::Unsupported(
                "filtered (compressed) fractal heap".to_string(),
            ));
        }
        if width == 0 || start_size < 4 || max_direct <= 0 {
            return Err(Hdf5Error::Corrupt("fractal heap geometry invalid".to_string()));
        }
        let mut max_direct_rows = 2usize;
        let mut ratio = (max_direct / start_size) as u64;
        while ratio > 1 {
            max_direct_rows += 1;
            ratio >>= 1;
        }
        let geo = FractalGeometry {
            width,
            start_size: start_size as u64,
            max_direct_rows,
            block_offset_size: ((max_heap_bits as usize) + 7) / 8,
            has_checksum: flags & 2 != 0,
        };
        if root == UNDEF {
            return Ok(Vec::new());
        }
        if root_rows == 0 {
            // Root is a single direct block of the starting size.
            self.seek_rel(root)?;
            let block = self.read_bytes(geo.start_size as usize)?;
            if &block[..4] != b"FHDB" {
                return Err(Hdf5Error::Corrupt(
                    "missing FHDB - fractal heap root block".to_string(),
                ));
            }
            return Ok(block);
        }
        let mut out = Vec::new();
        self.fractal_indirect(&geo, root, root_rows, 0, &mut out)?;
        Ok(out)
    }

    /// Walk an indirect block, concatenating direct-block bytes in heap
    /// order; missing blocks become zero filler so later heap offsets
    /// stay aligned.
    fn fractal_indirect(
        &mut self,
        geo: &FractalGeometry,
        addr: i64,
        nrows: usize,
        depth: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), Hdf5Error> {
        if depth > 16 {
            return Err(Hdf5Error::Corrupt("fractal heap nesting too deep".to_string()));
        }
        self.seek_rel(addr)?;
        self.expect_signature(b"FHIB", "fractal heap indirect block")?;
        let _version = self.read_u8()?;
        let _heap_header = self.read_offset()?;
        self.read_bytes(geo.block_offset_size)?; // block offset in heap space
        let direct_rows = nrows.min(geo.max_direct_rows);
        let indirect_rows = nrows.saturating_sub(geo.max_direct_rows);
        let nentries = (direct_rows + indirect_rows) * geo.width;
        let mut entries = Vec::with_capacity(nentries);
        for _ in 0..nentries {
            entries.push(self.read_offset()?);
        }
        if geo.has_checksum {
            let _checksum = self.read_u32()?;
        }

        let mut entry = entries.into_iter();
        // Direct rows: rows 0 and 1 use the starting block size, each
        // further row doubles it.
        let mut block_size = geo.start_size;
        for row in 0..direct_rows {
            for _ in 0..geo.width {
                let baddr = entry.next().unwrap_or(UNDEF);
                if baddr == UNDEF {
                    out.resize(out.len() + block_size as usize, 0);
                    continue;
                }
                self.seek_rel(baddr)?;
                let block = self.read_bytes(block_size as usize)?;
                if &block[..4] != b"FHDB" {
                    return Err(Hdf5Error::Corrupt(
                        "missing FHDB - fractal heap direct block".to_string(),
                    ));
                }
                out.extend_from_slice(&block);
            }
            if row >= 1 {
                block_size *= 2;
            }
        }
        // Indirect rows: children are indirect blocks one generation
        // deeper.
        let mut child_rows = geo.max_direct_rows + 1;
        for _ in 0..indirect_rows {
            for _ in 0..geo.width {
                let baddr = entry.next().unwrap_or(UNDEF);
                if baddr == UNDEF {
                    continue;
                }
                self.fractal_indirect(geo, baddr, child_rows, depth + 1, out)?;
            }
            child_rows += 1;
        }
        Ok(())
    }
}
