// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoders for the non-recursive object-header messages: dataspace,
//! data layout, link, link info, and filter pipeline.

use crate::error::Hdf5Error;

use super::cursor::Cur;
use super::{filter_name, H5Filter, LinkInfo, UNDEF};

/// Dataspace message (type 1): rank, dimensions, optional maxima.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Dataspace {
    pub dims: Vec<u64>,
    /// Maximum dimensions; -1 marks an unlimited dimension.
    pub maxdims: Option<Vec<i64>>,
    /// Version-2 null dataspace (no elements at all).
    pub null: bool,
}

pub(crate) fn decode_dataspace(body: &[u8], lensz: usize) -> Result<Dataspace, Hdf5Error> {
    let mut c = Cur::new(body);
    let version = c.read_u8()?;
    let ndims = c.read_u8()? as usize;
    let flags = c.read_u8()?;
    let stype = c.read_u8()?;
    if version == 1 {
        c.skip(4)?; // reserved
    }
    if version == 2 && stype == 2 {
        return Ok(Dataspace {
            dims: vec![0],
            maxdims: None,
            null: true,
        });
    }
    let mut dims = Vec::with_capacity(ndims);
    for _ in 0..ndims {
        dims.push(c.read_uint(lensz)?);
    }
    let maxdims = if flags & 1 != 0 {
        let mut m = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            m.push(c.read_sint(lensz)?);
        }
        Some(m)
    } else {
        None
    };
    Ok(Dataspace {
        dims,
        maxdims,
        null: false,
    })
}

/// Data layout message (type 8), normalized across versions 1-4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DataLayout {
    /// Data embedded in the header; `addr` is its absolute file offset.
    Compact { addr: u64 },
    /// One base-relative address (undefined when never written).
    Contiguous { addr: i64 },
    /// Chunk B-tree root plus per-dimension chunk extents (rank entries,
    /// element-size entry dropped).
    Chunked { addr: i64, dims: Vec<u32> },
    /// Version-4 virtual storage: recognized, never decoded.
    Virtual,
}

pub(crate) fn decode_layout(body: &[u8], at: u64, offsz: usize) -> Result<DataLayout, Hdf5Error> {
    let mut c = Cur::new(body);
    let version = c.read_u8()?;
    if version < 3 {
        let mut ndims = c.read_u8()? as usize;
        let cls = c.read_u8()?;
        c.skip(5)?; // reserved
        if cls == 2 && ndims > 0 {
            ndims -= 1; // chunk dims carry a trailing element-size entry
        }
        let addr = if cls > 0 { c.read_sint(offsz)? } else { UNDEF };
        let mut dims = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            dims.push(c.read_u32()?);
        }
        return Ok(match cls {
            0 => DataLayout::Compact {
                // Skip the 4-byte compact data size that follows the
                // dimensions.
                addr: at + c.pos() as u64 + 4,
            },
            1 => DataLayout::Contiguous { addr },
            _ => DataLayout::Chunked { addr, dims },
        });
    }
    if version == 3 {
        let cls = c.read_u8()?;
        return Ok(match cls {
            0 => {
                let _size = c.read_u16()?;
                DataLayout::Compact {
                    addr: at + c.pos() as u64,
                }
            }
            1 => {
                let addr = c.read_sint(offsz)?;
                DataLayout::Contiguous { addr }
            }
            2 => {
                let ndims = (c.read_u8()? as usize).saturating_sub(1);
                let addr = c.read_sint(offsz)?;
                let mut dims = Vec::with_capacity(ndims);
                for _ in 0..ndims {
                    dims.push(c.read_u32()?);
                }
                let _elem = c.read_u32();
                DataLayout::Chunked { addr, dims }
            }
            other => {
                return Err(Hdf5Error::Corrupt(format!(
                    "unknown v3 data layout class {}",
                    other
                )))
            }
        });
    }
    // Version 4.
    let cls = c.read_u8()?;
    Ok(match cls {
        0 => {
            let _size = c.read_u16()?;
            DataLayout::Compact {
                addr: at + c.pos() as u64,
            }
        }
        1 => {
            let addr = c.read_sint(offsz)?;
            DataLayout::Contiguous { addr }
        }
        3 => DataLayout::Virtual,
        _ => {
            // Version-4 chunked indexing is not walked; the dataset is
            // treated as external.
            DataLayout::Virtual
        }
    })
}

/// Link message (type 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Link {
    pub name: String,
    /// Hard-link target object header address (undefined for soft links).
    pub target: i64,
    pub corder: Option<i64>,
    /// Soft-link path, when the link is not hard.
    pub soft: Option<String>,
}

pub(crate) fn decode_link(body: &[u8], offsz: usize) -> Result<Link, Hdf5Error> {
    let mut c = Cur::new(body);
    let _version = c.read_u8()?;
    let flags = c.read_u8()?;
    let ltype = if flags & 0x8 != 0 { c.read_u8()? } else { 0 };
    let corder = if flags & 0x4 != 0 {
        Some(c.read_sint(8)?)
    } else {
        None
    };
    if flags & 0x10 != 0 {
        let _charset = c.read_u8()?;
    }
    let namelen_width = [1usize, 2, 4, 8][(flags & 3) as usize];
    let namelen = c.read_uint(namelen_width)? as usize;
    let raw = c.take(namelen)?;
    let name = String::from_utf8_lossy(raw).into_owned();
    match ltype {
        0 => {
            let target = c.read_sint(offsz)?;
            Ok(Link {
                name,
                target,
                corder,
                soft: None,
            })
        }
        1 => {
            let len = c.read_u16()? as usize;
            let raw = c.take(len)?;
            Ok(Link {
                name,
                target: UNDEF,
                corder,
                soft: Some(String::from_utf8_lossy(raw).into_owned()),
            })
        }
        _ => Ok(Link {
            name,
            target: UNDEF,
            corder,
            soft: Some(String::new()),
        }),
    }
}

/// Link info message (type 2): fractal heap and name-index B-tree
/// addresses, plus the optional creation-order B-tree.
pub(crate) fn decode_link_info(body: &[u8], offsz: usize) -> Result<LinkInfo, Hdf5Error> {
    let mut c = Cur::new(body);
    let _version = c.read_u8()?;
    let flags = c.read_u8()?;
    if flags & 1 != 0 {
        let _max_corder = c.read_sint(8)?;
    }
    let fheap = c.read_sint(offsz)?;
    let btree = c.read_sint(offsz)?;
    let corder_btree = if flags & 2 != 0 {
        Some(c.read_sint(offsz)?)
    } else {
        None
    };
    Ok(LinkInfo {
        fheap,
        btree,
        corder_btree,
    })
}

/// Filter pipeline message (type 11).
pub(crate) fn decode_filter_pipeline(body: &[u8]) -> Result<Vec<H5Filter>, Hdf5Error> {
    let mut c = Cur::new(body);
    let version = c.read_u8()?;
    let nfilters = c.read_u8()? as usize;
    if version == 1 {
        c.skip(6)?; // reserved
    }
    let mut filters = Vec::with_capacity(nfilters.min(32));
    for _ in 0..nfilters {
        let id = c.read_u16()?;
        let namelen = if version == 1 || id >= 256 {
            c.read_u16()? as usize
        } else {
            0
        };
        let flags = c.read_u16()?;
        let nvalues = c.read_u16()? as usize;
        let name = if namelen > 0 {
            let raw = c.take(namelen)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..end]).into_owned()
        } else {
            String::new()
        };
        let mut cdata = Vec::with_capacity(nvalues.min(64));
        for _ in 0..nvalues {
            cdata.push(c.read_u32()?);
        }
        if version == 1 && nvalues % 2 == 1 {
            c.skip(4)?; // pad client data to an even count
        }
        let name = if name.is_empty() {
            filter_name(id).to_string()
        } else {
            name
        };
        filters.push(H5Filter {
            id,
            name,
            flags,
            cdata,
        });
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataspace_v1_with_maxdims() {
        let mut body = vec![1u8, 2, 1, 0, 0, 0, 0, 0];
        body.extend_from_slice(&10u64.to_le_bytes());
        body.extend_from_slice(&4u64.to_le_bytes());
        body.extend_from_slice(&(-1i64).to_le_bytes());
        body.extend_from_slice(&4u64.to_le_bytes());
        let ds = decode_dataspace(&body, 8).unwrap();
        assert_eq!(ds.dims, vec![10, 4]);
        assert_eq!(ds.maxdims, Some(vec![-1, 4]));
    }

    #[test]
    fn layout_v3_contiguous() {
        let mut body = vec![3u8, 1];
        body.extend_from_slice(&2048u64.to_le_bytes());
        body.extend_from_slice(&320u64.to_le_bytes());
        assert_eq!(
            decode_layout(&body, 0, 8).unwrap(),
            DataLayout::Contiguous { addr: 2048 }
        );
    }

    #[test]
    fn layout_v3_chunked_drops_element_dim() {
        let mut body = vec![3u8, 2, 3]; // ndims = rank+1 = 3
        body.extend_from_slice(&4096u64.to_le_bytes());
        body.extend_from_slice(&16u32.to_le_bytes());
        body.extend_from_slice(&8u32.to_le_bytes());
        body.extend_from_slice(&8u32.to_le_bytes()); // element size entry
        assert_eq!(
            decode_layout(&body, 0, 8).unwrap(),
            DataLayout::Chunked {
                addr: 4096,
                dims: vec![16, 8]
            }
        );
    }

    #[test]
    fn hard_link_roundtrip() {
        let mut body = vec![1u8, 0x04]; // corder present, 1-byte name length
        body.extend_from_slice(&7i64.to_le_bytes()); // corder
        body.push(3); // name length
        body.extend_from_slice(b"abc");
        body.extend_from_slice(&800u64.to_le_bytes());
        let l = decode_link(&body, 8).unwrap();
        assert_eq!(l.name, "abc");
        assert_eq!(l.target, 800);
        assert_eq!(l.corder, Some(7));
        assert!(l.soft.is_none());
    }

    #[test]
    fn filter_pipeline_v2() {
        let mut body = vec![2u8, 1];
        body.extend_from_slice(&1u16.to_le_bytes()); // deflate
        body.extend_from_slice(&0u16.to_le_bytes()); // flags
        body.extend_from_slice(&1u16.to_le_bytes()); // one value
        body.extend_from_slice(&6u32.to_le_bytes()); // level 6
        let fs = decode_filter_pipeline(&body).unwrap();
        assert_eq!(fs.len(), 1);
        assert_eq!(fs[0].name, "deflate");
        assert_eq!(fs[0].cdata, vec![6]);
    }
}
