// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive decoding of datatype messages (type 3).
//!
//! The first word packs class, version, and a 24-bit class bit field;
//! the second is the byte size of one value.  Classes 0-10 follow with
//! class-specific properties.  Versions below 3 pad member names to
//! 8-byte boundaries; version 3+ uses bare NUL-terminated names.

use crate::error::Hdf5Error;

use super::cursor::Cur;

/// One decoded HDF5 datatype.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum H5Type {
    Int { big: bool, signed: bool, size: u32 },
    Float { big: bool, size: u32 },
    Time { big: bool, size: u32 },
    Str { utf8: bool, size: u32 },
    BitField { big: bool, size: u32 },
    Opaque { tag: String, size: u32 },
    Compound { size: u32, members: Vec<H5Member> },
    Reference { region: bool, size: u32 },
    Enum {
        base: Box<H5Type>,
        names: Vec<String>,
        values: Vec<i64>,
        size: u32,
    },
    VarLen { string: bool, utf8: bool, size: u32 },
    Array { dims: Vec<u32>, base: Box<H5Type> },
}

/// A compound member: name, byte offset, optional inline dimensions, and
/// the member datatype.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct H5Member {
    pub name: String,
    pub offset: u32,
    pub dims: Vec<u32>,
    pub ty: H5Type,
}

/// Decode a datatype message body.
pub(crate) fn decode(body: &[u8]) -> Result<H5Type, Hdf5Error> {
    let mut c = Cur::new(body);
    decode_at(&mut c, 0)
}

const MAX_NEST: u32 = 32;

fn decode_at(c: &mut Cur<'_>, depth: u32) -> Result<H5Type, Hdf5Error> {
    if depth > MAX_NEST {
        return Err(Hdf5Error::Corrupt("datatype nesting too deep".to_string()));
    }
    let word = c.read_u32()?;
    let size = c.read_u32()?;
    let cls = word & 0xf;
    let version = (word >> 4) & 0xf;
    let bits = (word >> 8) & 0xff_ffff;
    let big = bits & 1 != 0;
    match cls {
        0 => {
            // Fixed-point: offset and precision, then done.
            let _off = c.read_u16()?;
            let _prec = c.read_u16()?;
            Ok(H5Type::Int {
                big,
                signed: bits & 8 != 0,
                size,
            })
        }
        1 => {
            // Floating-point: 12 bytes of bit-layout properties.
            if bits & 64 != 0 {
                return Err(Hdf5Error::Corrupt(
                    "VAX-order floating point not supported".to_string(),
                ));
            }
            c.skip(12)?;
            Ok(H5Type::Float { big, size })
        }
        2 => {
            let _prec = c.read_u16()?;
            Ok(H5Type::Time { big, size })
        }
        3 => Ok(H5Type::Str {
            utf8: bits & 16 != 0,
            size,
        }),
        4 => {
            let _off = c.read_u16()?;
            let _prec = c.read_u16()?;
            Ok(H5Type::BitField { big, size })
        }
        5 => {
            // Opaque: ASCII tag, length in the low bits, padded to 8.
            let taglen = (bits & 0xff) as usize;
            let raw = c.take(taglen)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let tag = String::from_utf8_lossy(&raw[..end]).into_owned();
            Ok(H5Type::Opaque { tag, size })
        }
        6 => {
            let nmemb = (bits & 0xffff) as usize;
            let mut members = Vec::with_capacity(nmemb.min(1024));
            for _ in 0..nmemb {
                members.push(decode_member(c, version, size, depth)?);
            }
            Ok(H5Type::Compound { size, members })
        }
        7 => Ok(H5Type::Reference {
            region: bits & 1 != 0,
            size,
        }),
        8 => {
            let base = decode_at(c, depth + 1)?;
            let base_size = type_size(&base);
            let nmemb = (bits & 0xffff) as usize;
            let mut names = Vec::with_capacity(nmemb.min(1024));
            for _ in 0..nmemb {
                names.push(read_name(c, version)?);
            }
            let mut values = Vec::with_capacity(names.len());
            for _ in 0..names.len() {
                values.push(c.read_sint(base_size.clamp(1, 8) as usize)?);
            }
            Ok(H5Type::Enum {
                base: Box::new(base),
                names,
                values,
                size,
            })
        }
        9 => {
            let vtype = bits & 0xf;
            let charset = (bits >> 8) & 0xf;
            let base = decode_at(c, depth + 1)?;
            let _ = base;
            Ok(H5Type::VarLen {
                string: vtype == 1,
                utf8: charset == 1,
                size,
            })
        }
        10 => {
            let ndims = c.read_u8()? as usize;
            if version < 3 {
                c.skip(3)?; // reserved
            }
            let mut dims = Vec::with_capacity(ndims);
            for _ in 0..ndims {
                dims.push(c.read_u32()?);
            }
            if version < 3 {
                c.skip(4 * ndims)?; // dimension permutation
            }
            let base = decode_at(c, depth + 1)?;
            // Flatten nested arrays.
            if let H5Type::Array {
                dims: inner,
                base: inner_base,
            } = base
            {
                let mut all = dims;
                all.extend(inner);
                return Ok(H5Type::Array {
                    dims: all,
                    base: inner_base,
                });
            }
            Ok(H5Type::Array {
                dims,
                base: Box::new(base),
            })
        }
        other => Err(Hdf5Error::Corrupt(format!(
            "unknown datatype class {}",
            other
        ))),
    }
}

fn decode_member(
    c: &mut Cur<'_>,
    version: u32,
    parent_size: u32,
    depth: u32,
) -> Result<H5Member, Hdf5Error> {
    let name = read_name(c, version)?;
    let (offset, dims);
    match version {
        1 => {
            offset = c.read_u32()?;
            let ndims = c.read_u8()? as usize;
            c.skip(3)?; // reserved
            c.skip(4)?; // dimension permutation
            c.skip(4)?; // reserved
            let mut all = [0u32; 4];
            for slot in &mut all {
                *slot = c.read_u32()?;
            }
            if ndims > 4 {
                return Err(Hdf5Error::Corrupt(format!(
                    "compound member {} has {} dimensions",
                    name, ndims
                )));
            }
            dims = all[..ndims].to_vec();
        }
        2 => {
            offset = c.read_u32()?;
            dims = Vec::new();
        }
        _ => {
            // Version 3+: offset stored in the minimum number of bytes
            // needed for the parent's size.
            let width = if parent_size < 0x100 {
                1
            } else if parent_size < 0x1_0000 {
                2
            } else if parent_size < 0x100_0000 {
                3
            } else {
                4
            };
            offset = c.read_uint(width)? as u32;
            dims = Vec::new();
        }
    }
    let ty = decode_at(c, depth + 1)?;
    Ok(H5Member {
        name,
        offset,
        dims,
        ty,
    })
}

/// Member/enum name: padded to an 8-byte boundary before version 3,
/// bare NUL-terminated from version 3 on.
fn read_name(c: &mut Cur<'_>, version: u32) -> Result<String, Hdf5Error> {
    let name = c.cstr()?;
    if version < 3 {
        let padded = ((name.len() + 8) / 8) * 8;
        c.skip(padded - name.len())?;
    } else {
        c.skip(1)?; // the NUL itself
    }
    Ok(name)
}

fn type_size(t: &H5Type) -> u32 {
    match t {
        H5Type::Int { size, .. }
        | H5Type::Float { size, .. }
        | H5Type::Time { size, .. }
        | H5Type::Str { size, .. }
        | H5Type::BitField { size, .. }
        | H5Type::Opaque { size, .. }
        | H5Type::Compound { size, .. }
        | H5Type::Reference { size, .. }
        | H5Type::Enum { size, .. }
        | H5Type::VarLen { size, .. } => *size,
        H5Type::Array { dims, base } => {
            dims.iter().product::<u32>().max(1) * type_size(base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dtype_header(cls: u32, version: u32, bits: u32, size: u32) -> Vec<u8> {
        let word = cls | (version << 4) | (bits << 8);
        let mut out = word.to_le_bytes().to_vec();
        out.extend_from_slice(&size.to_le_bytes());
        out
    }

    #[test]
    fn fixed_point_le_i4() {
        let mut body = dtype_header(0, 1, 0x08, 4); // signed, little-endian
        body.extend_from_slice(&0u16.to_le_bytes()); // offset
        body.extend_from_slice(&32u16.to_le_bytes()); // precision
        assert_eq!(
            decode(&body).unwrap(),
            H5Type::Int {
                big: false,
                signed: true,
                size: 4
            }
        );
    }

    #[test]
    fn float_be_f8() {
        let mut body = dtype_header(1, 1, 0x01, 8);
        body.extend_from_slice(&[0u8; 12]);
        assert_eq!(decode(&body).unwrap(), H5Type::Float { big: true, size: 8 });
    }

    #[test]
    fn compound_v3_members() {
        // { x: <f8 @0, y: <f8 @8 }, total 16 bytes.
        let mut body = dtype_header(6, 3, 2, 16);
        for (name, off) in [("x", 0u8), ("y", 8u8)] {
            body.extend_from_slice(name.as_bytes());
            body.push(0); // NUL
            body.push(off); // one-byte offset (size < 0x100)
            let mut f8 = dtype_header(1, 1, 0, 8);
            f8.extend_from_slice(&[0u8; 12]);
            body.extend_from_slice(&f8);
        }
        match decode(&body).unwrap() {
            H5Type::Compound { size, members } => {
                assert_eq!(size, 16);
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].name, "x");
                assert_eq!(members[0].offset, 0);
                assert_eq!(members[1].name, "y");
                assert_eq!(members[1].offset, 8);
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn array_of_int() {
        // Array [3, 2] of <u2, version 3.
        let mut body = dtype_header(10, 3, 0, 12);
        body.push(2); // ndims
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend_from_slice(&2u32.to_le_bytes());
        let mut u2 = dtype_header(0, 1, 0, 2);
        u2.extend_from_slice(&0u16.to_le_bytes());
        u2.extend_from_slice(&16u16.to_le_bytes());
        body.extend_from_slice(&u2);
        match decode(&body).unwrap() {
            H5Type::Array { dims, base } => {
                assert_eq!(dims, vec![3, 2]);
                assert_eq!(
                    *base,
                    H5Type::Int {
                        big: false,
                        signed: false,
                        size: 2
                    }
                );
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn enum_v3_roundtrip() {
        // enum <i4 { LOW = 1, HIGH = 2 }
        let mut body = dtype_header(8, 3, 2, 4);
        let mut i4 = dtype_header(0, 1, 8, 4);
        i4.extend_from_slice(&0u16.to_le_bytes());
        i4.extend_from_slice(&32u16.to_le_bytes());
        body.extend_from_slice(&i4);
        for name in ["LOW", "HIGH"] {
            body.extend_from_slice(name.as_bytes());
            body.push(0);
        }
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend_from_slice(&2i32.to_le_bytes());
        match decode(&body).unwrap() {
            H5Type::Enum { names, values, .. } => {
                assert_eq!(names, vec!["LOW".to_string(), "HIGH".to_string()]);
                assert_eq!(values, vec![1, 2]);
            }
            other => panic!("expected enum, got {:?}", other),
        }
    }
}
