// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Superblock location and decoding.
//!
//! The 8-byte signature sits at offset 0 or, for files with a user block,
//! at 512, 1024, 2048, ... (doubling).  Versions 0-1 carry the B-tree K
//! values inline; version 2+ moves them to a superblock-extension object
//! header (message type 19).

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Hdf5Error;

use super::{Reader, UNDEF};

pub(crate) const SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

pub(crate) struct Superblock {
    #[allow(dead_code)]
    pub version: u8,
    pub offsz: u8,
    pub lensz: u8,
    /// Resolved base address (userblock-aware).
    pub base: u64,
    #[allow(dead_code)]
    pub eof: i64,
    /// Root group object header address, base-relative.
    pub root: i64,
    /// Superblock-extension object header address, or undefined.
    pub ext: i64,
    pub kleaf: u16,
    pub kint: u16,
    pub kintis: u16,
}

/// Probe for the signature and decode whichever superblock version is
/// present.
pub(crate) fn locate<R: Read + Seek>(f: &mut R) -> Result<Superblock, Hdf5Error> {
    let size = f.seek(SeekFrom::End(0))?;
    let mut sig_at: u64 = 0;
    loop {
        if sig_at + 8 >= size {
            return Err(Hdf5Error::Unsupported(
                "HDF5 superblock signature not found".to_string(),
            ));
        }
        f.seek(SeekFrom::Start(sig_at))?;
        let mut sig = [0u8; 8];
        f.read_exact(&mut sig)?;
        if sig == SIGNATURE {
            break;
        }
        sig_at = if sig_at == 0 { 512 } else { 2 * sig_at };
    }

    let version = f.read_u8()?;
    let mut kleaf: u16 = 4;
    let mut kint: u16 = 16;
    let mut kintis: u16 = 32;
    let (offsz, lensz);
    let (base_field, ext, eof, root);
    if version < 2 {
        let _freespace_ver = f.read_u8()?;
        let _roottable_ver = f.read_u8()?;
        let _reserved = f.read_u8()?;
        let _shared_ver = f.read_u8()?;
        offsz = f.read_u8()?;
        lensz = f.read_u8()?;
        let _reserved = f.read_u8()?;
        kleaf = f.read_u16::<LittleEndian>()?;
        kint = f.read_u16::<LittleEndian>()?;
        let _flags = f.read_u32::<LittleEndian>()?;
        if version == 1 {
            kintis = f.read_u16::<LittleEndian>()?;
            let _reserved = f.read_u16::<LittleEndian>()?;
        }
        check_width(offsz)?;
        check_width(lensz)?;
        base_field = read_sint(f, offsz as usize)?;
        let _freespace = read_sint(f, offsz as usize)?;
        eof = read_sint(f, offsz as usize)?;
        let _driver_info = read_sint(f, offsz as usize)?;
        // Root group symbol table entry: link name offset, then the
        // object header address.
        let _link_name_off = read_sint(f, offsz as usize)?;
        root = read_sint(f, offsz as usize)?;
        ext = UNDEF;
    } else if version <= 3 {
        offsz = f.read_u8()?;
        lensz = f.read_u8()?;
        let _flags = f.read_u8()?;
        check_width(offsz)?;
        check_width(lensz)?;
        base_field = read_sint(f, offsz as usize)?;
        ext = read_sint(f, offsz as usize)?;
        eof = read_sint(f, offsz as usize)?;
        root = read_sint(f, offsz as usize)?;
    } else {
        return Err(Hdf5Error::Unsupported(format!(
            "unknown superblock version {}",
            version
        )));
    }

    // The base-address field normally equals the signature offset; a
    // zero field with a displaced signature means a userblock file whose
    // writer left the field at zero.
    let base = if base_field > 0 {
        base_field as u64
    } else {
        sig_at
    };
    Ok(Superblock {
        version,
        offsz,
        lensz,
        base,
        eof,
        root,
        ext,
        kleaf,
        kint,
        kintis,
    })
}

fn check_width(w: u8) -> Result<(), Hdf5Error> {
    if w == 4 || w == 8 {
        Ok(())
    } else {
        Err(Hdf5Error::Unsupported(format!(
            "unsupported offset/length size {}",
            w
        )))
    }
}

fn read_sint<R: Read>(f: &mut R, width: usize) -> Result<i64, Hdf5Error> {
    let mut b = [0u8; 8];
    f.read_exact(&mut b[..width])?;
    let v = u64::from_le_bytes(b);
    let shift = 64 - 8 * width as u32;
    Ok(((v << shift) as i64) >> shift)
}

impl<R: Read + Seek> Reader<R> {
    /// Read the version-2 superblock extension: B-tree K values (message
    /// type 19) and the shared-message table address (type 15).
    pub(crate) fn superblock_extension(&mut self, addr: i64) -> Result<(), Hdf5Error> {
        let msgs = self.object_header(addr, false)?;
        for m in msgs {
            match m.mtype {
                19 => {
                    let mut c = super::cursor::Cur::new(&m.body);
                    let _version = c.read_u8()?;
                    self.kintis = c.read_u16()?;
                    self.kint = c.read_u16()?;
                    self.kleaf = c.read_u16()?;
                }
                15 => {
                    let mut c = super::cursor::Cur::new(&m.body);
                    let _version = c.read_u8()?;
                    self.sharetab = c.read_sint(self.offsz)?;
                    let _nindexes = c.read_u8()?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
