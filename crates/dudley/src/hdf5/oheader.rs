// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object header walking, legacy and v2 (`OHDR`) shapes.
//!
//! Both shapes deliver a flat sequence of typed messages; continuation
//! messages (type 16) link further chunks (bare for legacy, `OCHK`-signed
//! for v2).  Shared messages are resolved by following the pointed-to
//! object header and extracting the equivalent message; resolution never
//! recurses through a second level of sharing.

use std::io::{Read, Seek};

use log::{debug, warn};

use crate::error::Hdf5Error;

use super::cursor::Cur;
use super::{Reader, UNDEF};

/// One object-header message.
pub(crate) struct Message {
    pub mtype: u16,
    pub mflags: u8,
    /// Creation order when tracked, -1 otherwise.
    #[allow(dead_code)]
    pub morder: i32,
    pub body: Vec<u8>,
    /// Absolute file offset of the body (compact data layout needs it).
    pub at: u64,
}

/// Guard against continuation cycles in damaged files.
const MAX_CHUNKS: usize = 4096;

impl<R: Read + Seek> Reader<R> {
    /// Read all messages of the object header at a base-relative address.
    /// `in_shared` marks a read performed to resolve a shared message, in
    /// which case further shared messages are left unresolved.
    pub(crate) fn object_header(
        &mut self,
        addr: i64,
        in_shared: bool,
    ) -> Result<Vec<Message>, Hdf5Error> {
        self.seek_rel(addr)?;
        let sig = self.read_bytes(4)?;
        let mut msgs = if sig == b"OHDR" {
            self.oheader_v2(addr as u64 + self.base + 4)?
        } else {
            self.oheader_legacy(addr as u64 + self.base, &sig)?
        };
        if !in_shared {
            for i in 0..msgs.len() {
                if msgs[i].mflags & 2 != 0 {
                    if let Some(body) = self.resolve_shared(msgs[i].mtype, &msgs[i].body)? {
                        msgs[i].body = body;
                        msgs[i].mflags &= !2;
                    }
                }
            }
        }
        Ok(msgs)
    }

    /// Legacy prefix: version, reserved, message count, reference count,
    /// header size, then 8-byte-aligned messages.
    fn oheader_legacy(&mut self, start: u64, sig: &[u8]) -> Result<Vec<Message>, Hdf5Error> {
        let version = sig[0];
        if version != 1 {
            return Err(Hdf5Error::Corrupt(format!(
                "unrecognized object header version {}",
                version
            )));
        }
        let mut nmsgs = u16::from_le_bytes([sig[2], sig[3]]) as usize;
        let mut addr = start + 4;
        // Skip the object reference count; then the header size (read as
        // size-of-lengths bytes, which also absorbs the alignment pad
        // when lengths are 8 bytes).
        self.seek_to(addr + 4)?;
        let hsize = self.read_uint(self.lensz)? as u64;
        addr += 4 + self.lensz as u64;
        let mut maxaddr = addr + hsize;
        let mut cont: Option<(i64, i64)> = None;
        let mut msgs = Vec::new();
        let mut chunks = 0usize;
        self.seek_to(addr)?;
        while nmsgs > 0 {
            if addr > maxaddr || (addr == maxaddr && cont.is_some()) {
                let Some((caddr, clen)) = cont.take() else {
                    break;
                };
                chunks += 1;
                if chunks > MAX_CHUNKS {
                    return Err(Hdf5Error::Corrupt(
                        "object header continuation loop".to_string(),
                    ));
                }
                if caddr == UNDEF {
                    break;
                }
                addr = caddr as u64 + self.base;
                maxaddr = addr + clen as u64;
                self.seek_to(addr)?;
            }
            let header = self.read_bytes(8)?;
            let mut c = Cur::new(&header);
            let mtype = c.read_u16()?;
            let msize = c.read_u16()? as usize;
            let mflags = c.read_u8()?;
            addr += 8;
            let body = if msize > 0 {
                self.read_bytes(msize)?
            } else {
                Vec::new()
            };
            nmsgs -= 1;
            if mtype == 16 {
                let mut cb = Cur::new(&body);
                let caddr = cb.read_sint(self.offsz)?;
                let clen = cb.read_sint(self.lensz)?;
                cont = Some((caddr, clen));
            } else {
                msgs.push(Message {
                    mtype,
                    mflags,
                    morder: -1,
                    body,
                    at: addr,
                });
            }
            addr += msize as u64;
        }
        Ok(msgs)
    }

    /// `OHDR` shape: flags select which prefix fields exist, messages are
    /// unpadded, continuation chunks carry an `OCHK` signature.
    fn oheader_v2(&mut self, start: u64) -> Result<Vec<Message>, Hdf5Error> {
        let mut addr = start;
        let _version = self.read_u8()?;
        let flags = self.read_u8()?;
        addr += 2;
        if flags & 32 != 0 {
            self.read_bytes(16)?; // four timestamps
            addr += 16;
        }
        if flags & 16 != 0 {
            let _ncompact = self.read_u16()?;
            let _ndense = self.read_u16()?;
            addr += 4;
        }
        let tracked = flags & 4 != 0;
        let chunk0_width = [1usize, 2, 4, 8][(flags & 3) as usize];
        let chunk0 = self.read_uint(chunk0_width)?;
        addr += chunk0_width as u64;
        let mut maxaddr = addr + chunk0;
        let ntrack: u64 = if tracked { 6 } else { 4 };
        let mut msgs = Vec::new();
        let mut chunks = 0usize;
        loop {
            let mut cont: Option<(i64, i64)> = None;
            // The final ntrack bytes cannot hold a full message header;
            // the gap plus the chunk checksum live there.
            maxaddr = maxaddr.saturating_sub(ntrack);
            while addr < maxaddr {
                let mtype = self.read_u8()? as u16;
                let msize = self.read_u16()? as usize;
                let mflags = self.read_u8()?;
                let morder = if tracked {
                    self.read_u16()? as i32
                } else {
                    -1
                };
                addr += ntrack;
                let body = if msize > 0 {
                    self.read_bytes(msize)?
                } else {
                    Vec::new()
                };
                if mtype == 16 {
                    let mut cb = Cur::new(&body);
                    let caddr = cb.read_sint(self.offsz)?;
                    let clen = cb.read_sint(self.lensz)?;
                    cont = Some((caddr, clen));
                } else {
                    msgs.push(Message {
                        mtype,
                        mflags,
                        morder,
                        body,
                        at: addr,
                    });
                }
                addr += msize as u64;
            }
            let Some((caddr, clen)) = cont else {
                return Ok(msgs);
            };
            chunks += 1;
            if chunks > MAX_CHUNKS {
                return Err(Hdf5Error::Corrupt(
                    "object header continuation loop".to_string(),
                ));
            }
            if caddr == UNDEF || clen < 4 {
                return Ok(msgs);
            }
            addr = caddr as u64 + self.base;
            maxaddr = addr + clen as u64;
            self.seek_to(addr)?;
            let sig = self.read_bytes(4)?;
            addr += 4;
            if sig != b"OCHK" {
                warn!("hdf5: continuation chunk without OCHK signature");
                return Ok(msgs);
            }
        }
    }

    /// Resolve a shared message to the equivalent message body stored in
    /// another object header.  Returns `None` when the sharing scheme is
    /// not understood (the caller keeps the raw body).
    fn resolve_shared(
        &mut self,
        mtype: u16,
        body: &[u8],
    ) -> Result<Option<Vec<u8>>, Hdf5Error> {
        let mut c = Cur::new(body);
        let version = c.read_u8()?;
        let stype = c.read_u8()?;
        let addr = match version {
            1 => {
                c.skip(6)?;
                c.read_sint(self.offsz)?
            }
            2 => c.read_sint(self.offsz)?,
            3 => {
                if stype == 2 {
                    c.read_sint(self.offsz)?
                } else {
                    debug!(
                        "hdf5: shared message v3 scheme {} not resolved",
                        stype
                    );
                    return Ok(None);
                }
            }
            _ => {
                debug!("hdf5: unknown shared message version {}", version);
                return Ok(None);
            }
        };
        if addr == UNDEF {
            return Ok(None);
        }
        let pos = self.f.stream_position()?;
        let msgs = self.object_header(addr, true)?;
        let found = msgs
            .into_iter()
            .find(|m| m.mtype == mtype && m.mflags & 2 == 0)
            .map(|m| m.body);
        self.seek_to(pos)?;
        Ok(found)
    }
}
