// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Walk synthetic HDF5 files built byte-by-byte: a version-0 superblock
//! with v1 groups (TREE/SNOD/HEAP), and a version-2 superblock with an
//! OHDR root using compact links.  Offsets are asserted while building so
//! a size slip fails loudly at the build step, not as a confusing walk
//! error.

use std::io::Cursor;
use std::io::Write as _;

use dudley::hdf5;
use dudley::layout::handle::{Node, TypeRef};
use dudley::shape::DimValue;
use dudley::Addr;

/// Little-endian byte builder with absolute-offset assertions.
struct B {
    buf: Vec<u8>,
}

impl B {
    fn new() -> B {
        B { buf: Vec::new() }
    }

    fn at(&self) -> usize {
        self.buf.len()
    }

    fn mark(&mut self, expected: usize) {
        assert_eq!(self.at(), expected, "file layout slipped");
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// One v1 object-header message: 8-byte header, body padded to a
    /// multiple of 8.
    fn msg_v1(&mut self, mtype: u16, body: &[u8]) {
        let padded = (body.len() + 7) / 8 * 8;
        self.u16(mtype);
        self.u16(padded as u16);
        self.u8(0); // flags
        self.zeros(3);
        self.bytes(body);
        self.zeros(padded - body.len());
    }

    /// v1 object header prefix: version, message count, header size.
    fn oh_v1(&mut self, nmsgs: u16, hsize: u32) {
        self.u8(1);
        self.u8(0);
        self.u16(nmsgs);
        self.u32(1); // reference count
        self.u32(hsize);
        self.u32(0); // pad to 8-byte message alignment
    }
}

fn dtype_body(cls: u32, bits: u32, size: u32, props: &[u8]) -> Vec<u8> {
    let word = cls | (1 << 4) | (bits << 8);
    let mut out = word.to_le_bytes().to_vec();
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(props);
    out
}

/// The v0 fixture: root { temp: <f8 [unlimited 10] @2048,
/// grp/ { count: <i4 @4096 }, hist: <f4 [100] chunked+deflate }.
fn build_v0_file() -> Vec<u8> {
    const OH_ROOT: u64 = 96;
    const HEAP1: u64 = 136;
    const HEAP1_DATA: u64 = 168;
    const TREE1: u64 = 200;
    const SNOD1: u64 = 248;
    const OH_TEMP: u64 = 376;
    const OH_GRP: u64 = 488;
    const HEAP2: u64 = 528;
    const HEAP2_DATA: u64 = 560;
    const TREE2: u64 = 576;
    const SNOD2: u64 = 624;
    const OH_COUNT: u64 = 672;
    const OH_HIST: u64 = 760;
    const CHUNK_TREE: u64 = 896;

    let mut b = B::new();
    // Superblock, version 0.
    b.bytes(&[0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n']);
    b.u8(0); // superblock version
    b.u8(0); // free-space version
    b.u8(0); // root-group version
    b.u8(0);
    b.u8(0); // shared-header version
    b.u8(8); // size of offsets
    b.u8(8); // size of lengths
    b.u8(0);
    b.u16(4); // group leaf K
    b.u16(16); // group internal K
    b.u32(0); // consistency flags
    b.u64(0); // base address
    b.i64(-1); // free-space address
    b.u64(5000); // end of file
    b.i64(-1); // driver info
    b.u64(0); // root STE: link name offset
    b.u64(OH_ROOT); // root STE: object header address
    b.u32(0); // cache type
    b.u32(0);
    b.zeros(16); // scratch
    b.mark(OH_ROOT as usize);

    // Root group object header: one symbol-table message.
    b.oh_v1(1, 24);
    let mut st = Vec::new();
    st.extend_from_slice(&TREE1.to_le_bytes());
    st.extend_from_slice(&HEAP1.to_le_bytes());
    b.msg_v1(17, &st);
    b.mark(HEAP1 as usize);

    // Local heap 1.
    b.bytes(b"HEAP");
    b.u8(0);
    b.zeros(3);
    b.u64(32); // data size
    b.u64(0); // free list head
    b.u64(HEAP1_DATA);
    b.mark(HEAP1_DATA as usize);
    b.bytes(b"temp\0\0\0\0");
    b.bytes(b"grp\0\0\0\0\0");
    b.bytes(b"hist\0\0\0\0");
    b.zeros(8);
    b.mark(TREE1 as usize);

    // Group B-tree, one leaf-level node pointing at SNOD1.
    b.bytes(b"TREE");
    b.u8(0); // group node
    b.u8(0); // level 0
    b.u16(1); // one entry
    b.i64(-1); // left sibling
    b.i64(-1); // right sibling
    b.u64(0); // key 0
    b.u64(SNOD1); // child 0
    b.u64(16); // key 1
    b.mark(SNOD1 as usize);

    // Symbol table node with three entries.
    b.bytes(b"SNOD");
    b.u8(1);
    b.u8(0);
    b.u16(3);
    for (name_off, oh) in [(0u64, OH_TEMP), (8, OH_GRP), (16, OH_HIST)] {
        b.u64(name_off);
        b.u64(oh);
        b.u32(0); // cache type
        b.u32(0);
        b.zeros(16); // scratch
    }
    b.mark(OH_TEMP as usize);

    // temp: <f8, shape [10] with unlimited maxdim, contiguous @2048.
    b.oh_v1(3, 96);
    let mut ds = vec![1u8, 1, 1, 0, 0, 0, 0, 0]; // v1, 1 dim, maxdims flag
    ds.extend_from_slice(&10u64.to_le_bytes());
    ds.extend_from_slice(&(-1i64).to_le_bytes()); // unlimited
    b.msg_v1(1, &ds);
    b.msg_v1(3, &dtype_body(1, 0, 8, &[0u8; 12])); // <f8
    let mut lay = vec![3u8, 1];
    lay.extend_from_slice(&2048u64.to_le_bytes());
    lay.extend_from_slice(&80u64.to_le_bytes());
    b.msg_v1(8, &lay);
    b.mark(OH_GRP as usize);

    // grp: v1 subgroup.
    b.oh_v1(1, 24);
    let mut st = Vec::new();
    st.extend_from_slice(&TREE2.to_le_bytes());
    st.extend_from_slice(&HEAP2.to_le_bytes());
    b.msg_v1(17, &st);
    b.mark(HEAP2 as usize);

    b.bytes(b"HEAP");
    b.u8(0);
    b.zeros(3);
    b.u64(16);
    b.u64(0);
    b.u64(HEAP2_DATA);
    b.mark(HEAP2_DATA as usize);
    b.bytes(b"count\0\0\0");
    b.zeros(8);
    b.mark(TREE2 as usize);

    b.bytes(b"TREE");
    b.u8(0);
    b.u8(0);
    b.u16(1);
    b.i64(-1);
    b.i64(-1);
    b.u64(0);
    b.u64(SNOD2);
    b.u64(8);
    b.mark(SNOD2 as usize);

    b.bytes(b"SNOD");
    b.u8(1);
    b.u8(0);
    b.u16(1);
    b.u64(0);
    b.u64(OH_COUNT);
    b.u32(0);
    b.u32(0);
    b.zeros(16);
    b.mark(OH_COUNT as usize);

    // count: scalar <i4, contiguous @4096.
    b.oh_v1(3, 72);
    b.msg_v1(1, &[1u8, 0, 0, 0, 0, 0, 0, 0]); // scalar dataspace
    let mut props = Vec::new();
    props.extend_from_slice(&0u16.to_le_bytes());
    props.extend_from_slice(&32u16.to_le_bytes());
    b.msg_v1(3, &dtype_body(0, 0x08, 4, &props)); // signed <i4
    let mut lay = vec![3u8, 1];
    lay.extend_from_slice(&4096u64.to_le_bytes());
    lay.extend_from_slice(&4u64.to_le_bytes());
    b.msg_v1(8, &lay);
    b.mark(OH_HIST as usize);

    // hist: <f4 [100], chunked [50] with a deflate pipeline.
    b.oh_v1(4, 120);
    let mut ds = vec![1u8, 1, 0, 0, 0, 0, 0, 0];
    ds.extend_from_slice(&100u64.to_le_bytes());
    b.msg_v1(1, &ds);
    b.msg_v1(3, &dtype_body(1, 0, 4, &[0u8; 12])); // <f4
    let mut lay = vec![3u8, 2, 2]; // v3 chunked, rank+1 dims
    lay.extend_from_slice(&CHUNK_TREE.to_le_bytes());
    lay.extend_from_slice(&50u32.to_le_bytes());
    lay.extend_from_slice(&4u32.to_le_bytes()); // element size entry
    b.msg_v1(8, &lay);
    let mut pipe = vec![1u8, 1];
    pipe.extend_from_slice(&[0u8; 6]);
    pipe.extend_from_slice(&1u16.to_le_bytes()); // deflate
    pipe.extend_from_slice(&0u16.to_le_bytes()); // name length 0
    pipe.extend_from_slice(&0u16.to_le_bytes()); // flags
    pipe.extend_from_slice(&1u16.to_le_bytes()); // one client value
    pipe.extend_from_slice(&6u32.to_le_bytes()); // level 6
    pipe.extend_from_slice(&0u32.to_le_bytes()); // odd-count pad
    b.msg_v1(11, &pipe);
    b.mark(CHUNK_TREE as usize);

    // Chunk B-tree: one chunk at 3000 covering elements [0..50].
    b.bytes(b"TREE");
    b.u8(1); // chunk node
    b.u8(0);
    b.u16(1);
    b.i64(-1);
    b.i64(-1);
    b.u32(200); // key 0: stored chunk bytes
    b.u32(0); // filter mask
    b.u64(0); // offset dim 0
    b.u64(0); // element-size dim
    b.u64(3000); // child 0: chunk address
    b.u32(200); // key 1 (boundary)
    b.u32(0);
    b.u64(50);
    b.u64(0);

    b.buf
}

/// The v2 fixture: OHDR root with compact links a, b to scalar datasets.
fn build_v2_file() -> Vec<u8> {
    const OH_ROOT: u64 = 48;
    const OH_A: u64 = 96;
    const OH_B: u64 = 184;

    let mut b = B::new();
    b.bytes(&[0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n']);
    b.u8(2); // superblock version
    b.u8(8); // size of offsets
    b.u8(8); // size of lengths
    b.u8(0); // flags
    b.u64(0); // base
    b.i64(-1); // superblock extension
    b.u64(2000); // end of file
    b.u64(OH_ROOT);
    b.u32(0); // checksum (unchecked)
    b.mark(OH_ROOT as usize);

    b.bytes(b"OHDR");
    b.u8(2);
    b.u8(0); // flags: 1-byte chunk0 size, nothing tracked
    let link = |name: &[u8], target: u64| {
        let mut body = vec![1u8, 0, name.len() as u8];
        body.extend_from_slice(name);
        body.extend_from_slice(&target.to_le_bytes());
        body
    };
    let la = link(b"a", OH_A);
    let lb = link(b"b", OH_B);
    let msgs = 4 + la.len() + 4 + lb.len();
    b.u8((msgs + 4) as u8); // chunk 0 size, checksum included
    for body in [&la, &lb] {
        b.u8(6); // link message
        b.u16(body.len() as u16);
        b.u8(0); // flags
        b.bytes(body);
    }
    b.u32(0); // checksum (unchecked)
    b.zeros(OH_A as usize - b.at());
    b.mark(OH_A as usize);

    for addr in [1024u64, 1028] {
        b.oh_v1(3, 72);
        b.msg_v1(1, &[1u8, 0, 0, 0, 0, 0, 0, 0]);
        let mut props = Vec::new();
        props.extend_from_slice(&0u16.to_le_bytes());
        props.extend_from_slice(&32u16.to_le_bytes());
        b.msg_v1(3, &dtype_body(0, 0x08, 4, &props));
        let mut lay = vec![3u8, 1];
        lay.extend_from_slice(&addr.to_le_bytes());
        lay.extend_from_slice(&4u64.to_le_bytes());
        b.msg_v1(8, &lay);
    }
    b.buf
}

#[test]
fn v0_file_walks_to_expected_arena() {
    let bytes = build_v0_file();
    let out = hdf5::read(Cursor::new(bytes)).expect("walk should succeed");
    let root = out.arena.root();
    let names: Vec<&str> = root.items().map(|(n, _)| n).collect();
    assert_eq!(names, ["temp", "grp", "hist"]);

    let temp = root.get("temp").unwrap().as_datum().unwrap();
    match temp.datatype() {
        TypeRef::Prim(p) => assert_eq!(p.name, "<f8"),
        other => panic!("expected <f8, got {:?}", other),
    }
    assert_eq!(temp.shape().unwrap(), vec![DimValue::Unlimited]);
    assert_eq!(temp.address(), Addr::At(2048));
    // The unlimited extent is bound to the current dataspace size.
    assert_eq!(temp.size().unwrap(), Some(80));

    let grp = root.get("grp").unwrap().as_dict().unwrap();
    let count = grp.get("count").unwrap().as_datum().unwrap();
    match count.datatype() {
        TypeRef::Prim(p) => assert_eq!(p.name, "<i4"),
        other => panic!("expected <i4, got {:?}", other),
    }
    assert!(count.shape().unwrap().is_empty());
    assert_eq!(count.address(), Addr::At(4096));
    assert_eq!(count.size().unwrap(), Some(4));

    let hist = root.get("hist").unwrap().as_datum().unwrap();
    assert_eq!(hist.shape().unwrap(), vec![DimValue::Fixed(100)]);
    assert_eq!(hist.address(), Addr::Unallocated);
    let f = hist.filter().expect("deflate filter attached");
    assert_eq!(f.name, "deflate");

    let map = out.chunks.get(&hist.id()).expect("chunk map recorded");
    assert_eq!(map.dims, vec![50]);
    assert_eq!(map.entries.len(), 1);
    assert_eq!(map.entries[0].addr, 3000);
    assert_eq!(map.entries[0].nbytes, 200);
    assert_eq!(map.entries[0].offsets, vec![0]);

    assert!(out.external.is_empty());
    assert_eq!(out.pipelines.get(&hist.id()).map(Vec::len), Some(1));
}

#[test]
fn v2_superblock_with_compact_links() {
    let bytes = build_v2_file();
    let out = hdf5::read(Cursor::new(bytes)).expect("walk should succeed");
    let root = out.arena.root();
    let names: Vec<&str> = root.items().map(|(n, _)| n).collect();
    assert_eq!(names, ["a", "b"]);
    let a = root.get("a").unwrap().as_datum().unwrap();
    assert_eq!(a.address(), Addr::At(1024));
    let b = root.get("b").unwrap().as_datum().unwrap();
    assert_eq!(b.address(), Addr::At(1028));
}

#[test]
fn two_reads_of_the_same_bytes_are_equal() {
    let bytes = build_v0_file();
    let one = hdf5::read(Cursor::new(bytes.clone())).unwrap();
    let two = hdf5::read(Cursor::new(bytes)).unwrap();
    assert_eq!(one.arena, two.arena);
    assert_eq!(one.chunks, two.chunks);
    assert_eq!(one.external, two.external);
    assert_eq!(one.pipelines, two.pipelines);
}

#[test]
fn read_file_from_disk() {
    let bytes = build_v0_file();
    let mut tmp = tempfile::NamedTempFile::new().expect("temp file");
    tmp.write_all(&bytes).expect("write fixture");
    tmp.flush().expect("flush fixture");
    let out = hdf5::read_file(tmp.path()).expect("walk should succeed");
    assert!(out.arena.root().get("temp").is_some());
}

#[test]
fn missing_signature_is_a_terminal_error() {
    let err = hdf5::read(Cursor::new(vec![0u8; 4096])).unwrap_err();
    assert!(matches!(err, dudley::Hdf5Error::Unsupported(_)));
}

#[test]
fn truncated_file_reports_io_or_corrupt() {
    let mut bytes = build_v0_file();
    bytes.truncate(300); // cut inside the symbol table node
    let err = hdf5::read(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(
        err,
        dudley::Hdf5Error::Io(_) | dudley::Hdf5Error::Corrupt(_)
    ));
}

#[test]
fn userblock_displaced_signature_is_found() {
    let mut bytes = vec![0u8; 512];
    bytes.extend(build_v0_file());
    // All stored addresses are base-relative; with the signature at 512
    // the base resolves to 512 and the same tree appears.
    let out = hdf5::read(Cursor::new(bytes)).expect("walk should succeed");
    let temp = out.arena.root().get("temp").unwrap().as_datum().unwrap();
    assert_eq!(temp.address(), Addr::At(2048 + 512));
}

#[test]
fn dudley_text_round_trips_an_hdf5_arena() {
    let out = hdf5::read(Cursor::new(build_v0_file())).unwrap();
    let text = dudley::dud::write(&out.arena);
    let reparsed = dudley::dud::parse(&text);
    assert!(
        reparsed.is_clean(),
        "errors: {:?}\n{}",
        reparsed.errors,
        text
    );
    let root = reparsed.arena.root();
    assert!(root.get("temp").is_some());
    assert!(root.get("grp").unwrap().as_dict().is_some());
    let Node::Datum(hist) = root.get("hist").unwrap() else {
        panic!("hist survives the round trip")
    };
    assert_eq!(hist.shape().unwrap(), vec![DimValue::Fixed(100)]);
}
