// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end scenarios for the Dudley layout language: parse source,
//! inspect the resulting arena through the facade handles.

use dudley::dud;
use dudley::layout::handle::{Node, TypeRef};
use dudley::shape::DimValue;
use dudley::{AttrValue, FilterDir};

#[test]
fn minimal_primitive() {
    let r = dud::parse("x = <i4\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    assert_eq!(root.len(), 1);
    let x = root.get("x").unwrap().as_datum().unwrap();
    match x.datatype() {
        TypeRef::Prim(p) => assert_eq!(p.name, "<i4"),
        other => panic!("expected primitive, got {:?}", other),
    }
    assert!(x.shape().unwrap().is_empty());
    assert_eq!(x.alignment().unwrap(), Some(4));
    assert!(x.address().is_unspecified());
}

#[test]
fn parametric_shape() {
    let r = dud::parse("n : <i4 @0\nv = <f8 [n] @4\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    let n = root.param("n").unwrap();
    assert!(n.is_dynamic());
    assert_eq!(n.address().at(), Some(0));
    assert_eq!(n.size().unwrap(), 4);

    let v = root.get("v").unwrap().as_datum().unwrap();
    assert_eq!(v.address().at(), Some(4));
    let shape = v.shape().unwrap();
    assert_eq!(shape.len(), 1);
    match shape[0] {
        DimValue::Ref(r) => {
            assert_eq!(r.param, n.id());
            assert_eq!(r.offset, 0);
        }
        other => panic!("expected parameter reference, got {:?}", other),
    }
    // Unresolved dynamic parameter: size is unknown.
    assert_eq!(v.size().unwrap(), None);
}

#[test]
fn typedef_compound() {
    let r = dud::parse("pt == { x = <f8, y = <f8 }\np = pt [3]\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    let pt = root.datatype("pt").unwrap();
    let TypeRef::Type(pt) = pt else {
        panic!("pt should be a defined type")
    };
    assert!(!pt.is_typedef());
    assert_eq!(pt.len().unwrap(), 2);
    assert_eq!(pt.size().unwrap(), Some(16));
    assert_eq!(pt.align().unwrap(), 8);
    let members = pt.members().unwrap();
    assert_eq!(members[0].0, "x");
    assert_eq!(members[1].0, "y");

    let p = root.get("p").unwrap().as_datum().unwrap();
    assert_eq!(p.shape().unwrap(), vec![DimValue::Fixed(3)]);
    assert_eq!(p.alignment().unwrap(), Some(8));
    assert_eq!(p.size().unwrap(), Some(48));
}

#[test]
fn ragged_extension() {
    let r = dud::parse("w = <i4 [2] @16\nw @32 @48\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    let w = root.get("w").unwrap();
    let Node::List(list) = w else {
        panic!("w should have become a list")
    };
    assert_eq!(list.len(), 3);
    let addrs: Vec<Option<i64>> = list
        .iter()
        .map(|n| match n {
            Node::Datum(d) => d.address().at(),
            _ => None,
        })
        .collect();
    assert_eq!(addrs, vec![Some(16), Some(32), Some(48)]);
    for member in list.iter() {
        let Node::Datum(d) = member else {
            panic!("list member should be a datum")
        };
        assert_eq!(d.shape().unwrap(), vec![DimValue::Fixed(2)]);
        assert_eq!(d.size().unwrap(), Some(8));
    }
}

#[test]
fn unlimited_dimension() {
    let r = dud::parse("t = <f8 [-1, 4]\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let mut arena = r.arena;
    let t = arena.root().get("t").unwrap().as_datum().unwrap().id();
    assert_eq!(arena.datum_size(t).unwrap(), None);
    arena.bind_unlimited(t, 6).unwrap();
    assert_eq!(arena.datum_size(t).unwrap(), Some(6 * 4 * 8));
}

#[test]
fn parse_recovery_logs_one_error_and_keeps_good_items() {
    let r = dud::parse("a = <i4 x @ = <i4\n");
    assert_eq!(r.errors.len(), 1, "errors: {:?}", r.errors);
    let root = r.arena.root();
    let a = root.get("a").unwrap().as_datum().unwrap();
    match a.datatype() {
        TypeRef::Prim(p) => assert_eq!(p.name, "<i4"),
        other => panic!("expected primitive, got {:?}", other),
    }
}

#[test]
fn recovery_resumes_after_synchronizer() {
    // The bad item is skipped; the following well-formed items parse.
    let r = dud::parse("a = <i4\nbad @ oops\nb = <f8 @8\nc = <i2\n");
    assert!(!r.errors.is_empty());
    let root = r.arena.root();
    assert!(root.get("a").is_some());
    assert!(root.get("b").is_some());
    assert!(root.get("c").is_some());
    assert!(root.get("bad").is_none());
}

#[test]
fn error_reports_are_suppressed_while_recovering() {
    // A cascade of junk after one error produces one report, not many.
    let r = dud::parse("x = @ @ @ @\ny = <i4\n");
    assert_eq!(r.errors.len(), 1, "errors: {:?}", r.errors);
    assert!(r.arena.root().get("y").is_some());
}

#[test]
fn subdicts_and_scope() {
    let src = "\
n : 4
grid/
  m : 8
  cell == { u = <f8, v = <f8 }
  vals = cell [n, m]
..
top = <i4 [n]
";
    let r = dud::parse(src);
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    let grid = root.get("grid").unwrap().as_dict().unwrap();
    let vals = grid.get("vals").unwrap().as_datum().unwrap();
    // n resolves from the enclosing dict, m locally; both are fixed, so
    // the size is computable: 16 bytes * 4 * 8.
    assert_eq!(vals.size().unwrap(), Some(16 * 32));
    let top = root.get("top").unwrap().as_datum().unwrap();
    assert_eq!(top.size().unwrap(), Some(16));
}

#[test]
fn parameter_offset_suffixes() {
    let r = dud::parse("n : 10\nedges = <f8 [n+]\ninner = <f8 [n--]\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    let edges = root.get("edges").unwrap().as_datum().unwrap();
    match edges.shape().unwrap()[0] {
        DimValue::Ref(p) => assert_eq!(p.offset, 1),
        other => panic!("expected reference, got {:?}", other),
    }
    assert_eq!(edges.size().unwrap(), Some(11 * 8));
    let inner = root.get("inner").unwrap().as_datum().unwrap();
    assert_eq!(inner.size().unwrap(), Some(8 * 8));
}

#[test]
fn default_order_interns_unprefixed_primitives() {
    let r = dud::parse(">\nx = f8\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let x = r.arena.root().get("x").unwrap().as_datum().unwrap();
    match x.datatype() {
        TypeRef::Prim(p) => assert_eq!(p.name, ">f8"),
        other => panic!("expected primitive, got {:?}", other),
    }
}

#[test]
fn template_parameter_preamble() {
    let r = dud::parse("<{ nx : <i4 @0, ny : <i4 @4 }\ngrid = <f4 [nx, ny] @8\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    assert!(root.param("nx").unwrap().is_dynamic());
    assert_eq!(root.param("ny").unwrap().address().at(), Some(4));
}

#[test]
fn lists_with_inline_dicts() {
    let src = "frames [ <f8 [100] @0, <f8 [100] @800, / label = |S1 [8] @1600 / ]\n";
    let r = dud::parse(src);
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let root = r.arena.root();
    let Node::List(frames) = root.get("frames").unwrap() else {
        panic!("frames should be a list")
    };
    assert_eq!(frames.len(), 3);
    let Node::Dict(inline) = frames.get(2).unwrap() else {
        panic!("third member should be a dict")
    };
    let label = inline.get("label").unwrap().as_datum().unwrap();
    assert_eq!(label.address().at(), Some(1600));
    assert_eq!(label.size().unwrap(), Some(8));
}

#[test]
fn filters_and_attributes() {
    let src = "\
#: version = 3, name = 'wave'
z = <f4 [128, 128] -> zfp(16) @0
";
    let r = dud::parse(src);
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let z = r.arena.root().get("z").unwrap().as_datum().unwrap();
    let f = z.filter().unwrap();
    assert_eq!(f.name, "zfp");
    assert_eq!(f.dir, FilterDir::Write);
    let attrs = z.attrs().unwrap();
    assert_eq!(attrs.get("version"), Some(&AttrValue::Int(3)));
    assert_eq!(attrs.get("name"), Some(&AttrValue::Str("wave".into())));
}

#[test]
fn doc_comments_attach_to_their_item() {
    let r = dud::parse("## particle count\nn : <i8 @0\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    let n = r.arena.root().param("n").unwrap();
    assert_eq!(n.docs(), [" particle count".to_string()]);
}

#[test]
fn quoted_names() {
    let r = dud::parse("'odd name' = <i4 @0\n");
    assert!(r.is_clean(), "errors: {:?}", r.errors);
    assert!(r.arena.root().get("odd name").is_some());
}

#[test]
fn redeclaration_is_reported_not_fatal() {
    let r = dud::parse("x = <i4\nx = <f8\ny = <i2\n");
    assert_eq!(r.errors.len(), 1, "errors: {:?}", r.errors);
    assert!(r.arena.root().get("y").is_some());
}

#[test]
fn address_rejected_inside_typedef() {
    let r = dud::parse("bad == <i4 @8\n");
    assert_eq!(r.errors.len(), 1, "errors: {:?}", r.errors);
}

#[test]
fn parameter_type_must_be_integer() {
    let r = dud::parse("n : <f8 @0\n");
    assert!(!r.errors.is_empty());
}

#[test]
fn serializer_round_trip_is_a_fixed_point() {
    let src = "\
<
count : <i4 @0
pt == { x = <f8, y = <f8 }
## trajectory samples
path = pt [count] @8
meta/
  tag = |S1 [16] %8
  rate : 100
  hist = <f4 [rate] -> deflate(6)
..
raw = <u1 [-1, 512]
";
    let first = dud::parse(src);
    assert!(first.is_clean(), "errors: {:?}", first.errors);
    let text1 = dud::write(&first.arena);
    let second = dud::parse(&text1);
    assert!(second.is_clean(), "reparse errors: {:?}\n{}", second.errors, text1);
    let text2 = dud::write(&second.arena);
    assert_eq!(text1, text2, "serializer not a fixed point:\n{}", text1);
}

#[test]
fn round_trip_preserves_structure() {
    let src = "n : <i4 @0\nv = <f8 [n+] @4\n";
    let r1 = dud::parse(src);
    let r2 = dud::parse(&dud::write(&r1.arena));
    assert!(r2.is_clean());
    let v1 = r1.arena.root().get("v").unwrap().as_datum().unwrap();
    let v2 = r2.arena.root().get("v").unwrap().as_datum().unwrap();
    assert_eq!(v1.address(), v2.address());
    let (s1, s2) = (v1.shape().unwrap(), v2.shape().unwrap());
    match (&s1[0], &s2[0]) {
        (DimValue::Ref(a), DimValue::Ref(b)) => assert_eq!(a.offset, b.offset),
        other => panic!("expected references, got {:?}", other),
    }
}
