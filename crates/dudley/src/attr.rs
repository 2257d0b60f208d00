// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Attribute values attached to layout items by `#:` attribute comments.
//!
//! Values are one of seven tagged variants; arrays are homogeneous (mixed
//! arrays are rejected where they are parsed).  A bare attribute name is
//! boolean true.

/// One attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StrArray(Vec<String>),
}

/// An insertion-ordered attribute map.  Setting an existing name replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrMap {
    entries: Vec<(String, AttrValue)>,
}

impl AttrMap {
    pub fn new() -> AttrMap {
        AttrMap::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Move all entries of `other` into this map, replacing collisions.
    pub fn merge(&mut self, other: AttrMap) {
        for (name, value) in other.entries {
            self.set(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut m = AttrMap::new();
        m.set("a", AttrValue::Int(1));
        m.set("b", AttrValue::Bool(true));
        m.set("a", AttrValue::Int(2));
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("a"), Some(&AttrValue::Int(2)));
        // Insertion order survives replacement.
        let names: Vec<&str> = m.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn merge_overrides() {
        let mut m = AttrMap::new();
        m.set("units", AttrValue::Str("cm".into()));
        let mut other = AttrMap::new();
        other.set("units", AttrValue::Str("m".into()));
        other.set("scale", AttrValue::Float(1.5));
        m.merge(other);
        assert_eq!(m.get("units"), Some(&AttrValue::Str("m".into())));
        assert_eq!(m.get("scale"), Some(&AttrValue::Float(1.5)));
    }
}
