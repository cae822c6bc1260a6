//! Layout tables: compiled field descriptors keyed by name.
//!
//! A [LayoutTable] is built once from [FieldSpec]s and never changes afterwards,
//! so it can be shared by any number of views through an `Rc`.

use std::collections::BTreeMap;

use crate::{
    field::{FieldSpec, Param},
    value::{Endian, Kind},
};

/// Compiled descriptor of one field.
///
/// For [Kind::Number] fields `offset` and `length` are in bits from the start of
/// the view. For [Kind::String] fields they are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub offset: usize,
    pub length: usize,
    pub kind: Kind,
    pub endian: Endian,
}

impl LayoutEntry {
    /// Big-endian Number field of `length` bits at bit `offset`.
    pub fn number(offset: usize, length: usize) -> Self {
        LayoutEntry {
            offset,
            length,
            kind: Kind::Number,
            endian: Endian::Big,
        }
    }

    /// String field of `length` bytes at byte `offset`.
    pub fn string(offset: usize, length: usize) -> Self {
        LayoutEntry {
            offset,
            length,
            kind: Kind::String,
            endian: Endian::Big,
        }
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Compiles a description. Returns `None` when it has no usable length.
    pub fn from_spec(spec: &FieldSpec) -> Option<Self> {
        let length = spec.resolve(1, &spec.length, Param::as_size).unwrap_or(0);
        if length == 0 {
            return None;
        }

        Some(LayoutEntry {
            offset: spec.resolve(0, &spec.offset, Param::as_size).unwrap_or(0),
            length,
            kind: spec
                .resolve(2, &spec.kind, |param| param.as_text().and_then(Kind::from_name))
                .unwrap_or_default(),
            endian: spec
                .resolve(3, &spec.endian, |param| {
                    param.as_text().and_then(Endian::from_name)
                })
                .unwrap_or_default(),
        })
    }

    /// One past the last unit (bit or byte, per kind) covered by the field.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.length)
    }
}

/// Immutable map of field keys to [LayoutEntry]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutTable {
    entries: BTreeMap<String, LayoutEntry>,
}

impl LayoutTable {
    /// Compiles field descriptions into a table.
    ///
    /// Never fails: descriptions without a usable length are left out, and
    /// lookups of their keys later report an unknown key. Offsets are absolute
    /// per entry, not accumulated.
    pub fn build<I, K>(spec: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        let mut entries = BTreeMap::new();
        let mut dropped = 0usize;

        for (key, field) in spec {
            match LayoutEntry::from_spec(&field) {
                Some(entry) => {
                    entries.insert(key.into(), entry);
                }
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::debug!(dropped, kept = entries.len(), "layout entries without length dropped");
        }

        LayoutTable { entries }
    }

    /// Builds a table from already compiled entries, dropping zero-length ones.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, LayoutEntry)>,
        K: Into<String>,
    {
        LayoutTable {
            entries: entries
                .into_iter()
                .filter(|(_, entry)| entry.length > 0)
                .map(|(key, entry)| (key.into(), entry))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&LayoutEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LayoutEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }
}
