//! Serializable layout descriptions.
//!
//! A layout is a map from field key to either a positional array or a named
//! object, for example in JSON:
//!
//! ```json
//! {
//!   "version": [0, 4],
//!   "length":  { "offset": 4, "length": 12, "endian": "little" },
//!   "name":    [2, 6, "string"]
//! }
//! ```
//!
//! Convert a [LayoutDef] into a [LayoutTable] with `LayoutTable::from`.
//! Parameters and fields of an unexpected shape deserialize as `Other` and are
//! dropped by the conversion, so one bad entry never loses the rest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::IgnoredAny};

use crate::{
    field::{FieldSpec, Param},
    layout::LayoutTable,
};

/// A parameter: a number or a name such as `"string"` or `"little"`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamDef {
    Number(i64),
    Text(String),
    #[serde(skip_serializing)]
    Other(IgnoredAny),
}

/// Description of one field.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FieldDef {
    /// `[offset, length, type, endian]`; any prefix.
    Positional(Vec<ParamDef>),
    Named(NamedFieldDef),
    #[serde(skip_serializing)]
    Other(IgnoredAny),
}

/// Named form of a field; every parameter is optional.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct NamedFieldDef {
    /// Bit offset for numbers, byte offset for strings. Defaults to 0.
    #[serde(default)]
    pub offset: Option<ParamDef>,
    /// Bit width for numbers, byte length for strings. Fields without a length are dropped.
    #[serde(default)]
    pub length: Option<ParamDef>,
    /// `"number"` (default) or `"string"`.
    #[serde(default, rename = "type")]
    pub kind: Option<ParamDef>,
    /// `"big"`/`"net"` (default), `"little"` or `"host"`.
    #[serde(default)]
    pub endian: Option<ParamDef>,
}

/// Top-level layout description keyed by field name.
pub type LayoutDef = BTreeMap<String, FieldDef>;

impl From<ParamDef> for Param {
    fn from(value: ParamDef) -> Self {
        match value {
            ParamDef::Number(n) => Param::Number(n),
            ParamDef::Text(text) => Param::Text(text),
            ParamDef::Other(_) => Param::Unsupported,
        }
    }
}

impl From<FieldDef> for FieldSpec {
    fn from(value: FieldDef) -> Self {
        match value {
            FieldDef::Positional(params) => {
                FieldSpec::positional(params.into_iter().map(Into::into))
            }
            FieldDef::Named(named) => FieldSpec {
                positional: Vec::new(),
                offset: named.offset.map(Into::into),
                length: named.length.map(Into::into),
                kind: named.kind.map(Into::into),
                endian: named.endian.map(Into::into),
            },
            FieldDef::Other(_) => FieldSpec::default(),
        }
    }
}

impl From<LayoutDef> for LayoutTable {
    fn from(value: LayoutDef) -> Self {
        LayoutTable::build(value.into_iter().map(|(key, def)| (key, FieldSpec::from(def))))
    }
}
