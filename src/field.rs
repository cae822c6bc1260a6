//! Declarative field descriptions used to build a [crate::LayoutTable].
//!
//! A description arrives from an embedder as loosely typed parameters, either
//! positionally as `[offset, length, kind, endian]` or as named parameters.
//! Named parameters override positional ones. Parameters of the wrong type are
//! ignored rather than rejected.

/// A loosely typed parameter of a field description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Number(i64),
    Text(String),
    /// A value of any other type; it never parses, so the default applies.
    Unsupported,
}

impl Param {
    /// Reads the parameter as a non-negative size; numeric text is accepted.
    pub fn as_size(&self) -> Option<usize> {
        match self {
            Param::Number(n) => usize::try_from(*n).ok(),
            Param::Text(text) => text.trim().parse().ok(),
            Param::Unsupported => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Param::Text(text) => Some(text),
            Param::Number(_) | Param::Unsupported => None,
        }
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Number(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

/// Description of a single field before compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec {
    /// `[offset, length, kind, endian]`; any prefix may be given.
    pub positional: Vec<Param>,
    pub offset: Option<Param>,
    pub length: Option<Param>,
    /// `number` or `string`.
    pub kind: Option<Param>,
    /// `big`, `net`, `little` or `host`.
    pub endian: Option<Param>,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional form: `[offset, length, kind, endian]`.
    pub fn positional(params: impl IntoIterator<Item = Param>) -> Self {
        FieldSpec {
            positional: params.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(Param::Number(offset));
        self
    }

    pub fn length(mut self, length: i64) -> Self {
        self.length = Some(Param::Number(length));
        self
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn endian(mut self, endian: &str) -> Self {
        self.endian = Some(endian.into());
        self
    }

    /// Parses the named parameter, falling back to the positional one at `index`
    /// when the named one is absent or does not parse.
    pub(crate) fn resolve<T>(
        &self,
        index: usize,
        named: &Option<Param>,
        parse: impl Fn(&Param) -> Option<T>,
    ) -> Option<T> {
        named
            .as_ref()
            .and_then(&parse)
            .or_else(|| self.positional.get(index).and_then(&parse))
    }
}
