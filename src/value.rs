//! Field kinds, byte orders and the values read from or written to a view.

/// Byte order of a multi-byte Number field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// Network order. The first byte holds the most significant bits.
    #[default]
    Big,
    /// The first byte holds the least significant bits.
    Little,
    /// Native order of the target platform.
    Host,
}

impl Endian {
    /// Resolves [Endian::Host] to the target's native order.
    pub fn resolve(self) -> Endian {
        match self {
            Endian::Host if cfg!(target_endian = "little") => Endian::Little,
            Endian::Host => Endian::Big,
            other => other,
        }
    }

    /// Parses a byte-order name by its first letter: `big`/`net`, `little` or `host`.
    pub fn from_name(name: &str) -> Option<Endian> {
        match name.as_bytes().first()? {
            b'b' | b'n' => Some(Endian::Big),
            b'l' => Some(Endian::Little),
            b'h' => Some(Endian::Host),
            _ => None,
        }
    }
}

/// How a field's bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Kind {
    /// Unsigned integer of 1 to 64 bits at any bit offset.
    #[default]
    Number,
    /// Byte-aligned run of raw bytes.
    String,
}

impl Kind {
    /// Parses a kind name by its first letter: `number` or `string`.
    pub fn from_name(name: &str) -> Option<Kind> {
        match name.as_bytes().first()? {
            b'n' => Some(Kind::Number),
            b's' => Some(Kind::String),
            _ => None,
        }
    }
}

/// A value read from, or written to, a field of a [crate::DataView].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(u64),
    /// Raw bytes; not required to be UTF-8.
    String(Vec<u8>),
}

impl Value {
    /// The number, or `None` for a string value.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(_) => None,
        }
    }

    /// The string bytes, or `None` for a number value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(bytes) => Some(bytes),
            Value::Number(_) => None,
        }
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::String(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.as_bytes().to_vec())
    }
}
