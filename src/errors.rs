//! Error types for bit access, field access and view construction.

/// Errors produced by the unchecked bit codec in [crate::bits].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Field width is 0 or greater than 64 bits.
    #[error("invalid field width {0}: must be between 1 and 64 bits")]
    InvalidWidth(usize),
}

/// Errors produced when reading, writing or segmenting a [crate::DataView].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// No layout is attached, or the attached layout has no entry for this key.
    #[error("unknown field `{0}`")]
    UnknownKey(String),
    /// Requested range does not fit inside the view.
    #[error("field or segment is out of the view bounds")]
    OutOfRange,
    /// The backing memory was detached or the view was already destroyed.
    #[error("view memory is detached")]
    Detached,
    /// Number field wider than 64 bits.
    #[error("invalid field width {0}: must be between 1 and 64 bits")]
    InvalidWidth(usize),
    /// Value kind does not match the field kind.
    #[error("value does not match the field kind")]
    TypeMismatch,
}

impl From<CodecError> for AccessError {
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::InvalidWidth(width) => AccessError::InvalidWidth(width),
        }
    }
}

/// Errors produced when creating storage for a new [crate::DataView].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructError {
    /// Zero-sized buffers cannot back a view.
    #[error("cannot create a view over an empty buffer")]
    EmptyBuffer,
    /// Backing storage of `size` bytes could not be allocated.
    #[error("failed to allocate {size} bytes for a view")]
    Allocation {
        size: usize,
        #[source]
        source: std::collections::TryReserveError,
    },
}
