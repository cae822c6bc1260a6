//! Bounded, zero-copy windows into a shared [Raw] buffer.
//!
//! A [DataView] covers `len()` bytes starting at a byte offset of its [Raw].
//! Field access resolves a key through the attached [LayoutTable] and reads or
//! writes the bytes in place. Views created by [DataView::segment] share the
//! parent's Raw; the memory is freed once every view over it is destroyed.

use std::{ptr::NonNull, rc::Rc};

use crate::{
    bits,
    errors::{AccessError, ConstructError},
    layout::{LayoutEntry, LayoutTable},
    raw::{Deallocator, Raw},
    value::{Kind, Value},
};

const BYTE_BIT: usize = 8;
const MAX_NUMBER_BITS: usize = 64;

/// A window of bytes over a shared [Raw], with an optional [LayoutTable]
/// naming its fields.
///
/// Dropping a view releases its hold on the Raw; [DataView::destroy] does the
/// same eagerly.
#[derive(Debug)]
pub struct DataView {
    /// `None` once the view is destroyed.
    raw: Option<Rc<Raw>>,
    offset: usize,
    length: usize,
    layout: Option<Rc<LayoutTable>>,
}

/// Byte range of a resolved field, absolute within the Raw.
struct Located<'a> {
    raw: &'a Raw,
    entry: LayoutEntry,
    start: usize,
    len: usize,
}

impl DataView {
    fn over(raw: Rc<Raw>, offset: usize, length: usize) -> Self {
        DataView {
            raw: Some(raw),
            offset,
            length,
            layout: None,
        }
    }

    /// Takes ownership of `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self, ConstructError> {
        if bytes.is_empty() {
            return Err(ConstructError::EmptyBuffer);
        }

        let length = bytes.len();
        Ok(Self::over(Raw::from_vec(bytes), 0, length))
    }

    /// Copies `bytes` into new owned storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConstructError> {
        Self::from_vec(bytes.to_vec())
    }

    /// Allocates `size` zeroed bytes. A failed allocation is returned as
    /// [ConstructError::Allocation].
    pub fn with_size(size: usize) -> Result<Self, ConstructError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|source| ConstructError::Allocation { size, source })?;
        bytes.resize(size, 0);

        Self::from_vec(bytes)
    }

    /// Wraps caller memory. See [Raw::from_raw_parts] for ownership rules.
    ///
    /// # Safety
    ///
    /// Same contract as [Raw::from_raw_parts].
    pub unsafe fn from_raw_parts(
        ptr: NonNull<u8>,
        size: usize,
        dealloc: Option<Deallocator>,
    ) -> Result<Self, ConstructError> {
        if size == 0 {
            return Err(ConstructError::EmptyBuffer);
        }

        // SAFETY: forwarded to the caller.
        let raw = unsafe { Raw::from_raw_parts(ptr, size, dealloc) };
        Ok(Self::over(raw, 0, size))
    }

    /// Creates a view of `length` bytes at `offset` from the start of this view,
    /// sharing its memory. Without `length` the segment runs to the end of this
    /// view. The segment starts without a layout.
    pub fn segment(&self, offset: usize, length: Option<usize>) -> Result<DataView, AccessError> {
        let raw = self.raw.as_ref().ok_or(AccessError::Detached)?;

        if offset >= self.length {
            tracing::debug!(offset, view_len = self.length, "segment starts outside view");
            return Err(AccessError::OutOfRange);
        }

        let length = length.unwrap_or(self.length - offset);
        if offset.checked_add(length).is_none_or(|end| end > self.length) {
            tracing::debug!(offset, length, view_len = self.length, "segment exceeds view");
            return Err(AccessError::OutOfRange);
        }

        raw.retain();
        Ok(Self::over(Rc::clone(raw), self.offset + offset, length))
    }

    /// Attaches `layout`, replacing any previous one.
    pub fn apply_layout(&mut self, layout: Rc<LayoutTable>) {
        self.layout = Some(layout);
    }

    pub fn with_layout(mut self, layout: Rc<LayoutTable>) -> Self {
        self.apply_layout(layout);
        self
    }

    pub fn layout(&self) -> Option<&Rc<LayoutTable>> {
        self.layout.as_ref()
    }

    fn locate(&self, key: &str) -> Result<Located<'_>, AccessError> {
        let raw = match &self.raw {
            Some(raw) if !raw.is_detached() => raw,
            _ => return Err(AccessError::Detached),
        };

        let entry = *self
            .layout
            .as_ref()
            .and_then(|layout| layout.get(key))
            .ok_or_else(|| AccessError::UnknownKey(key.to_string()))?;

        let end = entry.end().ok_or(AccessError::OutOfRange)?;

        let (start, len) = match entry.kind {
            Kind::Number => {
                if entry.length > MAX_NUMBER_BITS
                    || self.length.checked_mul(BYTE_BIT).is_some_and(|bits| end > bits)
                {
                    return Err(AccessError::OutOfRange);
                }

                let first = entry.offset / BYTE_BIT;
                (first, end.div_ceil(BYTE_BIT) - first)
            }
            Kind::String => {
                if end > self.length {
                    return Err(AccessError::OutOfRange);
                }

                (entry.offset, entry.length)
            }
        };

        Ok(Located {
            raw,
            entry,
            start: self.offset + start,
            len,
        })
    }

    /// Reads the field `key`.
    pub fn get(&self, key: &str) -> Result<Value, AccessError> {
        let Located {
            raw,
            entry,
            start,
            len,
        } = self.locate(key)?;

        match entry.kind {
            Kind::Number => {
                let value = raw.with_bytes(start, len, |bytes| {
                    bits::get_bits(bytes, entry.offset % BYTE_BIT, entry.length, entry.endian)
                })??;

                Ok(Value::Number(value))
            }
            Kind::String => Ok(Value::String(raw.with_bytes(start, len, <[u8]>::to_vec)?)),
        }
    }

    /// Writes the field `key`.
    ///
    /// Numbers are truncated to the field width. Strings longer than the field
    /// are truncated to its length; shorter ones overwrite only their own length.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), AccessError> {
        let Located {
            raw,
            entry,
            start,
            len,
        } = self.locate(key)?;

        match (entry.kind, value.into()) {
            (Kind::Number, Value::Number(value)) => {
                raw.with_bytes_mut(start, len, |bytes| {
                    bits::set_bits(
                        bytes,
                        entry.offset % BYTE_BIT,
                        entry.length,
                        entry.endian,
                        value,
                    )
                })??;
            }
            (Kind::String, Value::String(source)) => {
                let count = source.len().min(len);
                raw.with_bytes_mut(start, count, |bytes| {
                    bytes.copy_from_slice(&source[..count])
                })?;
            }
            _ => return Err(AccessError::TypeMismatch),
        }

        Ok(())
    }

    /// Reads the field `key`, or `None` if it cannot be read.
    pub fn field(&self, key: &str) -> Option<Value> {
        self.get(key)
            .inspect_err(|err| tracing::debug!(key, %err, "field read skipped"))
            .ok()
    }

    /// Writes the field `key`; a failed write leaves the memory untouched.
    /// Returns whether the write happened.
    pub fn set_field(&self, key: &str, value: impl Into<Value>) -> bool {
        self.set(key, value)
            .inspect_err(|err| tracing::debug!(key, %err, "field write skipped"))
            .is_ok()
    }

    /// Length of the view in bytes.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Offset of the view from the start of its Raw, in bytes.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Copies the bytes of the view; `None` when detached or destroyed.
    pub fn to_vec(&self) -> Option<Vec<u8>> {
        let raw = self.raw.as_ref()?;
        raw.with_bytes(self.offset, self.length, <[u8]>::to_vec).ok()
    }

    /// Start of the view's memory; `None` when detached or destroyed.
    ///
    /// The pointer is valid for reads and writes of `len()` bytes while the
    /// memory stays attached. It must not be used while a field access on any
    /// view over the same Raw is in progress.
    pub fn as_ptr(&self) -> Option<NonNull<u8>> {
        let raw = self.raw.as_ref()?;
        raw.ptr_at(self.offset, self.length).ok()
    }

    pub fn raw(&self) -> Option<&Rc<Raw>> {
        self.raw.as_ref()
    }

    /// Detaches the shared Raw: every view over it fails with
    /// [AccessError::Detached] from now on. The memory is not freed.
    pub fn detach(&self) {
        if let Some(raw) = &self.raw {
            raw.detach();
        }
    }

    /// Releases the Raw and drops the layout. Later calls are no-ops, and any
    /// access fails with [AccessError::Detached].
    pub fn destroy(&mut self) {
        if let Some(raw) = self.raw.take() {
            raw.release();
        }
        self.layout = None;
    }
}

impl Drop for DataView {
    fn drop(&mut self) {
        self.destroy();
    }
}
