//! Reference-counted ownership of one physical memory allocation.
//!
//! A [Raw] is shared by every view over the same memory. Each view beyond the
//! first calls [Raw::retain] when it is created, and every view calls
//! [Raw::release] exactly once when it is destroyed. The release that finds the
//! count at zero frees the memory, if the Raw owns it.
//!
//! The counters are plain `Cell`s, so a `Raw` is neither `Send` nor `Sync`.

use std::{cell::Cell, ptr::NonNull, rc::Rc};

use crate::errors::AccessError;

/// Frees memory handed to [Raw::from_raw_parts]. Called at most once.
pub type Deallocator = Box<dyn FnOnce(NonNull<u8>, usize)>;

/// Shared owner of one allocation, with an explicit holder count.
///
/// The count starts at 0 for the first holder. Memory handed over with a
/// [Deallocator] is freed by the release that finds the count at 0; borrowed
/// memory is never freed.
pub struct Raw {
    ptr: Cell<Option<NonNull<u8>>>,
    size: Cell<usize>,
    refcount: Cell<usize>,
    dealloc: Cell<Option<Deallocator>>,
    owns_memory: bool,
    released: Cell<bool>,
}

impl std::fmt::Debug for Raw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raw")
            .field("ptr", &self.ptr.get())
            .field("size", &self.size.get())
            .field("refcount", &self.refcount.get())
            .field("owns_memory", &self.owns_memory)
            .finish()
    }
}

impl Raw {
    /// Takes ownership of `bytes`; they are freed on the last release.
    pub fn from_vec(bytes: Vec<u8>) -> Rc<Raw> {
        let size = bytes.len();
        let ptr = NonNull::from(Box::leak(bytes.into_boxed_slice())).cast::<u8>();

        let dealloc: Deallocator = Box::new(|ptr, size| {
            let slice = std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), size);
            // SAFETY: `ptr` and `size` come from the boxed slice leaked above.
            drop(unsafe { Box::from_raw(slice) });
        });

        // SAFETY: the leaked slice stays valid until `dealloc` runs.
        unsafe { Raw::from_raw_parts(ptr, size, Some(dealloc)) }
    }

    /// Wraps memory owned elsewhere. With a `dealloc`, the Raw owns the memory
    /// and frees it on the last release; without one it only borrows it.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `size` bytes until `dealloc`
    /// runs or, for borrowed memory, until [Raw::detach] is called. No other
    /// reference to that memory may be live while a view accesses it.
    pub unsafe fn from_raw_parts(
        ptr: NonNull<u8>,
        size: usize,
        dealloc: Option<Deallocator>,
    ) -> Rc<Raw> {
        Rc::new(Raw {
            ptr: Cell::new(Some(ptr)),
            size: Cell::new(size),
            refcount: Cell::new(0),
            owns_memory: dealloc.is_some(),
            dealloc: Cell::new(dealloc),
            released: Cell::new(false),
        })
    }

    /// Registers one more holder.
    ///
    /// # Panics
    ///
    /// Panics if the last holder was already released.
    pub fn retain(&self) {
        assert!(!self.released.get(), "raw retained after its last release");
        self.refcount.set(self.refcount.get() + 1);
        tracing::trace!(refcount = self.refcount.get(), "raw retained");
    }

    /// Drops one holder, freeing the memory when the last holder goes.
    ///
    /// # Panics
    ///
    /// Panics if called more often than [Raw::retain] plus one; that is a
    /// contract violation of the caller, not a recoverable error.
    pub fn release(&self) {
        match self.refcount.get() {
            0 => {
                if self.released.replace(true) {
                    panic!("raw refcount underflow: released more times than retained");
                }
                self.free();
            }
            refcount => {
                self.refcount.set(refcount - 1);
                tracing::trace!(refcount = refcount - 1, "raw released");
            }
        }
    }

    /// Forgets the memory without freeing it. Every later access through any
    /// view fails with [AccessError::Detached].
    pub fn detach(&self) {
        self.ptr.set(None);
        self.size.set(0);
        // the external owner reclaims the memory, so the deallocator must not run
        drop(self.dealloc.take());
        tracing::debug!(refcount = self.refcount.get(), "raw detached");
    }

    fn free(&self) {
        let size = self.size.replace(0);

        if let (Some(ptr), Some(dealloc)) = (self.ptr.take(), self.dealloc.take()) {
            tracing::trace!(size, "raw memory freed");
            dealloc(ptr, size);
        }
    }

    pub fn refcount(&self) -> usize {
        self.refcount.get()
    }

    /// Size in bytes; 0 once detached or freed.
    pub fn size(&self) -> usize {
        self.size.get()
    }

    pub fn owns_memory(&self) -> bool {
        self.owns_memory
    }

    /// True once the memory was detached or freed.
    pub fn is_detached(&self) -> bool {
        self.ptr.get().is_none()
    }

    /// Start of the memory; `None` once detached or freed.
    pub fn as_ptr(&self) -> Option<NonNull<u8>> {
        self.ptr.get()
    }

    /// Pointer to `len` bytes at `offset`, valid for reads and writes.
    pub(crate) fn ptr_at(&self, offset: usize, len: usize) -> Result<NonNull<u8>, AccessError> {
        let ptr = self.ptr.get().ok_or(AccessError::Detached)?;

        if offset.checked_add(len).is_none_or(|end| end > self.size.get()) {
            return Err(AccessError::OutOfRange);
        }

        // SAFETY: `offset + len` is within the allocation checked above.
        Ok(unsafe { ptr.add(offset) })
    }

    /// Runs `f` over `len` bytes at `offset`.
    pub(crate) fn with_bytes<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, AccessError> {
        let ptr = self.ptr_at(offset, len)?;
        // SAFETY: bounds checked; the slice does not outlive this call.
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
        Ok(f(bytes))
    }

    /// Runs `f` over `len` mutable bytes at `offset`. `f` must not access this Raw.
    pub(crate) fn with_bytes_mut<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, AccessError> {
        let ptr = self.ptr_at(offset, len)?;
        // SAFETY: bounds checked; no other slice over this memory is live while
        // `f` runs, and the slice does not outlive this call.
        let bytes = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), len) };
        Ok(f(bytes))
    }
}

impl Drop for Raw {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted(bytes: Vec<u8>, frees: &Rc<Cell<usize>>) -> Rc<Raw> {
        let size = bytes.len();
        let ptr = NonNull::from(Box::leak(bytes.into_boxed_slice())).cast::<u8>();
        let frees = Rc::clone(frees);

        let dealloc: Deallocator = Box::new(move |ptr, size| {
            frees.set(frees.get() + 1);
            let slice = std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), size);
            drop(unsafe { Box::from_raw(slice) });
        });

        unsafe { Raw::from_raw_parts(ptr, size, Some(dealloc)) }
    }

    #[test]
    fn test_release_frees_once() {
        let frees = Rc::new(Cell::new(0));
        let raw = counted(vec![1, 2, 3], &frees);

        raw.release();
        assert_eq!(frees.get(), 1);
        assert!(raw.is_detached());

        drop(raw);
        assert_eq!(frees.get(), 1);
    }

    #[test]
    fn test_free_after_last_release() {
        let frees = Rc::new(Cell::new(0));
        let raw = counted(vec![0; 8], &frees);

        raw.retain();
        raw.retain();
        raw.retain();
        assert_eq!(raw.refcount(), 3);

        for _ in 0..3 {
            raw.release();
            assert_eq!(frees.get(), 0);
        }

        raw.release();
        assert_eq!(frees.get(), 1);
    }

    #[test]
    #[should_panic(expected = "refcount underflow")]
    fn test_release_underflow_panics() {
        let raw = Raw::from_vec(vec![0; 4]);
        raw.release();
        raw.release();
    }

    #[test]
    #[should_panic(expected = "after its last release")]
    fn test_retain_after_free_panics() {
        let raw = Raw::from_vec(vec![0; 4]);
        raw.release();
        raw.retain();
    }

    #[test]
    fn test_as_ptr() {
        let raw = Raw::from_vec(vec![5, 6]);
        let ptr = raw.as_ptr().unwrap();
        assert_eq!(unsafe { ptr.add(1).read() }, 6);
        assert_eq!(raw.ptr_at(1, 1), Ok(unsafe { ptr.add(1) }));
        assert_eq!(raw.ptr_at(1, 2), Err(AccessError::OutOfRange));

        raw.release();
        assert_eq!(raw.as_ptr(), None);
    }

    #[test]
    fn test_borrowed_memory_not_freed() {
        let mut buffer = [1u8, 2, 3];
        let raw =
            unsafe { Raw::from_raw_parts(NonNull::from(&mut buffer).cast::<u8>(), 3, None) };

        assert!(!raw.owns_memory());
        assert_eq!(raw.with_bytes(1, 2, |bytes| bytes.to_vec()), Ok(vec![2, 3]));

        raw.release();
        drop(raw);
        assert_eq!(buffer, [1, 2, 3]);
    }

    #[test]
    fn test_detach() {
        let frees = Rc::new(Cell::new(0));
        let raw = counted(vec![7; 4], &frees);
        raw.retain();

        raw.detach();
        assert!(raw.is_detached());
        assert_eq!(raw.size(), 0);
        assert_eq!(raw.with_bytes(0, 1, |bytes| bytes[0]), Err(AccessError::Detached));
        assert_eq!(
            raw.with_bytes_mut(0, 1, |bytes| bytes[0] = 1),
            Err(AccessError::Detached)
        );

        raw.release();
        raw.release();
        drop(raw);
        assert_eq!(frees.get(), 0);
    }

    #[test]
    fn test_bounds() {
        let raw = Raw::from_vec(vec![0; 4]);
        assert!(raw.with_bytes(0, 4, |_| ()).is_ok());
        assert_eq!(raw.with_bytes(1, 4, |_| ()), Err(AccessError::OutOfRange));
        assert_eq!(
            raw.with_bytes(usize::MAX, 2, |_| ()),
            Err(AccessError::OutOfRange)
        );
    }

    #[test]
    fn test_drop_without_release_frees() {
        let frees = Rc::new(Cell::new(0));
        drop(counted(vec![0; 2], &frees));
        assert_eq!(frees.get(), 1);
    }
}
