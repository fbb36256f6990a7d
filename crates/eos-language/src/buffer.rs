//! Shared, typed storage blocks backing every `Array`.
//!
//! A [`RefCountedBuffer`] is either *owning* (the buffer allocated the
//! elements and releases them when the last reference goes away) or a
//! *borrowed view* over caller memory that is never freed here. Buffers are
//! always handled through `Arc`, whose strong count is the buffer's
//! reference count.

use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

enum Storage<T> {
    Owned(Vec<T>),
    Borrowed { ptr: NonNull<T>, len: usize },
}

// SAFETY: a borrowed view is only created through `RefCountedBuffer::borrowed`,
// whose contract hands the memory to the buffer for as long as it is alive.
// Access then goes through the buffer's lock like owned storage.
unsafe impl<T: Send> Send for Storage<T> {}
unsafe impl<T: Sync> Sync for Storage<T> {}

impl<T> Storage<T> {
    fn as_slice(&self) -> &[T] {
        match self {
            Storage::Owned(values) => values,
            // SAFETY: upheld by the `borrowed` contract.
            Storage::Borrowed { ptr, len } => unsafe { slice::from_raw_parts(ptr.as_ptr(), *len) },
        }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Storage::Owned(values) => values,
            // SAFETY: upheld by the `borrowed` contract; `&mut self` comes
            // from the write lock so this is the only live slice.
            Storage::Borrowed { ptr, len } => unsafe {
                slice::from_raw_parts_mut(ptr.as_ptr(), *len)
            },
        }
    }
}

/// Contiguous storage with an ownership flag.
///
/// The element count is fixed for the buffer's lifetime; resizing an array
/// swaps in a new buffer.
pub struct RefCountedBuffer<T> {
    storage: RwLock<Storage<T>>,
    len: usize,
    owner: bool,
}

impl<T: Clone> RefCountedBuffer<T> {
    /// Owning buffer of `len` copies of `fill`.
    pub fn owned(len: usize, fill: T) -> Self {
        Self::from_vec(vec![fill; len])
    }
}

impl<T> RefCountedBuffer<T> {
    /// Owning buffer taking over `values`.
    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            len: values.len(),
            storage: RwLock::new(Storage::Owned(values)),
            owner: true,
        }
    }

    /// Non-owning view over `len` elements starting at `ptr`.
    ///
    /// # Safety
    /// The caller must ensure that:
    /// - `ptr` points to `len` initialized, properly aligned elements
    /// - the memory stays valid until every array sharing this buffer is gone
    /// - nothing outside this buffer reads or writes the memory meanwhile
    pub unsafe fn borrowed(ptr: NonNull<T>, len: usize) -> Self {
        Self {
            storage: RwLock::new(Storage::Borrowed { ptr, len }),
            len,
            owner: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether dropping the last reference releases the elements.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn read(&self) -> BufferRead<'_, T> {
        BufferRead(self.storage.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn write(&self) -> BufferWrite<'_, T> {
        BufferWrite(self.storage.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Address of the first element.
    ///
    /// Stable for the buffer's lifetime: owned storage never reallocates.
    pub fn as_ptr(&self) -> *const T {
        self.read().as_ptr()
    }

    pub fn as_mut_ptr(&self) -> *mut T {
        self.write().as_mut_ptr()
    }
}

impl<T> std::fmt::Debug for RefCountedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefCountedBuffer")
            .field("len", &self.len)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Shared view of a buffer's elements.
pub struct BufferRead<'a, T>(RwLockReadGuard<'a, Storage<T>>);

impl<T> Deref for BufferRead<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.0.as_slice()
    }
}

/// Exclusive view of a buffer's elements.
pub struct BufferWrite<'a, T>(RwLockWriteGuard<'a, Storage<T>>);

impl<T> Deref for BufferWrite<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl<T> DerefMut for BufferWrite<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.0.as_mut_slice()
    }
}
