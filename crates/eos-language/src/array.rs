//! Copy-on-write numeric arrays.
//!
//! An [`Array`] is a value handle onto one [`RefCountedBuffer`]. Two
//! operations are deliberately distinct:
//!
//! - **attach** (`Clone`, [`Array::attach`]) shares the buffer: writes through
//!   one array are visible through every array attached to it;
//! - **copy** ([`Array::copy`], [`Array::copy_from`]) duplicates the elements
//!   into storage nobody else references.
//!
//! [`Array::resize`] always ends up on a fresh buffer, so it also breaks
//! sharing.

use std::fmt;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};
use std::ptr::NonNull;
use std::sync::Arc;

use eos_core::{EosError, EosResult, Scalar};

use crate::buffer::RefCountedBuffer;

pub struct Array<T> {
    buffer: Arc<RefCountedBuffer<T>>,
}

impl<T: Scalar> Array<T> {
    /// `len` zero elements.
    pub fn new(len: usize) -> Self {
        Self::filled(len, T::ZERO)
    }

    /// `len` copies of `fill`.
    pub fn filled(len: usize, fill: T) -> Self {
        Self {
            buffer: Arc::new(RefCountedBuffer::owned(len, fill)),
        }
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            buffer: Arc::new(RefCountedBuffer::from_vec(values)),
        }
    }

    /// Wrap `len` elements of caller memory without taking ownership.
    ///
    /// # Safety
    /// Same contract as [`RefCountedBuffer::borrowed`]: `ptr` must point to
    /// `len` initialized elements that outlive every array attached to the
    /// returned one, and nothing else may touch them meanwhile.
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> EosResult<Self> {
        let ptr = match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None if len == 0 => NonNull::dangling(),
            None => {
                return Err(EosError::InvalidArg {
                    what: "null pointer for a non-empty array view",
                });
            }
        };
        // SAFETY: forwarded to the caller.
        let buffer = unsafe { RefCountedBuffer::borrowed(ptr, len) };
        Ok(Self {
            buffer: Arc::new(buffer),
        })
    }

    /// Detach, then view `len` elements of caller memory.
    ///
    /// # Safety
    /// See [`Array::from_raw_parts`].
    pub unsafe fn set_ptr(&mut self, ptr: *mut T, len: usize) -> EosResult<&mut Self> {
        // SAFETY: forwarded to the caller.
        let view = unsafe { Self::from_raw_parts(ptr, len) }?;
        self.attach(&view);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of arrays attached to the current buffer, this one included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    pub fn is_owner(&self) -> bool {
        self.buffer.is_owner()
    }

    /// Whether `self` and `other` are attached to the same buffer.
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Raw address of the elements, for numerical routines across FFI.
    ///
    /// Valid until this array is detached or resized.
    pub fn as_ptr(&self) -> *const T {
        self.buffer.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buffer.as_mut_ptr()
    }

    pub fn get(&self, index: usize) -> EosResult<T> {
        self.buffer
            .read()
            .get(index)
            .copied()
            .ok_or(EosError::IndexOob {
                what: "array get",
                index,
                len: self.len(),
            })
    }

    pub fn set(&mut self, index: usize, value: T) -> EosResult<()> {
        let len = self.len();
        let mut values = self.buffer.write();
        let slot = values.get_mut(index).ok_or(EosError::IndexOob {
            what: "array set",
            index,
            len,
        })?;
        *slot = value;
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.buffer.read().to_vec()
    }

    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.buffer.read())
    }

    /// Mutate the elements in place; attached arrays see the changes.
    pub fn with_slice_mut<R>(&mut self, f: impl FnOnce(&mut [T]) -> R) -> R {
        f(&mut self.buffer.write())
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) -> &mut Self {
        self.buffer.write().fill(value);
        self
    }

    /// Drop this array's reference to its buffer.
    ///
    /// Returns `true` when that was the last reference of an owning buffer,
    /// i.e. when the elements were released. The array is left empty.
    pub fn detach(&mut self) -> bool {
        let old = std::mem::replace(&mut self.buffer, Arc::new(RefCountedBuffer::from_vec(Vec::new())));
        match Arc::into_inner(old) {
            Some(buffer) => buffer.is_owner(),
            None => false,
        }
    }

    /// Detach, then share `other`'s buffer.
    pub fn attach(&mut self, other: &Self) {
        if self.shares_buffer_with(other) {
            return;
        }
        self.detach();
        self.buffer = Arc::clone(&other.buffer);
    }

    /// New array attached to this one's buffer; same as `clone`.
    pub fn share(&self) -> Self {
        self.clone()
    }

    /// Independent duplicate of the elements.
    pub fn copy(&self) -> Self {
        Self::from_vec(self.to_vec())
    }

    /// Make `self` an element-wise copy of `other` that shares nothing.
    ///
    /// Storage is reused only when this array is the sole owner of a buffer
    /// of the right size; otherwise a new buffer is allocated.
    pub fn copy_from(&mut self, other: &Self) -> &mut Self {
        let reusable = self.ref_count() == 1 && self.is_owner() && self.len() == other.len();
        if reusable {
            self.buffer.write().copy_from_slice(&other.buffer.read());
        } else {
            let values = other.to_vec();
            self.detach();
            self.buffer = Arc::new(RefCountedBuffer::from_vec(values));
        }
        self
    }

    /// Copy `other` over the first `other.len()` elements, in place.
    pub fn inject(&mut self, other: &Self) -> EosResult<&mut Self> {
        if other.len() > self.len() {
            return Err(EosError::ShapeMismatch {
                what: "array inject",
                left: self.len(),
                right: other.len(),
            });
        }
        if !self.shares_buffer_with(other) {
            let n = other.len();
            self.zip_apply(other, |dst, src| dst[..n].copy_from_slice(src));
        }
        Ok(self)
    }

    /// Move onto a new buffer of `len` elements.
    ///
    /// The first `min(len, old_len)` elements are kept, the rest are zero.
    /// A no-op when the size is unchanged.
    pub fn resize(&mut self, len: usize) -> &mut Self {
        if len == self.len() {
            return self;
        }
        let mut values = Vec::with_capacity(len);
        {
            let old = self.buffer.read();
            let kept = len.min(old.len());
            values.extend_from_slice(&old[..kept]);
        }
        values.resize(len, T::ZERO);
        self.detach();
        self.buffer = Arc::new(RefCountedBuffer::from_vec(values));
        self
    }

    pub fn add_array(&mut self, other: &Self) -> EosResult<&mut Self> {
        self.check_same_len("array add", other)?;
        self.zip_apply(other, |x, y| x.iter_mut().zip(y).for_each(|(x, &y)| *x += y));
        Ok(self)
    }

    pub fn sub_array(&mut self, other: &Self) -> EosResult<&mut Self> {
        self.check_same_len("array sub", other)?;
        self.zip_apply(other, |x, y| x.iter_mut().zip(y).for_each(|(x, &y)| *x -= y));
        Ok(self)
    }

    /// `x += alpha * y`
    pub fn axpy(&mut self, alpha: T, y: &Self) -> EosResult<&mut Self> {
        self.check_same_len("array axpy", y)?;
        self.zip_apply(y, |x, y| {
            x.iter_mut().zip(y).for_each(|(x, &y)| *x += alpha * y)
        });
        Ok(self)
    }

    /// `x += alpha * y * y`
    pub fn axpy_squared(&mut self, alpha: T, y: &Self) -> EosResult<&mut Self> {
        self.check_same_len("array axpy_squared", y)?;
        self.zip_apply(y, |x, y| {
            x.iter_mut()
                .zip(y)
                .for_each(|(x, &y)| *x += alpha * y * y)
        });
        Ok(self)
    }

    pub fn square(&mut self) -> &mut Self {
        self.map_in_place(|x| x * x)
    }

    pub fn sqrt(&mut self) -> &mut Self {
        self.map_in_place(Scalar::sqrt)
    }

    pub fn max(&self) -> Option<T> {
        self.reduce(|acc, x| if x > acc { x } else { acc })
    }

    pub fn min(&self) -> Option<T> {
        self.reduce(|acc, x| if x < acc { x } else { acc })
    }

    pub fn max_abs(&self) -> Option<T> {
        self.map_reduce(Scalar::abs, |acc, x| if x > acc { x } else { acc })
    }

    pub fn min_abs(&self) -> Option<T> {
        self.map_reduce(Scalar::abs, |acc, x| if x < acc { x } else { acc })
    }

    /// Euclidean norm; zero for an empty array.
    pub fn norm(&self) -> T {
        let sum = self.with_slice(|values| {
            values.iter().fold(T::ZERO, |acc, &x| acc + x * x)
        });
        sum.sqrt()
    }

    fn map_in_place(&mut self, f: impl Fn(T) -> T) -> &mut Self {
        self.buffer.write().iter_mut().for_each(|x| *x = f(*x));
        self
    }

    fn reduce(&self, f: impl Fn(T, T) -> T) -> Option<T> {
        self.map_reduce(|x| x, f)
    }

    fn map_reduce(&self, map: impl Fn(T) -> T, f: impl Fn(T, T) -> T) -> Option<T> {
        self.with_slice(|values| {
            let (&first, rest) = values.split_first()?;
            Some(rest.iter().fold(map(first), |acc, &x| f(acc, map(x))))
        })
    }

    fn check_same_len(&self, what: &'static str, other: &Self) -> EosResult<()> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(EosError::ShapeMismatch {
                what,
                left: self.len(),
                right: other.len(),
            })
        }
    }

    /// Run `f` on our elements (writable) and `other`'s (read-only).
    ///
    /// Locks are taken in buffer address order so two threads combining the
    /// same pair of buffers in opposite directions cannot deadlock.
    fn zip_apply(&mut self, other: &Self, f: impl FnOnce(&mut [T], &[T])) {
        if self.shares_buffer_with(other) {
            let mut values = self.buffer.write();
            let snapshot = values.to_vec();
            f(&mut values, &snapshot);
            return;
        }
        let ours = Arc::as_ptr(&self.buffer);
        let theirs = Arc::as_ptr(&other.buffer);
        if ours < theirs {
            let mut dst = self.buffer.write();
            let src = other.buffer.read();
            f(&mut dst, &src);
        } else {
            let src = other.buffer.read();
            let mut dst = self.buffer.write();
            f(&mut dst, &src);
        }
    }
}

/// Attach: the clone shares this array's buffer.
impl<T> Clone for Array<T> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<T: Scalar> Default for Array<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Scalar> From<Vec<T>> for Array<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

impl<T: Scalar> FromIterator<T> for Array<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

/// Element-wise equality.
impl<T: Scalar> PartialEq for Array<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.shares_buffer_with(other) {
            return true;
        }
        self.with_slice(|a| other.with_slice(|b| a == b))
    }
}

impl<T: Scalar> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.len())
            .field("ref_count", &self.ref_count())
            .field("owner", &self.is_owner())
            .field("values", &&*self.buffer.read())
            .finish()
    }
}

macro_rules! impl_scalar_assign {
    ($($trait:ident :: $method:ident => $op:tt),*) => {$(
        impl<T: Scalar> $trait<T> for Array<T> {
            fn $method(&mut self, rhs: T) {
                self.buffer.write().iter_mut().for_each(|x| *x $op rhs);
            }
        }
    )*};
}

impl_scalar_assign!(
    AddAssign::add_assign => +=,
    SubAssign::sub_assign => -=,
    MulAssign::mul_assign => *=,
    DivAssign::div_assign => /=
);

#[cfg(test)]
mod tests {
    use super::*;
    use eos_core::{Tolerances, nearly_equal};

    #[test]
    fn attach_aliases_storage() {
        let mut a = Array::filled(5, 0.0_f64);
        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        a.set(2, 3.5).unwrap();
        assert_eq!(b.get(2).unwrap(), 3.5);
    }

    #[test]
    fn copy_is_independent() {
        let mut a = Array::filled(5, 1.0_f64);
        let c = a.copy();
        a.set(0, 9.0).unwrap();
        assert_eq!(c.get(0).unwrap(), 1.0);
        assert_eq!(c.ref_count(), 1);
        assert!(!c.shares_buffer_with(&a));
    }

    #[test]
    fn copy_from_breaks_previous_alias() {
        let mut a = Array::filled(3, 1_i32);
        let alias = a.clone();
        let source = Array::from_vec(vec![7, 8, 9]);
        a.copy_from(&source);
        assert_eq!(a.to_vec(), vec![7, 8, 9]);
        assert_eq!(alias.to_vec(), vec![1, 1, 1]);
        assert!(!a.shares_buffer_with(&source));
    }

    #[test]
    fn copy_from_reuses_unique_buffer() {
        let mut a = Array::filled(3, 0_i64);
        let before = a.as_ptr();
        a.copy_from(&Array::from_vec(vec![1, 2, 3]));
        assert_eq!(a.as_ptr(), before);
        assert_eq!(a.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn resize_keeps_prefix_and_zero_fills() {
        let mut a = Array::from_vec(vec![1.0_f64, 2.0, 3.0]);
        a.resize(5);
        assert_eq!(a.to_vec(), vec![1.0, 2.0, 3.0, 0.0, 0.0]);
        a.resize(2);
        assert_eq!(a.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn resize_same_size_is_noop() {
        let mut a = Array::filled(4, 2_i32);
        let b = a.clone();
        a.resize(4);
        assert!(a.shares_buffer_with(&b));
    }

    #[test]
    fn detach_frees_only_last_owner() {
        let mut a = Array::filled(4, 1.0_f64);
        let mut b = a.clone();
        assert!(!a.detach());
        assert_eq!(b.ref_count(), 1);
        assert!(b.detach());
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn detach_of_borrowed_view_never_frees() {
        let mut backing = vec![1.0_f64, 2.0];
        let mut view = unsafe { Array::from_raw_parts(backing.as_mut_ptr(), backing.len()) }.unwrap();
        assert!(!view.is_owner());
        assert!(!view.detach());
        assert_eq!(backing, vec![1.0, 2.0]);
    }

    #[test]
    fn null_view_rejected() {
        let err = unsafe { Array::<f64>::from_raw_parts(std::ptr::null_mut(), 3) }.unwrap_err();
        assert!(matches!(err, EosError::InvalidArg { .. }));
        let empty = unsafe { Array::<f64>::from_raw_parts(std::ptr::null_mut(), 0) }.unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn set_ptr_writes_through_to_caller_memory() {
        let mut backing = vec![0_i32; 3];
        let mut a = Array::filled(10, 5_i32);
        let alias = a.clone();
        unsafe { a.set_ptr(backing.as_mut_ptr(), backing.len()) }.unwrap();
        a.set(1, 42).unwrap();
        drop(a);
        assert_eq!(backing, vec![0, 42, 0]);
        assert_eq!(alias.len(), 10);
    }

    #[test]
    fn out_of_bounds_access_is_an_error() {
        let mut a = Array::<f64>::new(2);
        assert_eq!(
            a.get(2),
            Err(EosError::IndexOob {
                what: "array get",
                index: 2,
                len: 2
            })
        );
        assert!(a.set(5, 1.0).is_err());
    }

    #[test]
    fn scalar_operators() {
        let mut a = Array::filled(3, 2.0_f64);
        a += 1.0;
        a *= 4.0;
        a -= 2.0;
        a /= 5.0;
        assert_eq!(a.to_vec(), vec![2.0; 3]);
    }

    #[test]
    fn elementwise_ops_require_same_len() {
        let mut a = Array::from_vec(vec![1_i32, 2, 3]);
        let b = Array::from_vec(vec![10, 20, 30]);
        a.add_array(&b).unwrap();
        assert_eq!(a.to_vec(), vec![11, 22, 33]);
        a.sub_array(&b).unwrap();
        assert_eq!(a.to_vec(), vec![1, 2, 3]);

        let short = Array::from_vec(vec![1_i32]);
        let err = a.add_array(&short).unwrap_err();
        assert!(matches!(err, EosError::ShapeMismatch { left: 3, right: 1, .. }));
    }

    #[test]
    fn elementwise_op_with_own_alias() {
        let mut a = Array::from_vec(vec![1.0_f64, 2.0]);
        let alias = a.clone();
        a.add_array(&alias).unwrap();
        assert_eq!(alias.to_vec(), vec![2.0, 4.0]);
    }

    #[test]
    fn axpy_variants() {
        let mut x = Array::from_vec(vec![1.0_f64, 1.0]);
        let y = Array::from_vec(vec![2.0, 3.0]);
        x.axpy(2.0, &y).unwrap();
        assert_eq!(x.to_vec(), vec![5.0, 7.0]);
        x.axpy_squared(1.0, &y).unwrap();
        assert_eq!(x.to_vec(), vec![9.0, 16.0]);
        x.sqrt();
        assert_eq!(x.to_vec(), vec![3.0, 4.0]);
        x.square();
        assert_eq!(x.to_vec(), vec![9.0, 16.0]);
    }

    #[test]
    fn inject_writes_prefix_in_place() {
        let mut a = Array::filled(4, 0_i32);
        let alias = a.clone();
        a.inject(&Array::from_vec(vec![1, 2])).unwrap();
        assert_eq!(alias.to_vec(), vec![1, 2, 0, 0]);
        assert!(a.inject(&Array::filled(5, 1)).is_err());
    }

    #[test]
    fn reductions() {
        let a = Array::from_vec(vec![-4.0_f64, 1.0, 3.0, -0.5]);
        assert_eq!(a.max(), Some(3.0));
        assert_eq!(a.min(), Some(-4.0));
        assert_eq!(a.max_abs(), Some(4.0));
        assert_eq!(a.min_abs(), Some(0.5));
        let n = Array::from_vec(vec![3.0_f64, 4.0]).norm();
        assert!(nearly_equal(n, 5.0, Tolerances::default()));
    }

    #[test]
    fn reductions_on_empty() {
        let a = Array::<i32>::new(0);
        assert_eq!(a.max(), None);
        assert_eq!(a.min_abs(), None);
        assert_eq!(a.norm(), 0);
    }

    #[test]
    fn fill_is_visible_to_aliases() {
        let mut a = Array::<i64>::new(3);
        let b = a.clone();
        a.fill(6);
        assert_eq!(b.to_vec(), vec![6, 6, 6]);
    }

    #[test]
    fn equality_is_elementwise() {
        let a = Array::from_vec(vec![1_i32, 2]);
        let b = Array::from_vec(vec![1_i32, 2]);
        assert_eq!(a, b);
        assert_ne!(a, Array::from_vec(vec![1_i32]));
    }
}
