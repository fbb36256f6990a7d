use core::fmt;
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};
use core::str::FromStr;

/// Floating point type used for property vectors
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Element type storable in an `Array`.
///
/// Arithmetic follows the host type: integer division by zero panics,
/// float reductions propagate NaN the way `PartialOrd` comparisons do.
pub trait Scalar:
    Copy
    + Default
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + fmt::LowerExp
    + FromStr
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    const ZERO: Self;
    const TYPE_NAME: &'static str;

    fn abs(self) -> Self;

    fn sqrt(self) -> Self;
}

macro_rules! impl_float_scalar {
    ($($t:ty => $name:literal),*) => {$(
        impl Scalar for $t {
            const ZERO: Self = 0.0;
            const TYPE_NAME: &'static str = $name;

            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }
        }
    )*};
}

macro_rules! impl_int_scalar {
    ($($t:ty => $name:literal),*) => {$(
        impl Scalar for $t {
            const ZERO: Self = 0;
            const TYPE_NAME: &'static str = $name;

            #[inline]
            fn abs(self) -> Self {
                self.wrapping_abs()
            }

            // truncated toward zero, negative input gives zero
            #[inline]
            fn sqrt(self) -> Self {
                (self as Real).sqrt() as $t
            }
        }
    )*};
}

impl_float_scalar!(f32 => "f32", f64 => "f64");
impl_int_scalar!(i32 => "i32", i64 => "i64");
