//! Element-type traits.
//!
//! [`Magnitude`] is the scalar-extraction rule used by the magnitude reductions:
//! absolute value for real types, modulus for complex ones. [`Scalar`] adds the
//! field operations and conjugation needed by the products and the Toeplitz solver.

use core::fmt::Debug;
use core::ops::Neg;
use num_complex::Complex;
use num_traits::{Float, Num, NumAssign};

/// Magnitude and squared magnitude of an element.
pub trait Magnitude: Copy {
    /// Type of `|x|`. Equal to `Self` for real types.
    type Real: Copy + PartialOrd + Num + Send + Sync + Debug + 'static;

    /// `|x|`; the modulus for complex values.
    fn mag(self) -> Self::Real;

    /// `|x|²`, computed without a square root.
    fn magsq(self) -> Self::Real;
}

macro_rules! signed_magnitude {
    ($($t:ty),*) => {$(
        impl Magnitude for $t {
            type Real = $t;

            #[inline]
            fn mag(self) -> $t {
                self.saturating_abs()
            }

            #[inline]
            fn magsq(self) -> $t {
                self.saturating_mul(self)
            }
        }
    )*};
}

macro_rules! unsigned_magnitude {
    ($($t:ty),*) => {$(
        impl Magnitude for $t {
            type Real = $t;

            #[inline]
            fn mag(self) -> $t {
                self
            }

            #[inline]
            fn magsq(self) -> $t {
                self.saturating_mul(self)
            }
        }
    )*};
}

signed_magnitude!(i8, i16, i32, i64, i128, isize);
unsigned_magnitude!(u8, u16, u32, u64, u128, usize);

macro_rules! float_magnitude {
    ($($t:ty),*) => {$(
        impl Magnitude for $t {
            type Real = $t;

            #[inline]
            fn mag(self) -> $t {
                self.abs()
            }

            #[inline]
            fn magsq(self) -> $t {
                self * self
            }
        }

        impl Magnitude for Complex<$t> {
            type Real = $t;

            #[inline]
            fn mag(self) -> $t {
                self.norm()
            }

            #[inline]
            fn magsq(self) -> $t {
                self.norm_sqr()
            }
        }
    )*};
}

float_magnitude!(f32, f64);

/// Real or complex floating-point element.
pub trait Scalar:
    Magnitude<Real: Float>
    + NumAssign
    + Neg<Output = Self>
    + PartialEq
    + Debug
    + Send
    + Sync
    + 'static
{
    /// Complex conjugate; the identity for real types.
    fn conj(self) -> Self;

    /// Real part.
    fn re(self) -> Self::Real;

    /// Lifts a real number into this type.
    fn from_real(re: Self::Real) -> Self;
}

impl Scalar for f32 {
    #[inline]
    fn conj(self) -> Self {
        self
    }

    #[inline]
    fn re(self) -> Self {
        self
    }

    #[inline]
    fn from_real(re: Self) -> Self {
        re
    }
}

impl Scalar for f64 {
    #[inline]
    fn conj(self) -> Self {
        self
    }

    #[inline]
    fn re(self) -> Self {
        self
    }

    #[inline]
    fn from_real(re: Self) -> Self {
        re
    }
}

impl<T> Scalar for Complex<T>
where
    T: Float + NumAssign + Debug + Send + Sync + 'static,
    Complex<T>: Magnitude<Real = T>,
{
    #[inline]
    fn conj(self) -> Self {
        Complex::conj(&self)
    }

    #[inline]
    fn re(self) -> T {
        self.re
    }

    #[inline]
    fn from_real(re: T) -> Self {
        Complex::new(re, T::zero())
    }
}
