//! Utilities to approximate equality of floating point values.
//!
//! Differences are measured relative to the larger operand magnitude (or
//! absolutely, below one), then rated on a four-step scale.

use num_complex::Complex;

/// The max epsilon accepted on `f32`s.
pub const F32_MAX_ERROR: f32 = 1e-3;

/// The expected minimum epsilon accepted on `f32`s.
pub const F32_AVG_ERROR: f32 = 1e-5;

/// The best expected epsilon accepted on `f32`s.
pub const F32_MIN_ERROR: f32 = 1e-6;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The expected minimum epsilon accepted on `f64`s.
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The best expected epsilon accepted on `f64`s.
pub const F64_MIN_ERROR: f64 = 1e-12;

/// Checks the relative distance based off epsilon.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Rates the equality of `self` and `rhs`.
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

macro_rules! float_relative_eq {
    ($t:ty, $min:expr, $avg:expr, $max:expr) => {
        impl RelativeEq<Self> for $t {
            fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
                let scale = self.abs().max(rhs.abs()).max(1.0);
                let dif = (self - rhs).abs() / scale;

                if self == rhs || dif < $min {
                    ApproxEquality::Precise
                } else if dif < $avg {
                    ApproxEquality::Partial
                } else if dif < $max {
                    ApproxEquality::Relative
                } else {
                    ApproxEquality::Scarce
                }
            }
        }

        impl RelativeEq<Self> for Complex<$t> {
            fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
                self.re.approx_eq(&rhs.re).max(self.im.approx_eq(&rhs.im))
            }
        }
    };
}

float_relative_eq!(f32, F32_MIN_ERROR, F32_AVG_ERROR, F32_MAX_ERROR);
float_relative_eq!(f64, F64_MIN_ERROR, F64_AVG_ERROR, F64_MAX_ERROR);

impl<T: RelativeEq<U>, U> RelativeEq<[U]> for [T] {
    fn approx_eq(&self, rhs: &[U]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        let mut eq = ApproxEquality::Precise;
        for (t_val, u_val) in self.iter().zip(rhs) {
            eq = eq.max(t_val.approx_eq(u_val));
            if eq == ApproxEquality::Scarce {
                break; // can't improve from here
            }
        }
        eq
    }
}

impl<const N: usize, T: RelativeEq<U>, U> RelativeEq<[U; N]> for [T; N] {
    fn approx_eq(&self, rhs: &[U; N]) -> ApproxEquality {
        self.as_slice().approx_eq(rhs.as_slice())
    }
}

impl<T: RelativeEq<U>, U> RelativeEq<Vec<U>> for Vec<T> {
    fn approx_eq(&self, rhs: &Vec<U>) -> ApproxEquality {
        self.as_slice().approx_eq(rhs.as_slice())
    }
}

/// The approximated equality enumerated, best first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

/// `true` when `a` and `b` are equal to within the strongest epsilon.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) == ApproxEquality::Precise
}

/// `true` when `a` and `b` rate at `level` or better.
pub fn approx_eq_at<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B, level: ApproxEquality) -> bool {
    a.approx_eq(b) <= level
}
