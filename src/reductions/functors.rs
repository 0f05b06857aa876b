//! The built-in functor set.
//!
//! Value reductions implement [`ReductionFunctor`]; the extremum reductions
//! implement [`ExtremumFunctor`]. `R` parameters select a wider accumulator, e.g.
//! `SumValue<f32, f64>` sums `f32` elements in double precision.

use super::{ExtremumFunctor, ReductionFunctor, ReductionKind};
use crate::scalar::Magnitude;
use core::fmt;
use core::marker::PhantomData;
use core::ops::Div;
use num_traits::{FromPrimitive, PrimInt, Zero};

macro_rules! marker_functor {
    ($(#[$doc:meta])* $name:ident<$t:ident $(, $r:ident = $rd:ident)?>) => {
        $(#[$doc])*
        pub struct $name<$t $(, $r = $rd)?>(PhantomData<fn($t) $(-> $r)?>);

        impl<$t $(, $r)?> $name<$t $(, $r)?> {
            /// Creates the functor.
            #[inline]
            pub const fn new() -> Self {
                Self(PhantomData)
            }
        }

        impl<$t $(, $r)?> Clone for $name<$t $(, $r)?> {
            #[inline]
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<$t $(, $r)?> Copy for $name<$t $(, $r)?> {}

        impl<$t $(, $r)?> Default for $name<$t $(, $r)?> {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl<$t $(, $r)?> fmt::Debug for $name<$t $(, $r)?> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(stringify!($name))
            }
        }
    };
}

marker_functor! {
    /// Σ x, accumulated in `R`.
    SumValue<T, R = T>
}

marker_functor! {
    /// Σ x / n, accumulated in `R`. The mean of an empty sequence is `R::zero()`.
    MeanValue<T, R = T>
}

marker_functor! {
    /// Σ x², accumulated in `R`.
    SumSqValue<T, R = T>
}

marker_functor! {
    /// Σ |x|², accumulated in the magnitude type of `T`.
    SumMagsqValue<T>
}

marker_functor! {
    /// Σ |x|² / n. The result for an empty sequence is zero.
    MeanMagsqValue<T>
}

marker_functor! {
    /// Bitwise AND of all elements; `done` once every bit is clear.
    AllTrue<T>
}

marker_functor! {
    /// Bitwise OR of all elements; `done` once every bit is set.
    AnyTrue<T>
}

impl<T, R> ReductionFunctor for SumValue<T, R>
where
    T: Copy + Send + Sync + 'static,
    R: From<T> + Zero + Copy + Send + Sync + 'static,
{
    type Item = T;
    type Accum = R;
    type Output = R;

    const KIND: ReductionKind = ReductionKind::Sum;

    #[inline]
    fn initial(&self) -> R {
        R::zero()
    }

    #[inline]
    fn update(&self, acc: R, item: T) -> R {
        acc + R::from(item)
    }

    #[inline]
    fn combine(&self, lhs: R, rhs: R) -> R {
        lhs + rhs
    }

    #[inline]
    fn value(&self, acc: R, _len: usize) -> R {
        acc
    }
}

impl<T, R> ReductionFunctor for MeanValue<T, R>
where
    T: Copy + Send + Sync + 'static,
    R: From<T> + Zero + Div<Output = R> + FromPrimitive + Copy + Send + Sync + 'static,
{
    type Item = T;
    type Accum = R;
    type Output = R;

    const KIND: ReductionKind = ReductionKind::Mean;

    #[inline]
    fn initial(&self) -> R {
        R::zero()
    }

    #[inline]
    fn update(&self, acc: R, item: T) -> R {
        acc + R::from(item)
    }

    #[inline]
    fn combine(&self, lhs: R, rhs: R) -> R {
        lhs + rhs
    }

    fn value(&self, acc: R, len: usize) -> R {
        if len == 0 {
            return acc;
        }
        R::from_usize(len).map_or(acc, |n| acc / n)
    }
}

impl<T, R> ReductionFunctor for SumSqValue<T, R>
where
    T: Copy + Send + Sync + 'static,
    R: From<T> + Zero + core::ops::Mul<Output = R> + Copy + Send + Sync + 'static,
{
    type Item = T;
    type Accum = R;
    type Output = R;

    const KIND: ReductionKind = ReductionKind::SumSq;

    #[inline]
    fn initial(&self) -> R {
        R::zero()
    }

    #[inline]
    fn update(&self, acc: R, item: T) -> R {
        let x = R::from(item);
        acc + x * x
    }

    #[inline]
    fn combine(&self, lhs: R, rhs: R) -> R {
        lhs + rhs
    }

    #[inline]
    fn value(&self, acc: R, _len: usize) -> R {
        acc
    }
}

impl<T> ReductionFunctor for SumMagsqValue<T>
where
    T: Magnitude + Send + Sync + 'static,
{
    type Item = T;
    type Accum = T::Real;
    type Output = T::Real;

    const KIND: ReductionKind = ReductionKind::SumMagsq;

    #[inline]
    fn initial(&self) -> T::Real {
        T::Real::zero()
    }

    #[inline]
    fn update(&self, acc: T::Real, item: T) -> T::Real {
        acc + item.magsq()
    }

    #[inline]
    fn combine(&self, lhs: T::Real, rhs: T::Real) -> T::Real {
        lhs + rhs
    }

    #[inline]
    fn value(&self, acc: T::Real, _len: usize) -> T::Real {
        acc
    }
}

impl<T> ReductionFunctor for MeanMagsqValue<T>
where
    T: Magnitude + Send + Sync + 'static,
    T::Real: FromPrimitive,
{
    type Item = T;
    type Accum = T::Real;
    type Output = T::Real;

    const KIND: ReductionKind = ReductionKind::MeanMagsq;

    #[inline]
    fn initial(&self) -> T::Real {
        T::Real::zero()
    }

    #[inline]
    fn update(&self, acc: T::Real, item: T) -> T::Real {
        acc + item.magsq()
    }

    #[inline]
    fn combine(&self, lhs: T::Real, rhs: T::Real) -> T::Real {
        lhs + rhs
    }

    fn value(&self, acc: T::Real, len: usize) -> T::Real {
        if len == 0 {
            return acc;
        }
        T::Real::from_usize(len).map_or(acc, |n| acc / n)
    }
}

/// Number of `true` elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountTrue;

impl ReductionFunctor for CountTrue {
    type Item = bool;
    type Accum = usize;
    type Output = usize;

    const KIND: ReductionKind = ReductionKind::CountTrue;

    #[inline]
    fn initial(&self) -> usize {
        0
    }

    #[inline]
    fn update(&self, acc: usize, item: bool) -> usize {
        acc + usize::from(item)
    }

    #[inline]
    fn combine(&self, lhs: usize, rhs: usize) -> usize {
        lhs + rhs
    }

    #[inline]
    fn value(&self, acc: usize, _len: usize) -> usize {
        acc
    }
}

impl<T> ReductionFunctor for AllTrue<T>
where
    T: PrimInt + Send + Sync + 'static,
{
    type Item = T;
    type Accum = T;
    type Output = T;

    const KIND: ReductionKind = ReductionKind::AllTrue;

    #[inline]
    fn initial(&self) -> T {
        !T::zero()
    }

    #[inline]
    fn update(&self, acc: T, item: T) -> T {
        acc & item
    }

    #[inline]
    fn combine(&self, lhs: T, rhs: T) -> T {
        lhs & rhs
    }

    #[inline]
    fn value(&self, acc: T, _len: usize) -> T {
        acc
    }

    #[inline]
    fn done(&self, acc: &T) -> bool {
        acc.is_zero()
    }
}

impl<T> ReductionFunctor for AnyTrue<T>
where
    T: PrimInt + Send + Sync + 'static,
{
    type Item = T;
    type Accum = T;
    type Output = T;

    const KIND: ReductionKind = ReductionKind::AnyTrue;

    #[inline]
    fn initial(&self) -> T {
        T::zero()
    }

    #[inline]
    fn update(&self, acc: T, item: T) -> T {
        acc | item
    }

    #[inline]
    fn combine(&self, lhs: T, rhs: T) -> T {
        lhs | rhs
    }

    #[inline]
    fn value(&self, acc: T, _len: usize) -> T {
        acc
    }

    #[inline]
    fn done(&self, acc: &T) -> bool {
        *acc == !T::zero()
    }
}

/// Logical AND with short-circuit on the first `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllTrueBool;

impl ReductionFunctor for AllTrueBool {
    type Item = bool;
    type Accum = bool;
    type Output = bool;

    const KIND: ReductionKind = ReductionKind::AllTrue;

    #[inline]
    fn initial(&self) -> bool {
        true
    }

    #[inline]
    fn update(&self, acc: bool, item: bool) -> bool {
        acc && item
    }

    #[inline]
    fn combine(&self, lhs: bool, rhs: bool) -> bool {
        lhs && rhs
    }

    #[inline]
    fn value(&self, acc: bool, _len: usize) -> bool {
        acc
    }

    #[inline]
    fn done(&self, acc: &bool) -> bool {
        !*acc
    }
}

/// Logical OR with short-circuit on the first `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyTrueBool;

impl ReductionFunctor for AnyTrueBool {
    type Item = bool;
    type Accum = bool;
    type Output = bool;

    const KIND: ReductionKind = ReductionKind::AnyTrue;

    #[inline]
    fn initial(&self) -> bool {
        false
    }

    #[inline]
    fn update(&self, acc: bool, item: bool) -> bool {
        acc || item
    }

    #[inline]
    fn combine(&self, lhs: bool, rhs: bool) -> bool {
        lhs || rhs
    }

    #[inline]
    fn value(&self, acc: bool, _len: usize) -> bool {
        acc
    }

    #[inline]
    fn done(&self, acc: &bool) -> bool {
        *acc
    }
}

macro_rules! value_extremum {
    ($(#[$doc:meta])* $name:ident, $cmp:tt) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<T> {
            held: T,
        }

        impl<T> ExtremumFunctor for $name<T>
        where
            T: PartialOrd + Copy + Send + Sync + 'static,
        {
            type Item = T;
            type Output = T;

            #[inline]
            fn seed(first: T) -> Self {
                Self { held: first }
            }

            #[inline]
            fn next_value(&mut self, item: T) -> bool {
                if item $cmp self.held {
                    self.held = item;
                    true
                } else {
                    false
                }
            }

            #[inline]
            fn value(&self) -> T {
                self.held
            }

            #[inline]
            fn absorb(&mut self, other: &Self) -> bool {
                self.next_value(other.held)
            }

            #[inline]
            fn comparable(item: &T) -> bool {
                item.partial_cmp(item).is_some()
            }
        }
    };
}

macro_rules! magnitude_extremum {
    ($(#[$doc:meta])* $name:ident, $key:ident, $cmp:tt) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<T: Magnitude> {
            held: T::Real,
        }

        impl<T> ExtremumFunctor for $name<T>
        where
            T: Magnitude + Send + Sync + 'static,
        {
            type Item = T;
            type Output = T::Real;

            #[inline]
            fn seed(first: T) -> Self {
                Self { held: first.$key() }
            }

            #[inline]
            fn next_value(&mut self, item: T) -> bool {
                let key = item.$key();
                if key $cmp self.held {
                    self.held = key;
                    true
                } else {
                    false
                }
            }

            #[inline]
            fn value(&self) -> T::Real {
                self.held
            }

            #[inline]
            fn absorb(&mut self, other: &Self) -> bool {
                if other.held $cmp self.held {
                    self.held = other.held;
                    true
                } else {
                    false
                }
            }

            #[inline]
            fn comparable(item: &T) -> bool {
                let key = item.$key();
                key.partial_cmp(&key).is_some()
            }
        }
    };
}

value_extremum! {
    /// Largest element.
    MaxValue, >
}

value_extremum! {
    /// Smallest element.
    MinValue, <
}

magnitude_extremum! {
    /// Largest magnitude.
    MaxMagValue, mag, >
}

magnitude_extremum! {
    /// Smallest magnitude.
    MinMagValue, mag, <
}

magnitude_extremum! {
    /// Largest squared magnitude.
    MaxMagsqValue, magsq, >
}

magnitude_extremum! {
    /// Smallest squared magnitude.
    MinMagsqValue, magsq, <
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reductions::{fold, fold_extremum};
    use num_complex::Complex;

    fn improvements<E: ExtremumFunctor>(data: &[E::Item]) -> Vec<bool> {
        let mut functor = E::seed(data[0]);
        data[1..].iter().map(|&x| functor.next_value(x)).collect()
    }

    #[test]
    fn five_element_scenario() {
        let data = [2.0f64, 1.0, 4.0, 1.0, 4.0];
        assert_eq!(fold(&SumValue::<f64>::new(), data), 12.0);
        assert_eq!(fold(&MeanValue::<f64>::new(), data), 2.4);

        assert_eq!(fold_extremum::<MaxValue<f64>, _>(data), Some((4.0, 2)));
        assert_eq!(improvements::<MaxValue<f64>>(&data), [false, true, false, false]);

        assert_eq!(fold_extremum::<MinValue<f64>, _>(data), Some((1.0, 1)));
        assert_eq!(improvements::<MinValue<f64>>(&data), [true, false, false, false]);
    }

    #[test]
    fn wide_accumulators() {
        let data = [i32::MAX, i32::MAX];
        assert_eq!(fold(&SumValue::<i32, i64>::new(), data), 2 * i64::from(i32::MAX));
        assert_eq!(fold(&SumSqValue::<f32, f64>::new(), [3.0f32, 4.0]), 25.0);
        assert_eq!(fold(&MeanValue::<i32, i64>::new(), [1, 2, 3, 6]), 3);
    }

    #[test]
    fn magnitudes_of_complex_elements() {
        let data = [
            Complex::new(3.0f64, 4.0),
            Complex::new(0.0, -1.0),
            Complex::new(-6.0, 8.0),
        ];
        assert_eq!(fold(&SumMagsqValue::<Complex<f64>>::new(), data), 126.0);
        assert_eq!(fold(&MeanMagsqValue::<Complex<f64>>::new(), data), 42.0);
        assert_eq!(fold_extremum::<MaxMagValue<Complex<f64>>, _>(data), Some((10.0, 2)));
        assert_eq!(fold_extremum::<MinMagValue<Complex<f64>>, _>(data), Some((1.0, 1)));
        assert_eq!(fold_extremum::<MaxMagsqValue<Complex<f64>>, _>(data), Some((100.0, 2)));
        assert_eq!(fold_extremum::<MinMagsqValue<Complex<f64>>, _>(data), Some((1.0, 1)));
    }

    #[test]
    fn bitwise_and_logical_agree_on_zero_one_input() {
        let bits = [1u8, 1, 0, 1];
        let bools = bits.map(|b| b != 0);
        assert_eq!(fold(&AllTrue::<u8>::new(), bits) != 0, fold(&AllTrueBool, bools));
        assert_eq!(fold(&AnyTrue::<u8>::new(), bits) != 0, fold(&AnyTrueBool, bools));
        assert_eq!(fold(&CountTrue, bools), 3);
    }

    #[test]
    fn empty_means_are_zero() {
        assert_eq!(fold(&MeanValue::<f64>::new(), []), 0.0);
        assert_eq!(fold(&MeanMagsqValue::<i32>::new(), []), 0);
    }
}
