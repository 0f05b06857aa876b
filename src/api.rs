//! Numeric entry points over the standard [`registry`].
//!
//! Every function here names one operation signature and lets the dispatcher
//! pick the backend. Use [`Registry::dispatch`](crate::Registry::dispatch) on a
//! registry of your own to control the bindings.
//!
//! ```rust
//! use numkern::api::{maxval, meanval, sumval};
//!
//! let data = [2.0, 1.0, 4.0, 1.0, 4.0];
//! assert_eq!(sumval(&data)?, 12.0);
//! assert_eq!(meanval(&data)?, 2.4);
//! assert_eq!(maxval(&data)?, (4.0, 2));
//! # Ok::<(), numkern::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::ops::{
    BlockCopy, CopyArgs, Dot, DotArgs, Prod, ProdArgs, Reduce, ReduceArgs, ReduceIdx, Transpose,
    registry,
};
use crate::reductions::functors::{
    AllTrue, AllTrueBool, AnyTrue, AnyTrueBool, CountTrue, MaxMagValue, MaxMagsqValue, MaxValue,
    MeanMagsqValue, MeanValue, MinMagValue, MinMagsqValue, MinValue, SumMagsqValue, SumSqValue,
    SumValue,
};
use crate::reductions::{ExtremumFunctor, ReductionFunctor};
use crate::scalar::{Magnitude, Scalar};
use crate::tensors::Matrix;

/// Reduces `data` with `functor`.
pub fn reduce<R: ReductionFunctor>(functor: R, data: &[R::Item]) -> Result<R::Output> {
    registry().dispatch::<Reduce<R>>(ReduceArgs { functor, data })
}

/// Extremum of `data` under `E` with the index where it first occurs, or `None`
/// for an empty slice.
pub fn reduce_idx<E: ExtremumFunctor>(data: &[E::Item]) -> Result<Option<(E::Output, usize)>> {
    registry().dispatch::<ReduceIdx<E>>(data)
}

fn nonempty<E: ExtremumFunctor>(data: &[E::Item]) -> Result<(E::Output, usize)> {
    reduce_idx::<E>(data)?.ok_or_else(|| Error::Computation("extremum of an empty view".into()))
}

/// Σ x.
pub fn sumval<T>(data: &[T]) -> Result<T>
where
    SumValue<T>: ReductionFunctor<Item = T, Output = T>,
{
    reduce(SumValue::<T>::new(), data)
}

/// Σ x / n.
///
/// # Errors
/// [`Error::Computation`] for an empty slice.
pub fn meanval<T>(data: &[T]) -> Result<T>
where
    MeanValue<T>: ReductionFunctor<Item = T, Output = T>,
{
    if data.is_empty() {
        return Err(Error::Computation("mean of an empty view".into()));
    }
    reduce(MeanValue::<T>::new(), data)
}

/// Σ x².
pub fn sumsqval<T>(data: &[T]) -> Result<T>
where
    SumSqValue<T>: ReductionFunctor<Item = T, Output = T>,
{
    reduce(SumSqValue::<T>::new(), data)
}

/// Σ |x|².
pub fn summagsqval<T>(data: &[T]) -> Result<<SumMagsqValue<T> as ReductionFunctor>::Output>
where
    SumMagsqValue<T>: ReductionFunctor<Item = T>,
{
    reduce(SumMagsqValue::<T>::new(), data)
}

/// Σ |x|² / n.
///
/// # Errors
/// [`Error::Computation`] for an empty slice.
pub fn meanmagsqval<T>(data: &[T]) -> Result<<MeanMagsqValue<T> as ReductionFunctor>::Output>
where
    MeanMagsqValue<T>: ReductionFunctor<Item = T>,
{
    if data.is_empty() {
        return Err(Error::Computation("mean of an empty view".into()));
    }
    reduce(MeanMagsqValue::<T>::new(), data)
}

/// Bitwise AND of all elements; all bits set for an empty slice.
pub fn alltrue<T>(data: &[T]) -> Result<T>
where
    AllTrue<T>: ReductionFunctor<Item = T, Output = T>,
{
    reduce(AllTrue::<T>::new(), data)
}

/// Bitwise OR of all elements; zero for an empty slice.
pub fn anytrue<T>(data: &[T]) -> Result<T>
where
    AnyTrue<T>: ReductionFunctor<Item = T, Output = T>,
{
    reduce(AnyTrue::<T>::new(), data)
}

/// Whether every element is `true`.
pub fn all(data: &[bool]) -> Result<bool> {
    reduce(AllTrueBool, data)
}

/// Whether any element is `true`.
pub fn any(data: &[bool]) -> Result<bool> {
    reduce(AnyTrueBool, data)
}

/// Number of `true` elements.
pub fn counttrue(data: &[bool]) -> Result<usize> {
    reduce(CountTrue, data)
}

macro_rules! extremum_entry {
    ($(#[$doc:meta])* $fn_name:ident => $functor:ident $(, $bound:path)?) => {
        $(#[$doc])*
        ///
        /// # Errors
        /// [`Error::Computation`] for an empty slice.
        pub fn $fn_name<T>(data: &[T]) -> Result<(<$functor<T> as ExtremumFunctor>::Output, usize)>
        where
            $(T: $bound,)?
            $functor<T>: ExtremumFunctor<Item = T>,
        {
            nonempty::<$functor<T>>(data)
        }
    };
}

extremum_entry! {
    /// Largest element and the index where it first occurs.
    maxval => MaxValue
}
extremum_entry! {
    /// Smallest element and the index where it first occurs.
    minval => MinValue
}
extremum_entry! {
    /// Largest magnitude and the index where it first occurs.
    maxmgval => MaxMagValue, Magnitude
}
extremum_entry! {
    /// Smallest magnitude and the index where it first occurs.
    minmgval => MinMagValue, Magnitude
}
extremum_entry! {
    /// Largest squared magnitude and the index where it first occurs.
    maxmgsqval => MaxMagsqValue, Magnitude
}
extremum_entry! {
    /// Smallest squared magnitude and the index where it first occurs.
    minmgsqval => MinMagsqValue, Magnitude
}

/// `Σ lhs[i] * rhs[i]`.
///
/// # Errors
/// [`Error::DimensionMismatch`] when the lengths differ.
pub fn dot<T: Scalar>(lhs: &[T], rhs: &[T]) -> Result<T> {
    registry().dispatch::<Dot<T>>(DotArgs { lhs, rhs })
}

/// Matrix product `lhs × rhs`.
///
/// # Errors
/// [`Error::DimensionMismatch`] when `lhs.cols() != rhs.rows()`.
pub fn prod<T: Scalar>(lhs: &Matrix<T>, rhs: &Matrix<T>) -> Result<Matrix<T>> {
    registry().dispatch::<Prod<T>>(ProdArgs { lhs, rhs })
}

/// Transpose of `src`.
pub fn trans<T: Copy + Send + Sync + 'static>(src: &Matrix<T>) -> Result<Matrix<T>> {
    registry().dispatch::<Transpose<T>>(src)
}

/// Copies `src` into `dst`.
///
/// # Errors
/// [`Error::DimensionMismatch`] when the lengths differ.
pub fn copy<T: Copy + Send + Sync + 'static>(src: &[T], dst: &mut [T]) -> Result<()> {
    registry().dispatch::<BlockCopy<T>>(CopyArgs { src, dst })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;
    use num_complex::Complex;

    #[test]
    fn empty_views() {
        let none: [f64; 0] = [];
        assert_eq!(sumval(&none).unwrap(), 0.0);
        assert!(meanval(&none).unwrap_err().is_computation());
        assert!(maxval(&none).unwrap_err().is_computation());
        assert_eq!(alltrue::<u8>(&[]).unwrap(), u8::MAX);
        assert_eq!(anytrue::<u8>(&[]).unwrap(), 0);
        assert!(all(&[]).unwrap());
        assert!(!any(&[]).unwrap());
    }

    #[test]
    fn logical_reductions() {
        let flags = [true, false, true, true];
        assert_eq!(counttrue(&flags).unwrap(), 3);
        assert!(!all(&flags).unwrap());
        assert!(any(&flags).unwrap());
        assert_eq!(alltrue(&[0b1110u8, 0b0111]).unwrap(), 0b0110);
        assert_eq!(anytrue(&[0b1000u8, 0b0001]).unwrap(), 0b1001);
    }

    #[test]
    fn magnitudes() {
        let z = [Complex::new(3.0, 4.0), Complex::new(0.0, 1.0)];
        assert_eq!(summagsqval(&z).unwrap(), 26.0);
        assert_eq!(meanmagsqval(&z).unwrap(), 13.0);
        assert_eq!(maxmgval(&z).unwrap(), (5.0, 0));
        assert_eq!(minmgsqval(&z).unwrap(), (1.0, 1));
        assert_eq!(minmgval(&[-3i32, 2, -2]).unwrap(), (2, 1));
        assert_eq!(maxmgsqval(&[-3i32, 2, 3]).unwrap(), (9, 0));
    }

    #[test]
    fn linear_algebra() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
        assert!(dot(&[1.0f32], &[]).unwrap_err().is_computation());

        let a = matrix![[1.0, 2.0, 3.0]];
        let b = matrix![[1.0], [0.0], [-1.0]];
        assert_eq!(prod(&a, &b).unwrap(), matrix![[-2.0]]);
        assert_eq!(trans(&a).unwrap(), matrix![[1.0], [2.0], [3.0]]);

        let mut dst = [0; 3];
        copy(&[7, 8, 9], &mut dst).unwrap();
        assert_eq!(dst, [7, 8, 9]);
    }

    #[test]
    fn sum_of_squares() {
        assert_eq!(sumsqval(&[1.0, -2.0, 3.0]).unwrap(), 14.0);
        assert_eq!(minval(&[5, 3, 3]).unwrap(), (3, 1));
    }
}
