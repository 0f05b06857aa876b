//! Toeplitz systems.
//!
//! [`toepsol`] solves `T x = b` where `T` is a real symmetric or complex
//! Hermitian positive definite Toeplitz matrix given by its first row, using the
//! Levinson recursion in `O(n²)` operations. The inner products of the recursion
//! are dispatched as [`Dot`] operations, so they run on whatever backend the
//! registry prefers for the element type.

use crate::error::{Error, Result};
use crate::ops::{Dot, DotArgs, Registry, registry};
use crate::scalar::Scalar;
use num_traits::{Float, One, Zero};
use tracing::debug;

fn workspace<T: Scalar>(len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, T::zero());
    Ok(v)
}

/// Solves the Toeplitz system with first row `t` and right-hand side `b` on the
/// standard registry.
///
/// # Errors
/// - [`Error::DimensionMismatch`] if `t` and `b` differ in length
/// - [`Error::Computation`] if the matrix is not positive definite
/// - [`Error::Allocation`] if the workspace cannot be reserved
///
/// # Example
/// ```rust
/// use numkern::solver::toepsol;
///
/// let x = toepsol(&[2.0, 1.0], &[3.0, 3.0])?;
/// assert_eq!(x, [1.0, 1.0]);
/// # Ok::<(), numkern::Error>(())
/// ```
pub fn toepsol<T: Scalar>(t: &[T], b: &[T]) -> Result<Vec<T>> {
    toepsol_with(registry(), t, b)
}

/// [`toepsol`] with the inner products dispatched through `registry`.
///
/// # Errors
/// As for [`toepsol`].
pub fn toepsol_with<T: Scalar>(registry: &Registry, t: &[T], b: &[T]) -> Result<Vec<T>> {
    let n = t.len();
    if b.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: b.len(),
        });
    }
    let (Some(&t0), Some(&b0)) = (t.first(), b.first()) else {
        return Ok(Vec::new());
    };

    let not_full_rank = || Error::Computation("not full rank".into());
    let scale = t0.re();
    if scale == T::Real::zero() || !scale.is_finite() {
        return Err(not_full_rank());
    }

    let mut x = workspace::<T>(n)?;
    x[0] = b0 / T::from_real(scale);
    if n == 1 {
        return Ok(x);
    }

    // r = t[1..], conjugated once up front
    let mut r_conj = workspace::<T>(n - 1)?;
    for (c, &r) in r_conj.iter_mut().zip(&t[1..]) {
        *c = r.conj();
    }
    let mut y = workspace::<T>(n)?;
    let mut rev = workspace::<T>(n)?;
    let mut tmp = workspace::<T>(n)?;

    let mut beta = T::Real::one();
    let mut alpha = (-t[1] / T::from_real(scale)).conj();
    y[0] = alpha;

    for k in 1..n {
        beta = beta * (T::Real::one() - alpha.magsq());
        if !(beta > T::Real::zero()) {
            debug!(k, n, "prediction error collapsed");
            return Err(not_full_rank());
        }
        let denom = T::from_real(scale * beta);

        fill_reversed(&mut rev[..k], &x[..k]);
        let s = registry.dispatch::<Dot<T>>(DotArgs {
            lhs: &r_conj[..k],
            rhs: &rev[..k],
        })?;
        let mu = (b[k] - s) / denom;
        for (xi, &yi) in x[..k].iter_mut().zip(y[..k].iter().rev()) {
            *xi += mu * yi.conj();
        }
        x[k] = mu;

        if k < n - 1 {
            fill_reversed(&mut rev[..k], &y[..k]);
            let s = registry.dispatch::<Dot<T>>(DotArgs {
                lhs: &r_conj[..k],
                rhs: &rev[..k],
            })?;
            alpha = -(s + r_conj[k]) / denom;
            for ((ti, &yi), &yr) in tmp[..k].iter_mut().zip(&y[..k]).zip(&rev[..k]) {
                *ti = yi + alpha * yr.conj();
            }
            y[..k].copy_from_slice(&tmp[..k]);
            y[k] = alpha;
        }
    }

    Ok(x)
}

fn fill_reversed<T: Copy>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src.iter().rev()) {
        *d = s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::approx_eq;
    use num_complex::Complex;

    #[test]
    fn two_by_two() {
        assert_eq!(toepsol(&[2.0, 1.0], &[3.0, 3.0]).unwrap(), [1.0, 1.0]);
    }

    #[test]
    fn three_by_three() {
        let x = toepsol(&[4.0, 1.0, 0.5], &[7.5, 12.0, 14.5]).unwrap();
        assert!(approx_eq(&x, &vec![1.0, 2.0, 3.0]), "{x:?}");
    }

    #[test]
    fn hermitian() {
        let t = [Complex::new(3.0, 0.0), Complex::new(1.0, 1.0)];
        let b = [Complex::new(2.0, 1.0), Complex::new(1.0, 2.0)];
        let x = toepsol(&t, &b).unwrap();
        assert!(approx_eq(&x, &vec![Complex::new(1.0, 0.0), Complex::new(0.0, 1.0)]), "{x:?}");
    }

    #[test]
    fn singular_and_malformed() {
        assert!(toepsol(&[1.0, 1.0], &[1.0, 1.0]).unwrap_err().is_computation());
        assert!(toepsol(&[0.0f32], &[1.0]).unwrap_err().is_computation());
        assert!(matches!(
            toepsol(&[1.0, 0.0], &[1.0]),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert!(toepsol::<f64>(&[], &[]).unwrap().is_empty());
        assert_eq!(toepsol(&[4.0], &[2.0]).unwrap(), [0.5]);
    }

    #[test]
    fn non_finite_diagonal() {
        for t0 in [f64::INFINITY, f64::NAN] {
            assert!(toepsol(&[t0, 0.5], &[1.0, 1.0]).unwrap_err().is_computation());
        }
        let t = [Complex::new(f32::NEG_INFINITY, 0.0)];
        assert!(toepsol(&t, &[Complex::new(1.0, 0.0)]).unwrap_err().is_computation());
    }
}
