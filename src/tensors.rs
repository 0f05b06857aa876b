//! Dense row-major matrices.
//!
//! [`Matrix`] is the argument and result type of the matrix-valued operations
//! (`prod`, `trans`). Vector-valued operations take plain slices.
//!
//! ## Design Highlights
//! - Row-major, contiguous storage; element `(i, j)` lives at `data[i * cols + j]`
//! - Extents are checked on construction and never change afterwards
//! - Output matrices are allocated with [`Matrix::try_zeros`] so that exhaustion
//!   surfaces as [`Error::Allocation`] instead of aborting
//! - The `matrix!` macro builds small matrices from nested literals
//!
//! ## Example
//!
//! ```rust
//! use numkern::matrix;
//! let m = matrix![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
//! assert_eq!((m.rows(), m.cols()), (2, 3));
//! assert_eq!(m[(1, 2)], 6.0);
//! ```

use crate::error::{Error, Result};
use core::ops::{Index, IndexMut};
use num_traits::Zero;

/// A rows × cols matrix with flat row-major data.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Matrix<T> {
    /// Creates a matrix from its extents and flat row-major data.
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Self {
        assert_eq!(
            rows * cols,
            data.len(),
            "extents {rows}x{cols} are incompatible with {} data elements",
            data.len()
        );
        Self { rows, cols, data }
    }

    /// Like [`Matrix::new`], reporting a bad element count as an error.
    pub fn try_new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::Allocation(format!("{rows}x{cols} overflows usize")))?;
        if data.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Number of rows.
    #[inline]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Total element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when either extent is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major element storage.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major element storage.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Row `i` as a slice.
    ///
    /// # Panics
    /// Panics if `i >= self.rows()`.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Consumes the matrix and returns its storage.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Clone + Zero> Matrix<T> {
    /// A zero-filled matrix, or [`Error::Allocation`] if the storage cannot be
    /// reserved.
    pub fn try_zeros(rows: usize, cols: usize) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::Allocation(format!("{rows}x{cols} overflows usize")))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, T::zero());
        Ok(Self { rows, cols, data })
    }
}

impl<T: Clone> Matrix<T> {
    /// Builds a matrix from equally long rows.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::new();
        data.try_reserve_exact(rows.len() * cols)?;
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(Error::DimensionMismatch {
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(j < self.cols, "column {j} out of range for {} columns", self.cols);
        &self.data[i * self.cols + j]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(j < self.cols, "column {j} out of range for {} columns", self.cols);
        &mut self.data[i * self.cols + j]
    }
}

/// Defines a matrix from nested literal rows.
///
/// # Panics
/// Panics if the rows are ragged.
///
/// # Example
/// ```
/// use numkern::matrix;
/// let m = matrix![[1, 2], [3, 4]];
/// assert_eq!(m.as_slice(), &[1, 2, 3, 4]);
/// ```
#[macro_export]
macro_rules! matrix {
    ($( [ $( $x:expr ),* $(,)? ] ),+ $(,)?) => {{
        let rows = [ $( vec![ $( $x ),* ] ),+ ];
        let cols = rows[0].len();
        assert!(
            rows.iter().all(|r| r.len() == cols),
            "ragged matrix literal (rows have mismatched lengths)"
        );
        let n = rows.len();
        let data: Vec<_> = rows.into_iter().flatten().collect();
        $crate::tensors::Matrix::new(n, cols, data)
    }};
}
