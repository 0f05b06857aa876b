//! # Operation Dispatch Layer
//!
//! This module names the abstract operations, describes how they are called, and
//! routes each call to exactly one backend.
//!
//! ## Vocabulary
//!
//! - An [`OpTag`] identifies a kind of operation (`dot`, `reduce`, `fft`, ...).
//! - An [`Operation`] is a *signature*: an op tag plus the concrete argument and
//!   result types, e.g. [`Reduce<SumValue<f32>>`](Reduce) or [`Dot<f64>`](Dot).
//!   Every signature carries its own generic implementation, so the `generic`
//!   backend is available for all of them.
//! - An [`Evaluator`] is one backend's implementation of one signature: a cheap,
//!   side-effect free applicability probe plus the entry point that does the work.
//!
//! ## Submodules
//!
//! - [`priority`]: per-operation backend preference lists
//! - [`dispatch`]: binding registry and the dispatcher itself
//! - [`cpu`]: built-in CPU evaluators (`parallel`, `simd`, `transpose`, `copy`)
//! - `wgpu` (feature `wgpu`): GPU reductions for `f32`
//!
//! ## Extending
//!
//! To add a backend for an existing signature, implement [`Evaluator`] for it and
//! register it with [`RegistryBuilder::bind`]. To add an operation, define a new
//! signature type implementing [`Operation`]. Neither touches the dispatcher.
//!
//! ## Example
//!
//! ```rust
//! use numkern::ops::{DotArgs, Dot};
//! use numkern::{registry, BackendTag};
//!
//! let lhs = [1.0, 2.0, 3.0];
//! let rhs = [4.0, 5.0, 6.0];
//! let args = DotArgs { lhs: &lhs, rhs: &rhs };
//! assert_eq!(registry().select::<Dot<f64>>(&args), Some(BackendTag::Generic));
//! assert_eq!(registry().dispatch::<Dot<f64>>(args).unwrap(), 32.0);
//! ```

use crate::backend::BackendTag;
use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::reductions::{ExtremumFunctor, ReductionFunctor, fold, fold_extremum};
use crate::scalar::Scalar;
use crate::tensors::Matrix;
use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

pub mod cpu;
pub mod dispatch;
pub mod priority;
#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use dispatch::{Registry, RegistryBuilder, registry};
pub use priority::PriorityList;

/// Identity of one kind of numeric operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpTag {
    /// Value reduction driven by a [`ReductionFunctor`].
    Reduce,
    /// Extremum reduction returning the value and its index.
    ReduceIdx,
    /// Single FFT.
    Fft,
    /// Multiple FFTs over the rows or columns of a matrix.
    Fftm,
    /// FIR filter.
    Fir,
    /// Swap of the two halves of a spectrum.
    Freqswap,
    /// Histogram.
    Hist,
    /// Vector dot product.
    Dot,
    /// Vector outer product.
    Outer,
    /// Matrix product.
    Prod,
    /// Matrix product with the conjugate of the right operand.
    Prodj,
    /// Generalized matrix product `C = αAB + βC`.
    Gemp,
    /// LU decomposition.
    Lud,
    /// QR decomposition.
    Qrd,
    /// Cholesky decomposition.
    Chold,
    /// Singular value decomposition.
    Svd,
    /// Matrix transpose.
    Transpose,
    /// Element copy.
    Copy,
}

impl OpTag {
    /// Every tag, in declaration order.
    pub const ALL: [Self; 18] = [
        Self::Reduce,
        Self::ReduceIdx,
        Self::Fft,
        Self::Fftm,
        Self::Fir,
        Self::Freqswap,
        Self::Hist,
        Self::Dot,
        Self::Outer,
        Self::Prod,
        Self::Prodj,
        Self::Gemp,
        Self::Lud,
        Self::Qrd,
        Self::Chold,
        Self::Svd,
        Self::Transpose,
        Self::Copy,
    ];

    /// Short lowercase name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reduce => "reduce",
            Self::ReduceIdx => "reduce_idx",
            Self::Fft => "fft",
            Self::Fftm => "fftm",
            Self::Fir => "fir",
            Self::Freqswap => "freqswap",
            Self::Hist => "hist",
            Self::Dot => "dot",
            Self::Outer => "outer",
            Self::Prod => "prod",
            Self::Prodj => "prodj",
            Self::Gemp => "gemp",
            Self::Lud => "lud",
            Self::Qrd => "qrd",
            Self::Chold => "chold",
            Self::Svd => "svd",
            Self::Transpose => "transpose",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for OpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation signature: tag, argument types and result type.
///
/// Signature types are never instantiated; they only exist to be named in
/// `dispatch::<Op>(..)`.
pub trait Operation: Sized + 'static {
    /// The operation this signature belongs to.
    const TAG: OpTag;

    /// Arguments, passed by value to the chosen evaluator.
    type Args<'a>;

    /// Result of a successful call.
    type Output;

    /// The `generic` backend: plain loops, valid for every argument value.
    fn generic(args: Self::Args<'_>) -> Result<Self::Output>;

    /// Evaluator this crate ships for `backend`, if any.
    ///
    /// Consulted only by registries built [`with_builtins`](RegistryBuilder::with_builtins).
    /// Never called for [`BackendTag::Generic`].
    fn builtin(_backend: BackendTag, _config: &DispatchConfig) -> Option<Arc<dyn Evaluator<Self>>> {
        None
    }
}

/// One backend's implementation of one operation signature.
///
/// The dispatcher calls [`execute`](Evaluator::execute) only after
/// [`is_available`](Evaluator::is_available) returned `true` for the same
/// arguments during the same call, so `execute` may rely on whatever the probe
/// checked.
pub trait Evaluator<Op: Operation>: Send + Sync {
    /// Whether this backend can run `args`. Must be cheap and must not fail,
    /// allocate on a device, or have other side effects.
    fn is_available(&self, args: &Op::Args<'_>) -> bool;

    /// Runs the operation. Errors are reported to the caller unchanged; the
    /// dispatcher does not fall back to another backend.
    fn execute(&self, args: Op::Args<'_>) -> Result<Op::Output>;
}

/// Value reduction of a slice with functor `R`.
pub struct Reduce<R>(PhantomData<fn() -> R>);

/// Arguments of [`Reduce`].
#[derive(Clone, Copy)]
pub struct ReduceArgs<'a, R: ReductionFunctor> {
    /// Accumulation policy.
    pub functor: R,
    /// Elements to reduce.
    pub data: &'a [R::Item],
}

impl<R: ReductionFunctor> Operation for Reduce<R> {
    const TAG: OpTag = OpTag::Reduce;
    type Args<'a> = ReduceArgs<'a, R>;
    type Output = R::Output;

    fn generic(args: ReduceArgs<'_, R>) -> Result<R::Output> {
        Ok(fold(&args.functor, args.data.iter().copied()))
    }

    fn builtin(backend: BackendTag, config: &DispatchConfig) -> Option<Arc<dyn Evaluator<Self>>> {
        match backend {
            BackendTag::Parallel => Some(Arc::new(cpu::ParallelReduce::new(config))),
            #[cfg(feature = "simd")]
            BackendTag::Simd => Some(Arc::new(cpu::LaneReduce::new(config))),
            _ => None,
        }
    }
}

/// Extremum of a slice with functor `E`, reporting the value and its index.
pub struct ReduceIdx<E>(PhantomData<fn() -> E>);

impl<E: ExtremumFunctor> Operation for ReduceIdx<E> {
    const TAG: OpTag = OpTag::ReduceIdx;
    type Args<'a> = &'a [E::Item];
    type Output = Option<(E::Output, usize)>;

    fn generic(data: &[E::Item]) -> Result<Self::Output> {
        Ok(fold_extremum::<E, _>(data.iter().copied()))
    }

    fn builtin(backend: BackendTag, config: &DispatchConfig) -> Option<Arc<dyn Evaluator<Self>>> {
        match backend {
            BackendTag::Parallel => Some(Arc::new(cpu::ParallelReduceIdx::new(config))),
            _ => None,
        }
    }
}

/// Dot product `Σ lhs[i] * rhs[i]` (no conjugation).
pub struct Dot<T>(PhantomData<fn() -> T>);

/// Arguments of [`Dot`].
#[derive(Debug, Clone, Copy)]
pub struct DotArgs<'a, T> {
    /// Left operand.
    pub lhs: &'a [T],
    /// Right operand, same length as `lhs`.
    pub rhs: &'a [T],
}

impl<T> DotArgs<'_, T> {
    /// Whether both operands have the same length.
    #[inline]
    pub fn is_conformant(&self) -> bool {
        self.lhs.len() == self.rhs.len()
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_conformant() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.lhs.len(),
                found: self.rhs.len(),
            })
        }
    }
}

impl<T: Scalar> Operation for Dot<T> {
    const TAG: OpTag = OpTag::Dot;
    type Args<'a> = DotArgs<'a, T>;
    type Output = T;

    fn generic(args: DotArgs<'_, T>) -> Result<T> {
        args.check()?;
        Ok(args
            .lhs
            .iter()
            .zip(args.rhs)
            .fold(T::zero(), |acc, (&a, &b)| acc + a * b))
    }

    fn builtin(backend: BackendTag, config: &DispatchConfig) -> Option<Arc<dyn Evaluator<Self>>> {
        match backend {
            BackendTag::Parallel => Some(Arc::new(cpu::ParallelDot::new(config))),
            #[cfg(feature = "simd")]
            BackendTag::Simd => Some(Arc::new(cpu::LaneDot::new(config))),
            _ => None,
        }
    }
}

/// Matrix product `lhs × rhs`.
pub struct Prod<T>(PhantomData<fn() -> T>);

/// Arguments of [`Prod`].
#[derive(Debug, Clone, Copy)]
pub struct ProdArgs<'a, T> {
    /// `m × k` left operand.
    pub lhs: &'a Matrix<T>,
    /// `k × n` right operand.
    pub rhs: &'a Matrix<T>,
}

impl<T> ProdArgs<'_, T> {
    /// Whether the inner extents agree.
    #[inline]
    pub fn is_conformant(&self) -> bool {
        self.lhs.cols() == self.rhs.rows()
    }

    /// Multiply-adds the product performs.
    #[inline]
    pub fn work(&self) -> usize {
        self.lhs
            .rows()
            .saturating_mul(self.lhs.cols())
            .saturating_mul(self.rhs.cols())
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_conformant() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.lhs.cols(),
                found: self.rhs.rows(),
            })
        }
    }
}

impl<T: Scalar> Operation for Prod<T> {
    const TAG: OpTag = OpTag::Prod;
    type Args<'a> = ProdArgs<'a, T>;
    type Output = Matrix<T>;

    fn generic(args: ProdArgs<'_, T>) -> Result<Matrix<T>> {
        args.check()?;
        let (m, k, n) = (args.lhs.rows(), args.lhs.cols(), args.rhs.cols());
        let mut out = Matrix::try_zeros(m, n)?;
        let a = args.lhs.as_slice();
        let b = args.rhs.as_slice();
        let c = out.as_mut_slice();
        for i in 0..m {
            for l in 0..k {
                let a_il = a[i * k + l];
                for j in 0..n {
                    c[i * n + j] += a_il * b[l * n + j];
                }
            }
        }
        Ok(out)
    }

    fn builtin(backend: BackendTag, config: &DispatchConfig) -> Option<Arc<dyn Evaluator<Self>>> {
        match backend {
            BackendTag::Parallel => Some(Arc::new(cpu::ParallelProd::new(config))),
            _ => None,
        }
    }
}

/// Matrix transpose.
pub struct Transpose<T>(PhantomData<fn() -> T>);

impl<T: Copy + Send + Sync + 'static> Operation for Transpose<T> {
    const TAG: OpTag = OpTag::Transpose;
    type Args<'a> = &'a Matrix<T>;
    type Output = Matrix<T>;

    fn generic(src: &Matrix<T>) -> Result<Matrix<T>> {
        let (rows, cols) = (src.rows(), src.cols());
        let mut data = Vec::new();
        data.try_reserve_exact(src.len())?;
        for j in 0..cols {
            data.extend((0..rows).map(|i| src.as_slice()[i * cols + j]));
        }
        Ok(Matrix::new(cols, rows, data))
    }

    fn builtin(backend: BackendTag, config: &DispatchConfig) -> Option<Arc<dyn Evaluator<Self>>> {
        match backend {
            BackendTag::Transpose => Some(Arc::new(cpu::TiledTranspose::new(config))),
            _ => None,
        }
    }
}

/// Element-wise copy of `src` into `dst`.
pub struct BlockCopy<T>(PhantomData<fn() -> T>);

/// Arguments of [`BlockCopy`].
#[derive(Debug)]
pub struct CopyArgs<'a, T> {
    /// Source elements.
    pub src: &'a [T],
    /// Destination, same length as `src`.
    pub dst: &'a mut [T],
}

impl<T: Copy + Send + Sync + 'static> Operation for BlockCopy<T> {
    const TAG: OpTag = OpTag::Copy;
    type Args<'a> = CopyArgs<'a, T>;
    type Output = ();

    fn generic(args: CopyArgs<'_, T>) -> Result<()> {
        if args.src.len() != args.dst.len() {
            return Err(Error::DimensionMismatch {
                expected: args.dst.len(),
                found: args.src.len(),
            });
        }
        for (d, &s) in args.dst.iter_mut().zip(args.src) {
            *d = s;
        }
        Ok(())
    }

    fn builtin(backend: BackendTag, _config: &DispatchConfig) -> Option<Arc<dyn Evaluator<Self>>> {
        match backend {
            BackendTag::Copy => Some(Arc::new(cpu::SliceCopy)),
            _ => None,
        }
    }
}
