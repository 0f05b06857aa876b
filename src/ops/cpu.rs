//! Built-in CPU evaluators
//!
//! # CPU Backends
//!
//! This module provides the evaluators this crate ships for the CPU. They are
//! reached through [`Operation::builtin`](crate::ops::Operation::builtin) by
//! registries that enable builtins, or can be bound explicitly under any tag.
//!
//! ## Backends
//!
//! - `parallel` ([`ParallelReduce`], [`ParallelReduceIdx`], [`ParallelDot`],
//!   [`ParallelProd`]): block-parallel kernels using [`rayon`](https://docs.rs/rayon)
//! - `simd` ([`LaneReduce`], [`LaneDot`]): lane-blocked loops the compiler can
//!   vectorize; no intrinsics
//! - `transpose` ([`TiledTranspose`]): cache-tiled transpose
//! - `copy` ([`SliceCopy`]): bulk `memcpy`-style copy
//!
//! ## Design Goals
//!
//! - Partial results are merged in sequence order; the grouping of merges is
//!   left to rayon
//! - Probes only look at lengths, extents and the worker count
//! - Block sizes are local to each evaluator and never change results of
//!   lawful functors

use crate::config::DispatchConfig;
use crate::error::Result;
use crate::ops::{
    BlockCopy, CopyArgs, Dot, DotArgs, Evaluator, Prod, ProdArgs, Reduce, ReduceArgs, ReduceIdx,
    Transpose,
};
use crate::reductions::{
    ExtremumFunctor, ReductionFunctor, fold_block, merge_extremum, scan_extremum_at,
};
use crate::scalar::Scalar;
use crate::tensors::Matrix;
use core::ops::ControlFlow;
use rayon::prelude::*;

/// Accumulators per lane-blocked loop.
pub const LANES: usize = 8;

#[inline]
fn parallel_worth_it(len: usize, min_len: usize) -> bool {
    len >= min_len && rayon::current_num_threads() > 1
}

/// Block-parallel value reduction.
///
/// Every block is folded from `initial()` on a rayon worker, and partials are
/// combined in sequence order. A block whose accumulator reaches `done` stops
/// early, and so does the merge.
#[derive(Debug, Clone, Copy)]
pub struct ParallelReduce {
    min_len: usize,
    block_len: usize,
}

impl ParallelReduce {
    /// Tuned by `parallel_min_len` and `parallel_block_len`.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_len: config.parallel_min_len,
            block_len: config.parallel_block_len.max(1),
        }
    }
}

impl<R: ReductionFunctor> Evaluator<Reduce<R>> for ParallelReduce {
    fn is_available(&self, args: &ReduceArgs<'_, R>) -> bool {
        parallel_worth_it(args.data.len(), self.min_len)
    }

    fn execute(&self, args: ReduceArgs<'_, R>) -> Result<R::Output> {
        let f = &args.functor;
        let folded = args
            .data
            .par_chunks(self.block_len)
            .map(|chunk| match fold_block(f, f.initial(), chunk.iter().copied()) {
                ControlFlow::Continue(acc) => Ok(acc),
                ControlFlow::Break(acc) => Err(acc),
            })
            .try_reduce(
                || f.initial(),
                |lhs, rhs| {
                    let acc = f.combine(lhs, rhs);
                    if f.done(&acc) { Err(acc) } else { Ok(acc) }
                },
            );
        let (Ok(acc) | Err(acc)) = folded;
        Ok(f.value(acc, args.data.len()))
    }
}

/// Block-parallel extremum search. Ties resolve to the earliest index, and
/// elements that do not compare are skipped unless they start the sequence, so
/// the result is the one the sequential scan finds.
#[derive(Debug, Clone, Copy)]
pub struct ParallelReduceIdx {
    min_len: usize,
    block_len: usize,
}

impl ParallelReduceIdx {
    /// Tuned by `parallel_min_len` and `parallel_block_len`.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_len: config.parallel_min_len,
            block_len: config.parallel_block_len.max(1),
        }
    }
}

impl<E: ExtremumFunctor> Evaluator<ReduceIdx<E>> for ParallelReduceIdx {
    fn is_available(&self, data: &&[E::Item]) -> bool {
        parallel_worth_it(data.len(), self.min_len)
    }

    fn execute(&self, data: &[E::Item]) -> Result<Option<(E::Output, usize)>> {
        let block = self.block_len;
        let best = data
            .par_chunks(block)
            .enumerate()
            .map(|(b, chunk)| scan_extremum_at::<E, _>(chunk.iter().copied(), b * block))
            .reduce_with(|lhs, rhs| match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => Some(merge_extremum(lhs, rhs)),
                (lhs, None) => lhs,
                (None, rhs) => rhs,
            })
            .flatten();
        Ok(best.map(|(e, i)| (e.value(), i)))
    }
}

/// Block-parallel dot product.
#[derive(Debug, Clone, Copy)]
pub struct ParallelDot {
    min_len: usize,
    block_len: usize,
}

impl ParallelDot {
    /// Tuned by `parallel_min_len` and `parallel_block_len`.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_len: config.parallel_min_len,
            block_len: config.parallel_block_len.max(1),
        }
    }
}

impl<T: Scalar> Evaluator<Dot<T>> for ParallelDot {
    fn is_available(&self, args: &DotArgs<'_, T>) -> bool {
        args.is_conformant() && parallel_worth_it(args.lhs.len(), self.min_len)
    }

    fn execute(&self, args: DotArgs<'_, T>) -> Result<T> {
        args.check()?;
        Ok(args
            .lhs
            .par_chunks(self.block_len)
            .zip(args.rhs.par_chunks(self.block_len))
            .map(|(x, y)| x.iter().zip(y).fold(T::zero(), |acc, (&a, &b)| acc + a * b))
            .reduce(T::zero, |a, b| a + b))
    }
}

/// Row-parallel matrix product.
///
/// Each output row is computed by one rayon task as a sequence of scaled row
/// updates, which keeps the inner loop contiguous in both `rhs` and the output.
#[derive(Debug, Clone, Copy)]
pub struct ParallelProd {
    min_len: usize,
}

impl ParallelProd {
    /// Tuned by `parallel_min_len`, compared against the multiply-add count.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_len: config.parallel_min_len,
        }
    }
}

impl<T: Scalar> Evaluator<Prod<T>> for ParallelProd {
    fn is_available(&self, args: &ProdArgs<'_, T>) -> bool {
        args.is_conformant() && parallel_worth_it(args.work(), self.min_len)
    }

    fn execute(&self, args: ProdArgs<'_, T>) -> Result<Matrix<T>> {
        args.check()?;
        let (m, k, n) = (args.lhs.rows(), args.lhs.cols(), args.rhs.cols());
        let mut out = Matrix::try_zeros(m, n)?;
        if n == 0 {
            return Ok(out);
        }

        let a = args.lhs.as_slice();
        let b = args.rhs.as_slice();
        out.as_mut_slice()
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(i, row)| {
                for (l, &a_il) in a[i * k..(i + 1) * k].iter().enumerate() {
                    for (c, &b_lj) in row.iter_mut().zip(&b[l * n..(l + 1) * n]) {
                        *c += a_il * b_lj;
                    }
                }
            });
        Ok(out)
    }
}

/// Lane-blocked value reduction.
///
/// Element `i` goes to lane `i % LANES`, so the functor must be commutative as
/// well as associative; the probe declines otherwise. `done` is tested after
/// each block of `LANES` elements.
#[derive(Debug, Clone, Copy)]
pub struct LaneReduce {
    min_len: usize,
}

impl LaneReduce {
    /// Tuned by `simd_min_len`.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_len: config.simd_min_len,
        }
    }
}

impl<R: ReductionFunctor> Evaluator<Reduce<R>> for LaneReduce {
    fn is_available(&self, args: &ReduceArgs<'_, R>) -> bool {
        R::COMMUTATIVE && args.data.len() >= self.min_len
    }

    fn execute(&self, args: ReduceArgs<'_, R>) -> Result<R::Output> {
        let f = &args.functor;
        let len = args.data.len();
        let mut lanes = [f.initial(); LANES];
        let mut blocks = args.data.chunks_exact(LANES);
        for block in blocks.by_ref() {
            for (lane, &x) in lanes.iter_mut().zip(block) {
                *lane = f.update(*lane, x);
            }
            // done is absorbing: a finished lane is the final result
            if let Some(acc) = lanes.iter().find(|acc| f.done(acc)) {
                return Ok(f.value(*acc, len));
            }
        }

        let acc = lanes.into_iter().fold(f.initial(), |a, b| f.combine(a, b));
        let (ControlFlow::Continue(acc) | ControlFlow::Break(acc)) =
            fold_block(f, acc, blocks.remainder().iter().copied());
        Ok(f.value(acc, len))
    }
}

/// Lane-blocked dot product.
#[derive(Debug, Clone, Copy)]
pub struct LaneDot {
    min_len: usize,
}

impl LaneDot {
    /// Tuned by `simd_min_len`.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_len: config.simd_min_len,
        }
    }
}

impl<T: Scalar> Evaluator<Dot<T>> for LaneDot {
    fn is_available(&self, args: &DotArgs<'_, T>) -> bool {
        args.is_conformant() && args.lhs.len() >= self.min_len
    }

    fn execute(&self, args: DotArgs<'_, T>) -> Result<T> {
        args.check()?;
        let xs = args.lhs.chunks_exact(LANES);
        let ys = args.rhs.chunks_exact(LANES);
        let (x_rest, y_rest) = (xs.remainder(), ys.remainder());

        let mut lanes = [T::zero(); LANES];
        for (x, y) in xs.zip(ys) {
            for ((lane, &a), &b) in lanes.iter_mut().zip(x).zip(y) {
                *lane += a * b;
            }
        }

        let mut sum = lanes.into_iter().fold(T::zero(), |a, b| a + b);
        for (&a, &b) in x_rest.iter().zip(y_rest) {
            sum += a * b;
        }
        Ok(sum)
    }
}

/// Cache-tiled transpose.
#[derive(Debug, Clone, Copy)]
pub struct TiledTranspose {
    min_len: usize,
    tile: usize,
}

impl TiledTranspose {
    /// Tuned by `transpose_min_len` and `transpose_tile`.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_len: config.transpose_min_len,
            tile: config.transpose_tile.max(1),
        }
    }
}

impl<T: Copy + Send + Sync + 'static> Evaluator<Transpose<T>> for TiledTranspose {
    fn is_available(&self, src: &&Matrix<T>) -> bool {
        !src.is_empty() && src.len() >= self.min_len
    }

    fn execute(&self, src: &Matrix<T>) -> Result<Matrix<T>> {
        let (rows, cols) = (src.rows(), src.cols());
        let s = src.as_slice();
        let Some(&fill) = s.first() else {
            return Ok(Matrix::new(cols, rows, Vec::new()));
        };

        let mut data = Vec::new();
        data.try_reserve_exact(s.len())?;
        data.resize(s.len(), fill);

        for i0 in (0..rows).step_by(self.tile) {
            let i1 = (i0 + self.tile).min(rows);
            for j0 in (0..cols).step_by(self.tile) {
                let j1 = (j0 + self.tile).min(cols);
                for i in i0..i1 {
                    for j in j0..j1 {
                        data[j * rows + i] = s[i * cols + j];
                    }
                }
            }
        }
        Ok(Matrix::new(cols, rows, data))
    }
}

/// Bulk copy between slices of equal length.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceCopy;

impl<T: Copy + Send + Sync + 'static> Evaluator<BlockCopy<T>> for SliceCopy {
    fn is_available(&self, args: &CopyArgs<'_, T>) -> bool {
        args.src.len() == args.dst.len()
    }

    fn execute(&self, args: CopyArgs<'_, T>) -> Result<()> {
        args.dst.copy_from_slice(args.src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Operation;
    use crate::reductions::functors::{AllTrueBool, AnyTrue, MaxValue, MinValue, SumValue};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    type SumI64 = Reduce<SumValue<i64>>;
    type AnyU32 = Reduce<AnyTrue<u32>>;
    type All = Reduce<AllTrueBool>;

    fn tiny() -> DispatchConfig {
        DispatchConfig {
            parallel_min_len: 0,
            parallel_block_len: 5,
            simd_min_len: 0,
            transpose_min_len: 0,
            transpose_tile: 3,
            ..DispatchConfig::DEFAULT
        }
    }

    fn ints(n: usize, seed: u64) -> Vec<i64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.random_range(-50..50)).collect()
    }

    #[test]
    fn reductions_match_generic() {
        let par = ParallelReduce::new(&tiny());
        let lane = LaneReduce::new(&tiny());
        for n in [0, 1, 7, 8, 9, 64, 301] {
            let data = ints(n, n as u64);
            let args = ReduceArgs {
                functor: SumValue::<i64>::new(),
                data: &data,
            };
            let expect = SumI64::generic(args).unwrap();
            assert_eq!(Evaluator::<SumI64>::execute(&par, args).unwrap(), expect);
            assert_eq!(Evaluator::<SumI64>::execute(&lane, args).unwrap(), expect);

            let bits: Vec<u32> = data.iter().map(|&x| (x & 0xff) as u32).collect();
            let args = ReduceArgs {
                functor: AnyTrue::<u32>::new(),
                data: &bits,
            };
            let expect = AnyU32::generic(args).unwrap();
            assert_eq!(Evaluator::<AnyU32>::execute(&par, args).unwrap(), expect);
            assert_eq!(Evaluator::<AnyU32>::execute(&lane, args).unwrap(), expect);
        }
    }

    #[test]
    fn short_circuit_in_any_block() {
        let par = ParallelReduce::new(&tiny());
        let lane = LaneReduce::new(&tiny());
        let mut data = vec![true; 97];
        for at in [0, 4, 5, 50, 96] {
            data[at] = false;
            let args = ReduceArgs {
                functor: AllTrueBool,
                data: &data,
            };
            assert!(!Evaluator::<All>::execute(&par, args).unwrap());
            assert!(!Evaluator::<All>::execute(&lane, args).unwrap());
            data[at] = true;
        }
        let args = ReduceArgs {
            functor: AllTrueBool,
            data: &data,
        };
        assert!(Evaluator::<All>::execute(&par, args).unwrap());
        assert!(Evaluator::<All>::execute(&lane, args).unwrap());
    }

    #[test]
    fn parallel_extremum_keeps_the_first_index() {
        let eval = ParallelReduceIdx::new(&tiny());
        let data = [3, 9, 1, 9, 1, 0, 0, 9, 0, 0, 0, 1];
        assert_eq!(
            Evaluator::<ReduceIdx<MaxValue<i32>>>::execute(&eval, &data).unwrap(),
            Some((9, 1))
        );
        assert_eq!(
            Evaluator::<ReduceIdx<MinValue<i32>>>::execute(&eval, &data).unwrap(),
            Some((0, 5))
        );
        assert_eq!(
            Evaluator::<ReduceIdx<MinValue<i32>>>::execute(&eval, &[]).unwrap(),
            None
        );
    }

    #[test]
    fn parallel_extremum_skips_nan_at_block_starts() {
        let eval = ParallelReduceIdx::new(&DispatchConfig {
            parallel_block_len: 2,
            ..tiny()
        });
        let data = [1.0, 2.0, f64::NAN, 5.0];
        let generic = ReduceIdx::<MaxValue<f64>>::generic(&data).unwrap();
        assert_eq!(generic, Some((5.0, 3)));
        assert_eq!(
            Evaluator::<ReduceIdx<MaxValue<f64>>>::execute(&eval, &data).unwrap(),
            generic
        );

        let data = [4.0, f64::NAN, f64::NAN, 0.5, f64::NAN, 7.0];
        assert_eq!(
            Evaluator::<ReduceIdx<MaxValue<f64>>>::execute(&eval, &data).unwrap(),
            Some((7.0, 5))
        );
        assert_eq!(
            Evaluator::<ReduceIdx<MinValue<f64>>>::execute(&eval, &data).unwrap(),
            ReduceIdx::<MinValue<f64>>::generic(&data).unwrap()
        );

        // a NaN at index 0 is held, as in the sequential scan
        let data = [f64::NAN, 1.0, 2.0];
        let got = Evaluator::<ReduceIdx<MaxValue<f64>>>::execute(&eval, &data).unwrap();
        assert!(matches!(got, Some((v, 0)) if v.is_nan()));
    }

    #[test]
    fn dot_products_match_generic() {
        let par = ParallelDot::new(&tiny());
        let lane = LaneDot::new(&tiny());
        for n in [0, 3, 8, 17, 1000] {
            let x: Vec<f64> = ints(n, 1).into_iter().map(|v| v as f64).collect();
            let y: Vec<f64> = ints(n, 2).into_iter().map(|v| v as f64).collect();
            let args = DotArgs { lhs: &x, rhs: &y };
            let expect = Dot::<f64>::generic(args).unwrap();
            assert_eq!(Evaluator::<Dot<f64>>::execute(&par, args).unwrap(), expect);
            assert_eq!(Evaluator::<Dot<f64>>::execute(&lane, args).unwrap(), expect);
        }
    }

    #[test]
    fn probes_reject_mismatched_operands() {
        let args = DotArgs {
            lhs: &[1.0f32, 2.0],
            rhs: &[1.0f32],
        };
        assert!(!Evaluator::<Dot<f32>>::is_available(&LaneDot::new(&tiny()), &args));
        assert!(!Evaluator::<Dot<f32>>::is_available(&ParallelDot::new(&tiny()), &args));
    }

    #[test]
    fn row_parallel_product() {
        let a = Matrix::new(3, 4, ints(12, 3).into_iter().map(|v| v as f64).collect());
        let b = Matrix::new(4, 2, ints(8, 4).into_iter().map(|v| v as f64).collect());
        let args = ProdArgs { lhs: &a, rhs: &b };
        assert_eq!(
            Evaluator::<Prod<f64>>::execute(&ParallelProd::new(&tiny()), args).unwrap(),
            Prod::<f64>::generic(args).unwrap()
        );
    }

    #[test]
    fn tiled_transpose_matches_generic() {
        let eval = TiledTranspose::new(&tiny());
        for (rows, cols) in [(1, 1), (2, 7), (7, 2), (9, 9), (10, 4)] {
            let m = Matrix::new(rows, cols, ints(rows * cols, 5));
            let t = Evaluator::<Transpose<i64>>::execute(&eval, &m).unwrap();
            assert_eq!(t, Transpose::<i64>::generic(&m).unwrap());
            assert_eq!((t.rows(), t.cols()), (cols, rows));
        }
    }

    #[test]
    fn slice_copy() {
        let src = [1u16, 2, 3];
        let mut dst = [0u16; 3];
        let args = CopyArgs {
            src: &src,
            dst: &mut dst,
        };
        assert!(Evaluator::<BlockCopy<u16>>::is_available(&SliceCopy, &args));
        Evaluator::<BlockCopy<u16>>::execute(&SliceCopy, args).unwrap();
        assert_eq!(dst, src);
    }
}
