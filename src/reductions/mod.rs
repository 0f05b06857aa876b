//! # Generic Reductions
//!
//! One fold algorithm, parameterized over pluggable accumulation policies.
//!
//! A [`ReductionFunctor`] describes an aggregate (sum, mean, logical all/any, ...)
//! as an initial accumulator, an associative `update`, an associative `combine` of
//! partial accumulators, a finalization `value(acc, len)` and an early-termination
//! predicate `done`. An [`ExtremumFunctor`] describes a running maximum or minimum
//! that is seeded with the first element and reports whether each further element
//! strictly improved on it.
//!
//! The functions here are the sequential reference traversals. Backends may split
//! the input into blocks, fold each block from [`ReductionFunctor::initial`] and
//! merge the partials with [`ReductionFunctor::combine`]; because both operations
//! are associative the result does not depend on the block size.
//!
//! ## Example
//!
//! ```rust
//! use numkern::reductions::{fold, fold_extremum};
//! use numkern::reductions::functors::{MaxValue, MeanValue, SumValue};
//!
//! let data = [2.0, 1.0, 4.0, 1.0, 4.0];
//! assert_eq!(fold(&SumValue::<f64>::new(), data), 12.0);
//! assert_eq!(fold(&MeanValue::<f64>::new(), data), 2.4);
//! assert_eq!(fold_extremum::<MaxValue<f64>, _>(data), Some((4.0, 2)));
//! ```

use core::ops::ControlFlow;

pub mod functors;

/// Which aggregate a functor computes.
///
/// Backends use this to recognize reductions they have a dedicated kernel for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionKind {
    /// Σ x
    Sum,
    /// Σ x / n
    Mean,
    /// Σ x²
    SumSq,
    /// Σ |x|²
    SumMagsq,
    /// Σ |x|² / n
    MeanMagsq,
    /// Number of `true` elements.
    CountTrue,
    /// Logical or bitwise conjunction.
    AllTrue,
    /// Logical or bitwise disjunction.
    AnyTrue,
    /// Anything else.
    Custom,
}

/// Accumulation policy for [`fold`].
///
/// # Laws
///
/// - `update` folds one element into an accumulator and `combine` merges two
///   accumulators; both must be associative, and `initial()` must be an identity
///   for `combine`.
/// - `value(acc, len)` receives the length of the whole sequence, even when the
///   traversal stopped early.
/// - `done` must be absorbing: once `done(&acc)` holds, no further `update` or
///   `combine` may change `acc`. Traversals may therefore stop as soon as it holds.
///
/// Functors are small `Copy` values; a functor instance carries no state between
/// calls.
pub trait ReductionFunctor: Copy + Send + Sync + 'static {
    /// Element type consumed by the fold.
    type Item: Copy + Send + Sync + 'static;
    /// Running accumulator.
    type Accum: Copy + Send;
    /// Final result.
    type Output;

    /// The aggregate this functor computes.
    const KIND: ReductionKind;

    /// Whether elements may be regrouped across lanes, not just split into
    /// contiguous blocks.
    const COMMUTATIVE: bool = true;

    /// The accumulator of an empty sequence.
    fn initial(&self) -> Self::Accum;

    /// Folds one element into `acc`.
    fn update(&self, acc: Self::Accum, item: Self::Item) -> Self::Accum;

    /// Merges the accumulators of two adjacent blocks, `lhs` first.
    fn combine(&self, lhs: Self::Accum, rhs: Self::Accum) -> Self::Accum;

    /// Finalizes `acc` for a sequence of `len` elements.
    fn value(&self, acc: Self::Accum, len: usize) -> Self::Output;

    /// Early-termination predicate.
    #[inline]
    fn done(&self, _acc: &Self::Accum) -> bool {
        false
    }
}

/// Running extremum, seeded with the first element of a sequence.
pub trait ExtremumFunctor: Sized + Send + 'static {
    /// Element type.
    type Item: Copy + Send + Sync + 'static;
    /// Reported value: the element itself, or its magnitude.
    type Output;

    /// Starts tracking with `first` held.
    fn seed(first: Self::Item) -> Self;

    /// Replaces the held value if `item` is strictly better, returning whether it
    /// did. Ties keep the held value.
    fn next_value(&mut self, item: Self::Item) -> bool;

    /// The held value.
    fn value(&self) -> Self::Output;

    /// Takes over `other`'s held value if it is strictly better. Used to merge the
    /// results of consecutive blocks, earlier block on the left.
    fn absorb(&mut self, other: &Self) -> bool;

    /// Whether `item` compares with anything at all. A held value that does not
    /// (NaN) refuses every later element, so only element 0 may hold one.
    #[inline]
    fn comparable(_item: &Self::Item) -> bool {
        true
    }
}

/// Folds `seq` with `functor`.
///
/// `done` is tested after every element; the fold stops at the first accumulator
/// it accepts and never pulls another element from the iterator.
pub fn fold<F, I>(functor: &F, seq: I) -> F::Output
where
    F: ReductionFunctor,
    I: IntoIterator<Item = F::Item>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = seq.into_iter();
    let len = iter.len();
    let (ControlFlow::Continue(acc) | ControlFlow::Break(acc)) =
        fold_block(functor, functor.initial(), iter);
    functor.value(acc, len)
}

/// Folds `items` into `acc`, returning `Break` as soon as `done` holds.
#[inline]
pub fn fold_block<F, I>(functor: &F, mut acc: F::Accum, items: I) -> ControlFlow<F::Accum, F::Accum>
where
    F: ReductionFunctor,
    I: IntoIterator<Item = F::Item>,
{
    for item in items {
        acc = functor.update(acc, item);
        if functor.done(&acc) {
            return ControlFlow::Break(acc);
        }
    }
    ControlFlow::Continue(acc)
}

/// Sequential blocked traversal: every `block_len` elements are folded from
/// `initial()` and merged left to right with `combine`. `done` is tested after
/// each block.
///
/// Equal to [`fold`] for every lawful functor and every `block_len >= 1`.
pub fn fold_chunks<F>(functor: &F, data: &[F::Item], block_len: usize) -> F::Output
where
    F: ReductionFunctor,
{
    let mut acc = functor.initial();
    for chunk in data.chunks(block_len.max(1)) {
        let (ControlFlow::Continue(part) | ControlFlow::Break(part)) =
            fold_block(functor, functor.initial(), chunk.iter().copied());
        acc = functor.combine(acc, part);
        if functor.done(&acc) {
            break;
        }
    }
    functor.value(acc, data.len())
}

/// Finds the extremum of `seq` and the index where it was last established.
///
/// Element 0 seeds the functor; every later element goes through
/// [`ExtremumFunctor::next_value`], and the index moves only when that reports a
/// change. There is no early exit. `None` for an empty sequence.
pub fn fold_extremum<E, I>(seq: I) -> Option<(E::Output, usize)>
where
    E: ExtremumFunctor,
    I: IntoIterator<Item = E::Item>,
{
    scan_extremum::<E, I>(seq).map(|(functor, idx)| (functor.value(), idx))
}

/// Like [`fold_extremum`], returning the functor itself so it can be merged with
/// the results of neighbouring blocks.
pub fn scan_extremum<E, I>(seq: I) -> Option<(E, usize)>
where
    E: ExtremumFunctor,
    I: IntoIterator<Item = E::Item>,
{
    let mut iter = seq.into_iter();
    let mut functor = E::seed(iter.next()?);
    let mut idx = 0;
    for (i, item) in iter.enumerate() {
        if functor.next_value(item) {
            idx = i + 1;
        }
    }
    Some((functor, idx))
}

/// Scans a block that starts at `offset > 0` in a longer sequence, reporting
/// indices relative to the whole sequence.
///
/// Leading elements that are not [`comparable`](ExtremumFunctor::comparable)
/// are skipped, as the sequential scan never takes them after element 0. `None`
/// if no element of the block compares.
pub fn scan_extremum_at<E, I>(seq: I, offset: usize) -> Option<(E, usize)>
where
    E: ExtremumFunctor,
    I: IntoIterator<Item = E::Item>,
{
    if offset == 0 {
        return scan_extremum::<E, I>(seq);
    }
    let mut iter = seq
        .into_iter()
        .enumerate()
        .skip_while(|(_, item)| !E::comparable(item));
    let (start, first) = iter.next()?;
    let mut functor = E::seed(first);
    let mut idx = start;
    for (i, item) in iter {
        if functor.next_value(item) {
            idx = i;
        }
    }
    Some((functor, offset + idx))
}

/// Merges the scan of a later block into the scan of an earlier one. Ties keep
/// the earlier index.
#[inline]
pub fn merge_extremum<E: ExtremumFunctor>(lhs: (E, usize), rhs: (E, usize)) -> (E, usize) {
    let (mut best, idx) = lhs;
    if best.absorb(&rhs.0) {
        (best, rhs.1)
    } else {
        (best, idx)
    }
}
