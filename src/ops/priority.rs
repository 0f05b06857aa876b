//! Backend priority lists.
//!
//! A [`PriorityList`] orders the backends the dispatcher tries for one operation,
//! most specific first. Lists are independent of argument types: the same list
//! serves `Dot<f32>` and `Dot<Complex<f64>>`, and backends without a binding for
//! a signature are simply skipped for it.
//!
//! A well-formed list is non-empty, has no repeated entries and ends in
//! [`BackendTag::Generic`], which accepts every call. Validation goes through
//! `briny`'s [`Validate`] trait.

use crate::backend::BackendTag;
use crate::ops::OpTag;
use briny::prelude::{Validate, ValidationError};

/// Ordered backend preference for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityList {
    op: OpTag,
    backends: Vec<BackendTag>,
}

impl PriorityList {
    /// A list for `op` trying `backends` in order.
    pub fn new(op: OpTag, backends: impl Into<Vec<BackendTag>>) -> Self {
        Self {
            op,
            backends: backends.into(),
        }
    }

    /// The operation this list belongs to.
    #[inline]
    pub const fn op(&self) -> OpTag {
        self.op
    }

    /// The backends, highest priority first.
    #[inline]
    pub fn backends(&self) -> &[BackendTag] {
        &self.backends
    }

    /// Iterates the backends, highest priority first.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = BackendTag> + '_ {
        self.backends.iter().copied()
    }

    /// Whether `backend` appears in the list.
    #[inline]
    pub fn contains(&self, backend: BackendTag) -> bool {
        self.backends.contains(&backend)
    }

    /// Puts `backend` in front of every existing entry. An existing occurrence is
    /// removed first, so the list stays free of duplicates.
    pub fn prepend(&mut self, backend: BackendTag) {
        self.backends.retain(|&b| b != backend);
        self.backends.insert(0, backend);
    }

    /// What is wrong with the list, if anything.
    pub fn defect(&self) -> Option<&'static str> {
        let Some(&last) = self.backends.last() else {
            return Some("list is empty");
        };
        for (i, b) in self.backends.iter().enumerate() {
            if self.backends[..i].contains(b) {
                return Some("backend listed more than once");
            }
        }
        if last != BackendTag::Generic {
            return Some("list does not end in `generic`");
        }
        None
    }

    /// The list this crate declares for `op`.
    pub fn default_for(op: OpTag) -> Self {
        use BackendTag::*;

        let backends: &[BackendTag] = match op {
            OpTag::Reduce => {
                let mut list = Self::new(op, [Cuda, Opencl, Parallel, Simd, Cvsip, Generic]);
                if cfg!(feature = "wgpu") {
                    list.prepend(Wgpu);
                }
                return list;
            }
            OpTag::ReduceIdx => &[Cuda, Parallel, Cvsip, Generic],
            OpTag::Dot => &[Cuda, Blas, Parallel, Simd, Generic],
            OpTag::Prod | OpTag::Prodj | OpTag::Gemp | OpTag::Outer => {
                &[Cuda, Blas, Parallel, Generic]
            }
            OpTag::Lud | OpTag::Qrd | OpTag::Chold | OpTag::Svd => &[Cuda, Lapack, Cvsip, Generic],
            OpTag::Fft | OpTag::Fftm => &[Cuda, Opencl, Fftw, Cvsip, Generic],
            OpTag::Fir | OpTag::Hist | OpTag::Freqswap => &[Cuda, Cvsip, Opt, Generic],
            OpTag::Transpose => &[Transpose, Generic],
            OpTag::Copy => &[Copy, Generic],
        };
        Self::new(op, backends)
    }

    /// Declared lists for every operation.
    pub fn defaults() -> impl Iterator<Item = Self> {
        OpTag::ALL.into_iter().map(Self::default_for)
    }
}

impl Validate for PriorityList {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.defect() {
            None => Ok(()),
            Some(_) => Err(ValidationError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_lists_are_well_formed() {
        for list in PriorityList::defaults() {
            assert_eq!(list.defect(), None, "{}", list.op());
            assert!(list.validate().is_ok());
        }
    }

    #[test]
    fn defects_are_named() {
        use BackendTag::*;
        let empty = PriorityList::new(OpTag::Dot, vec![]);
        let dup = PriorityList::new(OpTag::Dot, vec![Blas, Blas, Generic]);
        let open = PriorityList::new(OpTag::Dot, vec![Blas, Simd]);
        assert_eq!(empty.defect(), Some("list is empty"));
        assert_eq!(dup.defect(), Some("backend listed more than once"));
        assert_eq!(open.defect(), Some("list does not end in `generic`"));
        assert!(open.validate().is_err());
    }

    #[test]
    fn prepend_moves_an_existing_entry_to_the_front() {
        let mut list = PriorityList::default_for(OpTag::Dot);
        list.prepend(BackendTag::Parallel);
        list.prepend(BackendTag::User);
        assert_eq!(list.backends()[..2], [BackendTag::User, BackendTag::Parallel]);
        assert_eq!(list.defect(), None);
    }
}
