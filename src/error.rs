//! Error types shared by the dispatcher, the bindings and the numeric entry points.

use crate::backend::BackendTag;
use crate::ops::OpTag;
use thiserror::Error;

/// Everything that can go wrong between naming an operation and receiving its result.
///
/// The variants fall into three families:
///
/// - **configuration defects** (`NoApplicableBackend`, `InvalidPriorityList`,
///   `DuplicateBinding`): the registry was assembled wrongly. These are programming
///   errors, never transient conditions.
/// - **computation errors** (`Computation`, `DimensionMismatch`): the input is
///   ill-posed or malformed.
/// - **resource errors** (`Allocation`): the environment could not supply memory.
///
/// `Unavailable` is reserved for the explicit backend override, where the caller
/// asked for one specific backend and it could not run.
#[derive(Debug, Error)]
pub enum Error {
    /// Every candidate of the priority list declined. Only possible for lists
    /// without a generic fallback.
    #[error("no backend accepted `{op}` (tried: {tried:?})")]
    NoApplicableBackend {
        /// The operation being dispatched.
        op: OpTag,
        /// Structurally eligible backends, in the order they were probed.
        tried: Vec<BackendTag>,
    },

    /// A priority list failed validation while building a registry.
    #[error("invalid priority list for `{op}`: {reason}")]
    InvalidPriorityList {
        /// The operation whose list is malformed.
        op: OpTag,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A second binding was registered for the same signature and backend.
    #[error("`{backend}` already has a binding for `{signature}`")]
    DuplicateBinding {
        /// The backend tag that was registered twice.
        backend: BackendTag,
        /// Type name of the operation signature.
        signature: &'static str,
    },

    /// An explicitly requested backend has no binding or declined the arguments.
    #[error("backend `{backend}` cannot run `{op}` for these arguments")]
    Unavailable {
        /// The operation being dispatched.
        op: OpTag,
        /// The backend that was requested.
        backend: BackendTag,
    },

    /// The problem is ill-posed, ill-conditioned or otherwise not computable.
    #[error("computation error: {0}")]
    Computation(String),

    /// Operand extents do not agree.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The extent the operation required.
        expected: usize,
        /// The extent it was given.
        found: usize,
    },

    /// Workspace, output or device memory could not be allocated.
    #[error("allocation failure: {0}")]
    Allocation(String),
}

impl Error {
    /// Returns `true` for errors caused by how the registry was put together.
    #[must_use]
    pub const fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            Self::NoApplicableBackend { .. }
                | Self::InvalidPriorityList { .. }
                | Self::DuplicateBinding { .. }
        )
    }

    /// Returns `true` for errors caused by the input itself.
    #[must_use]
    pub const fn is_computation(&self) -> bool {
        matches!(self, Self::Computation(_) | Self::DimensionMismatch { .. })
    }

    /// Returns `true` for resource exhaustion.
    #[must_use]
    pub const fn is_allocation(&self) -> bool {
        matches!(self, Self::Allocation(_))
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::Allocation(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_families_are_disjoint() {
        let defect = Error::NoApplicableBackend {
            op: OpTag::Dot,
            tried: vec![BackendTag::Simd],
        };
        let numeric = Error::Computation("not full rank".into());
        let shape = Error::DimensionMismatch {
            expected: 3,
            found: 4,
        };
        let alloc = Error::Allocation("workspace".into());

        assert!(defect.is_configuration_defect());
        assert!(!defect.is_computation() && !defect.is_allocation());
        assert!(numeric.is_computation() && !numeric.is_allocation());
        assert!(shape.is_computation());
        assert!(alloc.is_allocation() && !alloc.is_computation());
    }

    #[test]
    fn try_reserve_failure_maps_to_allocation() {
        let mut v: Vec<u64> = Vec::new();
        let err: Error = v.try_reserve_exact(usize::MAX).unwrap_err().into();
        assert!(err.is_allocation());
    }

    #[test]
    fn messages_name_the_operation() {
        let err = Error::Unavailable {
            op: OpTag::Prod,
            backend: BackendTag::Blas,
        };
        assert_eq!(
            err.to_string(),
            "backend `blas` cannot run `prod` for these arguments"
        );
    }
}
