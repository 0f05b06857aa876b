//! Backend tags.
//!
//! A [`BackendTag`] names one implementation strategy for numeric kernels. Tags carry
//! no behavior of their own: what a backend can do is decided entirely by the
//! evaluator bindings registered for it (see [`crate::ops::dispatch`]), and when it
//! is tried is decided by the priority list of each operation
//! (see [`crate::ops::priority`]).
//!
//! Backends are not mutually exclusive capability sets. For any one call several
//! may be structurally eligible; the dispatcher picks exactly one.
//!
//! # Built-in bindings
//!
//! Only a subset of the catalogue ships with bindings in this crate:
//!
//! - `Generic`: the universal fallback, implied for every operation signature
//! - `Parallel`: multi-threaded CPU kernels using `rayon`
//! - `Simd`: lane-blocked CPU kernels (no intrinsics; the compiler vectorizes)
//! - `Transpose`: cache-tiled matrix transpose
//! - `Copy`: bulk slice copy
//! - `Wgpu`: GPU reductions through `wgpu` (feature `wgpu`)
//!
//! The remaining tags exist so that vendor bindings (BLAS, LAPACK, FFTW, CUDA, ...)
//! can be registered by downstream crates without touching this one.

use core::convert::TryFrom;
use core::fmt;

/// Enumeration of implementation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum BackendTag {
    /// Plain loops; available for every operation signature.
    #[default]
    Generic = 0,
    /// Lane-blocked loops laid out for auto-vectorization.
    Simd,
    /// Hand-optimized CPU kernels.
    Opt,
    /// Vendor BLAS (ATLAS, MKL, OpenBLAS, ...).
    Blas,
    /// Vendor LAPACK.
    Lapack,
    /// A C-VSIPL library.
    Cvsip,
    /// FFTW.
    Fftw,
    /// Placeholder FFT backend that performs no transform.
    NoFft,
    /// OpenCL devices.
    Opencl,
    /// NVIDIA CUDA devices.
    Cuda,
    /// Work distributed across threads.
    Parallel,
    /// Dense multi-dimensional expression evaluation.
    DenseExpr,
    /// Multi-dimensional expression reduction.
    MdimExpr,
    /// Generic loop fusion.
    LoopFusion,
    /// Fused fast-convolution expressions.
    FcExpr,
    /// Return-block expressions.
    RboExpr,
    /// Special expression handling (vector-matrix products and similar).
    OpExpr,
    /// Optimized copy.
    Copy,
    /// Optimized transpose.
    Transpose,
    /// Hook for user-supplied evaluators.
    User,
    /// WebGPU devices through `wgpu`.
    Wgpu,
}

impl BackendTag {
    /// Every tag, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::Generic,
        Self::Simd,
        Self::Opt,
        Self::Blas,
        Self::Lapack,
        Self::Cvsip,
        Self::Fftw,
        Self::NoFft,
        Self::Opencl,
        Self::Cuda,
        Self::Parallel,
        Self::DenseExpr,
        Self::MdimExpr,
        Self::LoopFusion,
        Self::FcExpr,
        Self::RboExpr,
        Self::OpExpr,
        Self::Copy,
        Self::Transpose,
        Self::User,
        Self::Wgpu,
    ];

    /// Short lowercase name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Simd => "simd",
            Self::Opt => "opt",
            Self::Blas => "blas",
            Self::Lapack => "lapack",
            Self::Cvsip => "cvsip",
            Self::Fftw => "fftw",
            Self::NoFft => "no_fft",
            Self::Opencl => "opencl",
            Self::Cuda => "cuda",
            Self::Parallel => "parallel",
            Self::DenseExpr => "dense_expr",
            Self::MdimExpr => "mdim_expr",
            Self::LoopFusion => "loop_fusion",
            Self::FcExpr => "fc_expr",
            Self::RboExpr => "rbo_expr",
            Self::OpExpr => "op_expr",
            Self::Copy => "copy",
            Self::Transpose => "transpose",
            Self::User => "user",
            Self::Wgpu => "wgpu",
        }
    }
}

impl fmt::Display for BackendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for BackendTag {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(usize::from(value)).copied().ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_round_trip() {
        for tag in BackendTag::ALL {
            assert_eq!(BackendTag::try_from(tag as u8), Ok(tag));
        }
        assert!(BackendTag::try_from(BackendTag::ALL.len() as u8).is_err());
    }

    #[test]
    fn default_is_generic() {
        assert_eq!(BackendTag::default(), BackendTag::Generic);
        assert_eq!(BackendTag::NoFft.to_string(), "no_fft");
    }
}
