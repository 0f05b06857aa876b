//! numkern: backend-agnostic dispatch for numeric kernels.
//!
//! Numeric operations are named abstractly (dot product, matrix product,
//! reduction, ...) and routed at run time to one of several interchangeable
//! backends, chosen by a per-operation priority list and by a cheap
//! applicability probe over the actual arguments. A portable `generic`
//! implementation backs every signature, so dispatch is total whenever the lists
//! are well formed.
//!
//! # Features
//!
//! - Priority-ordered dispatch with pluggable bindings and per-signature memoized
//!   resolution.
//! - A generic reduction framework: one fold algorithm over interchangeable
//!   accumulation policies, with chunked traversal and early termination.
//! - Built-in `parallel` (rayon), lane-blocked `simd`, tiled `transpose` and bulk
//!   `copy` backends; optional `wgpu` GPU reductions.
//! - A Levinson-recursion Toeplitz solver built on the dispatched dot product.
//!
//! # Modules
//!
//! - [`ops`]: operation tags, signatures, registry and dispatcher
//! - [`reductions`]: reduction functor traits, traversals and the functor set
//! - [`api`]: numeric entry points over the standard registry
//! - [`solver`]: Toeplitz solver
//! - [`tensors`]: dense row-major matrices
//! - [`scalar`]: magnitude and scalar-field traits
//! - [`config`]: backend thresholds and block sizes
//!
//! # Example
//!
//! ```rust
//! use numkern::{matrix, api};
//!
//! let a = matrix![[1.0, 2.0], [3.0, 4.0]];
//! let id = matrix![[1.0, 0.0], [0.0, 1.0]];
//! assert_eq!(api::prod(&a, &id)?, a);
//! assert_eq!(api::counttrue(&[true, false, true])?, 2);
//! # Ok::<(), numkern::Error>(())
//! ```
//!
//! # Cargo Features
//!
//! - `simd`: lets the standard registry use the lane-blocked evaluators.
//! - `wgpu`: GPU reductions for `f32` through `wgpu`.

pub mod api;
pub mod approx;
pub mod backend;
pub mod config;
pub mod error;
pub mod ops;
pub mod reductions;
pub mod scalar;
pub mod solver;
pub mod tensors;

pub use backend::BackendTag;
pub use config::DispatchConfig;
pub use error::{Error, Result};
pub use ops::{Evaluator, OpTag, Operation, Registry, RegistryBuilder, registry};
pub use solver::toepsol;
pub use tensors::Matrix;
