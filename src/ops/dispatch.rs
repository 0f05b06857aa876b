//! Operation Dispatch Layer
//!
//! A [`Registry`] holds the evaluator bindings and the priority lists, and routes
//! every call to exactly one backend:
//!
//! 1. walk the priority list of `Op::TAG` in order
//! 2. skip backends with no binding for the signature `Op`
//! 3. probe the first remaining candidate with the actual arguments
//! 4. run it if the probe accepts, otherwise move on to the next candidate
//!
//! `generic` accepts every call, so a well-formed list always resolves.
//!
//! # Design Highlights
//! - **Pluggable**: bindings are added through [`RegistryBuilder::bind`] without
//!   touching the dispatcher or any list
//! - **Minimal overhead**: step 2 is decided once per signature and memoized, so a
//!   call only pays for the probes it actually runs
//! - **No second chances**: once a probe accepted, that backend's result or error
//!   is returned as is
//!
//! # Example
//! ```rust
//! use numkern::ops::{Evaluator, Dot, DotArgs, Operation, RegistryBuilder};
//! use numkern::{BackendTag, Result};
//!
//! struct LongOnly;
//!
//! impl Evaluator<Dot<f64>> for LongOnly {
//!     fn is_available(&self, args: &DotArgs<'_, f64>) -> bool {
//!         args.lhs.len() >= 4 && args.is_conformant()
//!     }
//!
//!     fn execute(&self, args: DotArgs<'_, f64>) -> Result<f64> {
//!         Dot::<f64>::generic(args)
//!     }
//! }
//!
//! let mut builder = RegistryBuilder::new();
//! builder.bind::<Dot<f64>, _>(BackendTag::User, LongOnly)?;
//! builder.prepend(numkern::OpTag::Dot, BackendTag::User);
//! let registry = builder.build()?;
//!
//! let short = [1.0, 2.0];
//! let args = DotArgs { lhs: &short, rhs: &short };
//! assert_eq!(registry.select::<Dot<f64>>(&args), Some(BackendTag::Generic));
//! # Ok::<(), numkern::Error>(())
//! ```

use crate::backend::BackendTag;
use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::ops::priority::PriorityList;
use crate::ops::{Evaluator, OpTag, Operation};
use briny::prelude::Validate;
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

type Erased = Box<dyn Any + Send + Sync>;

/// One registered evaluator, type-erased. Holds an `Arc<dyn Evaluator<Op>>`.
struct Binding {
    op: OpTag,
    signature: &'static str,
    evaluator: Erased,
}

impl Binding {
    fn get<Op: Operation>(&self) -> Option<&Arc<dyn Evaluator<Op>>> {
        self.evaluator.downcast_ref::<Arc<dyn Evaluator<Op>>>()
    }
}

/// Assembles a [`Registry`].
///
/// Starts from the declared priority list of every operation. Bindings and list
/// changes are additive; nothing registered earlier is modified.
pub struct RegistryBuilder {
    bindings: HashMap<(TypeId, BackendTag), Binding>,
    lists: HashMap<OpTag, PriorityList>,
    builtins: Option<DispatchConfig>,
}

impl RegistryBuilder {
    /// A builder with the declared priority lists and no bindings.
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            lists: PriorityList::defaults().map(|l| (l.op(), l)).collect(),
            builtins: None,
        }
    }

    /// A builder with no priority lists and no bindings.
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
            lists: HashMap::new(),
            builtins: None,
        }
    }

    /// Makes the evaluators this crate ships (see [`Operation::builtin`])
    /// available, tuned by `config`.
    pub fn with_builtins(&mut self, config: DispatchConfig) -> &mut Self {
        self.builtins = Some(config.sanitized());
        self
    }

    /// Registers `evaluator` as `backend`'s implementation of `Op`.
    ///
    /// # Errors
    /// [`Error::DuplicateBinding`] if `backend` already implements `Op` here,
    /// including through a builtin, or if `backend` is `generic`, which every
    /// signature provides itself.
    pub fn bind<Op, E>(&mut self, backend: BackendTag, evaluator: E) -> Result<&mut Self>
    where
        Op: Operation,
        E: Evaluator<Op> + 'static,
    {
        let key = (TypeId::of::<Op>(), backend);
        let builtin = self
            .builtins
            .is_some_and(|cfg| Op::builtin(backend, &cfg).is_some());
        if backend == BackendTag::Generic || builtin || self.bindings.contains_key(&key) {
            return Err(Error::DuplicateBinding {
                backend,
                signature: type_name::<Op>(),
            });
        }
        self.insert::<Op>(backend, Arc::new(evaluator));
        Ok(self)
    }

    pub(crate) fn insert<Op: Operation>(&mut self, backend: BackendTag, evaluator: Arc<dyn Evaluator<Op>>) {
        self.bindings.insert(
            (TypeId::of::<Op>(), backend),
            Binding {
                op: Op::TAG,
                signature: type_name::<Op>(),
                evaluator: Box::new(evaluator),
            },
        );
    }

    /// Gives `backend` the highest priority for `op`. An operation without a list
    /// gets `[backend, generic]`.
    pub fn prepend(&mut self, op: OpTag, backend: BackendTag) -> &mut Self {
        self.lists
            .entry(op)
            .or_insert_with(|| PriorityList::new(op, [BackendTag::Generic]))
            .prepend(backend);
        self
    }

    /// Replaces the list of `list.op()`.
    pub fn priority(&mut self, list: PriorityList) -> &mut Self {
        self.lists.insert(list.op(), list);
        self
    }

    /// Validates every priority list and builds the registry.
    ///
    /// # Errors
    /// [`Error::InvalidPriorityList`] for the first malformed list.
    pub fn build(self) -> Result<Registry> {
        let mut ops: Vec<_> = self.lists.keys().copied().collect();
        ops.sort_unstable();
        for op in ops {
            let list = &self.lists[&op];
            if list.validate().is_err() {
                let reason = list.defect().unwrap_or("validation failed");
                error!(%op, reason, "rejecting priority list");
                return Err(Error::InvalidPriorityList { op, reason });
            }
        }
        Ok(self.build_unchecked())
    }

    /// Builds the registry without validating the lists. Calls whose candidates
    /// all decline then fail with [`Error::NoApplicableBackend`].
    pub fn build_unchecked(self) -> Registry {
        for (&(_, backend), binding) in &self.bindings {
            let listed = self
                .lists
                .get(&binding.op)
                .is_some_and(|list| list.contains(backend));
            if !listed {
                warn!(
                    op = %binding.op,
                    %backend,
                    signature = binding.signature,
                    "binding is not reachable from the priority list"
                );
            }
        }
        Registry {
            bindings: self.bindings,
            lists: self.lists,
            builtins: self.builtins,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Candidate<Op: Operation> {
    backend: BackendTag,
    /// `None` runs `Op::generic`.
    evaluator: Option<Arc<dyn Evaluator<Op>>>,
}

/// Structurally eligible candidates for one signature, in priority order.
struct Resolution<Op: Operation> {
    candidates: Vec<Candidate<Op>>,
}

impl<Op: Operation> Resolution<Op> {
    fn tags(&self) -> Vec<BackendTag> {
        self.candidates.iter().map(|c| c.backend).collect()
    }
}

/// Bindings plus priority lists. Immutable once built; share it by reference.
pub struct Registry {
    bindings: HashMap<(TypeId, BackendTag), Binding>,
    lists: HashMap<OpTag, PriorityList>,
    builtins: Option<DispatchConfig>,
    cache: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Registry {
    /// The registry behind [`registry()`]: declared lists, builtins tuned by
    /// `config`, and the GPU bindings when the `wgpu` feature is on.
    pub fn standard(config: DispatchConfig) -> Self {
        let mut builder = RegistryBuilder::new();
        builder.with_builtins(config);
        #[cfg(feature = "wgpu")]
        crate::ops::wgpu::register(&mut builder, &config);
        debug!(?config, "standard registry created");
        builder.build_unchecked()
    }

    /// Re-runs list validation.
    ///
    /// # Errors
    /// [`Error::InvalidPriorityList`] for the first malformed list.
    pub fn check(&self) -> Result<()> {
        let mut ops: Vec<_> = self.lists.keys().copied().collect();
        ops.sort_unstable();
        for op in ops {
            if let Some(reason) = self.lists[&op].defect() {
                return Err(Error::InvalidPriorityList { op, reason });
            }
        }
        Ok(())
    }

    /// The priority list of `op`.
    pub fn priority_list(&self, op: OpTag) -> Option<&PriorityList> {
        self.lists.get(&op)
    }

    /// The builtin tuning, if builtins are enabled.
    pub fn builtins(&self) -> Option<&DispatchConfig> {
        self.builtins.as_ref()
    }

    /// Whether `backend` implements `Op` here, through a binding or a builtin.
    pub fn has_binding<Op: Operation>(&self, backend: BackendTag) -> bool {
        self.evaluator::<Op>(backend).is_some()
    }

    /// Runs `Op` on the first backend of its priority list that has a binding and
    /// accepts `args`.
    ///
    /// # Errors
    /// Whatever the chosen backend reports, or [`Error::NoApplicableBackend`] if
    /// every candidate declined.
    pub fn dispatch<Op: Operation>(&self, args: Op::Args<'_>) -> Result<Op::Output> {
        let resolution = self.resolution::<Op>();
        for candidate in &resolution.candidates {
            match &candidate.evaluator {
                None => {
                    trace!(op = %Op::TAG, backend = %candidate.backend, "selected");
                    return Op::generic(args);
                }
                Some(evaluator) => {
                    if evaluator.is_available(&args) {
                        trace!(op = %Op::TAG, backend = %candidate.backend, "selected");
                        return evaluator.execute(args);
                    }
                    trace!(op = %Op::TAG, backend = %candidate.backend, "declined");
                }
            }
        }

        let tried = resolution.tags();
        error!(
            op = %Op::TAG,
            signature = type_name::<Op>(),
            ?tried,
            "no backend accepted the call"
        );
        Err(Error::NoApplicableBackend { op: Op::TAG, tried })
    }

    /// The backend [`dispatch`](Self::dispatch) would run for `args`, probing but
    /// not executing.
    pub fn select<Op: Operation>(&self, args: &Op::Args<'_>) -> Option<BackendTag> {
        self.resolution::<Op>()
            .candidates
            .iter()
            .find(|c| c.evaluator.as_ref().is_none_or(|e| e.is_available(args)))
            .map(|c| c.backend)
    }

    /// Backends that have a binding for `Op`, in priority order, ending at the
    /// first `generic` entry.
    pub fn candidates<Op: Operation>(&self) -> Vec<BackendTag> {
        self.resolution::<Op>().tags()
    }

    /// Runs `Op` on `backend`, bypassing the priority list.
    ///
    /// # Errors
    /// [`Error::Unavailable`] if `backend` has no binding for `Op` or declines
    /// `args`; otherwise whatever the backend reports.
    pub fn dispatch_on<Op: Operation>(&self, backend: BackendTag, args: Op::Args<'_>) -> Result<Op::Output> {
        if backend == BackendTag::Generic {
            return Op::generic(args);
        }
        match self.evaluator::<Op>(backend) {
            Some(evaluator) if evaluator.is_available(&args) => evaluator.execute(args),
            _ => Err(Error::Unavailable { op: Op::TAG, backend }),
        }
    }

    fn evaluator<Op: Operation>(&self, backend: BackendTag) -> Option<Arc<dyn Evaluator<Op>>> {
        if backend == BackendTag::Generic {
            return None;
        }
        if let Some(binding) = self.bindings.get(&(TypeId::of::<Op>(), backend)) {
            return binding.get::<Op>().cloned();
        }
        self.builtins.as_ref().and_then(|cfg| Op::builtin(backend, cfg))
    }

    fn resolution<Op: Operation>(&self) -> Arc<Resolution<Op>> {
        let key = TypeId::of::<Op>();
        let hit = self.cache.read().get(&key).cloned();
        if let Some(hit) = hit {
            if let Ok(resolution) = hit.downcast::<Resolution<Op>>() {
                return resolution;
            }
        }

        let built = Arc::new(self.resolve::<Op>());
        let erased: Arc<dyn Any + Send + Sync> = built.clone();
        let stored = self.cache.write().entry(key).or_insert(erased).clone();
        stored.downcast::<Resolution<Op>>().unwrap_or(built)
    }

    fn resolve<Op: Operation>(&self) -> Resolution<Op> {
        let op = Op::TAG;
        let signature = type_name::<Op>();
        let mut candidates = Vec::new();

        match self.lists.get(&op) {
            Some(list) => {
                let mut backends = list.iter();
                for backend in backends.by_ref() {
                    if backend == BackendTag::Generic {
                        candidates.push(Candidate { backend, evaluator: None });
                        break;
                    }
                    if let Some(evaluator) = self.evaluator::<Op>(backend) {
                        candidates.push(Candidate {
                            backend,
                            evaluator: Some(evaluator),
                        });
                    }
                }
                let unreachable: Vec<_> = backends.collect();
                if !unreachable.is_empty() {
                    warn!(%op, signature, ?unreachable, "entries after `generic` are never tried");
                }
            }
            None => warn!(%op, signature, "no priority list"),
        }

        let resolution = Resolution { candidates };
        debug!(%op, signature, candidates = ?resolution.tags(), "resolved");
        resolution
    }
}

lazy_static::lazy_static! {
    static ref STANDARD: Registry = Registry::standard(DispatchConfig::from_env());
}

/// The process-wide standard registry, built on first use.
pub fn registry() -> &'static Registry {
    &STANDARD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{Dot, DotArgs};

    struct Declines;

    impl Evaluator<Dot<f64>> for Declines {
        fn is_available(&self, _args: &DotArgs<'_, f64>) -> bool {
            false
        }

        fn execute(&self, _args: DotArgs<'_, f64>) -> Result<f64> {
            unreachable!("probe declined")
        }
    }

    #[test]
    fn standard_lists_validate() {
        let registry = Registry::standard(DispatchConfig::default());
        assert!(registry.check().is_ok());
    }

    #[test]
    fn resolution_is_memoized_per_signature() {
        let registry = RegistryBuilder::new().build().unwrap();
        assert_eq!(registry.candidates::<Dot<f64>>(), [BackendTag::Generic]);
        assert_eq!(registry.cache.read().len(), 1);
        assert_eq!(registry.candidates::<Dot<f64>>(), [BackendTag::Generic]);
        assert_eq!(registry.candidates::<Dot<f32>>(), [BackendTag::Generic]);
        assert_eq!(registry.cache.read().len(), 2);
    }

    #[test]
    fn entries_after_generic_are_not_candidates() {
        let mut builder = RegistryBuilder::new();
        builder.bind::<Dot<f64>, _>(BackendTag::Blas, Declines).unwrap();
        builder.priority(PriorityList::new(
            OpTag::Dot,
            [BackendTag::Generic, BackendTag::Blas],
        ));
        let registry = builder.build_unchecked();
        assert!(registry.check().is_err());
        assert_eq!(registry.candidates::<Dot<f64>>(), [BackendTag::Generic]);
    }

    #[test]
    fn missing_list_has_no_candidates() {
        let registry = RegistryBuilder::empty().build().unwrap();
        let err = registry
            .dispatch::<Dot<f64>>(DotArgs { lhs: &[], rhs: &[] })
            .unwrap_err();
        assert!(err.is_configuration_defect());
    }
}
