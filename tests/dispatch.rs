use numkern::ops::cpu::ParallelDot;
use numkern::ops::{
    BlockCopy, CopyArgs, Dot, DotArgs, PriorityList, Reduce, ReduceArgs, Transpose,
};
use numkern::reductions::functors::SumValue;
use numkern::{
    BackendTag, DispatchConfig, Error, Evaluator, OpTag, Operation, RegistryBuilder, Result, matrix,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Sum = Reduce<SumValue<i64>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Accepts inputs of at least `min_len` elements and counts its runs.
struct Threshold {
    min_len: usize,
    runs: Arc<AtomicUsize>,
}

impl Evaluator<Sum> for Threshold {
    fn is_available(&self, args: &ReduceArgs<'_, SumValue<i64>>) -> bool {
        args.data.len() >= self.min_len
    }

    fn execute(&self, args: ReduceArgs<'_, SumValue<i64>>) -> Result<i64> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(args.data.iter().sum())
    }
}

struct Declines;

impl Evaluator<Dot<f64>> for Declines {
    fn is_available(&self, _args: &DotArgs<'_, f64>) -> bool {
        false
    }

    fn execute(&self, _args: DotArgs<'_, f64>) -> Result<f64> {
        unreachable!("probe declined")
    }
}

/// Accepts everything, then fails.
struct Broken;

impl Evaluator<Dot<f64>> for Broken {
    fn is_available(&self, _args: &DotArgs<'_, f64>) -> bool {
        true
    }

    fn execute(&self, _args: DotArgs<'_, f64>) -> Result<f64> {
        Err(Error::Computation("device lost".into()))
    }
}

#[test]
fn test_threshold_backend_selected_by_length() {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let mut builder = RegistryBuilder::new();
    builder
        .bind::<Sum, _>(
            BackendTag::User,
            Threshold {
                min_len: 16,
                runs: Arc::clone(&runs),
            },
        )
        .unwrap();
    builder.prepend(OpTag::Reduce, BackendTag::User);
    let registry = builder.build().unwrap();

    for len in 1..=32i64 {
        let data: Vec<i64> = (1..=len).collect();
        let args = ReduceArgs {
            functor: SumValue::<i64>::new(),
            data: &data,
        };
        let expected = if len >= 16 {
            BackendTag::User
        } else {
            BackendTag::Generic
        };
        assert_eq!(registry.select::<Sum>(&args), Some(expected), "len {len}");
        assert_eq!(registry.dispatch::<Sum>(args).unwrap(), len * (len + 1) / 2);
    }
    assert_eq!(runs.load(Ordering::Relaxed), 17);
}

#[test]
fn test_dispatch_is_deterministic() {
    let mut builder = RegistryBuilder::new();
    builder.bind::<Dot<f64>, _>(BackendTag::Blas, Declines).unwrap();
    let registry = builder.build().unwrap();

    let x = [1.0, 2.0, 3.0];
    let args = DotArgs { lhs: &x, rhs: &x };
    let first = (registry.select::<Dot<f64>>(&args), registry.dispatch::<Dot<f64>>(args).unwrap());
    for _ in 0..10 {
        let again = (registry.select::<Dot<f64>>(&args), registry.dispatch::<Dot<f64>>(args).unwrap());
        assert_eq!(again, first);
    }
    assert_eq!(first, (Some(BackendTag::Generic), 14.0));
}

#[test]
fn test_unsupported_signature_falls_through_to_generic() {
    let mut builder = RegistryBuilder::new();
    builder.bind::<Dot<f64>, _>(BackendTag::Blas, Broken).unwrap();
    let registry = builder.build().unwrap();

    assert_eq!(
        registry.candidates::<Dot<f64>>(),
        [BackendTag::Blas, BackendTag::Generic]
    );
    assert_eq!(registry.candidates::<Dot<f32>>(), [BackendTag::Generic]);
    let x = [2.0f32, 3.0];
    assert_eq!(
        registry
            .dispatch::<Dot<f32>>(DotArgs { lhs: &x, rhs: &x })
            .unwrap(),
        13.0
    );
}

#[test]
fn test_no_fallback_after_commit() {
    let mut builder = RegistryBuilder::new();
    builder.bind::<Dot<f64>, _>(BackendTag::Blas, Broken).unwrap();
    let registry = builder.build().unwrap();

    let x = [1.0];
    let err = registry
        .dispatch::<Dot<f64>>(DotArgs { lhs: &x, rhs: &x })
        .unwrap_err();
    assert!(matches!(err, Error::Computation(ref msg) if msg == "device lost"));
}

#[test]
fn test_no_applicable_backend_without_generic() {
    init_tracing();
    let mut builder = RegistryBuilder::new();
    builder.bind::<Dot<f64>, _>(BackendTag::User, Declines).unwrap();
    builder.priority(PriorityList::new(OpTag::Dot, [BackendTag::User]));
    let registry = builder.build_unchecked();

    let x = [1.0];
    let args = DotArgs { lhs: &x, rhs: &x };
    assert_eq!(registry.select::<Dot<f64>>(&args), None);
    match registry.dispatch::<Dot<f64>>(args) {
        Err(Error::NoApplicableBackend { op, tried }) => {
            assert_eq!(op, OpTag::Dot);
            assert_eq!(tried, [BackendTag::User]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_explicit_backend_override() {
    let mut builder = RegistryBuilder::new();
    builder.bind::<Dot<f64>, _>(BackendTag::Blas, Declines).unwrap();
    builder.bind::<Dot<f64>, _>(BackendTag::User, Broken).unwrap();
    let registry = builder.build().unwrap();

    let x = [1.0, 1.0];
    let args = DotArgs { lhs: &x, rhs: &x };
    assert_eq!(registry.dispatch_on::<Dot<f64>>(BackendTag::Generic, args).unwrap(), 2.0);
    assert!(matches!(
        registry.dispatch_on::<Dot<f64>>(BackendTag::Blas, args),
        Err(Error::Unavailable {
            backend: BackendTag::Blas,
            ..
        })
    ));
    assert!(matches!(
        registry.dispatch_on::<Dot<f64>>(BackendTag::Fftw, args),
        Err(Error::Unavailable { .. })
    ));
    // bound but not listed: still reachable by name
    assert!(registry.dispatch_on::<Dot<f64>>(BackendTag::User, args).unwrap_err().is_computation());
}

#[test]
fn test_duplicate_bindings_are_rejected() {
    let mut builder = RegistryBuilder::new();
    builder.bind::<Dot<f64>, _>(BackendTag::Blas, Declines).unwrap();
    let dup = builder.bind::<Dot<f64>, _>(BackendTag::Blas, Broken).err();
    assert!(matches!(
        dup,
        Some(Error::DuplicateBinding {
            backend: BackendTag::Blas,
            ..
        })
    ));
    assert!(builder.bind::<Dot<f64>, _>(BackendTag::Generic, Broken).is_err());

    builder.with_builtins(DispatchConfig::default());
    let shadowed = builder
        .bind::<Dot<f64>, _>(BackendTag::Parallel, ParallelDot::new(&DispatchConfig::default()))
        .err();
    assert!(shadowed.is_some_and(|err| err.is_configuration_defect()));
}

#[test]
fn test_invalid_priority_lists() {
    for (backends, reason) in [
        (vec![], "list is empty"),
        (vec![BackendTag::Blas], "list does not end in `generic`"),
        (
            vec![BackendTag::Blas, BackendTag::Blas, BackendTag::Generic],
            "backend listed more than once",
        ),
    ] {
        let mut builder = RegistryBuilder::new();
        builder.priority(PriorityList::new(OpTag::Fft, backends));
        match builder.build() {
            Err(Error::InvalidPriorityList { op, reason: got }) => {
                assert_eq!(op, OpTag::Fft);
                assert_eq!(got, reason);
            }
            Err(other) => panic!("unexpected {other}"),
            Ok(_) => panic!("accepted a malformed list"),
        }
    }
}

#[test]
fn test_builtins_follow_the_config() {
    let config = DispatchConfig {
        parallel_min_len: 0,
        transpose_min_len: 0,
        ..DispatchConfig::DEFAULT
    };
    let mut builder = RegistryBuilder::new();
    builder.with_builtins(config);
    let registry = builder.build().unwrap();

    let dot = registry.candidates::<Dot<f64>>();
    assert_eq!(dot.first(), Some(&BackendTag::Parallel));
    assert_eq!(dot.last(), Some(&BackendTag::Generic));
    assert!(registry.has_binding::<Dot<f64>>(BackendTag::Parallel));
    assert!(!registry.has_binding::<Dot<f64>>(BackendTag::Blas));

    let m = matrix![[1, 2, 3], [4, 5, 6]];
    assert_eq!(registry.select::<Transpose<i32>>(&&m), Some(BackendTag::Transpose));
    assert_eq!(
        registry.dispatch::<Transpose<i32>>(&m).unwrap(),
        Transpose::<i32>::generic(&m).unwrap()
    );

    let src = [1u8, 2, 3];
    let mut dst = [0u8; 3];
    let args = CopyArgs {
        src: &src,
        dst: &mut dst,
    };
    assert_eq!(registry.select::<BlockCopy<u8>>(&args), Some(BackendTag::Copy));
    registry.dispatch::<BlockCopy<u8>>(args).unwrap();
    assert_eq!(dst, src);

    // without builtins only generic remains
    let bare = RegistryBuilder::new().build().unwrap();
    assert_eq!(bare.candidates::<Transpose<i32>>(), [BackendTag::Generic]);
}

#[test]
fn test_standard_registry_is_well_formed() {
    let registry = numkern::registry();
    assert!(registry.check().is_ok());
    for op in OpTag::ALL {
        let list = registry.priority_list(op).unwrap();
        assert_eq!(list.backends().last(), Some(&BackendTag::Generic), "{op}");
    }
    assert!(registry.builtins().is_some());
}
