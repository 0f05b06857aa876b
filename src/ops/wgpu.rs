//! GPU-accelerated reductions using WGPU.
//!
//! This module runs the additive `f32` reductions (sum, mean, sum of squares and
//! their magnitude variants) as a WGSL compute kernel. It handles GPU context
//! initialization, shader precompilation (via `lazy_static`), and the
//! upload/dispatch/readback cycle.
//!
//! The kernel writes one partial sum per workgroup; the partials are added on the
//! host in workgroup order, so a given input always produces the same result on
//! the same device. Results may differ from the CPU backends in the last bits.
//!
//! The bindings are registered under [`BackendTag::Wgpu`] by
//! [`Registry::standard`](crate::ops::Registry::standard). When no adapter is
//! found the evaluator declines every call and dispatch falls through to the
//! next backend.

use crate::backend::BackendTag;
use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::ops::{Evaluator, Reduce, ReduceArgs, RegistryBuilder};
use crate::reductions::functors::{
    MeanMagsqValue, MeanValue, SumMagsqValue, SumSqValue, SumValue,
};
use crate::reductions::{ReductionFunctor, ReductionKind};
use briny::prelude::{Validate, ValidationError};
use std::sync::Arc;
use std::sync::mpsc;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

const REDUCE: &str = include_str!("shaders/reduce.wgsl");

/// Invocations per workgroup, fixed by the shader.
const WORKGROUP: usize = 256;

/// Upper bound on dispatched workgroups; invocations stride over longer inputs.
const MAX_GROUPS: usize = 1024;

/// Failure to bring up the GPU.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// No suitable adapter.
    #[error("adapter error: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    /// The adapter refused to create a device.
    #[error("device error: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// Holds the WGPU device and queue used for executing compute pipelines.
///
/// Initialized once globally and reused for all reductions via `lazy_static`.
pub struct GpuContext {
    /// The actual GPU device.
    pub device: wgpu::Device,
    /// Submission queue of the device.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Selects the default adapter and creates a device and queue.
    ///
    /// Blocks on the asynchronous WGPU calls with `pollster`.
    pub fn new() -> core::result::Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("numkern"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))?;

        Ok(Self { device, queue })
    }
}

/// Wrapper for WGSL source that is checked before it reaches the driver.
pub struct WgslSource<'a>(pub &'a str);

impl Validate for WgslSource<'_> {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        let src = self.0;

        if src.len() > 65536 || !src.contains("fn main") {
            return Err(ValidationError);
        }

        // no source inclusion or escape hatches
        let forbidden = ["import", "#include", "asm", "unsafe", "ptr", "std::"];
        if forbidden.iter().any(|bad| src.contains(bad)) {
            return Err(ValidationError);
        }

        Ok(())
    }
}

/// Validates `source` and compiles it on `device`.
///
/// # Errors
/// [`Error::Computation`] if the source fails validation.
pub fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    WgslSource(source)
        .validate()
        .map_err(|_| Error::Computation(format!("shader `{label}` failed validation")))?;

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}

struct ReducePipeline {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl ReducePipeline {
    fn new(ctx: &GpuContext) -> Result<Self> {
        let device = &ctx.device;
        let shader = load_shader(device, "reduce", REDUCE)?;

        let buffer = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("reduce_bgl"),
            entries: &[
                buffer(0, wgpu::BufferBindingType::Uniform),
                buffer(1, wgpu::BufferBindingType::Storage { read_only: true }),
                buffer(2, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("reduce_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("reduce_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        Ok(Self { layout, pipeline })
    }
}

lazy_static::lazy_static! {
    static ref GPU_CONTEXT: Option<GpuContext> = match GpuContext::new() {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            warn!(%err, "GPU unavailable, `wgpu` backend disabled");
            None
        }
    };
    static ref REDUCE_PIPELINE: Option<ReducePipeline> = GPU_CONTEXT.as_ref().and_then(|ctx| {
        ReducePipeline::new(ctx)
            .inspect_err(|err| warn!(%err, "reduce pipeline unavailable"))
            .ok()
    });
}

/// Shader mode for a reduction kind: `0` sums elements, `1` sums their squares.
const fn shader_mode(kind: ReductionKind) -> Option<u32> {
    match kind {
        ReductionKind::Sum | ReductionKind::Mean => Some(0),
        ReductionKind::SumSq | ReductionKind::SumMagsq | ReductionKind::MeanMagsq => Some(1),
        _ => None,
    }
}

fn to_bytes<T: Copy, const N: usize>(values: &[T], bytes: impl Fn(T) -> [u8; N]) -> Vec<u8> {
    values.iter().flat_map(|&v| bytes(v)).collect()
}

/// Additive `f32` reduction on the GPU.
///
/// Construction brings the device up (once per process); the probe then only
/// compares the input length against bounds fixed at that point.
#[derive(Debug, Clone, Copy)]
pub struct GpuReduce {
    min_len: usize,
    max_len: usize,
}

impl GpuReduce {
    /// Tuned by `gpu_min_len`. Declines every input when no device or pipeline
    /// could be created.
    pub fn new(config: &DispatchConfig) -> Self {
        let max_len = match (GPU_CONTEXT.as_ref(), REDUCE_PIPELINE.as_ref()) {
            (Some(ctx), Some(_)) => {
                let limit = u64::from(ctx.device.limits().max_storage_buffer_binding_size) / 4;
                usize::try_from(limit.min(u64::from(u32::MAX))).unwrap_or(0)
            }
            _ => 0,
        };
        Self::with_bounds(config.gpu_min_len, max_len)
    }

    const fn with_bounds(min_len: usize, max_len: usize) -> Self {
        Self {
            min_len: if min_len == 0 { 1 } else { min_len },
            max_len,
        }
    }
}

impl<R> Evaluator<Reduce<R>> for GpuReduce
where
    R: ReductionFunctor<Item = f32, Accum = f32>,
{
    fn is_available(&self, args: &ReduceArgs<'_, R>) -> bool {
        let len = args.data.len();
        shader_mode(R::KIND).is_some() && (self.min_len..=self.max_len).contains(&len)
    }

    fn execute(&self, args: ReduceArgs<'_, R>) -> Result<R::Output> {
        let len = args.data.len();
        let (Some(ctx), Some(reduce)) = (GPU_CONTEXT.as_ref(), REDUCE_PIPELINE.as_ref()) else {
            return Err(Error::Allocation("no GPU context".into()));
        };
        let mode = shader_mode(R::KIND)
            .ok_or_else(|| Error::Computation(format!("no GPU kernel for {:?}", R::KIND)))?;
        let len32 = u32::try_from(len).map_err(|_| Error::Allocation("input exceeds u32 indexing".into()))?;
        let groups = len.div_ceil(WORKGROUP).clamp(1, MAX_GROUPS);
        let partial_bytes = (groups * 4) as u64;
        let device = &ctx.device;

        let params = [len32, mode, groups as u32, 0];
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("reduce_params"),
            contents: &to_bytes(&params, u32::to_ne_bytes),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let input_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("reduce_input"),
            contents: &to_bytes(args.data, f32::to_ne_bytes),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let partial_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reduce_partials"),
            size: partial_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reduce_staging"),
            size: partial_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("reduce_bind_group"),
            layout: &reduce.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: input_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: partial_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("reduce_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("reduce_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&reduce.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups as u32, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&partial_buf, 0, &staging, 0, partial_bytes);
        ctx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| Error::Computation(format!("device poll failed: {err}")))?;
        rx.recv()
            .map_err(|_| Error::Allocation("readback was dropped".into()))?
            .map_err(|err| Error::Allocation(format!("readback failed: {err}")))?;

        let total = {
            let view = slice.get_mapped_range();
            view.chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .fold(0.0f32, |acc, x| acc + x)
        };
        staging.unmap();

        debug!(len, groups, kind = ?R::KIND, "GPU reduction finished");
        Ok(args.functor.value(total, len))
    }
}

/// Binds [`GpuReduce`] for the `f32` reductions it has a kernel for.
pub(crate) fn register(builder: &mut RegistryBuilder, config: &DispatchConfig) {
    let eval = GpuReduce::new(config);
    builder.insert::<Reduce<SumValue<f32>>>(BackendTag::Wgpu, Arc::new(eval));
    builder.insert::<Reduce<MeanValue<f32>>>(BackendTag::Wgpu, Arc::new(eval));
    builder.insert::<Reduce<SumSqValue<f32>>>(BackendTag::Wgpu, Arc::new(eval));
    builder.insert::<Reduce<SumMagsqValue<f32>>>(BackendTag::Wgpu, Arc::new(eval));
    builder.insert::<Reduce<MeanMagsqValue<f32>>>(BackendTag::Wgpu, Arc::new(eval));
}
