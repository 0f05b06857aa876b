//! Tunables for the built-in backends.
//!
//! Every threshold here is a *probe* input: it decides whether a built-in backend
//! accepts a call, never what the call computes. Chunk and tile sizes are local to
//! the backend that uses them; results only depend on the associativity of the
//! functor being folded.
//!
//! Overrides are read from the environment by [`DispatchConfig::from_env`]:
//!
//! | variable | field |
//! |---|---|
//! | `NUMKERN_PARALLEL_MIN_LEN` | [`parallel_min_len`](DispatchConfig::parallel_min_len) |
//! | `NUMKERN_PARALLEL_BLOCK_LEN` | [`parallel_block_len`](DispatchConfig::parallel_block_len) |
//! | `NUMKERN_SIMD_MIN_LEN` | [`simd_min_len`](DispatchConfig::simd_min_len) |
//! | `NUMKERN_GPU_MIN_LEN` | [`gpu_min_len`](DispatchConfig::gpu_min_len) |
//! | `NUMKERN_TRANSPOSE_MIN_LEN` | [`transpose_min_len`](DispatchConfig::transpose_min_len) |
//! | `NUMKERN_TRANSPOSE_TILE` | [`transpose_tile`](DispatchConfig::transpose_tile) |
//!
//! Empty or unparsable values are ignored.

/// Size thresholds and block lengths consulted by the built-in bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Shortest input the `parallel` backend accepts.
    pub parallel_min_len: usize,
    /// Elements per rayon work item. Always at least 1.
    pub parallel_block_len: usize,
    /// Shortest input the lane-blocked `simd` backend accepts.
    pub simd_min_len: usize,
    /// Shortest input the `wgpu` backend accepts.
    pub gpu_min_len: usize,
    /// Smallest element count for which the tiled transpose is used.
    pub transpose_min_len: usize,
    /// Edge length of a transpose tile. Always at least 1.
    pub transpose_tile: usize,
}

impl DispatchConfig {
    /// Built-in defaults.
    pub const DEFAULT: Self = Self {
        parallel_min_len: 1 << 15,
        parallel_block_len: 4096,
        simd_min_len: 16,
        gpu_min_len: 1 << 20,
        transpose_min_len: 64 * 64,
        transpose_tile: 32,
    };

    /// Defaults with `NUMKERN_*` environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults with overrides taken from `lookup`, which maps a variable name to
    /// its raw value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |name: &str| -> Option<usize> {
            let value = lookup(name)?;
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            value.parse::<usize>().ok()
        };

        let d = Self::DEFAULT;
        Self {
            parallel_min_len: parse("NUMKERN_PARALLEL_MIN_LEN").unwrap_or(d.parallel_min_len),
            parallel_block_len: parse("NUMKERN_PARALLEL_BLOCK_LEN").unwrap_or(d.parallel_block_len),
            simd_min_len: parse("NUMKERN_SIMD_MIN_LEN").unwrap_or(d.simd_min_len),
            gpu_min_len: parse("NUMKERN_GPU_MIN_LEN").unwrap_or(d.gpu_min_len),
            transpose_min_len: parse("NUMKERN_TRANSPOSE_MIN_LEN").unwrap_or(d.transpose_min_len),
            transpose_tile: parse("NUMKERN_TRANSPOSE_TILE").unwrap_or(d.transpose_tile),
        }
        .sanitized()
    }

    /// Clamps block and tile sizes to at least one element.
    #[must_use]
    pub const fn sanitized(mut self) -> Self {
        if self.parallel_block_len == 0 {
            self.parallel_block_len = 1;
        }
        if self.transpose_tile == 0 {
            self.transpose_tile = 1;
        }
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
