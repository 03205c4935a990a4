//! # Extrema Search (Driver)
//!
//! Finds the global minimum and maximum of a dense 3D volume together with
//! their flat locations, in parallel.
//!
//! ## Parameters
//! - **workers**: logical worker count, i.e. flat ranges per search (defaults
//!   to the current rayon thread count)
//! - **strategy**: partition + merge combination (defaults to `Tiled(Tree)`)
//! - **tile**: `(i, j)` tile shape for tiled strategies (defaults to 8×8)
//! - **leaf_threshold**: task-tree leaf size in cells (defaults to 65 536)
//!
//! ## Returns
//! - **`Ok(ExtremaOutput)`** with one min and one max record.
//! - **`Err(ExtremaError)`** on invalid input, unsupported kernel or a
//!   failed worker. A partially scanned volume is never reported.
//!
//! ## Developer Notes
//! - Value ties resolve to the smallest flat index on both sides, so the
//!   output is identical across worker counts, strategies and kernels, and
//!   `workers = 1` matches a plain sequential scan.
//! - Partition coverage is re-checked in debug builds before dispatch.
//! - `workers` sets the partition count. The pool behind it never holds
//!   more threads than there are cells or host threads, so a huge worker
//!   count costs partitions, not OS threads.
//! - Min and max always come out of the same pass over each unit; there is
//!   no mode that runs them as two separate tasks over the volume.
//! - Worker panics are caught at the pool boundary and reported as
//!   `WorkerFailure`; the shared accumulator of the locked merge is never
//!   read after a poisoning.

use crate::extrema::merge::{merge_locked, merge_task_tree, merge_tree};
use crate::extrema::partition::{
    flat_split, halving_leaves, tile_split, validate_ranges, validate_tiles, FlatRange, Tile,
    TileShape,
};
use crate::extrema::record::{Extremum, MinMax};
use crate::extrema::scan::{scan_tile, LocalScanner};
use crate::utilities::enums::Kernel;
use crate::utilities::helpers::{detect_best_kernel, kernel_supported};
use crate::utilities::volume::{Coord, Dims, Volume};
use log::{debug, warn};
use rayon::ThreadPoolBuilder;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

pub const DEFAULT_LEAF_THRESHOLD: usize = 65_536;

// --- DATA TYPES ---

/// How partial records are merged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Merge {
    /// Private accumulation, then one `Mutex`-guarded fold per worker.
    Locked,
    /// Private accumulation, then pairwise rounds.
    Tree,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strategy {
    /// One scan over the whole volume on the calling thread.
    Sequential,
    /// One contiguous range per worker.
    Flat(Merge),
    /// Cache-sized `(i, j)` tiles spanning full depth.
    Tiled(Merge),
    /// Recursive halving with `rayon::join` at every split.
    TaskTree,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Tiled(Merge::Tree)
    }
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::Sequential,
        Strategy::Flat(Merge::Locked),
        Strategy::Flat(Merge::Tree),
        Strategy::Tiled(Merge::Locked),
        Strategy::Tiled(Merge::Tree),
        Strategy::TaskTree,
    ];
}

#[derive(Debug, Clone)]
pub enum ExtremaData<'a> {
    Volume(&'a Volume),
    Slice { data: &'a [i32], dims: Dims },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtremaParams {
    pub workers: Option<usize>,
    pub strategy: Option<Strategy>,
    pub tile: Option<TileShape>,
    pub leaf_threshold: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExtremaInput<'a> {
    pub data: ExtremaData<'a>,
    pub params: ExtremaParams,
}

impl<'a> ExtremaInput<'a> {
    pub fn from_volume(volume: &'a Volume, params: ExtremaParams) -> Self {
        Self {
            data: ExtremaData::Volume(volume),
            params,
        }
    }
    pub fn from_slice(data: &'a [i32], dims: Dims, params: ExtremaParams) -> Self {
        Self {
            data: ExtremaData::Slice { data, dims },
            params,
        }
    }
    pub fn with_default_volume(volume: &'a Volume) -> Self {
        Self::from_volume(volume, ExtremaParams::default())
    }
    pub fn get_workers(&self) -> usize {
        self.params
            .workers
            .unwrap_or_else(rayon::current_num_threads)
    }
    pub fn get_strategy(&self) -> Strategy {
        self.params.strategy.unwrap_or_default()
    }
    pub fn get_tile(&self) -> TileShape {
        self.params.tile.unwrap_or_default()
    }
    pub fn get_leaf_threshold(&self) -> usize {
        self.params.leaf_threshold.unwrap_or(DEFAULT_LEAF_THRESHOLD)
    }

    fn as_parts(&self) -> (&'a [i32], Dims) {
        match &self.data {
            ExtremaData::Volume(v) => (v.as_slice(), v.dims()),
            ExtremaData::Slice { data, dims } => (*data, *dims),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtremaOutput {
    pub min: Extremum,
    pub max: Extremum,
    pub dims: Dims,
}

impl ExtremaOutput {
    pub fn min_coord(&self) -> Coord {
        self.dims.unflatten(self.min.location)
    }
    pub fn max_coord(&self) -> Coord {
        self.dims.unflatten(self.max.location)
    }
    /// `(min_value, min_location, max_value, max_location)`.
    pub fn as_tuple(&self) -> (i32, usize, i32, usize) {
        (
            self.min.value,
            self.min.location,
            self.max.value,
            self.max.location,
        )
    }
}

// --- BUILDER ---

#[derive(Copy, Clone, Debug, Default)]
pub struct ExtremaBuilder {
    workers: Option<usize>,
    strategy: Option<Strategy>,
    tile: Option<TileShape>,
    leaf_threshold: Option<usize>,
    kernel: Kernel,
}

impl ExtremaBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }
    pub fn strategy(mut self, s: Strategy) -> Self {
        self.strategy = Some(s);
        self
    }
    pub fn tile(mut self, shape: TileShape) -> Self {
        self.tile = Some(shape);
        self
    }
    pub fn leaf_threshold(mut self, cells: usize) -> Self {
        self.leaf_threshold = Some(cells);
        self
    }
    pub fn kernel(mut self, k: Kernel) -> Self {
        self.kernel = k;
        self
    }
    fn params(&self) -> ExtremaParams {
        ExtremaParams {
            workers: self.workers,
            strategy: self.strategy,
            tile: self.tile,
            leaf_threshold: self.leaf_threshold,
        }
    }
    pub fn apply(self, volume: &Volume) -> Result<ExtremaOutput, ExtremaError> {
        let input = ExtremaInput::from_volume(volume, self.params());
        extrema_with_kernel(&input, self.kernel)
    }
    pub fn apply_slice(self, data: &[i32], dims: Dims) -> Result<ExtremaOutput, ExtremaError> {
        let input = ExtremaInput::from_slice(data, dims, self.params());
        extrema_with_kernel(&input, self.kernel)
    }
}

// --- ERRORS ---

#[derive(Debug, Error)]
pub enum ExtremaError {
    #[error("extrema: Invalid dimensions: m = {m}, n = {n}, p = {p}")]
    InvalidDimensions { m: usize, n: usize, p: usize },
    #[error("extrema: Data length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("extrema: Invalid worker count: {0}")]
    InvalidWorkers(usize),
    #[error("extrema: Invalid tile shape: ti = {ti}, tj = {tj}")]
    InvalidTileShape { ti: usize, tj: usize },
    #[error("extrema: Invalid leaf threshold: {0}")]
    InvalidLeafThreshold(usize),
    #[error("extrema: Kernel {0:?} is not supported on this CPU or build")]
    UnsupportedKernel(Kernel),
    #[error("extrema: Partition unit {index} is empty")]
    EmptyPartition { index: usize },
    #[error("extrema: Partition covers {covered} of {total} cells")]
    PartitionMismatch { covered: usize, total: usize },
    #[error("extrema: Worker failed: {reason}")]
    WorkerFailure { reason: String },
    #[error("extrema: Could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// --- KERNEL API ---

#[inline]
pub fn extrema(input: &ExtremaInput) -> Result<ExtremaOutput, ExtremaError> {
    extrema_with_kernel(input, Kernel::Auto)
}

/// `(data, dims, workers)` entry point with default strategy and kernel.
pub fn search(data: &[i32], dims: Dims, workers: usize) -> Result<ExtremaOutput, ExtremaError> {
    ExtremaBuilder::new().workers(workers).apply_slice(data, dims)
}

pub fn resolve_kernel(kernel: Kernel) -> Result<Kernel, ExtremaError> {
    match kernel {
        Kernel::Auto => Ok(detect_best_kernel()),
        k if kernel_supported(k) => Ok(k),
        k => Err(ExtremaError::UnsupportedKernel(k)),
    }
}

pub fn extrema_with_kernel(
    input: &ExtremaInput,
    kernel: Kernel,
) -> Result<ExtremaOutput, ExtremaError> {
    let chosen = resolve_kernel(kernel)?;
    debug!("extrema: kernel {:?} resolved to {:?}", kernel, chosen);
    extrema_with_scanner(input, &chosen)
}

/// Run the search with a caller-supplied scanner.
pub fn extrema_with_scanner<S: LocalScanner>(
    input: &ExtremaInput,
    scanner: &S,
) -> Result<ExtremaOutput, ExtremaError> {
    let (data, dims) = input.as_parts();
    dims.validate()?;
    if data.len() != dims.len() {
        return Err(ExtremaError::LengthMismatch {
            expected: dims.len(),
            got: data.len(),
        });
    }

    let workers = input.get_workers();
    if workers == 0 {
        return Err(ExtremaError::InvalidWorkers(workers));
    }
    let strategy = input.get_strategy();
    let tile = input.get_tile();
    tile.validate()?;
    let leaf = input.get_leaf_threshold();
    if leaf == 0 {
        return Err(ExtremaError::InvalidLeafThreshold(leaf));
    }

    debug!(
        "extrema: dims={}x{}x{} strategy={:?} workers={}",
        dims.m, dims.n, dims.p, strategy, workers
    );

    let run = || dispatch(scanner, data, dims, strategy, workers, tile, leaf);
    let outcome = if strategy == Strategy::Sequential {
        panic::catch_unwind(AssertUnwindSafe(run))
    } else {
        let threads = pool_threads(workers, dims.len());
        if threads < workers {
            debug!("extrema: {} workers share a pool of {} threads", workers, threads);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("extrema-worker-{i}"))
            .build()?;
        panic::catch_unwind(AssertUnwindSafe(|| pool.install(run)))
    };

    let found = match outcome {
        Ok(result) => result?,
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            warn!("extrema: worker panicked, discarding partial result: {}", reason);
            return Err(ExtremaError::WorkerFailure { reason });
        }
    };

    if found.is_seed() {
        return Err(ExtremaError::EmptyPartition { index: 0 });
    }
    debug_assert_eq!(data[found.min.location], found.min.value);
    debug_assert_eq!(data[found.max.location], found.max.value);

    Ok(ExtremaOutput {
        min: found.min,
        max: found.max,
        dims,
    })
}

fn dispatch<S: LocalScanner>(
    scanner: &S,
    data: &[i32],
    dims: Dims,
    strategy: Strategy,
    workers: usize,
    tile: TileShape,
    leaf: usize,
) -> Result<MinMax, ExtremaError> {
    let total = dims.len();
    match strategy {
        Strategy::Sequential => Ok(scanner.scan(data, 0)),
        Strategy::Flat(merge) => {
            let units = flat_split(total, workers);
            if cfg!(debug_assertions) {
                validate_ranges(&units, total)?;
            }
            debug!("extrema: flat split into {} ranges", units.len());
            let scan = |r: &FlatRange| scanner.scan(r.slice(data), r.start);
            match merge {
                Merge::Locked => merge_locked(&units, scan),
                Merge::Tree => Ok(merge_tree(&units, scan)),
            }
        }
        Strategy::Tiled(merge) => {
            let tiles = tile_split(dims, tile);
            if cfg!(debug_assertions) {
                validate_tiles(&tiles, dims)?;
            }
            debug!(
                "extrema: {} tiles of {}x{} rows",
                tiles.len(),
                tile.ti,
                tile.tj
            );
            let scan = |t: &Tile| scan_tile(scanner, data, dims, t);
            match merge {
                Merge::Locked => merge_locked(&tiles, scan),
                Merge::Tree => Ok(merge_tree(&tiles, scan)),
            }
        }
        Strategy::TaskTree => {
            let root = FlatRange::new(0, total);
            if cfg!(debug_assertions) {
                validate_ranges(&halving_leaves(root, leaf), total)?;
            }
            let scan = |r: FlatRange| scanner.scan(r.slice(data), r.start);
            Ok(merge_task_tree(root, leaf, &scan))
        }
    }
}

/// Threads actually spawned for `workers` logical workers. Partitioning still
/// uses the full worker count; only the OS threads are bounded, by the cell
/// count and by the parallelism the host reports.
fn pool_threads(workers: usize, cells: usize) -> usize {
    let host = std::thread::available_parallelism().map_or(1, |n| n.get());
    workers.min(cells).min(host).max(1)
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
