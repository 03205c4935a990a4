//! # Partition Strategies
//!
//! Split the flat index domain `[0, M*N*P)` into disjoint units that cover it
//! exactly once.
//!
//! - **Flat**: `W` contiguous ranges of `total / W` cells, the remainder going
//!   to the last range. `W` is clamped to `total` so no range is empty.
//! - **Tiles**: rectangles of `(i, j)` rows, each row spanning the full `k`
//!   extent. Rows inside a tile are contiguous in memory; tiles are not.
//! - **Halving**: bisect a range until it is at most `leaf` cells long.
//!
//! Tile shape and leaf threshold change throughput only, never the result.

use crate::extrema::search::ExtremaError;
use crate::utilities::volume::Dims;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Half-open range of flat indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlatRange {
    pub start: usize,
    pub end: usize,
}

impl FlatRange {
    #[inline(always)]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[inline(always)]
    pub fn split_mid(&self) -> (FlatRange, FlatRange) {
        let mid = self.start + self.len() / 2;
        (FlatRange::new(self.start, mid), FlatRange::new(mid, self.end))
    }

    #[inline(always)]
    pub fn slice<'a>(&self, data: &'a [i32]) -> &'a [i32] {
        &data[self.start..self.end]
    }
}

pub fn flat_split(total: usize, workers: usize) -> Vec<FlatRange> {
    if total == 0 {
        return Vec::new();
    }
    let w = workers.clamp(1, total);
    let chunk = total / w;
    (0..w)
        .map(|t| {
            let start = t * chunk;
            let end = if t == w - 1 { total } else { start + chunk };
            FlatRange::new(start, end)
        })
        .collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileShape {
    pub ti: usize,
    pub tj: usize,
}

impl Default for TileShape {
    fn default() -> Self {
        // 8 * 8 rows of 500 ints is ~125 KiB, half of a 256 KiB L2.
        Self { ti: 8, tj: 8 }
    }
}

impl TileShape {
    pub const fn new(ti: usize, tj: usize) -> Self {
        Self { ti, tj }
    }

    /// Square tile whose rows fit in `cache_bytes`.
    pub fn for_cache(dims: Dims, cache_bytes: usize) -> Self {
        let cells = cache_bytes / std::mem::size_of::<i32>();
        let rows = (cells / dims.p.max(1)).max(1);
        let side = ((rows as f64).sqrt() as usize).max(1);
        Self {
            ti: side.min(dims.m.max(1)),
            tj: side.min(dims.n.max(1)),
        }
    }

    pub fn validate(&self) -> Result<(), ExtremaError> {
        if self.ti == 0 || self.tj == 0 {
            return Err(ExtremaError::InvalidTileShape {
                ti: self.ti,
                tj: self.tj,
            });
        }
        Ok(())
    }
}

/// `i0..i1` × `j0..j1` rows, each covering `k` in `0..P`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    pub i0: usize,
    pub i1: usize,
    pub j0: usize,
    pub j1: usize,
}

impl Tile {
    #[inline(always)]
    pub const fn row_count(&self) -> usize {
        (self.i1 - self.i0) * (self.j1 - self.j0)
    }

    #[inline(always)]
    pub const fn cells(&self, dims: Dims) -> usize {
        self.row_count() * dims.p
    }

    /// Rows in scan order (`i` outer, `j` inner), as flat ranges.
    pub fn rows(&self, dims: Dims) -> impl Iterator<Item = FlatRange> + '_ {
        let p = dims.p;
        (self.i0..self.i1).flat_map(move |i| {
            (self.j0..self.j1).map(move |j| {
                let start = dims.row_start(i, j);
                FlatRange::new(start, start + p)
            })
        })
    }
}

pub fn tile_split(dims: Dims, shape: TileShape) -> Vec<Tile> {
    let ti = shape.ti.max(1);
    let tj = shape.tj.max(1);
    let ni = dims.m.div_ceil(ti);
    let nj = dims.n.div_ceil(tj);

    let mut tiles = Vec::with_capacity(ni * nj);
    for a in 0..ni {
        for b in 0..nj {
            let i0 = a * ti;
            let j0 = b * tj;
            tiles.push(Tile {
                i0,
                i1: (i0 + ti).min(dims.m),
                j0,
                j1: (j0 + tj).min(dims.n),
            });
        }
    }
    tiles
}

/// Leaves of the recursive-halving tree over `range`, left to right.
pub fn halving_leaves(range: FlatRange, leaf: usize) -> Vec<FlatRange> {
    let leaf = leaf.max(1);
    let mut out = Vec::new();
    let mut stack = vec![range];
    while let Some(r) = stack.pop() {
        if r.len() <= leaf {
            out.push(r);
        } else {
            let (lo, hi) = r.split_mid();
            stack.push(hi);
            stack.push(lo);
        }
    }
    out
}

/// Check that `units` are non-empty, pairwise disjoint and cover `[0, total)`.
pub fn validate_ranges(units: &[FlatRange], total: usize) -> Result<(), ExtremaError> {
    if let Some(index) = units.iter().position(|r| r.is_empty()) {
        return Err(ExtremaError::EmptyPartition { index });
    }

    let mut sorted: Vec<FlatRange> = units.to_vec();
    sorted.sort_unstable_by_key(|r| r.start);

    let mut covered = 0usize;
    for r in &sorted {
        if r.start != covered {
            return Err(ExtremaError::PartitionMismatch { covered, total });
        }
        covered = r.end;
    }
    if covered != total {
        return Err(ExtremaError::PartitionMismatch { covered, total });
    }
    Ok(())
}

pub fn validate_tiles(tiles: &[Tile], dims: Dims) -> Result<(), ExtremaError> {
    if let Some(index) = tiles.iter().position(|t| t.row_count() == 0) {
        return Err(ExtremaError::EmptyPartition { index });
    }
    let rows: Vec<FlatRange> = tiles.iter().flat_map(|t| t.rows(dims)).collect();
    validate_ranges(&rows, dims.len())
}
