//! Deterministic volume fill with planted extrema.
//!
//! Values are uniform in `[0, 99_999]`. A unique minimum (`-1`) is planted
//! at `(M-1, N-1, P-1)` and a unique maximum (`100_000`) at
//! `(M/2, N/2, P/2)`, so a correct search has exactly one answer on each
//! side. When both land on the same cell (a 1×1×1 volume) the maximum wins.
//!
//! Each `i`-plane draws from its own `ChaCha8Rng` seeded from the base seed
//! and the plane index, so the fill is identical for any rayon pool size.

use crate::extrema::search::ExtremaError;
use crate::utilities::volume::{Coord, Dims, Volume};
use aligned_vec::{AVec, CACHELINE_ALIGN};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_EXTENT: usize = 500;
pub const FILL_MAX: i32 = 99_999;
pub const PLANTED_MIN: i32 = -1;
pub const PLANTED_MAX: i32 = 100_000;

/// Where the generator plants its sentinels for `dims`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlantedExtrema {
    pub min_at: Coord,
    pub max_at: Coord,
}

impl PlantedExtrema {
    pub fn for_dims(dims: Dims) -> Self {
        Self {
            min_at: Coord::new(dims.m - 1, dims.n - 1, dims.p - 1),
            max_at: Coord::new(dims.m / 2, dims.n / 2, dims.p / 2),
        }
    }
}

/// Fill `dims` from `seed` without planting anything.
pub fn random_volume(dims: Dims, seed: u64) -> Result<Volume, ExtremaError> {
    dims.validate()?;
    let plane = dims.plane();
    let mut data: AVec<i32> = AVec::with_capacity(CACHELINE_ALIGN, dims.len());
    for _ in 0..dims.len() {
        data.push(0);
    }

    data.par_chunks_mut(plane)
        .enumerate()
        .for_each(|(i, slab)| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
            for v in slab.iter_mut() {
                *v = rng.gen_range(0..=FILL_MAX);
            }
        });

    Volume::from_avec(dims, data)
}

/// Seeded fill with the unique minimum and maximum planted.
pub fn generate_volume(dims: Dims, seed: u64) -> Result<(Volume, PlantedExtrema), ExtremaError> {
    let mut volume = random_volume(dims, seed)?;
    let planted = PlantedExtrema::for_dims(dims);
    volume.set(planted.min_at, PLANTED_MIN);
    volume.set(planted.max_at, PLANTED_MAX);
    Ok((volume, planted))
}

/// The 500×500×500 reference volume with seed 42.
pub fn default_volume() -> Result<(Volume, PlantedExtrema), ExtremaError> {
    let dims = Dims::new(DEFAULT_EXTENT, DEFAULT_EXTENT, DEFAULT_EXTENT)?;
    generate_volume(dims, DEFAULT_SEED)
}
