//! # Extremum Records
//!
//! A record is a `(value, location)` pair where `location` is a flat index.
//! The min side orders records by value ascending and breaks value ties by
//! the smaller location; the max side orders by value descending with the
//! same location tie-break. Under that total order [`Extremum::combine_min`]
//! and [`Extremum::combine_max`] are associative, commutative and
//! idempotent, so every reduction topology (serial chain, pairwise rounds,
//! task tree) produces the same record.
//!
//! ## Seeds
//! - `MIN_SEED` is `(i32::MAX, usize::MAX)` and `MAX_SEED` is
//!   `(i32::MIN, usize::MAX)`. Because no real cell sits at `usize::MAX`,
//!   each seed is an exact identity of its combine operator: a seed never
//!   wins against a real record, even one holding `i32::MAX`/`i32::MIN`.
//! - A seed surviving into a search result means nothing was scanned; the
//!   driver treats that as an internal error.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Extremum {
    pub value: i32,
    pub location: usize,
}

impl Extremum {
    pub const MIN_SEED: Extremum = Extremum {
        value: i32::MAX,
        location: usize::MAX,
    };
    pub const MAX_SEED: Extremum = Extremum {
        value: i32::MIN,
        location: usize::MAX,
    };

    #[inline(always)]
    pub const fn new(value: i32, location: usize) -> Self {
        Self { value, location }
    }

    #[inline(always)]
    pub const fn is_seed(&self) -> bool {
        self.location == usize::MAX
    }

    #[inline(always)]
    pub fn combine_min(self, other: Self) -> Self {
        if other.value < self.value || (other.value == self.value && other.location < self.location) {
            other
        } else {
            self
        }
    }

    #[inline(always)]
    pub fn combine_max(self, other: Self) -> Self {
        if other.value > self.value || (other.value == self.value && other.location < self.location) {
            other
        } else {
            self
        }
    }
}

/// Paired min and max records for one scanned region.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MinMax {
    pub min: Extremum,
    pub max: Extremum,
}

impl Default for MinMax {
    fn default() -> Self {
        Self::SEED
    }
}

impl MinMax {
    pub const SEED: MinMax = MinMax {
        min: Extremum::MIN_SEED,
        max: Extremum::MAX_SEED,
    };

    /// Both sides seeded from a single observed cell.
    #[inline(always)]
    pub const fn at(value: i32, location: usize) -> Self {
        Self {
            min: Extremum::new(value, location),
            max: Extremum::new(value, location),
        }
    }

    #[inline(always)]
    pub fn combine(self, other: Self) -> Self {
        Self {
            min: self.min.combine_min(other.min),
            max: self.max.combine_max(other.max),
        }
    }

    #[inline(always)]
    pub const fn is_seed(&self) -> bool {
        self.min.is_seed() || self.max.is_seed()
    }
}
