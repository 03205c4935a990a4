//! Dense 3D volume storage and index arithmetic.
//!
//! Cells are laid out row-major with `k` fastest: the flat index of
//! `(i, j, k)` is `i*N*P + j*P + k`. Each `(i, j)` pair therefore owns one
//! contiguous row of `P` cells, which is what the tile partitioner walks.

use crate::extrema::search::ExtremaError;
use aligned_vec::{AVec, CACHELINE_ALIGN};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dims {
    pub m: usize,
    pub n: usize,
    pub p: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coord {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl Dims {
    /// Validated dimensions. Rejects zero extents and element counts that
    /// overflow `usize`.
    pub fn new(m: usize, n: usize, p: usize) -> Result<Self, ExtremaError> {
        let dims = Self { m, n, p };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> Result<(), ExtremaError> {
        let invalid = || ExtremaError::InvalidDimensions {
            m: self.m,
            n: self.n,
            p: self.p,
        };
        if self.m == 0 || self.n == 0 || self.p == 0 {
            return Err(invalid());
        }
        self.m
            .checked_mul(self.n)
            .and_then(|mn| mn.checked_mul(self.p))
            .ok_or_else(invalid)?;
        Ok(())
    }

    /// Total cell count. Only meaningful on validated dimensions.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.m * self.n * self.p
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub const fn plane(&self) -> usize {
        self.n * self.p
    }

    #[inline(always)]
    pub const fn flatten(&self, c: Coord) -> usize {
        c.i * self.n * self.p + c.j * self.p + c.k
    }

    #[inline(always)]
    pub const fn unflatten(&self, idx: usize) -> Coord {
        let plane = self.n * self.p;
        Coord {
            i: idx / plane,
            j: (idx % plane) / self.p,
            k: idx % self.p,
        }
    }

    /// Flat index of the first cell of row `(i, j)`.
    #[inline(always)]
    pub const fn row_start(&self, i: usize, j: usize) -> usize {
        i * self.n * self.p + j * self.p
    }
}

impl Coord {
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }
}

impl From<(usize, usize, usize)> for Coord {
    fn from((i, j, k): (usize, usize, usize)) -> Self {
        Self { i, j, k }
    }
}

/// Immutable dense volume backed by cache-line aligned storage.
#[derive(Debug, Clone)]
pub struct Volume {
    dims: Dims,
    data: AVec<i32>,
}

impl Volume {
    pub fn from_slice(dims: Dims, data: &[i32]) -> Result<Self, ExtremaError> {
        dims.validate()?;
        if data.len() != dims.len() {
            return Err(ExtremaError::LengthMismatch {
                expected: dims.len(),
                got: data.len(),
            });
        }
        Ok(Self {
            dims,
            data: AVec::from_slice(CACHELINE_ALIGN, data),
        })
    }

    pub fn filled(dims: Dims, value: i32) -> Result<Self, ExtremaError> {
        dims.validate()?;
        let mut data: AVec<i32> = AVec::with_capacity(CACHELINE_ALIGN, dims.len());
        for _ in 0..dims.len() {
            data.push(value);
        }
        Ok(Self { dims, data })
    }

    /// Build a volume by evaluating `f` at every coordinate in flat order.
    pub fn from_fn<F>(dims: Dims, mut f: F) -> Result<Self, ExtremaError>
    where
        F: FnMut(Coord) -> i32,
    {
        dims.validate()?;
        let mut data: AVec<i32> = AVec::with_capacity(CACHELINE_ALIGN, dims.len());
        for idx in 0..dims.len() {
            data.push(f(dims.unflatten(idx)));
        }
        Ok(Self { dims, data })
    }

    /// Take ownership of an already aligned buffer.
    pub(crate) fn from_avec(dims: Dims, data: AVec<i32>) -> Result<Self, ExtremaError> {
        dims.validate()?;
        if data.len() != dims.len() {
            return Err(ExtremaError::LengthMismatch {
                expected: dims.len(),
                got: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    #[inline(always)]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    #[inline(always)]
    pub fn get(&self, c: Coord) -> Option<i32> {
        if c.i < self.dims.m && c.j < self.dims.n && c.k < self.dims.p {
            Some(self.data[self.dims.flatten(c)])
        } else {
            None
        }
    }

    /// Overwrite one cell. Only used while a volume is being prepared; a
    /// search borrows the volume immutably.
    pub fn set(&mut self, c: Coord, value: i32) -> Option<i32> {
        if c.i < self.dims.m && c.j < self.dims.n && c.k < self.dims.p {
            let idx = self.dims.flatten(c);
            Some(std::mem::replace(&mut self.data[idx], value))
        } else {
            None
        }
    }
}
