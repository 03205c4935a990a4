//! # Local Scanners
//!
//! Sequential min+max scans of one contiguous run of cells. Every variant
//! returns exactly what a plain front-to-back scan with strict comparisons
//! would: the smallest/largest value, located at its first occurrence.
//!
//! ## Kernels
//! - **Scalar**: branch per comparison; the reference semantics.
//! - **Branchless**: the same comparisons turned into all-ones/all-zeros
//!   masks, selecting value and location together with `and`/`or`.
//! - **Portable**: 8 fixed lanes held in arrays. Each lane keeps its own
//!   running record and the block index where it was found; a horizontal
//!   reduction rebuilds flat indices and applies the value-then-location
//!   tie-break. Written so LLVM can vectorise it on any target.
//! - **Avx2** / **Avx512**: the lane scheme with `cmpgt` + blend
//!   intrinsics on 8 / 16 `i32` lanes. Block counters live in `i32` lanes,
//!   so input is processed in segments of at most `i32::MAX` blocks.
//!
//! Elements that do not fill a whole block go through the scalar path and
//! are folded in with the combine operator; they always sit after the
//! vector body, so first-occurrence order is preserved.
//!
//! ## Invariants
//! - The input slice is never written.
//! - An empty slice yields [`MinMax::SEED`]; partitioners never emit one.

use crate::extrema::partition::Tile;
use crate::extrema::record::{Extremum, MinMax};
use crate::utilities::enums::Kernel;
use crate::utilities::helpers::{detect_best_kernel, kernel_supported, prefetch_read};
use crate::utilities::volume::Dims;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

pub const PORTABLE_LANES: usize = 8;

/// Anything that can produce the min+max record of one contiguous run.
///
/// Every partition and merge strategy is written against this trait, so a
/// single correctness suite covers all scanners.
pub trait LocalScanner: Sync {
    fn scan(&self, data: &[i32], base: usize) -> MinMax;
}

impl LocalScanner for Kernel {
    #[inline]
    fn scan(&self, data: &[i32], base: usize) -> MinMax {
        scan_with_kernel(data, base, *self)
    }
}

/// Walk a tile row by row, keeping one accumulator for the whole tile and
/// prefetching the next row while the current one is scanned.
pub fn scan_tile<S: LocalScanner + ?Sized>(
    scanner: &S,
    data: &[i32],
    dims: Dims,
    tile: &Tile,
) -> MinMax {
    let mut acc = MinMax::SEED;
    let mut rows = tile.rows(dims).peekable();
    while let Some(row) = rows.next() {
        if let Some(next) = rows.peek() {
            prefetch_read(data.as_ptr().wrapping_add(next.start));
        }
        acc = acc.combine(scanner.scan(row.slice(data), row.start));
    }
    acc
}

/// Scan `data`, whose first element sits at flat index `base`.
///
/// `Kernel::Auto` picks the best kernel for this CPU. A SIMD kernel the CPU
/// cannot run degrades to the portable lanes, which produce the same record.
#[inline]
pub fn scan_with_kernel(data: &[i32], base: usize, kernel: Kernel) -> MinMax {
    let chosen = match kernel {
        Kernel::Auto => detect_best_kernel(),
        other => other,
    };

    match chosen {
        Kernel::Scalar => scan_scalar(data, base),
        Kernel::Branchless => scan_branchless(data, base),
        #[cfg(target_arch = "x86_64")]
        Kernel::Avx2 if kernel_supported(Kernel::Avx2) => unsafe { scan_avx2(data, base) },
        #[cfg(all(feature = "nightly-avx", target_arch = "x86_64"))]
        Kernel::Avx512 if kernel_supported(Kernel::Avx512) => unsafe { scan_avx512(data, base) },
        _ => scan_portable(data, base),
    }
}

#[inline]
pub fn scan_scalar(data: &[i32], base: usize) -> MinMax {
    let Some((&first, rest)) = data.split_first() else {
        return MinMax::SEED;
    };

    let (mut min_v, mut min_i) = (first, base);
    let (mut max_v, mut max_i) = (first, base);
    for (off, &v) in rest.iter().enumerate() {
        let idx = base + 1 + off;
        if v < min_v {
            min_v = v;
            min_i = idx;
        }
        if v > max_v {
            max_v = v;
            max_i = idx;
        }
    }

    MinMax {
        min: Extremum::new(min_v, min_i),
        max: Extremum::new(max_v, max_i),
    }
}

#[inline(always)]
fn select_i32(cond: bool, new: i32, old: i32) -> i32 {
    let mask = -(cond as i32);
    (new & mask) | (old & !mask)
}

#[inline(always)]
fn select_usize(cond: bool, new: usize, old: usize) -> usize {
    let mask = (cond as usize).wrapping_neg();
    (new & mask) | (old & !mask)
}

#[inline]
pub fn scan_branchless(data: &[i32], base: usize) -> MinMax {
    let Some((&first, rest)) = data.split_first() else {
        return MinMax::SEED;
    };

    let (mut min_v, mut min_i) = (first, base);
    let (mut max_v, mut max_i) = (first, base);
    for (off, &v) in rest.iter().enumerate() {
        let idx = base + 1 + off;

        let lt = v < min_v;
        min_v = select_i32(lt, v, min_v);
        min_i = select_usize(lt, idx, min_i);

        let gt = v > max_v;
        max_v = select_i32(gt, v, max_v);
        max_i = select_usize(gt, idx, max_i);
    }

    MinMax {
        min: Extremum::new(min_v, min_i),
        max: Extremum::new(max_v, max_i),
    }
}

/// Fold per-lane winners into one record. Lane `l` with block counter `b`
/// maps back to flat index `base + b * lanes + l`.
#[inline]
fn reduce_lanes(
    min_v: &[i32],
    min_blk: &[usize],
    max_v: &[i32],
    max_blk: &[usize],
    base: usize,
) -> MinMax {
    let lanes = min_v.len();
    let mut acc = MinMax::SEED;
    for l in 0..lanes {
        acc.min = acc
            .min
            .combine_min(Extremum::new(min_v[l], base + min_blk[l] * lanes + l));
        acc.max = acc
            .max
            .combine_max(Extremum::new(max_v[l], base + max_blk[l] * lanes + l));
    }
    acc
}

#[inline]
pub fn scan_portable(data: &[i32], base: usize) -> MinMax {
    const L: usize = PORTABLE_LANES;
    let blocks = data.len() / L;
    if blocks == 0 {
        return scan_scalar(data, base);
    }
    let (body, tail) = data.split_at(blocks * L);

    let mut min_v = [0i32; L];
    min_v.copy_from_slice(&body[..L]);
    let mut max_v = min_v;
    let mut min_blk = [0usize; L];
    let mut max_blk = [0usize; L];

    for (b, chunk) in body.chunks_exact(L).enumerate().skip(1) {
        for l in 0..L {
            let v = chunk[l];
            let lt = v < min_v[l];
            min_v[l] = if lt { v } else { min_v[l] };
            min_blk[l] = if lt { b } else { min_blk[l] };
            let gt = v > max_v[l];
            max_v[l] = if gt { v } else { max_v[l] };
            max_blk[l] = if gt { b } else { max_blk[l] };
        }
    }

    reduce_lanes(&min_v, &min_blk, &max_v, &max_blk, base)
        .combine(scan_scalar(tail, base + blocks * L))
}

#[cfg(target_arch = "x86_64")]
const AVX2_SEGMENT: usize = (i32::MAX as usize) * 8;

/// # Safety
/// The CPU must support AVX2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn scan_avx2(data: &[i32], base: usize) -> MinMax {
    let mut acc = MinMax::SEED;
    for (s, segment) in data.chunks(AVX2_SEGMENT).enumerate() {
        acc = acc.combine(scan_avx2_segment(segment, base + s * AVX2_SEGMENT));
    }
    acc
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn scan_avx2_segment(data: &[i32], base: usize) -> MinMax {
    const L: usize = 8;
    let blocks = data.len() / L;
    if blocks == 0 {
        return scan_scalar(data, base);
    }
    let ptr = data.as_ptr();

    let first = _mm256_loadu_si256(ptr as *const __m256i);
    let mut vmin = first;
    let mut vmax = first;
    let mut vmin_blk = _mm256_setzero_si256();
    let mut vmax_blk = _mm256_setzero_si256();
    let one = _mm256_set1_epi32(1);
    let mut vcur = one;

    for b in 1..blocks {
        let vdata = _mm256_loadu_si256(ptr.add(b * L) as *const __m256i);

        let lt = _mm256_cmpgt_epi32(vmin, vdata);
        vmin = _mm256_blendv_epi8(vmin, vdata, lt);
        vmin_blk = _mm256_blendv_epi8(vmin_blk, vcur, lt);

        let gt = _mm256_cmpgt_epi32(vdata, vmax);
        vmax = _mm256_blendv_epi8(vmax, vdata, gt);
        vmax_blk = _mm256_blendv_epi8(vmax_blk, vcur, gt);

        vcur = _mm256_add_epi32(vcur, one);
    }

    let mut min_v = [0i32; L];
    let mut max_v = [0i32; L];
    let mut min_b = [0i32; L];
    let mut max_b = [0i32; L];
    _mm256_storeu_si256(min_v.as_mut_ptr() as *mut __m256i, vmin);
    _mm256_storeu_si256(max_v.as_mut_ptr() as *mut __m256i, vmax);
    _mm256_storeu_si256(min_b.as_mut_ptr() as *mut __m256i, vmin_blk);
    _mm256_storeu_si256(max_b.as_mut_ptr() as *mut __m256i, vmax_blk);

    let min_blk = min_b.map(|b| b as u32 as usize);
    let max_blk = max_b.map(|b| b as u32 as usize);

    reduce_lanes(&min_v, &min_blk, &max_v, &max_blk, base)
        .combine(scan_scalar(&data[blocks * L..], base + blocks * L))
}

#[cfg(all(feature = "nightly-avx", target_arch = "x86_64"))]
const AVX512_SEGMENT: usize = (i32::MAX as usize) * 16;

/// # Safety
/// The CPU must support AVX-512F.
#[cfg(all(feature = "nightly-avx", target_arch = "x86_64"))]
#[target_feature(enable = "avx512f")]
pub unsafe fn scan_avx512(data: &[i32], base: usize) -> MinMax {
    let mut acc = MinMax::SEED;
    for (s, segment) in data.chunks(AVX512_SEGMENT).enumerate() {
        acc = acc.combine(scan_avx512_segment(segment, base + s * AVX512_SEGMENT));
    }
    acc
}

#[cfg(all(feature = "nightly-avx", target_arch = "x86_64"))]
#[target_feature(enable = "avx512f")]
unsafe fn scan_avx512_segment(data: &[i32], base: usize) -> MinMax {
    const L: usize = 16;
    let blocks = data.len() / L;
    if blocks == 0 {
        return scan_scalar(data, base);
    }
    let ptr = data.as_ptr();

    let first = _mm512_loadu_si512(ptr.cast());
    let mut vmin = first;
    let mut vmax = first;
    let mut vmin_blk = _mm512_setzero_si512();
    let mut vmax_blk = _mm512_setzero_si512();
    let one = _mm512_set1_epi32(1);
    let mut vcur = one;

    for b in 1..blocks {
        let vdata = _mm512_loadu_si512(ptr.add(b * L).cast());

        let lt = _mm512_cmpgt_epi32_mask(vmin, vdata);
        vmin = _mm512_mask_blend_epi32(lt, vmin, vdata);
        vmin_blk = _mm512_mask_blend_epi32(lt, vmin_blk, vcur);

        let gt = _mm512_cmpgt_epi32_mask(vdata, vmax);
        vmax = _mm512_mask_blend_epi32(gt, vmax, vdata);
        vmax_blk = _mm512_mask_blend_epi32(gt, vmax_blk, vcur);

        vcur = _mm512_add_epi32(vcur, one);
    }

    let mut min_v = [0i32; L];
    let mut max_v = [0i32; L];
    let mut min_b = [0i32; L];
    let mut max_b = [0i32; L];
    _mm512_storeu_si512(min_v.as_mut_ptr().cast(), vmin);
    _mm512_storeu_si512(max_v.as_mut_ptr().cast(), vmax);
    _mm512_storeu_si512(min_b.as_mut_ptr().cast(), vmin_blk);
    _mm512_storeu_si512(max_b.as_mut_ptr().cast(), vmax_blk);

    let min_blk = min_b.map(|b| b as u32 as usize);
    let max_blk = max_b.map(|b| b as u32 as usize);

    reduce_lanes(&min_v, &min_blk, &max_v, &max_blk, base)
        .combine(scan_scalar(&data[blocks * L..], base + blocks * L))
}
