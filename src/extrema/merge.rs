//! # Merge Engine
//!
//! Three ways of folding per-unit records into one global [`MinMax`], all
//! built on [`MinMax::combine`]:
//!
//! - [`merge_locked`]: workers accumulate privately, then each folds its
//!   record into one shared accumulator under a `Mutex`. Value and location
//!   are replaced together inside the critical section; there is no
//!   per-field atomic anywhere.
//! - [`merge_tree`]: workers accumulate privately and the accumulators are
//!   combined pairwise in `ceil(log2 W)` rounds. Nothing is shared while
//!   workers are still writing.
//! - [`merge_task_tree`]: recursive halving under `rayon::join`; each join
//!   combines two published child records exactly once.
//!
//! Work runs on whatever rayon pool is current; the driver installs a pool
//! sized to the requested worker count.

use crate::extrema::partition::FlatRange;
use crate::extrema::record::MinMax;
use crate::extrema::search::ExtremaError;
use log::trace;
use rayon::prelude::*;
use std::sync::Mutex;

pub fn merge_locked<U, F>(units: &[U], scan: F) -> Result<MinMax, ExtremaError>
where
    U: Sync,
    F: Fn(&U) -> MinMax + Sync + Send,
{
    let shared = Mutex::new(MinMax::SEED);

    units
        .par_iter()
        .fold(|| MinMax::SEED, |acc, unit| acc.combine(scan(unit)))
        .try_for_each(|local| {
            let mut acc = shared.lock().map_err(|_| poisoned())?;
            *acc = acc.combine(local);
            Ok::<(), ExtremaError>(())
        })?;

    shared.into_inner().map_err(|_| poisoned())
}

fn poisoned() -> ExtremaError {
    ExtremaError::WorkerFailure {
        reason: "shared accumulator poisoned by a panicking worker".to_string(),
    }
}

pub fn merge_tree<U, F>(units: &[U], scan: F) -> MinMax
where
    U: Sync,
    F: Fn(&U) -> MinMax + Sync + Send,
{
    let locals: Vec<MinMax> = units
        .par_iter()
        .fold(|| MinMax::SEED, |acc, unit| acc.combine(scan(unit)))
        .collect();
    reduce_pairwise(locals)
}

/// Combine neighbours pairwise until one record remains.
pub fn reduce_pairwise(mut level: Vec<MinMax>) -> MinMax {
    let mut round = 0usize;
    while level.len() > 1 {
        level = level
            .par_chunks(2)
            .map(|pair| match pair {
                [a, b] => a.combine(*b),
                [a] => *a,
                _ => MinMax::SEED,
            })
            .collect();
        round += 1;
        trace!("extrema: tree round {} left {} records", round, level.len());
    }
    level.pop().unwrap_or(MinMax::SEED)
}

pub fn merge_task_tree<F>(range: FlatRange, leaf: usize, scan_leaf: &F) -> MinMax
where
    F: Fn(FlatRange) -> MinMax + Sync,
{
    if range.len() <= leaf.max(1) {
        return scan_leaf(range);
    }
    let (lo, hi) = range.split_mid();
    let (left, right) = rayon::join(
        || merge_task_tree(lo, leaf, scan_leaf),
        || merge_task_tree(hi, leaf, scan_leaf),
    );
    left.combine(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::partition::{flat_split, halving_leaves};
    use crate::extrema::record::Extremum;
    use crate::extrema::scan::scan_scalar;
    use proptest::prelude::*;

    fn scan_range(data: &[i32]) -> impl Fn(&FlatRange) -> MinMax + Sync + Send + '_ {
        move |r: &FlatRange| scan_scalar(r.slice(data), r.start)
    }

    #[test]
    fn test_reduce_pairwise_odd_counts() {
        let recs: Vec<MinMax> = [4, -2, 7, -2, 9]
            .iter()
            .enumerate()
            .map(|(i, &v)| MinMax::at(v, i * 10))
            .collect();
        let got = reduce_pairwise(recs);
        assert_eq!(got.min, Extremum::new(-2, 10));
        assert_eq!(got.max, Extremum::new(9, 40));
        assert!(reduce_pairwise(Vec::new()).is_seed());
    }

    #[test]
    fn test_locked_and_tree_agree_on_ties() {
        let data = vec![1, 0, 3, 0, 3, 1, 0, 3];
        let units = flat_split(data.len(), 4);
        let expected = scan_scalar(&data, 0);
        assert_eq!(expected.min, Extremum::new(0, 1));
        assert_eq!(expected.max, Extremum::new(3, 2));
        assert_eq!(merge_locked(&units, scan_range(&data)).unwrap(), expected);
        assert_eq!(merge_tree(&units, scan_range(&data)), expected);
    }

    #[test]
    fn test_task_tree_single_leaf() {
        let data = vec![2, 2, 2];
        let scan = |r: FlatRange| scan_scalar(r.slice(&data), r.start);
        let got = merge_task_tree(FlatRange::new(0, 3), 100, &scan);
        assert_eq!(got, MinMax::at(2, 0));
    }

    fn visited_leaves(total: usize, leaf: usize) -> Vec<FlatRange> {
        let seen = Mutex::new(Vec::new());
        let record = |r: FlatRange| {
            seen.lock().unwrap().push(r);
            MinMax::at(0, r.start)
        };
        merge_task_tree(FlatRange::new(0, total), leaf, &record);
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable_by_key(|r| r.start);
        seen
    }

    #[test]
    fn test_task_tree_visits_halving_leaves() {
        for (total, leaf) in [(1, 1), (100, 10), (4097, 64), (1000, 1)] {
            let expected = halving_leaves(FlatRange::new(0, total), leaf);
            assert_eq!(visited_leaves(total, leaf), expected, "total={} leaf={}", total, leaf);
        }
    }

    proptest! {
        #[test]
        fn prop_task_tree_leaves_match_halving(total in 1usize..5_000, leaf in 1usize..400) {
            prop_assert_eq!(
                visited_leaves(total, leaf),
                halving_leaves(FlatRange::new(0, total), leaf)
            );
        }

        #[test]
        fn prop_all_merges_match_sequential(
            data in prop::collection::vec(-8i32..8, 1..2_000),
            workers in 1usize..17,
            leaf in 1usize..300,
        ) {
            let expected = scan_scalar(&data, 0);
            let units = flat_split(data.len(), workers);
            prop_assert_eq!(merge_locked(&units, scan_range(&data)).unwrap(), expected);
            prop_assert_eq!(merge_tree(&units, scan_range(&data)), expected);
            let scan = |r: FlatRange| scan_scalar(r.slice(&data), r.start);
            prop_assert_eq!(merge_task_tree(FlatRange::new(0, data.len()), leaf, &scan), expected);
        }
    }
}
