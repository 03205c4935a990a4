use proptest::prelude::*;
use std::error::Error;
use volume_extrema::extrema::partition::TileShape;
use volume_extrema::extrema::scan::{scan_scalar, LocalScanner};
use volume_extrema::extrema::search::extrema_with_scanner;
use volume_extrema::utilities::generator::{
    default_volume, generate_volume, random_volume, PLANTED_MAX, PLANTED_MIN,
};
use volume_extrema::utilities::helpers::kernel_supported;
use volume_extrema::{
    extrema, search, Coord, Dims, Extremum, ExtremaBuilder, ExtremaError, ExtremaInput,
    ExtremaParams, Kernel, MinMax, Strategy as SearchStrategy, Volume,
};

const WORKER_COUNTS: [usize; 5] = [1, 2, 4, 8, 16];

fn kernels() -> Vec<Kernel> {
    [
        Kernel::Scalar,
        Kernel::Branchless,
        Kernel::Portable,
        Kernel::Avx2,
        Kernel::Avx512,
    ]
    .into_iter()
    .filter(|&k| kernel_supported(k))
    .collect()
}

#[test]
fn scenario_a_small_volume() -> Result<(), Box<dyn Error>> {
    let dims = Dims::new(4, 4, 4)?;
    let mut data = vec![5; 64];
    data[0] = -1;
    data[63] = 99;
    for workers in [1, 4] {
        let out = search(&data, dims, workers)?;
        assert_eq!(out.min, Extremum::new(-1, 0));
        assert_eq!(out.max, Extremum::new(99, 63));
        assert_eq!(out.min_coord(), Coord::new(0, 0, 0));
        assert_eq!(out.max_coord(), Coord::new(3, 3, 3));
    }
    Ok(())
}

#[test]
fn worker_count_far_above_cell_count() -> Result<(), Box<dyn Error>> {
    let dims = Dims::new(1, 1, 1)?;
    for strategy in SearchStrategy::ALL {
        let out = ExtremaBuilder::new()
            .strategy(strategy)
            .workers(100_000)
            .apply_slice(&[7], dims)?;
        assert_eq!(out.as_tuple(), (7, 0, 7, 0), "{:?}", strategy);
    }

    let volume = Volume::from_fn(Dims::new(3, 3, 3)?, |c| (c.i * 9 + c.j * 3 + c.k) as i32 - 4)?;
    let out = search(volume.as_slice(), volume.dims(), 50_000)?;
    assert_eq!(out.min_coord(), Coord::from((0, 0, 0)));
    assert_eq!(out.max_coord(), Coord::from((2, 2, 2)));
    Ok(())
}

#[test]
fn scenario_b_seeded_500_cube() -> Result<(), Box<dyn Error>> {
    let (volume, planted) = default_volume()?;
    assert_eq!(planted.min_at, Coord::new(499, 499, 499));
    assert_eq!(planted.max_at, Coord::new(250, 250, 250));

    for strategy in SearchStrategy::ALL {
        for workers in [1, 4, 8] {
            let out = ExtremaBuilder::new()
                .strategy(strategy)
                .workers(workers)
                .apply(&volume)?;
            assert_eq!(out.min.value, PLANTED_MIN, "{:?} w={}", strategy, workers);
            assert_eq!(out.min_coord(), planted.min_at, "{:?} w={}", strategy, workers);
            assert_eq!(out.max.value, PLANTED_MAX, "{:?} w={}", strategy, workers);
            assert_eq!(out.max_coord(), planted.max_at, "{:?} w={}", strategy, workers);
        }
    }
    Ok(())
}

#[test]
fn single_cell_boundary() -> Result<(), Box<dyn Error>> {
    let volume = Volume::from_slice(Dims::new(1, 1, 1)?, &[-17])?;
    for strategy in SearchStrategy::ALL {
        let out = ExtremaBuilder::new().strategy(strategy).workers(16).apply(&volume)?;
        assert_eq!(out.as_tuple(), (-17, 0, -17, 0));
    }
    Ok(())
}

#[test]
fn results_identical_across_workers_strategies_and_kernels() -> Result<(), Box<dyn Error>> {
    let dims = Dims::new(13, 17, 29)?;
    let volume = random_volume(dims, 7)?;
    let expected = scan_scalar(volume.as_slice(), 0);

    for kernel in kernels() {
        for strategy in SearchStrategy::ALL {
            for workers in WORKER_COUNTS {
                let out = ExtremaBuilder::new()
                    .kernel(kernel)
                    .strategy(strategy)
                    .workers(workers)
                    .tile(TileShape::new(3, 4))
                    .leaf_threshold(257)
                    .apply(&volume)?;
                assert_eq!(out.min, expected.min, "{:?} {:?} w={}", kernel, strategy, workers);
                assert_eq!(out.max, expected.max, "{:?} {:?} w={}", kernel, strategy, workers);
            }
        }
    }
    Ok(())
}

#[test]
fn repeated_search_is_idempotent() -> Result<(), Box<dyn Error>> {
    let (volume, _) = generate_volume(Dims::new(40, 30, 20)?, 3)?;
    let input = ExtremaInput::from_volume(
        &volume,
        ExtremaParams {
            workers: Some(4),
            strategy: Some(SearchStrategy::TaskTree),
            tile: None,
            leaf_threshold: Some(1000),
        },
    );
    let first = extrema(&input)?;
    let second = extrema(&input)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn planted_unique_extrema_found_everywhere() -> Result<(), Box<dyn Error>> {
    for (m, n, p) in [(1, 1, 9), (2, 3, 1), (7, 1, 5), (9, 8, 33)] {
        let dims = Dims::new(m, n, p)?;
        let (volume, planted) = generate_volume(dims, 11)?;
        for strategy in SearchStrategy::ALL {
            for workers in [1, 3, 16] {
                let out = ExtremaBuilder::new()
                    .strategy(strategy)
                    .workers(workers)
                    .tile(TileShape::new(2, 2))
                    .leaf_threshold(16)
                    .apply(&volume)?;
                assert_eq!(out.min_coord(), planted.min_at, "{:?} {:?}", dims, strategy);
                assert_eq!(out.max_coord(), planted.max_at, "{:?} {:?}", dims, strategy);
            }
        }
    }
    Ok(())
}

/// Scans normally until it reaches a poisoned cell value.
struct FailingScanner {
    poison: i32,
}

impl LocalScanner for FailingScanner {
    fn scan(&self, data: &[i32], base: usize) -> MinMax {
        if data.contains(&self.poison) {
            panic!("poisoned cell near {}", base);
        }
        scan_scalar(data, base)
    }
}

#[test]
fn worker_failure_discards_partial_result() -> Result<(), Box<dyn Error>> {
    let dims = Dims::new(6, 6, 6)?;
    let mut volume = Volume::filled(dims, 1)?;
    volume.set(Coord::new(5, 5, 5), 777);

    for strategy in SearchStrategy::ALL {
        let input = ExtremaInput::from_volume(
            &volume,
            ExtremaParams {
                workers: Some(4),
                strategy: Some(strategy),
                tile: None,
                leaf_threshold: Some(8),
            },
        );
        match extrema_with_scanner(&input, &FailingScanner { poison: 777 }) {
            Err(ExtremaError::WorkerFailure { reason }) => {
                assert!(reason.contains("poisoned cell"), "{:?}: {}", strategy, reason)
            }
            other => panic!("{:?}: expected WorkerFailure, got {:?}", strategy, other),
        }
    }

    // The same input without the poison still searches cleanly.
    let out = extrema_with_scanner(
        &ExtremaInput::with_default_volume(&volume),
        &FailingScanner { poison: -1 },
    )?;
    assert_eq!(out.max, Extremum::new(777, dims.len() - 1));
    Ok(())
}

fn volume_strategy() -> impl Strategy<Value = (Dims, Vec<i32>)> {
    (1usize..7, 1usize..7, 1usize..40).prop_flat_map(|(m, n, p)| {
        let dims = Dims { m, n, p };
        prop::collection::vec(-6i32..6, m * n * p).prop_map(move |data| (dims, data))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_strategy_matches_sequential(
        (dims, data) in volume_strategy(),
        workers in 1usize..17,
        ti in 1usize..5,
        tj in 1usize..5,
        leaf in 1usize..64,
    ) {
        let expected = scan_scalar(&data, 0);
        for strategy in SearchStrategy::ALL {
            let out = ExtremaBuilder::new()
                .strategy(strategy)
                .workers(workers)
                .tile(TileShape::new(ti, tj))
                .leaf_threshold(leaf)
                .apply_slice(&data, dims)
                .unwrap();
            prop_assert_eq!(out.min, expected.min);
            prop_assert_eq!(out.max, expected.max);
            prop_assert_eq!(data[out.min.location], out.min.value);
            prop_assert_eq!(data[out.max.location], out.max.value);
        }
    }
}
