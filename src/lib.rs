#![cfg_attr(all(feature = "nightly-avx", rustc_is_nightly), feature(stdarch_x86_avx512))]
#![cfg_attr(all(feature = "nightly-avx", rustc_is_nightly), feature(avx512_target_feature))]
#![allow(clippy::needless_range_loop)]

//! Parallel min/max-with-location search over dense 3D integer volumes.
//!
//! The entry points live in [`extrema::search`]: build an [`ExtremaInput`]
//! (or use [`ExtremaBuilder`]) and get back the global minimum and maximum
//! together with their flat locations. Results are identical for every
//! worker count, partition strategy and scan kernel; value ties resolve to
//! the smallest flat index.

pub mod extrema;
pub mod utilities;

pub use extrema::record::{Extremum, MinMax};
pub use extrema::search::{
    extrema, extrema_with_kernel, search, ExtremaBuilder, ExtremaData, ExtremaError,
    ExtremaInput, ExtremaOutput, ExtremaParams, Merge, Strategy,
};
pub use utilities::enums::Kernel;
pub use utilities::volume::{Coord, Dims, Volume};
