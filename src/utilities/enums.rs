#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Local scanner implementation used for each partition.
///
/// Every kernel yields bit-identical records; they differ only in how the
/// inner loop is executed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Kernel {
    Auto,
    Scalar,
    Branchless,
    Portable,
    Avx2,
    Avx512,
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Auto
    }
}
