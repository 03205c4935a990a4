use crate::utilities::enums::Kernel;
use std::sync::OnceLock;

static BEST_SINGLE: OnceLock<Kernel> = OnceLock::new();

#[inline(always)]
pub fn detect_best_kernel() -> Kernel {
    *BEST_SINGLE.get_or_init(|| {
        if kernel_supported(Kernel::Avx512) {
            return Kernel::Avx512;
        }
        if kernel_supported(Kernel::Avx2) {
            return Kernel::Avx2;
        }
        Kernel::Portable
    })
}

/// Whether `kernel` can run on this CPU with the features this build was
/// compiled with.
pub fn kernel_supported(kernel: Kernel) -> bool {
    match kernel {
        Kernel::Auto | Kernel::Scalar | Kernel::Branchless | Kernel::Portable => true,
        Kernel::Avx2 => {
            #[cfg(target_arch = "x86_64")]
            {
                std::arch::is_x86_feature_detected!("avx2")
            }
            #[cfg(not(target_arch = "x86_64"))]
            {
                false
            }
        }
        Kernel::Avx512 => {
            #[cfg(all(feature = "nightly-avx", target_arch = "x86_64"))]
            {
                std::arch::is_x86_feature_detected!("avx512f")
            }
            #[cfg(not(all(feature = "nightly-avx", target_arch = "x86_64")))]
            {
                false
            }
        }
    }
}

/// Hint the cache hierarchy that the line holding `ptr` will be read soon.
#[inline(always)]
pub fn prefetch_read<T>(ptr: *const T) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        // Prefetch never faults, even on an address outside the allocation.
        use core::arch::x86_64::{_mm_prefetch, _MM_HINT_T1};
        _mm_prefetch::<_MM_HINT_T1>(ptr as *const i8);
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = ptr;
    }
}

/// Return `Ok(())` early from a `check_*` test when the host lacks `kernel`.
#[macro_export]
macro_rules! skip_if_unsupported {
    ($kernel:expr, $test_name:expr) => {
        if !$crate::utilities::helpers::kernel_supported($kernel) {
            eprintln!("[{}] Skipping {:?} test - not supported here", $test_name, $kernel);
            return Ok(());
        }
    };
}
