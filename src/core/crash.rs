//! Crash Point Generation
//!
//! Tiered inverse-uniform distribution:
//!
//! | draw `r`          | crash point                          |
//! |-------------------|--------------------------------------|
//! | `r < 0.001`       | exactly `1.00` (instant crash)       |
//! | `r < 0.01`        | uniform in `[1.00, 3.00)`            |
//! | otherwise         | `max(1.01, 1 / (1 - r))`             |
//!
//! Results are rounded to two decimals so they can be compared exactly
//! against the live multiplier.

use crate::core::curve::round_hundredths;
use crate::core::rng::RandomSource;

/// Upper bound of the instant-crash tier.
pub const INSTANT_CRASH_CUTOFF: f64 = 0.001;

/// Upper bound of the low-range tier.
pub const LOW_TIER_CUTOFF: f64 = 0.01;

/// Lowest crash point the main tier can produce.
pub const MIN_TAIL_CRASH_POINT: f64 = 1.01;

/// Crash point returned for the instant-crash tier.
pub const INSTANT_CRASH_POINT: f64 = 1.0;

/// Draw a crash point from `rng`.
///
/// Consumes one draw, or two when the low-range tier is selected.
///
/// # Panics
///
/// Panics if the result is non-finite or below 1.0.
pub fn generate_crash_point<R: RandomSource + ?Sized>(rng: &mut R) -> f64 {
    let r = rng.next_unit();

    let crash_point = if r < INSTANT_CRASH_CUTOFF {
        INSTANT_CRASH_POINT
    } else if r < LOW_TIER_CUTOFF {
        round_hundredths(rng.next_range(1.0, 3.0))
    } else {
        round_hundredths(MIN_TAIL_CRASH_POINT.max(1.0 / (1.0 - r)))
    };

    assert!(
        crash_point.is_finite() && crash_point >= 1.0,
        "crash point generator produced {crash_point} from draw {r}"
    );
    crash_point
}
