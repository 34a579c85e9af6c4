//! Multiplier Growth Curve
//!
//! Maps time spent in the running phase to the live multiplier. Three
//! segments: a slow start up to 3x, a visible acceleration up to 10x, then
//! unbounded growth. The segments meet exactly at their boundaries.

/// End of the first segment (seconds).
pub const FIRST_SEGMENT_END: f64 = 3.0;

/// End of the second segment (seconds).
pub const SECOND_SEGMENT_END: f64 = 6.0;

/// Round to two decimal places.
///
/// Values produced here compare bit-for-bit when they represent the same
/// number of hundredths, which the crash check relies on.
#[inline]
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Integer hundredths of a two-decimal multiplier (e.g. 2.57 -> 257).
#[inline]
pub fn to_hundredths(value: f64) -> u64 {
    (value * 100.0).round() as u64
}

/// Quadratic ease-out on `t` in `[0, 1]`.
#[inline]
pub fn ease_out_quad(t: f64) -> f64 {
    t * (2.0 - t)
}

/// Unrounded curve value.
fn raw_value_at(elapsed: f64) -> f64 {
    if elapsed < FIRST_SEGMENT_END {
        1.0 + ease_out_quad(elapsed / 3.0) * 2.0
    } else if elapsed < SECOND_SEGMENT_END {
        3.0 + ease_out_quad((elapsed - FIRST_SEGMENT_END) / 3.0) * 7.0
    } else {
        10.0 + ((elapsed - SECOND_SEGMENT_END) / 3.0).powf(1.5) * 20.0
    }
}

/// Live multiplier after `elapsed_secs` in the running phase.
///
/// # Panics
///
/// Panics on negative or non-finite input; either means the caller's clock
/// arithmetic is broken and settling against the result would be wrong.
pub fn multiplier_at(elapsed_secs: f64) -> f64 {
    assert!(
        elapsed_secs.is_finite() && elapsed_secs >= 0.0,
        "elapsed time must be finite and non-negative, got {elapsed_secs}"
    );

    let value = round_hundredths(raw_value_at(elapsed_secs));
    assert!(value.is_finite() && value >= 1.0, "curve produced invalid multiplier {value}");
    value
}
