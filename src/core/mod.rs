//! Core round primitives.
//!
//! Pure functions and the randomness seam. Nothing here knows about rounds,
//! participants or time sources; the game layer composes them.

pub mod rng;
pub mod curve;
pub mod crash;

// Re-export core types
pub use rng::{DeterministicRng, RandomSource, SequenceSource};
pub use curve::{multiplier_at, round_hundredths, to_hundredths};
pub use crash::generate_crash_point;
