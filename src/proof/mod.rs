//! Provably-fair crash points.
//!
//! Each round's crash point is committed to when the round starts running
//! and revealed when it crashes, so observers can check it was fixed in
//! advance.

pub mod commitment;

pub use commitment::RoundCommitment;
