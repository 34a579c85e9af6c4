//! # Crash Engine
//!
//! Server-authoritative round engine for a crash game: a multiplier climbs
//! from 1.00x along a fixed curve until it hits a crash point drawn at the
//! start of the round. A roster of simulated participants bets and cashes
//! out against it, and observers read immutable snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CRASH ENGINE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Pure round primitives                   │
//! │  ├── rng.rs        - RandomSource seam, Xorshift128+         │
//! │  ├── curve.rs      - Piecewise multiplier curve              │
//! │  └── crash.rs      - Three-tier crash point generator        │
//! │                                                              │
//! │  game/             - Round logic (synchronous)               │
//! │  ├── state.rs      - Rounds, phases, wagers                  │
//! │  ├── participants.rs - Simulated bettors                     │
//! │  ├── history.rs    - Last N crash points                     │
//! │  ├── events.rs     - Round lifecycle events                  │
//! │  └── engine.rs     - Tick-driven state machine               │
//! │                                                              │
//! │  network/          - Async layer                             │
//! │  ├── driver.rs     - Engine task + command handle            │
//! │  ├── snapshot.rs   - Throttled snapshot publishing           │
//! │  ├── protocol.rs   - Snapshot and feed message types         │
//! │  └── server.rs     - WebSocket snapshot feed                 │
//! │                                                              │
//! │  proof/            - Crash point commitments                 │
//! │  config.rs         - Environment configuration               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single Writer
//!
//! Exactly one task owns the [`RoundEngine`] and mutates it, one tick at a
//! time. Readers never lock it: they get `Arc` snapshots through a
//! [`SnapshotReader`], and writes from outside (external wagers) are queued
//! to the owning task through an [`EngineHandle`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod proof;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use crate::core::rng::{DeterministicRng, RandomSource, SequenceSource};
pub use game::engine::{EngineConfig, RoundEngine, WagerError};
pub use game::state::{ParticipantId, RoundPhase, Wager};
pub use network::driver::{EngineDriver, EngineHandle};
pub use network::protocol::EngineSnapshot;
pub use network::snapshot::SnapshotReader;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine tick period (ms)
pub const TICK_INTERVAL_MS: u64 = 50;

/// Crash points kept in history
pub const HISTORY_CAPACITY: usize = game::history::DEFAULT_HISTORY_CAPACITY;
