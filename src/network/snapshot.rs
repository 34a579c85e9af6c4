//! Snapshot Publishing
//!
//! The engine task captures its state into an [`EngineSnapshot`] and swaps
//! it into a `watch` channel; any number of readers clone the current
//! `Arc` without ever touching the engine. Captures are throttled to at most
//! one per `min_interval`; calls in between leave the cached snapshot in
//! place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::config::env_ms;
use crate::core::rng::RandomSource;
use crate::game::engine::RoundEngine;
use crate::game::state::RoundPhase;
use crate::network::protocol::{EngineSnapshot, ParticipantView, WagerView};

/// Snapshot throttling.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Minimum time between two captures.
    pub min_interval: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(crate::TICK_INTERVAL_MS),
        }
    }
}

impl SnapshotConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            min_interval: env_ms("CRASH_SNAPSHOT_INTERVAL_MS", Self::default().min_interval),
        }
    }
}

/// Copy the engine state out at `now`, stamped with `captured_at` (epoch ms).
///
/// The crash point and commitment salt stay hidden until the round crashes.
pub fn capture_snapshot<R: RandomSource>(engine: &RoundEngine<R>, now: Instant, captured_at: i64) -> EngineSnapshot {
    let round = engine.round();
    let pool = engine.pool();
    let crashed = round.phase == RoundPhase::Crashed;

    let wagers = round
        .wagers
        .iter()
        .map(|w| WagerView {
            participant_id: w.participant_id,
            participant_name: pool
                .get(w.participant_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            amount: w.amount,
            cashed_out: w.cashed_out,
            cashout_multiplier: w.cashout_multiplier,
        })
        .collect();

    let participants = pool
        .participants()
        .iter()
        .map(|p| ParticipantView {
            id: p.id,
            name: p.name.clone(),
            balance: p.balance,
            fixed_bet_amount: p.fixed_bet_amount,
            cash_out_threshold: p.cash_out_threshold,
        })
        .collect();

    EngineSnapshot {
        round_id: round.id,
        multiplier: round.multiplier,
        crash_point: if crashed { round.crash_point } else { None },
        state: round.phase,
        history: engine.history().to_vec(),
        wagers,
        participants,
        elapsed_seconds: round.elapsed_secs(now),
        captured_at,
        commitment: round.commitment.as_ref().map(|c| c.hash_hex()),
        revealed_salt: if crashed {
            round.commitment.as_ref().map(|c| hex::encode(c.reveal()))
        } else {
            None
        },
    }
}

/// Write side of the snapshot channel. Owned by the engine task.
pub struct SnapshotPublisher {
    config: SnapshotConfig,
    tx: watch::Sender<Arc<EngineSnapshot>>,
    last_capture: Instant,
}

impl SnapshotPublisher {
    /// Create a publisher seeded with a capture of `engine` at `now`.
    pub fn new<R: RandomSource>(config: SnapshotConfig, engine: &RoundEngine<R>, now: Instant) -> Self {
        let initial = capture_snapshot(engine, now, chrono::Utc::now().timestamp_millis());
        let (tx, _) = watch::channel(Arc::new(initial));

        Self {
            config,
            tx,
            last_capture: now,
        }
    }

    /// Capture `engine` if at least `min_interval` has passed since the last
    /// capture. Returns whether a capture happened.
    pub fn publish<R: RandomSource>(&mut self, engine: &RoundEngine<R>, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_capture) < self.config.min_interval {
            return false;
        }

        let snapshot = capture_snapshot(engine, now, chrono::Utc::now().timestamp_millis());
        self.tx.send_replace(Arc::new(snapshot));
        self.last_capture = now;
        true
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Arc<EngineSnapshot> {
        self.tx.borrow().clone()
    }

    /// New read handle.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the snapshot channel. Cheap to clone, safe to use from any
/// task.
#[derive(Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Arc<EngineSnapshot>>,
}

impl SnapshotReader {
    /// Most recent snapshot.
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for the next capture. Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Arc<EngineSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
