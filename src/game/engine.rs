//! Round State Machine
//!
//! The authority over the current round. One owner drives it with
//! [`RoundEngine::tick`] at a fixed period; every transition happens inside a
//! tick and is decided by comparing the tick's wall-clock instant against the
//! current phase's deadline.
//!
//! ```text
//!   Waiting ──(random 3-5 s)──▶ Countdown ──(3 s)──▶ Running ──(m >= crash)──▶ Crashed
//!      ▲                                                                         │
//!      └──────────────────────────────────(3 s)─────────────────────────────────┘
//! ```
//!
//! Elapsed running time is always measured from the real start instant, so
//! late or skipped ticks never distort the curve; the crash is only ever
//! detected on a tick, at most one period late and never early.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{env_ms, env_or};
use crate::core::crash::generate_crash_point;
use crate::core::curve::multiplier_at;
use crate::core::rng::{DeterministicRng, RandomSource};
use crate::game::events::RoundEvent;
use crate::game::history::{HistoryLedger, DEFAULT_HISTORY_CAPACITY};
use crate::game::participants::{default_roster, ParticipantPool, ParticipantProfile};
use crate::game::state::{ParticipantId, Round, RoundPhase, Wager};
use crate::proof::commitment::RoundCommitment;

/// Engine timing, history size and roster.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the driving tick.
    pub tick_interval: Duration,
    /// Length of the countdown phase.
    pub countdown: Duration,
    /// How long a crashed round stays visible before waiting.
    pub crashed_hold: Duration,
    /// Shortest delay between entering `Waiting` and the next countdown.
    pub min_round_delay: Duration,
    /// Longest delay (exclusive) between entering `Waiting` and the next countdown.
    pub max_round_delay: Duration,
    /// Number of crash points kept in history.
    pub history_capacity: usize,
    /// Simulated participants.
    pub roster: Vec<ParticipantProfile>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(crate::TICK_INTERVAL_MS),
            countdown: Duration::from_millis(3_000),
            crashed_hold: Duration::from_millis(3_000),
            min_round_delay: Duration::from_millis(3_000),
            max_round_delay: Duration::from_millis(5_000),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            roster: default_roster(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    ///
    /// `CRASH_ROSTER_JSON` may hold a JSON array of participant profiles
    /// (`name`, `balance`, `fixedBetAmount`, `cashOutThreshold`). Values the
    /// engine cannot run with fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let roster = std::env::var("CRASH_ROSTER_JSON")
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<ParticipantProfile>>(&raw).ok())
            .filter(|roster| {
                roster
                    .iter()
                    .all(|p| p.cash_out_threshold.is_finite() && p.cash_out_threshold >= 1.0)
            })
            .unwrap_or(defaults.roster);

        Self {
            tick_interval: env_ms("CRASH_TICK_MS", defaults.tick_interval),
            countdown: env_ms("CRASH_COUNTDOWN_MS", defaults.countdown),
            crashed_hold: env_ms("CRASH_CRASHED_HOLD_MS", defaults.crashed_hold),
            min_round_delay: env_ms("CRASH_MIN_ROUND_DELAY_MS", defaults.min_round_delay),
            max_round_delay: env_ms("CRASH_MAX_ROUND_DELAY_MS", defaults.max_round_delay),
            history_capacity: env_or("CRASH_HISTORY_CAPACITY", defaults.history_capacity),
            roster,
        }
        .sanitized()
    }

    /// Replace values that would panic downstream with their defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.tick_interval.is_zero() {
            warn!("tick interval must be positive, using {:?}", defaults.tick_interval);
            self.tick_interval = defaults.tick_interval;
        }
        if self.history_capacity == 0 {
            warn!("history capacity must be positive, using {}", defaults.history_capacity);
            self.history_capacity = defaults.history_capacity;
        }
        if self.min_round_delay >= self.max_round_delay {
            warn!(
                "round delay window {:?}..{:?} is empty, using {:?}..{:?}",
                self.min_round_delay, self.max_round_delay, defaults.min_round_delay, defaults.max_round_delay
            );
            self.min_round_delay = defaults.min_round_delay;
            self.max_round_delay = defaults.max_round_delay;
        }
        self
    }
}

/// Errors from the external wager command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WagerError {
    /// Wagers are only accepted while waiting or counting down.
    #[error("Round not accepting wagers (phase: {0})")]
    RoundNotAcceptingWagers(RoundPhase),

    /// No such participant.
    #[error("Unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    /// Stake must be positive.
    #[error("Wager amount must be positive")]
    InvalidAmount,

    /// Balance does not cover the stake.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Participant already has a wager on this round.
    #[error("Wager already placed this round")]
    WagerAlreadyPlaced,
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick.
    pub events: Vec<RoundEvent>,
    /// Whether the phase changed this tick.
    pub phase_changed: bool,
    /// Whether the round crashed this tick.
    pub crashed: bool,
}

/// The round engine.
///
/// Owns the current round, the participant pool and the crash history. It
/// is not `Sync`-shared: exactly one task holds it and calls [`tick`].
///
/// [`tick`]: RoundEngine::tick
pub struct RoundEngine<R: RandomSource = DeterministicRng> {
    config: EngineConfig,
    rng: R,
    round: Round,
    pool: ParticipantPool,
    history: HistoryLedger,
}

impl<R: RandomSource> RoundEngine<R> {
    /// Create an engine in `Waiting`, with round 1 scheduled after a random
    /// delay from `now`.
    pub fn new(config: EngineConfig, mut rng: R, now: Instant) -> Self {
        assert!(
            config.min_round_delay < config.max_round_delay,
            "round delay window must not be empty"
        );
        let delay = draw_round_delay(&config, &mut rng);
        let pool = ParticipantPool::new(&config.roster);
        let history = HistoryLedger::new(config.history_capacity);

        info!(delay_ms = delay.as_millis() as u64, participants = pool.len(), "round engine created");

        Self {
            round: Round::waiting(1, now + delay),
            config,
            rng,
            pool,
            history,
        }
    }

    /// Advance the engine to `now`.
    pub fn tick(&mut self, now: Instant) -> TickResult {
        let mut result = TickResult::default();

        match self.round.phase {
            RoundPhase::Waiting => {
                if now >= self.round.phase_ends_at {
                    self.begin_countdown(now, &mut result);
                }
            }
            RoundPhase::Countdown => {
                if now >= self.round.phase_ends_at {
                    self.begin_running(now, &mut result);
                }
            }
            RoundPhase::Running => {
                self.advance_running(now, &mut result);
            }
            RoundPhase::Crashed => {
                if now >= self.round.phase_ends_at {
                    self.enter_waiting(now, &mut result);
                }
            }
        }

        result
    }

    /// Start the next round immediately if the engine is still waiting.
    ///
    /// A no-op in any other phase.
    pub fn start_round(&mut self, now: Instant) -> TickResult {
        let mut result = TickResult::default();
        if self.round.phase == RoundPhase::Waiting {
            self.begin_countdown(now, &mut result);
        }
        result
    }

    /// Place an external wager for `participant_id`.
    ///
    /// Accepted while waiting (for the upcoming round) or counting down. The
    /// stake is debited immediately.
    pub fn place_wager(&mut self, participant_id: ParticipantId, amount: u64) -> Result<Wager, WagerError> {
        if !self.round.phase.accepts_wagers() {
            return Err(WagerError::RoundNotAcceptingWagers(self.round.phase));
        }
        if self.pool.get(participant_id).is_none() {
            return Err(WagerError::UnknownParticipant(participant_id));
        }
        if amount == 0 {
            return Err(WagerError::InvalidAmount);
        }
        if self.round.wager_of(participant_id).is_some() {
            return Err(WagerError::WagerAlreadyPlaced);
        }
        if !self.pool.try_debit(participant_id, amount) {
            return Err(WagerError::InsufficientBalance);
        }

        let wager = Wager::new(participant_id, amount);
        self.round.wagers.push(wager.clone());
        debug!(round_id = self.round.id, participant = %participant_id, amount, "external wager accepted");
        Ok(wager)
    }

    /// Current round.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.round.phase
    }

    /// Live multiplier.
    pub fn multiplier(&self) -> f64 {
        self.round.multiplier
    }

    /// Crash point of the current round, once fixed.
    pub fn crash_point(&self) -> Option<f64> {
        self.round.crash_point
    }

    /// Crash history, most recent first.
    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// Participant pool.
    pub fn pool(&self) -> &ParticipantPool {
        &self.pool
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// `Waiting -> Countdown`: reset the round and run the bet pass.
    fn begin_countdown(&mut self, now: Instant, result: &mut TickResult) {
        let round = &mut self.round;
        round.phase = RoundPhase::Countdown;
        round.crash_point = None;
        round.multiplier = 1.0;
        round.started_at = None;
        round.commitment = None;
        round.phase_ends_at = now + self.config.countdown;

        result.events.push(RoundEvent::CountdownStarted {
            round_id: round.id,
            countdown_ms: self.config.countdown.as_millis() as u64,
        });

        // External wagers placed while waiting are already in `round.wagers`
        let placed = self.pool.place_bets(&mut round.wagers, &mut self.rng);
        for wager in &placed {
            result.events.push(RoundEvent::BetPlaced {
                round_id: round.id,
                participant_id: wager.participant_id,
                amount: wager.amount,
            });
        }

        info!(round_id = round.id, wagers = round.wagers.len(), "countdown started");
        result.phase_changed = true;
    }

    /// `Countdown -> Running`: fix and commit the crash point.
    fn begin_running(&mut self, now: Instant, result: &mut TickResult) {
        let crash_point = generate_crash_point(&mut self.rng);
        let commitment = RoundCommitment::new(self.round.id, crash_point);

        let round = &mut self.round;
        round.phase = RoundPhase::Running;
        round.crash_point = Some(crash_point);
        round.multiplier = 1.0;
        round.started_at = Some(now);

        result.events.push(RoundEvent::RoundStarted {
            round_id: round.id,
            commitment: commitment.hash_hex(),
        });
        round.commitment = Some(commitment);

        info!(round_id = round.id, "round running");
        result.phase_changed = true;
    }

    /// One running tick: recompute the multiplier, run the cash-out pass,
    /// then check for the crash.
    fn advance_running(&mut self, now: Instant, result: &mut TickResult) {
        let round = &mut self.round;
        let (Some(started_at), Some(crash_point)) = (round.started_at, round.crash_point) else {
            panic!("round {} is running without a start time or crash point", round.id);
        };
        let elapsed = now
            .checked_duration_since(started_at)
            .unwrap_or_else(|| panic!("tick at {now:?} precedes round start {started_at:?}"));

        let curve_value = multiplier_at(elapsed.as_secs_f64());
        assert!(
            curve_value >= round.multiplier,
            "multiplier regressed from {} to {curve_value}",
            round.multiplier
        );

        // The displayed multiplier never passes the crash point; on the
        // crash tick it equals it exactly.
        let live = curve_value.min(crash_point);
        round.multiplier = live;

        let settled = self.pool.evaluate_cashouts(&mut round.wagers, live, &mut self.rng);
        for cash_out in settled {
            result.events.push(RoundEvent::CashedOut {
                round_id: round.id,
                participant_id: cash_out.participant_id,
                multiplier: cash_out.multiplier,
                payout: cash_out.payout,
            });
        }

        if curve_value >= crash_point {
            self.crash(now, crash_point, result);
        }
    }

    /// `Running -> Crashed`: outstanding wagers are lost.
    fn crash(&mut self, now: Instant, crash_point: f64, result: &mut TickResult) {
        let round = &mut self.round;
        round.multiplier = crash_point;
        round.phase = RoundPhase::Crashed;
        round.phase_ends_at = now + self.config.crashed_hold;
        self.history.append(crash_point);

        let losing_wagers = round.outstanding_wagers().count();
        let salt = round
            .commitment
            .as_ref()
            .map(|c| hex::encode(c.reveal()))
            .unwrap_or_default();

        result.events.push(RoundEvent::Crashed {
            round_id: round.id,
            crash_point,
            salt,
            losing_wagers,
        });

        info!(round_id = round.id, crash_point, losing_wagers, "round crashed");
        result.phase_changed = true;
        result.crashed = true;
    }

    /// `Crashed -> Waiting`: retire the round and schedule the next one.
    fn enter_waiting(&mut self, now: Instant, result: &mut TickResult) {
        let delay = draw_round_delay(&self.config, &mut self.rng);
        let next_round_id = self.round.id + 1;
        self.round = Round::waiting(next_round_id, now + delay);

        result.events.push(RoundEvent::WaitingStarted {
            next_round_id,
            delay_ms: delay.as_millis() as u64,
        });

        debug!(next_round_id, delay_ms = delay.as_millis() as u64, "waiting for next round");
        result.phase_changed = true;
    }
}

/// Uniform delay in `[min_round_delay, max_round_delay)`, whole milliseconds.
fn draw_round_delay<R: RandomSource + ?Sized>(config: &EngineConfig, rng: &mut R) -> Duration {
    let min = config.min_round_delay.as_millis() as f64;
    let max = config.max_round_delay.as_millis() as f64;
    Duration::from_millis(rng.next_range(min, max).floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::SequenceSource;

    const TICK: Duration = Duration::from_millis(50);

    fn solo_config(balance: u64, bet: u64, threshold: f64) -> EngineConfig {
        EngineConfig {
            roster: vec![ParticipantProfile::new("solo", balance, bet, threshold)],
            ..Default::default()
        }
    }

    /// Tick every 50 ms until the phase changes, returning the tick instant.
    fn tick_until_change<R: RandomSource>(engine: &mut RoundEngine<R>, mut now: Instant) -> (Instant, TickResult) {
        loop {
            now += TICK;
            let result = engine.tick(now);
            if result.phase_changed {
                return (now, result);
            }
        }
    }

    #[test]
    fn test_initial_state() {
        let t0 = Instant::now();
        // Delay draw 0.5 -> 4000 ms
        let engine = RoundEngine::new(EngineConfig::default(), SequenceSource::new(vec![0.5]), t0);

        assert_eq!(engine.phase(), RoundPhase::Waiting);
        assert_eq!(engine.multiplier(), 1.0);
        assert_eq!(engine.crash_point(), None);
        assert_eq!(engine.round().id, 1);
        assert_eq!(engine.round().phase_ends_at, t0 + Duration::from_millis(4_000));
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_waiting_respects_delay() {
        let t0 = Instant::now();
        let mut engine = RoundEngine::new(EngineConfig::default(), SequenceSource::new(vec![0.0]), t0);

        assert!(!engine.tick(t0 + Duration::from_millis(2_999)).phase_changed);
        assert_eq!(engine.phase(), RoundPhase::Waiting);

        let result = engine.tick(t0 + Duration::from_millis(3_000));
        assert!(result.phase_changed);
        assert_eq!(engine.phase(), RoundPhase::Countdown);
    }

    #[test]
    fn test_start_round_is_noop_outside_waiting() {
        let t0 = Instant::now();
        let mut engine = RoundEngine::new(EngineConfig::default(), SequenceSource::new(vec![0.0]), t0);

        assert!(engine.start_round(t0).phase_changed);
        assert_eq!(engine.phase(), RoundPhase::Countdown);

        let again = engine.start_round(t0 + TICK);
        assert!(!again.phase_changed);
        assert!(again.events.is_empty());
        assert_eq!(engine.phase(), RoundPhase::Countdown);
    }

    #[test]
    fn test_full_lifecycle_with_fixed_draws() {
        // Draws: delay 0.0, bet 0.0 (no bet), crash r=0.5 (2.00x), delay 0.0
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.0, 0.5, 0.0]);
        let mut engine = RoundEngine::new(solo_config(5_000, 100, 50.0), rng, t0);

        let (countdown_at, result) = tick_until_change(&mut engine, t0);
        assert_eq!(engine.phase(), RoundPhase::Countdown);
        assert_eq!(countdown_at, t0 + Duration::from_millis(3_000));
        assert!(matches!(result.events[0], RoundEvent::CountdownStarted { round_id: 1, .. }));

        let (running_at, result) = tick_until_change(&mut engine, countdown_at);
        assert_eq!(engine.phase(), RoundPhase::Running);
        assert_eq!(running_at - countdown_at, Duration::from_millis(3_000));
        assert_eq!(engine.crash_point(), Some(2.0));
        assert_eq!(engine.multiplier(), 1.0);
        assert!(matches!(result.events[0], RoundEvent::RoundStarted { .. }));

        let mut now = running_at;
        loop {
            now += TICK;
            let result = engine.tick(now);
            assert!(engine.multiplier() <= 2.0);
            if result.crashed {
                break;
            }
            assert_eq!(engine.phase(), RoundPhase::Running);
        }
        let crashed_at = now;
        assert_eq!(engine.phase(), RoundPhase::Crashed);
        assert_eq!(engine.multiplier(), 2.0);
        assert_eq!(engine.multiplier().to_bits(), 2.0f64.to_bits());
        assert_eq!(engine.history().to_vec(), vec![2.0]);

        let (waiting_at, result) = tick_until_change(&mut engine, crashed_at);
        assert_eq!(engine.phase(), RoundPhase::Waiting);
        assert_eq!(waiting_at - crashed_at, Duration::from_millis(3_000));
        assert_eq!(engine.round().id, 2);
        assert_eq!(engine.crash_point(), None);
        assert!(matches!(result.events[0], RoundEvent::WaitingStarted { next_round_id: 2, delay_ms: 3_000 }));
    }

    #[test]
    fn test_crash_not_detected_early() {
        // 2.00x is reached at roughly 0.88 s into the first segment
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.0, 0.5, 0.0]);
        let mut engine = RoundEngine::new(solo_config(0, 100, 50.0), rng, t0);
        engine.start_round(t0);
        let start = t0 + Duration::from_millis(3_000);
        engine.tick(start);
        assert_eq!(engine.phase(), RoundPhase::Running);

        // 0.5 s -> t = 1/6, ease = 0.3056, 1.61x
        engine.tick(start + Duration::from_millis(500));
        assert_eq!(engine.phase(), RoundPhase::Running);
        assert_eq!(engine.multiplier(), 1.61);

        // A delayed tick far past the crash point crashes at exactly 2.00
        let result = engine.tick(start + Duration::from_secs(10));
        assert!(result.crashed);
        assert_eq!(engine.multiplier(), 2.0);
    }

    #[test]
    fn test_instant_crash() {
        // Draws: delay, bet (none), crash tier r=0.0 -> 1.00x
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.0, 0.0]);
        let mut engine = RoundEngine::new(solo_config(5_000, 100, 2.0), rng, t0);
        engine.start_round(t0);
        let start = t0 + Duration::from_millis(3_000);
        engine.tick(start);
        assert_eq!(engine.crash_point(), Some(1.0));

        let result = engine.tick(start + TICK);
        assert!(result.crashed);
        assert_eq!(engine.multiplier(), 1.0);
        assert_eq!(engine.history().latest(), Some(1.0));
    }

    #[test]
    fn test_uncashed_wager_is_lost() {
        // Draws: delay, bet 0.9 (bets), crash 0.5 (2.00x); threshold 2.5 is never reached
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.9, 0.5]);
        let mut engine = RoundEngine::new(solo_config(5_000, 100, 2.5), rng, t0);

        engine.start_round(t0);
        assert_eq!(engine.pool().total_balance(), 4_900);
        assert_eq!(engine.round().wagers.len(), 1);

        let mut now = t0 + Duration::from_millis(3_000);
        engine.tick(now);
        let (_, result) = tick_until_change(&mut engine, now);
        assert!(result.crashed);
        assert!(matches!(result.events.last(), Some(RoundEvent::Crashed { losing_wagers: 1, .. })));

        let wager = engine.round().wager_of(ParticipantId(0)).cloned().unwrap();
        assert!(!wager.cashed_out);
        assert_eq!(wager.cashout_multiplier, None);

        // Nothing mutates the lost wager while crashed
        now += Duration::from_secs(2);
        engine.tick(now);
        assert_eq!(engine.round().wager_of(ParticipantId(0)), Some(&wager));
        assert_eq!(engine.pool().total_balance(), 4_900);
    }

    #[test]
    fn test_cashout_scenario() {
        // balance 5000, bet 100, threshold 2.5, crash r=2/3 -> 3.00x.
        // Draws after the crash point are all 0.5, so the first eligible
        // tick cashes out.
        let t0 = Instant::now();
        let mut draws = vec![0.0, 0.9, 2.0 / 3.0];
        draws.extend(std::iter::repeat(0.5).take(64));
        let mut engine = RoundEngine::new(solo_config(5_000, 100, 2.5), SequenceSource::new(draws), t0);

        engine.start_round(t0);
        let start = t0 + Duration::from_millis(3_000);
        engine.tick(start);
        assert_eq!(engine.crash_point(), Some(3.0));

        let mut now = start;
        let mut cashed_at = None;
        while engine.phase() == RoundPhase::Running {
            now += TICK;
            let result = engine.tick(now);
            for event in &result.events {
                if let RoundEvent::CashedOut { multiplier, payout, .. } = event {
                    assert_eq!(*payout, (100.0 * multiplier).round() as u64);
                    cashed_at = Some(*multiplier);
                }
            }
        }

        let m = cashed_at.expect("wager should cash out before 3.00x");
        assert!((2.5..=3.0).contains(&m), "cashed out at {m}");
        let wager = engine.round().wager_of(ParticipantId(0)).unwrap();
        assert!(wager.cashed_out);
        assert_eq!(wager.cashout_multiplier, Some(m));
        assert_eq!(
            engine.pool().total_balance(),
            5_000 - 100 + wager.payout_at(m)
        );
    }

    #[test]
    fn test_late_tick_settles_at_crash_point() {
        // Crash r=2/3 -> 3.00x, threshold 2.9. The only running tick lands at
        // 3.05 s where the curve reads 3.23x; the wager first becomes eligible
        // on that crash tick.
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.9, 2.0 / 3.0, 0.5]);
        let mut engine = RoundEngine::new(solo_config(5_000, 100, 2.9), rng, t0);

        engine.start_round(t0);
        let start = t0 + Duration::from_millis(3_000);
        engine.tick(start);
        assert_eq!(engine.crash_point(), Some(3.0));

        let result = engine.tick(start + Duration::from_millis(3_050));
        assert!(result.crashed);
        assert!(matches!(
            result.events.first(),
            Some(RoundEvent::CashedOut { multiplier, payout: 300, .. }) if *multiplier == 3.0
        ));
        assert!(matches!(result.events.last(), Some(RoundEvent::Crashed { losing_wagers: 0, .. })));

        let wager = engine.round().wager_of(ParticipantId(0)).unwrap();
        assert!(wager.cashed_out);
        assert_eq!(wager.cashout_multiplier, Some(3.0));
        assert_eq!(engine.pool().total_balance(), 5_000 - 100 + 300);
        assert_eq!(engine.multiplier(), 3.0);
    }

    #[test]
    fn test_config_falls_back_on_unusable_values() {
        let config = EngineConfig {
            tick_interval: Duration::ZERO,
            history_capacity: 0,
            min_round_delay: Duration::from_millis(6_000),
            max_round_delay: Duration::from_millis(4_000),
            ..Default::default()
        }
        .sanitized();
        let defaults = EngineConfig::default();

        assert_eq!(config.tick_interval, defaults.tick_interval);
        assert_eq!(config.history_capacity, defaults.history_capacity);
        assert_eq!(config.min_round_delay, defaults.min_round_delay);
        assert_eq!(config.max_round_delay, defaults.max_round_delay);

        // Usable values pass through
        let custom = EngineConfig {
            tick_interval: Duration::from_millis(20),
            history_capacity: 10,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(custom.tick_interval, Duration::from_millis(20));
        assert_eq!(custom.history_capacity, 10);
    }

    #[test]
    fn test_config_from_env_survives_zero_values() {
        std::env::set_var("CRASH_TICK_MS", "0");
        std::env::set_var("CRASH_HISTORY_CAPACITY", "0");
        std::env::set_var("CRASH_MIN_ROUND_DELAY_MS", "5000");
        std::env::set_var("CRASH_MAX_ROUND_DELAY_MS", "5000");
        let config = EngineConfig::from_env();
        for key in ["CRASH_TICK_MS", "CRASH_HISTORY_CAPACITY", "CRASH_MIN_ROUND_DELAY_MS", "CRASH_MAX_ROUND_DELAY_MS"] {
            std::env::remove_var(key);
        }

        assert_eq!(config.tick_interval, Duration::from_millis(crate::TICK_INTERVAL_MS));
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert!(config.min_round_delay < config.max_round_delay);
        // Constructing an engine from it no longer panics
        let _ = RoundEngine::new(config, SequenceSource::new(vec![0.0]), Instant::now());
    }

    #[test]
    fn test_history_after_seven_rounds() {
        let t0 = Instant::now();
        let mut engine = RoundEngine::new(EngineConfig::default(), DeterministicRng::new(99), t0);

        let mut now = t0;
        let mut crashes = Vec::new();
        while crashes.len() < 7 {
            now += TICK;
            if engine.tick(now).crashed {
                crashes.push(engine.multiplier());
                assert_eq!(Some(engine.multiplier()), engine.crash_point());
            }
        }

        let expected: Vec<f64> = crashes.iter().rev().take(5).copied().collect();
        assert_eq!(engine.history().to_vec(), expected);
        assert_eq!(engine.round().id, 7);
    }

    #[test]
    fn test_multiplier_bounded_and_monotonic_over_many_rounds() {
        let t0 = Instant::now();
        let mut engine = RoundEngine::new(EngineConfig::default(), DeterministicRng::new(4242), t0);
        let starting_total = engine.pool().total_balance();

        let mut now = t0;
        let mut last = (0, 1.0);
        for _ in 0..20_000 {
            now += TICK;
            engine.tick(now);
            let round = engine.round();
            if round.phase == RoundPhase::Running {
                if last.0 == round.id {
                    assert!(round.multiplier >= last.1);
                }
                assert!(round.multiplier <= round.crash_point.unwrap());
                last = (round.id, round.multiplier);
            }
        }
        // Balances moved, and never underflowed
        assert_ne!(engine.pool().total_balance(), starting_total);
    }

    #[test]
    fn test_place_wager_phases() {
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.0, 0.5, 0.0]);
        let mut engine = RoundEngine::new(solo_config(1_000, 100, 50.0), rng, t0);
        let solo = ParticipantId(0);

        // Waiting: attached to the upcoming round
        let wager = engine.place_wager(solo, 300).unwrap();
        assert_eq!(wager.amount, 300);
        assert_eq!(engine.pool().total_balance(), 700);
        assert_eq!(engine.place_wager(solo, 10), Err(WagerError::WagerAlreadyPlaced));

        // Carried into the countdown; the simulated bet is skipped
        engine.start_round(t0);
        assert_eq!(engine.round().wagers.len(), 1);
        assert_eq!(engine.round().wagers[0].amount, 300);

        engine.tick(t0 + Duration::from_millis(3_000));
        assert_eq!(
            engine.place_wager(solo, 10),
            Err(WagerError::RoundNotAcceptingWagers(RoundPhase::Running))
        );
    }

    #[test]
    fn test_place_wager_validation() {
        let t0 = Instant::now();
        let mut engine = RoundEngine::new(solo_config(50, 100, 2.0), SequenceSource::new(vec![0.0]), t0);

        assert_eq!(engine.place_wager(ParticipantId(9), 10), Err(WagerError::UnknownParticipant(ParticipantId(9))));
        assert_eq!(engine.place_wager(ParticipantId(0), 0), Err(WagerError::InvalidAmount));
        assert_eq!(engine.place_wager(ParticipantId(0), 51), Err(WagerError::InsufficientBalance));
        assert!(engine.place_wager(ParticipantId(0), 50).is_ok());
        assert_eq!(engine.pool().total_balance(), 0);
    }

    #[test]
    fn test_commitment_revealed_on_crash() {
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.0, 0.5, 0.0]);
        let mut engine = RoundEngine::new(solo_config(0, 100, 50.0), rng, t0);
        engine.start_round(t0);
        let start = t0 + Duration::from_millis(3_000);
        let started = engine.tick(start);

        let Some(RoundEvent::RoundStarted { commitment, .. }) = started.events.first() else {
            panic!("expected round start event");
        };
        let commitment = commitment.clone();

        let result = engine.tick(start + Duration::from_secs(5));
        let Some(RoundEvent::Crashed { crash_point, salt, .. }) = result.events.last() else {
            panic!("expected crash event");
        };

        let published = engine.round().commitment.clone().unwrap();
        assert_eq!(published.hash_hex(), commitment);
        let salt: [u8; 32] = hex::decode(salt).unwrap().try_into().unwrap();
        assert!(published.verify(*crash_point, &salt));
    }

    #[test]
    #[should_panic(expected = "precedes round start")]
    fn test_tick_before_start_panics() {
        let t0 = Instant::now();
        let rng = SequenceSource::new(vec![0.0, 0.0, 0.5, 0.0]);
        let mut engine = RoundEngine::new(solo_config(0, 100, 50.0), rng, t0 + Duration::from_secs(1));
        engine.start_round(t0 + Duration::from_secs(1));
        engine.tick(t0 + Duration::from_secs(4));
        engine.tick(t0);
    }
}
