//! Round State
//!
//! The round, its phase, and the wagers placed against it.

use std::fmt;
use std::time::Instant;

use serde::{Serialize, Deserialize};

use crate::core::curve::to_hundredths;
use crate::proof::commitment::RoundCommitment;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Participant identifier (index into the roster).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Lifecycle phase of the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    /// Between rounds, waiting for the next one to be scheduled.
    #[default]
    Waiting,
    /// Bets are being taken; the crash point is not fixed yet.
    Countdown,
    /// Multiplier is climbing.
    Running,
    /// The round has crashed; outstanding wagers are lost.
    Crashed,
}

impl RoundPhase {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Waiting => "waiting",
            RoundPhase::Countdown => "countdown",
            RoundPhase::Running => "running",
            RoundPhase::Crashed => "crashed",
        }
    }

    /// Whether external wagers may be placed in this phase.
    pub fn accepts_wagers(&self) -> bool {
        matches!(self, RoundPhase::Waiting | RoundPhase::Countdown)
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WAGER
// =============================================================================

/// A stake placed by one participant on one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    /// Owner.
    pub participant_id: ParticipantId,
    /// Stake, already debited from the owner's balance.
    pub amount: u64,
    /// Whether the wager was cashed out before the crash.
    pub cashed_out: bool,
    /// Multiplier at cash-out. Only meaningful when `cashed_out` is set.
    pub cashout_multiplier: Option<f64>,
}

impl Wager {
    /// Create an outstanding wager.
    pub fn new(participant_id: ParticipantId, amount: u64) -> Self {
        Self {
            participant_id,
            amount,
            cashed_out: false,
            cashout_multiplier: None,
        }
    }

    /// Whether the wager is still riding.
    pub fn is_outstanding(&self) -> bool {
        !self.cashed_out
    }

    /// Payout for cashing out at `multiplier`: `floor(amount * multiplier)`.
    ///
    /// Computed in integer hundredths so two-decimal multipliers settle
    /// exactly.
    pub fn payout_at(&self, multiplier: f64) -> u64 {
        self.amount.saturating_mul(to_hundredths(multiplier)) / 100
    }

    /// Settle at `multiplier`, returning the payout.
    pub(crate) fn cash_out(&mut self, multiplier: f64) -> u64 {
        debug_assert!(self.is_outstanding(), "wager cashed out twice");
        self.cashed_out = true;
        self.cashout_multiplier = Some(multiplier);
        self.payout_at(multiplier)
    }
}

// =============================================================================
// ROUND
// =============================================================================

/// The unit of play.
///
/// Exactly one round exists at a time. Its identity begins when the engine
/// leaves `Waiting` and ends when it re-enters `Waiting`.
#[derive(Clone, Debug)]
pub struct Round {
    /// Sequential round number (starts at 1).
    pub id: u64,
    /// Current phase.
    pub phase: RoundPhase,
    /// Crash point, fixed on entry to `Running`.
    pub crash_point: Option<f64>,
    /// Live multiplier, two-decimal rounded.
    pub multiplier: f64,
    /// When the running phase began.
    pub started_at: Option<Instant>,
    /// Deadline for the current phase's timer.
    pub phase_ends_at: Instant,
    /// Wagers attached to this round (at most one per participant).
    pub wagers: Vec<Wager>,
    /// Commitment to the crash point, published while running.
    pub commitment: Option<RoundCommitment>,
}

impl Round {
    /// A fresh round in `Waiting`, whose waiting timer ends at `next_start`.
    pub fn waiting(id: u64, next_start: Instant) -> Self {
        Self {
            id,
            phase: RoundPhase::Waiting,
            crash_point: None,
            multiplier: 1.0,
            started_at: None,
            phase_ends_at: next_start,
            wagers: Vec::new(),
            commitment: None,
        }
    }

    /// Seconds spent in the running phase (0 outside `Running`).
    pub fn elapsed_secs(&self, now: Instant) -> f64 {
        match (self.phase, self.started_at) {
            (RoundPhase::Running, Some(started)) => {
                now.saturating_duration_since(started).as_secs_f64()
            }
            _ => 0.0,
        }
    }

    /// Wager placed by `participant_id`, if any.
    pub fn wager_of(&self, participant_id: ParticipantId) -> Option<&Wager> {
        self.wagers.iter().find(|w| w.participant_id == participant_id)
    }

    /// Wagers that have not been cashed out.
    pub fn outstanding_wagers(&self) -> impl Iterator<Item = &Wager> {
        self.wagers.iter().filter(|w| w.is_outstanding())
    }
}
