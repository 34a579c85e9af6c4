//! Round Events
//!
//! Emitted by the engine as a round moves through its lifecycle. The driver
//! logs them and forwards them to snapshot-feed subscribers.

use serde::{Serialize, Deserialize};

use crate::game::state::ParticipantId;

/// Something that happened during a tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoundEvent {
    /// A round left `Waiting` and is taking bets.
    CountdownStarted {
        round_id: u64,
        countdown_ms: u64,
    },

    /// A wager was attached to the round.
    BetPlaced {
        round_id: u64,
        participant_id: ParticipantId,
        amount: u64,
    },

    /// The multiplier started climbing. The crash point is committed, not
    /// revealed.
    RoundStarted {
        round_id: u64,
        commitment: String,
    },

    /// A wager was settled by cash-out.
    CashedOut {
        round_id: u64,
        participant_id: ParticipantId,
        multiplier: f64,
        payout: u64,
    },

    /// The round crashed.
    Crashed {
        round_id: u64,
        crash_point: f64,
        salt: String,
        losing_wagers: usize,
    },

    /// The engine is idle until the next round.
    WaitingStarted {
        next_round_id: u64,
        delay_ms: u64,
    },
}

impl RoundEvent {
    /// Round this event belongs to.
    pub fn round_id(&self) -> u64 {
        match self {
            RoundEvent::CountdownStarted { round_id, .. }
            | RoundEvent::BetPlaced { round_id, .. }
            | RoundEvent::RoundStarted { round_id, .. }
            | RoundEvent::CashedOut { round_id, .. }
            | RoundEvent::Crashed { round_id, .. } => *round_id,
            RoundEvent::WaitingStarted { next_round_id, .. } => *next_round_id,
        }
    }
}
