//! Simulated Participants
//!
//! A small fixed roster of synthetic bettors that keeps the engine under
//! continuous load. Each round every participant may place its fixed bet;
//! each running tick every outstanding wager may cash out once the
//! multiplier passes its owner's threshold.
//!
//! Both decisions are random draws on top of the static policy, so observers
//! see varied behavior from round to round.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::RandomSource;
use crate::game::state::{ParticipantId, Wager};

/// A participant bets only when its draw exceeds this value (70% of rounds).
pub const BET_DRAW_CUTOFF: f64 = 0.3;

/// An eligible wager cashes out only when its draw exceeds this value
/// (80% of eligible ticks).
pub const CASHOUT_DRAW_CUTOFF: f64 = 0.2;

/// Static description of a simulated participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    /// Display name.
    pub name: String,
    /// Starting balance.
    pub balance: u64,
    /// Stake placed every round the participant bets.
    pub fixed_bet_amount: u64,
    /// Multiplier at which the participant starts trying to cash out.
    pub cash_out_threshold: f64,
}

impl ParticipantProfile {
    /// Create a profile.
    pub fn new(name: impl Into<String>, balance: u64, fixed_bet_amount: u64, cash_out_threshold: f64) -> Self {
        Self {
            name: name.into(),
            balance,
            fixed_bet_amount,
            cash_out_threshold,
        }
    }
}

/// Roster used when nothing else is configured.
pub fn default_roster() -> Vec<ParticipantProfile> {
    vec![
        ParticipantProfile::new("Nova", 5_000, 100, 1.5),
        ParticipantProfile::new("Quill", 5_000, 250, 2.0),
        ParticipantProfile::new("Marlow", 10_000, 500, 3.0),
        ParticipantProfile::new("Juno", 2_500, 50, 1.25),
        ParticipantProfile::new("Ember", 8_000, 200, 5.0),
        ParticipantProfile::new("Tove", 20_000, 1_000, 10.0),
    ]
}

/// A simulated participant. Lives as long as the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Current balance. Never negative.
    pub balance: u64,
    /// Stake placed every round the participant bets.
    pub fixed_bet_amount: u64,
    /// Multiplier at which the participant starts trying to cash out.
    pub cash_out_threshold: f64,
}

/// A wager settled by cash-out during a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct CashOut {
    /// Owner.
    pub participant_id: ParticipantId,
    /// Multiplier the wager was settled at.
    pub multiplier: f64,
    /// Amount credited.
    pub payout: u64,
}

/// The roster plus the two per-round policy passes.
#[derive(Clone, Debug)]
pub struct ParticipantPool {
    participants: Vec<Participant>,
}

impl ParticipantPool {
    /// Build a pool from profiles. Ids follow roster order.
    pub fn new(profiles: &[ParticipantProfile]) -> Self {
        let participants = profiles
            .iter()
            .enumerate()
            .map(|(idx, profile)| {
                assert!(
                    profile.cash_out_threshold.is_finite() && profile.cash_out_threshold >= 1.0,
                    "cash-out threshold for {} must be at least 1.0",
                    profile.name
                );
                Participant {
                    id: ParticipantId(idx as u32),
                    name: profile.name.clone(),
                    balance: profile.balance,
                    fixed_bet_amount: profile.fixed_bet_amount,
                    cash_out_threshold: profile.cash_out_threshold,
                }
            })
            .collect();

        Self { participants }
    }

    /// All participants in id order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Look up a participant.
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(id.0 as usize)
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Sum of all balances.
    pub fn total_balance(&self) -> u64 {
        self.participants.iter().map(|p| p.balance).sum()
    }

    /// Debit `amount` if the balance covers it.
    pub(crate) fn try_debit(&mut self, id: ParticipantId, amount: u64) -> bool {
        match self.participants.get_mut(id.0 as usize) {
            Some(p) if p.balance >= amount => {
                p.balance -= amount;
                true
            }
            _ => false,
        }
    }

    /// Bet-placement pass, run once as a round enters countdown.
    ///
    /// Every participant draws once, in id order. A participant bets its
    /// fixed amount when the draw exceeds [`BET_DRAW_CUTOFF`] and its balance
    /// covers the stake. Participants that already hold a wager in `wagers`
    /// still draw but are skipped. Returns the wagers created by this pass.
    pub fn place_bets<R: RandomSource + ?Sized>(&mut self, wagers: &mut Vec<Wager>, rng: &mut R) -> Vec<Wager> {
        let mut placed = Vec::new();

        for participant in &mut self.participants {
            let draw = rng.next_unit();

            if wagers.iter().any(|w| w.participant_id == participant.id) {
                continue;
            }
            if draw <= BET_DRAW_CUTOFF || participant.balance < participant.fixed_bet_amount {
                continue;
            }
            if participant.fixed_bet_amount == 0 {
                continue;
            }

            participant.balance -= participant.fixed_bet_amount;
            let wager = Wager::new(participant.id, participant.fixed_bet_amount);
            debug!(
                participant = %participant.name,
                amount = wager.amount,
                balance = participant.balance,
                "simulated bet placed"
            );
            wagers.push(wager.clone());
            placed.push(wager);
        }

        placed
    }

    /// Cash-out pass, run once per running tick with the tick's multiplier.
    ///
    /// For each outstanding wager whose owner's threshold is reached, draw
    /// once; above [`CASHOUT_DRAW_CUTOFF`] the wager settles at `multiplier`
    /// and `floor(amount * multiplier)` is credited. Wagers that lose the
    /// draw stay outstanding for a later tick.
    pub fn evaluate_cashouts<R: RandomSource + ?Sized>(
        &mut self,
        wagers: &mut [Wager],
        multiplier: f64,
        rng: &mut R,
    ) -> Vec<CashOut> {
        let mut settled = Vec::new();

        for wager in wagers.iter_mut().filter(|w| w.is_outstanding()) {
            let Some(participant) = self.participants.get_mut(wager.participant_id.0 as usize) else {
                continue;
            };
            if multiplier < participant.cash_out_threshold {
                continue;
            }
            if rng.next_unit() <= CASHOUT_DRAW_CUTOFF {
                continue;
            }

            let payout = wager.cash_out(multiplier);
            participant.balance = participant.balance.saturating_add(payout);
            debug!(
                participant = %participant.name,
                multiplier,
                payout,
                balance = participant.balance,
                "simulated cash-out"
            );
            settled.push(CashOut {
                participant_id: participant.id,
                multiplier,
                payout,
            });
        }

        settled
    }
}

impl Default for ParticipantPool {
    fn default() -> Self {
        Self::new(&default_roster())
    }
}
