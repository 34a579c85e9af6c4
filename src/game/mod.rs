//! Game Logic Module
//!
//! The round state machine and everything it owns.
//!
//! ## Module Structure
//!
//! - `state`: Rounds, phases and wagers
//! - `participants`: Simulated bettors and their bet/cash-out passes
//! - `history`: Bounded crash-point ledger
//! - `events`: Round lifecycle events
//! - `engine`: The tick-driven round engine

pub mod state;
pub mod participants;
pub mod history;
pub mod events;
pub mod engine;

// Re-export key types
pub use state::{ParticipantId, Round, RoundPhase, Wager};
pub use participants::{Participant, ParticipantPool, ParticipantProfile};
pub use history::HistoryLedger;
pub use events::RoundEvent;
pub use engine::{EngineConfig, RoundEngine, TickResult, WagerError};
