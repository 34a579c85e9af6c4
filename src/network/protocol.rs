//! Protocol Messages
//!
//! Wire format for the snapshot feed. Snapshots use camelCase field names;
//! WebSocket messages are JSON objects tagged by `type`.

use serde::{Serialize, Deserialize};

use crate::game::events::RoundEvent;
use crate::game::state::{ParticipantId, RoundPhase};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Immutable, timestamped copy of the engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    /// Current round number.
    pub round_id: u64,
    /// Live multiplier, two-decimal rounded.
    pub multiplier: f64,
    /// Crash point. `null` in every phase but `crashed`: it is fixed when the
    /// round starts running, but only `commitment` is published until the
    /// multiplier reaches it.
    pub crash_point: Option<f64>,
    /// Current phase.
    pub state: RoundPhase,
    /// Recent crash points, most recent first.
    pub history: Vec<f64>,
    /// Wagers on the current round.
    pub wagers: Vec<WagerView>,
    /// All participants and their balances.
    pub participants: Vec<ParticipantView>,
    /// Seconds since the round started running (0 outside `Running`).
    pub elapsed_seconds: f64,
    /// Capture time, epoch milliseconds.
    pub captured_at: i64,
    /// Hex commitment to the crash point, once fixed.
    pub commitment: Option<String>,
    /// Hex commitment salt, once the round has crashed.
    pub revealed_salt: Option<String>,
}

/// Wager as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WagerView {
    /// Owner.
    pub participant_id: ParticipantId,
    /// Owner's display name.
    pub participant_name: String,
    /// Stake.
    pub amount: u64,
    /// Whether the wager was cashed out.
    pub cashed_out: bool,
    /// Cash-out multiplier, if cashed out.
    pub cashout_multiplier: Option<f64>,
}

/// Participant as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    /// Identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Current balance.
    pub balance: u64,
    /// Fixed stake.
    pub fixed_bet_amount: u64,
    /// Cash-out threshold.
    pub cash_out_threshold: f64,
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the latest snapshot immediately.
    SyncRequest,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Latest engine snapshot.
    Snapshot(EngineSnapshot),

    /// Round lifecycle event.
    Event(RoundEvent),

    /// Pong response.
    Pong { timestamp: u64, server_time: i64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid input.
    InvalidInput,
    /// Server overloaded.
    ServerOverloaded,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Error message shorthand.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError {
            code,
            message: message.into(),
        })
    }
}
