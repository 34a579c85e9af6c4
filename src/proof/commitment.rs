//! Crash Point Commitment
//!
//! Commit to a round's crash point the moment it is fixed, reveal the salt
//! when the round crashes. Anyone holding the reveal can check that the
//! crash point was not changed while the round was running.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::core::curve::to_hundredths;

/// Domain separator for commitments.
const COMMITMENT_DOMAIN: &[u8] = b"CRASH_ENGINE_COMMIT_V1";

/// SHA-256 digest.
pub type CommitmentHash = [u8; 32];

/// Secret salt mixed into a commitment.
pub type CommitmentSalt = [u8; 32];

/// Commitment published when a round enters the running phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCommitment {
    /// Round the commitment belongs to.
    pub round_id: u64,
    /// Published hash.
    pub hash: CommitmentHash,
    /// Salt, kept secret until the round crashes.
    #[serde(skip)]
    salt: CommitmentSalt,
}

impl RoundCommitment {
    /// Commit to `crash_point` with a fresh random salt.
    pub fn new(round_id: u64, crash_point: f64) -> Self {
        Self::with_salt(round_id, crash_point, rand::random())
    }

    /// Commit with an explicit salt.
    pub fn with_salt(round_id: u64, crash_point: f64, salt: CommitmentSalt) -> Self {
        Self {
            round_id,
            hash: compute_commitment_hash(round_id, crash_point, &salt),
            salt,
        }
    }

    /// Hex form of the published hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Reveal the salt. Only call once the crash point is public.
    pub fn reveal(&self) -> CommitmentSalt {
        self.salt
    }

    /// Check a revealed crash point and salt against this commitment.
    pub fn verify(&self, crash_point: f64, salt: &CommitmentSalt) -> bool {
        compute_commitment_hash(self.round_id, crash_point, salt) == self.hash
    }
}

/// Compute commitment hash over the round id, the crash point in integer
/// hundredths, and the salt.
fn compute_commitment_hash(round_id: u64, crash_point: f64, salt: &CommitmentSalt) -> CommitmentHash {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(round_id.to_le_bytes());
    hasher.update(to_hundredths(crash_point).to_le_bytes());
    hasher.update(salt);
    hasher.finalize().into()
}
