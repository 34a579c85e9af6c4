//! Environment Configuration
//!
//! Each layer owns its config struct with a `Default` and a `from_env()`
//! constructor; this module holds the shared parsing helpers and the
//! aggregate [`AppConfig`] the binary loads at startup.
//!
//! Unset or unparsable variables fall back to the default silently.

use std::str::FromStr;
use std::time::Duration;

use crate::game::engine::EngineConfig;
use crate::network::server::ServerConfig;
use crate::network::snapshot::SnapshotConfig;

/// Read `key` and parse it, falling back to `fallback`.
pub fn env_or<T: FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(fallback)
}

/// Read a millisecond duration from `key`.
pub fn env_ms(key: &str, fallback: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(fallback)
}

/// Everything the binary needs to start.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Round engine timing and roster.
    pub engine: EngineConfig,
    /// Snapshot throttling.
    pub snapshot: SnapshotConfig,
    /// Snapshot feed server.
    pub server: ServerConfig,
    /// Fixed engine seed (`CRASH_RNG_SEED`); OS entropy when unset.
    pub rng_seed: Option<u64>,
}

impl AppConfig {
    /// Load from `CRASH_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            engine: EngineConfig::from_env(),
            snapshot: SnapshotConfig::from_env(),
            server: ServerConfig::from_env(),
            rng_seed: std::env::var("CRASH_RNG_SEED")
                .ok()
                .and_then(|raw| raw.trim().parse().ok()),
        }
    }
}
