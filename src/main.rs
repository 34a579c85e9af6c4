//! Crash Engine Server
//!
//! Runs the round engine and serves its snapshots over WebSocket.

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crash_engine::{
    VERSION, AppConfig, DeterministicRng, EngineDriver, RoundEngine,
    network::server::SnapshotServer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();

    info!("Crash Engine v{}", VERSION);
    info!(
        "Tick: {} ms, participants: {}, history: {}",
        config.engine.tick_interval.as_millis(),
        config.engine.roster.len(),
        config.engine.history_capacity
    );

    let rng = match config.rng_seed {
        Some(seed) => {
            info!("Using fixed RNG seed {}", seed);
            DeterministicRng::new(seed)
        }
        None => DeterministicRng::from_entropy(),
    };

    let engine = RoundEngine::new(config.engine.clone(), rng, Instant::now().into_std());
    let (driver, handle) = EngineDriver::new(engine, config.snapshot.clone());

    let (shutdown_tx, _) = broadcast::channel(1);
    let driver_task = driver.spawn(shutdown_tx.subscribe());

    let server = SnapshotServer::new(config.server.clone(), handle);
    info!("Serving snapshots on ws://{}", config.server.bind_addr);

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    let _ = shutdown_tx.send(());
    let engine = driver_task.await?;
    info!(
        "Stopped at round {}, history: {:?}",
        engine.round().id,
        engine.history().to_vec()
    );

    Ok(())
}
