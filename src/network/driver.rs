//! Engine Driver
//!
//! The single task that owns the [`RoundEngine`]. It ticks the engine on a
//! fixed interval, applies queued commands between ticks, publishes
//! snapshots and fans round events out to subscribers. Everything else talks
//! to it through a cloneable [`EngineHandle`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::rng::{DeterministicRng, RandomSource};
use crate::game::engine::{RoundEngine, WagerError};
use crate::game::events::RoundEvent;
use crate::game::state::{ParticipantId, Wager};
use crate::network::protocol::EngineSnapshot;
use crate::network::snapshot::{SnapshotConfig, SnapshotPublisher, SnapshotReader};

/// Pending commands before senders start waiting.
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Events buffered per subscriber before it starts lagging.
const EVENT_BUFFER: usize = 256;

/// Requests applied on the engine task.
#[derive(Debug)]
pub enum EngineCommand {
    /// Place an external wager.
    PlaceWager {
        /// Bettor.
        participant_id: ParticipantId,
        /// Stake.
        amount: u64,
        /// Outcome.
        reply: oneshot::Sender<Result<Wager, WagerError>>,
    },
    /// Start the next round now if the engine is waiting.
    StartRound {
        /// Whether a countdown was started.
        reply: oneshot::Sender<bool>,
    },
}

/// Errors returned through an [`EngineHandle`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineHandleError {
    /// The driver task is gone.
    #[error("Engine driver stopped")]
    EngineStopped,

    /// The engine rejected the wager.
    #[error("Wager rejected: {0}")]
    Wager(#[from] WagerError),
}

/// Cloneable access to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    snapshots: SnapshotReader,
    events: broadcast::Sender<RoundEvent>,
}

impl EngineHandle {
    /// Place an external wager and wait for the engine's answer.
    pub async fn place_wager(&self, participant_id: ParticipantId, amount: u64) -> Result<Wager, EngineHandleError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::PlaceWager {
                participant_id,
                amount,
                reply,
            })
            .await
            .map_err(|_| EngineHandleError::EngineStopped)?;

        let result = rx.await.map_err(|_| EngineHandleError::EngineStopped)?;
        Ok(result?)
    }

    /// Skip the rest of the waiting delay. Returns whether a countdown began.
    pub async fn start_round(&self) -> Result<bool, EngineHandleError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::StartRound { reply })
            .await
            .map_err(|_| EngineHandleError::EngineStopped)?;

        rx.await.map_err(|_| EngineHandleError::EngineStopped)
    }

    /// Most recent snapshot.
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshots.snapshot()
    }

    /// Independent snapshot reader.
    pub fn snapshots(&self) -> SnapshotReader {
        self.snapshots.clone()
    }

    /// Subscribe to round events from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }
}

/// Owns the engine and runs its tick loop.
pub struct EngineDriver<R: RandomSource = DeterministicRng> {
    engine: RoundEngine<R>,
    publisher: SnapshotPublisher,
    commands: mpsc::Receiver<EngineCommand>,
    events: broadcast::Sender<RoundEvent>,
}

impl<R: RandomSource + Send + 'static> EngineDriver<R> {
    /// Wrap `engine`, returning the driver and a handle to it.
    pub fn new(engine: RoundEngine<R>, snapshot_config: SnapshotConfig) -> (Self, EngineHandle) {
        let publisher = SnapshotPublisher::new(snapshot_config, &engine, Instant::now().into_std());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let handle = EngineHandle {
            commands: command_tx,
            snapshots: publisher.reader(),
            events: events.clone(),
        };

        let driver = Self {
            engine,
            publisher,
            commands: command_rx,
            events,
        };

        (driver, handle)
    }

    /// Run on a new task until `shutdown` fires.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<RoundEngine<R>> {
        tokio::spawn(self.run(shutdown))
    }

    /// Tick loop. Returns the engine once `shutdown` fires or its sender is
    /// dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> RoundEngine<R> {
        let mut ticker = interval(self.engine.config().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_ms = self.engine.config().tick_interval.as_millis() as u64,
            "engine driver started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now().into_std();
                    let result = self.engine.tick(now);
                    self.dispatch(result.events);
                    self.publisher.publish(&self.engine, now);
                }
                Some(command) = self.commands.recv() => {
                    self.apply(command);
                }
                _ = shutdown.recv() => {
                    info!(round_id = self.engine.round().id, "engine driver stopping");
                    break;
                }
            }
        }

        self.engine
    }

    fn apply(&mut self, command: EngineCommand) {
        let now = Instant::now().into_std();

        match command {
            EngineCommand::PlaceWager {
                participant_id,
                amount,
                reply,
            } => {
                let result = self.engine.place_wager(participant_id, amount);
                match &result {
                    Ok(wager) => {
                        let event = RoundEvent::BetPlaced {
                            round_id: self.engine.round().id,
                            participant_id: wager.participant_id,
                            amount: wager.amount,
                        };
                        self.dispatch(vec![event]);
                    }
                    Err(e) => debug!(participant = %participant_id, amount, "wager rejected: {}", e),
                }
                if reply.send(result).is_err() {
                    warn!(participant = %participant_id, "wager caller went away before the reply");
                }
            }
            EngineCommand::StartRound { reply } => {
                let result = self.engine.start_round(now);
                let started = result.phase_changed;
                self.dispatch(result.events);
                let _ = reply.send(started);
            }
        }

        self.publisher.publish(&self.engine, now);
    }

    fn dispatch(&self, events: Vec<RoundEvent>) {
        for event in events {
            debug!(?event, "round event");
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}
