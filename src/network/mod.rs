//! Network Layer
//!
//! Everything async: the task that drives the engine, snapshot publishing,
//! and the WebSocket feed for observers. The engine itself never awaits.

pub mod protocol;
pub mod snapshot;
pub mod driver;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, EngineSnapshot, ErrorCode};
pub use snapshot::{SnapshotConfig, SnapshotPublisher, SnapshotReader, capture_snapshot};
pub use driver::{EngineDriver, EngineHandle, EngineHandleError};
pub use server::{SnapshotServer, ServerConfig, SnapshotServerError};
