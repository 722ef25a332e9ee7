//! Synchronization Module
//!
//! This module turns the stateless API calls into application state:
//!
//! - `logs`: per-host cursor and append-only merge of log streams (`LogStore`, `LogSyncEngine`).
//! - `chain`: per-miner chain snapshots replaced wholesale (`ChainView`, `BlockchainSyncEngine`).
//! - `events`: change notifications published by the engines.
//! - `progress_tracker`: per-host poll statistics.
//! - `monitor`: fixed-interval rounds over every host.
//!
//! Stores are plain owned values shared through `Arc`; several independent stores can live in
//! the same process.

/// Blockchain snapshot engine
pub mod chain;
/// Event system for change notification
pub mod events;
/// Incremental log engine
pub mod logs;
/// Periodic rounds over every host
pub mod monitor;
/// Poll statistics
pub mod progress_tracker;
mod types;

pub use chain::{BlockchainSyncEngine, ChainSnapshot, ChainView};
pub use events::{EventDispatcher, SyncEvent, SyncEventHandler};
pub use logs::{LogStore, LogSyncEngine};
pub use monitor::{RoundReport, SyncMonitor};
pub use progress_tracker::PollStats;
pub use types::*;
