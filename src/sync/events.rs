//! Event system for log and chain synchronization.
//!
//! The engines publish a [`SyncEvent`] whenever a store changes or a sync attempt fails.
//! Presentation code registers [`SyncEventHandler`]s on an [`EventDispatcher`] to react
//! (redraw a log view, refresh a block list) without polling the stores.

use crate::api::Host;
use crate::sync::SyncError;

/// Events that occur during synchronization
#[derive(Debug, Clone)]
pub enum SyncEvent {
	/// New log entries were appended for a host
	LogsMerged {
		host: Host,
		appended: usize,
		cursor: u64,
	},
	/// Entries at or below the cursor were refused
	StaleEntriesDropped {
		host: Host,
		dropped: usize,
		cursor: u64,
	},
	/// The stored chain of a miner was replaced
	ChainReplaced { host: Host, blocks: usize },
	/// A poll or refresh failed; the stores were left untouched
	SyncFailed { host: Host, error: SyncError },
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
	/// Handle a sync event.
	async fn handle(&self, event: &SyncEvent) -> Result<(), SyncError>;

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that fans events out to every registered handler.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
	/// Create a new, empty event dispatcher.
	pub fn new() -> Self {
		Self {
			handlers: Vec::new(),
		}
	}

	/// Register a new event handler.
	///
	/// Handlers are called in the order they are registered.
	pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
		self.handlers.push(handler);
	}

	/// Dispatch an event to all registered handlers.
	///
	/// Errors from handlers are logged, but do not stop other handlers from running.
	pub async fn dispatch(&self, event: &SyncEvent) {
		for handler in &self.handlers {
			if let Err(e) = handler.handle(event).await {
				tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
			}
		}
	}
}
