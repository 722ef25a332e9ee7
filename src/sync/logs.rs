//! Incremental log synchronization.
//!
//! [`LogStore`] keeps, for every host, the entries received so far and the cursor (highest
//! sequence number merged). [`LogSyncEngine::poll`] asks the backend for what follows the
//! cursor and appends it. Entries are never reordered or removed, and the cursor never moves
//! backwards.
//!
//! Polls of one host are serialized by a per-host gate held for the whole poll, so two polls
//! cannot both fetch from the same cursor. The entries themselves sit behind a separate lock
//! that is only taken briefly, so readers do not wait on the network.

use crate::api::{ApiClient, Host, LogBatch, LogEntry};
use crate::sync::events::{EventDispatcher, SyncEvent};
use crate::sync::progress_tracker::PollStats;
use crate::sync::SyncError;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Log state of one host
#[derive(Debug, Default)]
struct HostLog {
	cursor: u64,
	entries: Vec<LogEntry>,
	last_reported_cursor: Option<u64>,
	stats: PollStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MergeOutcome {
	appended: usize,
	dropped: usize,
}

impl HostLog {
	/// Append the entries of `batch` that are newer than the running cursor.
	fn merge(&mut self, batch: LogBatch) -> MergeOutcome {
		let mut outcome = MergeOutcome {
			appended: 0,
			dropped: 0,
		};

		for entry in batch.entries {
			if entry.no <= self.cursor {
				outcome.dropped += 1;
				continue;
			}
			self.stats.record_sequence(self.cursor, entry.no);
			self.cursor = entry.no;
			self.entries.push(entry);
			outcome.appended += 1;
		}

		if batch.reported_cursor != self.cursor {
			debug!(
				"Server reported cursor {} but merged up to {}",
				batch.reported_cursor, self.cursor
			);
		}
		self.last_reported_cursor = Some(batch.reported_cursor);
		self.stats.record_success(outcome.appended, outcome.dropped);
		outcome
	}
}

#[derive(Debug, Default)]
struct HostSlot {
	poll_gate: Mutex<()>,
	log: RwLock<HostLog>,
}

/// Host-partitioned, append-only log store
#[derive(Debug)]
pub struct LogStore {
	slots: [HostSlot; 4],
}

impl Default for LogStore {
	fn default() -> Self {
		Self::new()
	}
}

impl LogStore {
	/// Create an empty store, every cursor at 0.
	pub fn new() -> Self {
		Self {
			slots: std::array::from_fn(|_| HostSlot::default()),
		}
	}

	fn slot(&self, host: Host) -> &HostSlot {
		&self.slots[host as usize]
	}

	/// Highest sequence number merged for `host`, 0 if none.
	pub async fn cursor(&self, host: Host) -> u64 {
		self.slot(host).log.read().await.cursor
	}

	/// Entries of `host` in the order they were merged.
	pub async fn entries(&self, host: Host) -> Vec<LogEntry> {
		self.slot(host).log.read().await.entries.clone()
	}

	pub async fn len(&self, host: Host) -> usize {
		self.slot(host).log.read().await.entries.len()
	}

	/// Cursor the server reported on the last successful poll.
	pub async fn last_reported_cursor(&self, host: Host) -> Option<u64> {
		self.slot(host).log.read().await.last_reported_cursor
	}

	pub async fn stats(&self, host: Host) -> PollStats {
		self.slot(host).log.read().await.stats.clone()
	}

	/// Render one host's entries, one `[label] #no message` line each.
	pub async fn render_host_text(&self, host: Host) -> String {
		let log = self.slot(host).log.read().await;
		let mut text = String::new();
		for entry in &log.entries {
			push_line(&mut text, host, entry);
		}
		text
	}

	/// Render every host's entries, hosts in [`Host::ALL`] order.
	pub async fn render_text(&self) -> String {
		let mut text = String::new();
		for host in Host::ALL {
			let log = self.slot(host).log.read().await;
			for entry in &log.entries {
				push_line(&mut text, host, entry);
			}
		}
		text
	}
}

fn push_line(text: &mut String, host: Host, entry: &LogEntry) {
	text.push_str(&format!("[{}] #{} {}\n", host.label(), entry.no, entry.message));
}

/// Turns repeated `GetLogs` calls into an append-only log view
#[derive(Clone)]
pub struct LogSyncEngine {
	client: ApiClient,
	store: Arc<LogStore>,
	events: Arc<EventDispatcher>,
}

impl LogSyncEngine {
	pub fn new(client: ApiClient, store: Arc<LogStore>) -> Self {
		Self::with_events(client, store, Arc::new(EventDispatcher::new()))
	}

	pub fn with_events(
		client: ApiClient,
		store: Arc<LogStore>,
		events: Arc<EventDispatcher>,
	) -> Self {
		Self {
			client,
			store,
			events,
		}
	}

	pub fn store(&self) -> &Arc<LogStore> {
		&self.store
	}

	/// Fetch and merge the entries of `host` newer than its cursor.
	///
	/// Returns the number of entries appended. On failure the cursor and entries are left
	/// as they were and the poll can simply be repeated.
	pub async fn poll(&self, host: Host) -> Result<usize, SyncError> {
		let slot = self.store.slot(host);
		let _gate = slot.poll_gate.lock().await;

		let cursor = slot.log.read().await.cursor;
		let batch = match self.client.get_logs(host, cursor).await {
			Ok(batch) => batch,
			Err(e) => {
				slot.log.write().await.stats.record_failure();
				let error = SyncError::from(e);
				warn!("Log poll of {} failed: {}", host, error);
				self.events
					.dispatch(&SyncEvent::SyncFailed {
						host,
						error: error.clone(),
					})
					.await;
				return Err(error);
			}
		};

		let (outcome, cursor) = {
			let mut log = slot.log.write().await;
			let outcome = log.merge(batch);
			(outcome, log.cursor)
		};

		if outcome.dropped > 0 {
			warn!(
				"Dropped {} stale log entries from {} (cursor {})",
				outcome.dropped, host, cursor
			);
			self.events
				.dispatch(&SyncEvent::StaleEntriesDropped {
					host,
					dropped: outcome.dropped,
					cursor,
				})
				.await;
		}
		if outcome.appended > 0 {
			info!(
				"Merged {} log entries from {}, cursor now {}",
				outcome.appended, host, cursor
			);
			self.events
				.dispatch(&SyncEvent::LogsMerged {
					host,
					appended: outcome.appended,
					cursor,
				})
				.await;
		}

		Ok(outcome.appended)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api::transport::testing::ScriptedTransport;
	use crate::api::{ApiError, Credentials};
	use crate::sync::events::testing::RecordingHandler;
	use serde_json::json;
	use std::time::Duration;

	fn entry(no: u64) -> serde_json::Value {
		json!({"no": no, "message": format!("ligne {}", no)})
	}

	fn batch(cursor: u64, nos: &[u64]) -> serde_json::Value {
		json!({"dernier": cursor, "logs": nos.iter().map(|n| entry(*n)).collect::<Vec<_>>()})
	}

	async fn engine_with(transport: &Arc<ScriptedTransport>) -> LogSyncEngine {
		let client = ApiClient::new(transport.clone());
		transport.respond_json(200, json!({"access_token": "abc"}));
		client
			.login(&Credentials::new("admin", "pw"))
			.await
			.unwrap();
		LogSyncEngine::new(client, Arc::new(LogStore::new()))
	}

	async fn nos(store: &LogStore, host: Host) -> Vec<u64> {
		store.entries(host).await.iter().map(|e| e.no).collect()
	}

	#[tokio::test]
	async fn batches_are_concatenated_in_order() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(2, &[1, 2]))
			.respond_json(200, batch(3, &[3]))
			.respond_json(200, batch(6, &[4, 5, 6]));

		assert_eq!(engine.poll(Host::Miner1).await, Ok(2));
		assert_eq!(engine.poll(Host::Miner1).await, Ok(1));
		assert_eq!(engine.poll(Host::Miner1).await, Ok(3));

		let store = engine.store();
		assert_eq!(nos(store, Host::Miner1).await, vec![1, 2, 3, 4, 5, 6]);
		assert_eq!(store.cursor(Host::Miner1).await, 6);

		let cursors_sent: Vec<_> = transport.requests()[1..]
			.iter()
			.map(|r| r.body.clone())
			.collect();
		assert_eq!(
			cursors_sent,
			vec![
				Some(json!({"dernier": 0})),
				Some(json!({"dernier": 2})),
				Some(json!({"dernier": 3}))
			]
		);
	}

	#[tokio::test]
	async fn gaps_are_allowed() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(5, &[1, 2, 3, 4, 5]))
			.respond_json(200, batch(9, &[6, 7, 9]));

		engine.poll(Host::Miner1).await.unwrap();
		assert_eq!(engine.poll(Host::Miner1).await, Ok(3));

		let store = engine.store();
		assert_eq!(nos(store, Host::Miner1).await, vec![1, 2, 3, 4, 5, 6, 7, 9]);
		assert_eq!(store.cursor(Host::Miner1).await, 9);
		assert_eq!(store.stats(Host::Miner1).await.gaps, 1);
	}

	#[tokio::test]
	async fn empty_poll_changes_nothing() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(9, &[6, 7, 9]))
			.respond_json(200, batch(9, &[]));

		engine.poll(Host::Miner1).await.unwrap();
		let before = engine.store().entries(Host::Miner1).await;

		assert_eq!(engine.poll(Host::Miner1).await, Ok(0));
		assert_eq!(engine.store().entries(Host::Miner1).await, before);
		assert_eq!(engine.store().cursor(Host::Miner1).await, 9);
	}

	#[tokio::test]
	async fn stale_entries_are_dropped() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(5, &[4, 5]))
			.respond_json(200, batch(3, &[2, 5, 6, 6, 3, 8]));

		engine.poll(Host::Miner2).await.unwrap();
		assert_eq!(engine.poll(Host::Miner2).await, Ok(2));

		let store = engine.store();
		assert_eq!(nos(store, Host::Miner2).await, vec![4, 5, 6, 8]);
		assert_eq!(store.cursor(Host::Miner2).await, 8);
		assert_eq!(store.last_reported_cursor(Host::Miner2).await, Some(3));
		assert_eq!(store.stats(Host::Miner2).await.stale_entries_dropped, 4);
	}

	#[tokio::test]
	async fn smaller_reported_cursor_does_not_regress() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(9, &[9]))
			.respond_json(200, batch(1, &[]));

		engine.poll(Host::WebServer).await.unwrap();
		engine.poll(Host::WebServer).await.unwrap();
		assert_eq!(engine.store().cursor(Host::WebServer).await, 9);
	}

	#[tokio::test]
	async fn failed_poll_leaves_state_and_can_be_retried() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(2, &[1, 2]))
			.fail("timed out")
			.respond(200, r#"{"dernier": "trois"}"#)
			.respond_json(200, batch(3, &[3]));

		engine.poll(Host::Miner3).await.unwrap();
		assert!(matches!(
			engine.poll(Host::Miner3).await,
			Err(SyncError::ApiError(ApiError::ConnectionError(_)))
		));
		assert!(matches!(
			engine.poll(Host::Miner3).await,
			Err(SyncError::ApiError(ApiError::SchemaInvalid(_)))
		));
		assert_eq!(engine.store().cursor(Host::Miner3).await, 2);
		assert_eq!(nos(engine.store(), Host::Miner3).await, vec![1, 2]);

		assert_eq!(engine.poll(Host::Miner3).await, Ok(1));
		let requests = transport.requests();
		assert_eq!(requests[2].body, Some(json!({"dernier": 2})));
		assert_eq!(requests[3].body, Some(json!({"dernier": 2})));
		assert_eq!(requests[4].body, Some(json!({"dernier": 2})));

		let stats = engine.store().stats(Host::Miner3).await;
		assert_eq!(stats.failed_polls, 2);
		assert_eq!(stats.successful_polls, 2);
	}

	#[tokio::test]
	async fn hosts_are_independent() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(3, &[1, 2, 3]))
			.respond_json(200, batch(1, &[1]));

		engine.poll(Host::Miner1).await.unwrap();
		engine.poll(Host::WebServer).await.unwrap();

		let store = engine.store();
		assert_eq!(store.cursor(Host::Miner1).await, 3);
		assert_eq!(store.cursor(Host::WebServer).await, 1);
		assert_eq!(store.cursor(Host::Miner2).await, 0);
		assert_eq!(transport.requests()[2].path, "/admin/logs/serveurweb");
		assert_eq!(transport.requests()[2].body, Some(json!({"dernier": 0})));
	}

	#[tokio::test]
	async fn concurrent_polls_of_one_host_are_serialized() {
		let transport = Arc::new(ScriptedTransport::new().with_latency(Duration::from_millis(20)));
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(2, &[1, 2]))
			.respond_json(200, batch(4, &[3, 4]));

		let (first, second) = tokio::join!(engine.poll(Host::Miner1), engine.poll(Host::Miner1));
		assert_eq!(first, Ok(2));
		assert_eq!(second, Ok(2));

		// the second poll starts from the cursor left by the first
		let requests = transport.requests();
		assert_eq!(requests[1].body, Some(json!({"dernier": 0})));
		assert_eq!(requests[2].body, Some(json!({"dernier": 2})));
		assert_eq!(nos(engine.store(), Host::Miner1).await, vec![1, 2, 3, 4]);
	}

	#[tokio::test]
	async fn render_text_follows_host_order() {
		let transport = Arc::new(ScriptedTransport::new());
		let engine = engine_with(&transport).await;
		transport
			.respond_json(200, batch(1, &[1]))
			.respond_json(200, batch(2, &[2]));

		engine.poll(Host::WebServer).await.unwrap();
		engine.poll(Host::Miner1).await.unwrap();

		assert_eq!(
			engine.store().render_text().await,
			"[Mineur 1] #2 ligne 2\n[Serveur Web] #1 ligne 1\n"
		);
		assert_eq!(
			engine.store().render_host_text(Host::WebServer).await,
			"[Serveur Web] #1 ligne 1\n"
		);
	}

	#[tokio::test]
	async fn events_are_published() {
		let transport = Arc::new(ScriptedTransport::new());
		let client = ApiClient::new(transport.clone());
		transport.respond_json(200, json!({"access_token": "abc"}));
		client.login(&Credentials::new("admin", "pw")).await.unwrap();

		let recorder = RecordingHandler::default();
		let mut dispatcher = EventDispatcher::new();
		dispatcher.register_handler(Box::new(recorder.clone()));
		let engine =
			LogSyncEngine::with_events(client, Arc::new(LogStore::new()), Arc::new(dispatcher));

		transport
			.respond_json(200, batch(3, &[1, 3]))
			.respond_json(200, batch(3, &[3]))
			.respond(404, "");

		engine.poll(Host::Miner1).await.unwrap();
		engine.poll(Host::Miner1).await.unwrap();
		engine.poll(Host::Miner1).await.unwrap_err();

		let events = recorder.events.lock().unwrap();
		assert_eq!(events.len(), 3);
		assert!(matches!(
			events[0],
			SyncEvent::LogsMerged { host: Host::Miner1, appended: 2, cursor: 3 }
		));
		assert!(matches!(
			events[1],
			SyncEvent::StaleEntriesDropped { host: Host::Miner1, dropped: 1, cursor: 3 }
		));
		assert!(matches!(
			&events[2],
			SyncEvent::SyncFailed { host: Host::Miner1, error: SyncError::ApiError(ApiError::NotFound(_)) }
		));
	}
}
