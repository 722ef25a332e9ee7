//! Blockchain snapshots per miner.
//!
//! Unlike logs, chains are never merged: a reorganization can rewrite any suffix, so every
//! successful refresh replaces the stored chain of that miner as a whole.

use crate::api::{ApiClient, ApiError, Block, Host};
use crate::sync::events::{EventDispatcher, SyncEvent};
use crate::sync::SyncError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// A chain as fetched from one miner
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
	pub blocks: Arc<[Block]>,
	pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ChainSlot {
	refresh_gate: Mutex<()>,
	snapshot: RwLock<Option<ChainSnapshot>>,
}

/// Latest chain snapshot of every miner
#[derive(Debug)]
pub struct ChainView {
	slots: [ChainSlot; 4],
}

impl Default for ChainView {
	fn default() -> Self {
		Self::new()
	}
}

impl ChainView {
	pub fn new() -> Self {
		Self {
			slots: std::array::from_fn(|_| ChainSlot::default()),
		}
	}

	fn slot(&self, host: Host) -> &ChainSlot {
		&self.slots[host as usize]
	}

	/// Latest snapshot of `host`, `None` before the first successful refresh.
	pub async fn snapshot(&self, host: Host) -> Option<ChainSnapshot> {
		self.slot(host).snapshot.read().await.clone()
	}

	/// Blocks of `host`, oldest first; empty before the first successful refresh.
	pub async fn blocks(&self, host: Host) -> Arc<[Block]> {
		match &*self.slot(host).snapshot.read().await {
			Some(snapshot) => snapshot.blocks.clone(),
			None => Arc::from(Vec::new()),
		}
	}

	async fn replace(&self, host: Host, blocks: Vec<Block>) -> usize {
		let count = blocks.len();
		*self.slot(host).snapshot.write().await = Some(ChainSnapshot {
			blocks: Arc::from(blocks),
			fetched_at: Utc::now(),
		});
		count
	}
}

/// Turns `GetBlockchain` calls into a materialized block list per miner
#[derive(Clone)]
pub struct BlockchainSyncEngine {
	client: ApiClient,
	view: Arc<ChainView>,
	events: Arc<EventDispatcher>,
}

impl BlockchainSyncEngine {
	pub fn new(client: ApiClient, view: Arc<ChainView>) -> Self {
		Self::with_events(client, view, Arc::new(EventDispatcher::new()))
	}

	pub fn with_events(
		client: ApiClient,
		view: Arc<ChainView>,
		events: Arc<EventDispatcher>,
	) -> Self {
		Self {
			client,
			view,
			events,
		}
	}

	pub fn view(&self) -> &Arc<ChainView> {
		&self.view
	}

	/// Fetch the full chain of `host` and replace the stored one.
	///
	/// Returns the number of blocks now stored. A failed refresh keeps the previous snapshot.
	pub async fn refresh(&self, host: Host) -> Result<usize, SyncError> {
		if host.chain_segment().is_none() {
			return Err(ApiError::UnsupportedHost(host).into());
		}

		let _gate = self.view.slot(host).refresh_gate.lock().await;
		match self.client.get_blockchain(host).await {
			Ok(blocks) => {
				let count = self.view.replace(host, blocks).await;
				info!("Chain of {} replaced: {} blocks", host, count);
				self.events
					.dispatch(&SyncEvent::ChainReplaced {
						host,
						blocks: count,
					})
					.await;
				Ok(count)
			}
			Err(e) => {
				let error = SyncError::from(e);
				warn!("Chain refresh of {} failed: {}", host, error);
				self.events
					.dispatch(&SyncEvent::SyncFailed {
						host,
						error: error.clone(),
					})
					.await;
				Err(error)
			}
		}
	}
}
