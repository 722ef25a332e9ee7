//! Periodic synchronization of every host.
//!
//! A round polls the logs of all four hosts and refreshes the chains of the three miners, all
//! concurrently. Failures are reported per host; nothing is retried inside a round, the next
//! tick simply tries again from the same cursor.

use crate::api::{ApiError, Host};
use crate::sync::SyncError;
use crate::sync::chain::BlockchainSyncEngine;
use crate::sync::logs::LogSyncEngine;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Outcome of one synchronization round
#[derive(Debug)]
pub struct RoundReport {
	/// Appended entry count (or failure) per host
	pub logs: Vec<(Host, Result<usize, SyncError>)>,
	/// Stored block count (or failure) per miner
	pub chains: Vec<(Host, Result<usize, SyncError>)>,
}

impl RoundReport {
	pub fn failures(&self) -> impl Iterator<Item = (Host, &SyncError)> {
		self.logs
			.iter()
			.chain(self.chains.iter())
			.filter_map(|(host, result)| result.as_ref().err().map(|e| (*host, e)))
	}

	/// Whether any call found the session missing or rejected.
	pub fn session_lost(&self) -> bool {
		self.failures().any(|(_, e)| e.needs_login())
	}

	pub fn appended(&self) -> usize {
		self.logs
			.iter()
			.filter_map(|(_, r)| r.as_ref().ok())
			.sum()
	}
}

/// Drives both engines on a fixed interval
pub struct SyncMonitor {
	logs: LogSyncEngine,
	chains: BlockchainSyncEngine,
	interval: Duration,
}

impl SyncMonitor {
	pub fn new(logs: LogSyncEngine, chains: BlockchainSyncEngine, interval: Duration) -> Self {
		Self {
			logs,
			chains,
			interval,
		}
	}

	/// Run one round over every host.
	pub async fn poll_all(&self) -> RoundReport {
		let log_polls = Host::ALL.map(|host| async move { (host, self.logs.poll(host).await) });
		let chain_refreshes =
			Host::MINERS.map(|host| async move { (host, self.chains.refresh(host).await) });

		let (logs, chains) = tokio::join!(join_all(log_polls), join_all(chain_refreshes));
		RoundReport { logs, chains }
	}

	/// Run rounds every interval until `shutdown` completes.
	///
	/// # Errors
	/// Stops with `ApiError::Unauthenticated` as soon as a round shows the session was lost,
	/// so the caller can log in again.
	pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), SyncError> {
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		tokio::pin!(shutdown);

		info!("Polling every {:?}", self.interval);
		loop {
			tokio::select! {
				biased;

				_ = &mut shutdown => {
					info!("Monitor stopped");
					return Ok(());
				}
				_ = ticker.tick() => {
					let report = self.poll_all().await;
					for (host, e) in report.failures() {
						error!("Sync of {} failed: {}", host, e);
					}
					debug!("Round done, {} new log entries", report.appended());

					if report.session_lost() {
						return Err(ApiError::Unauthenticated.into());
					}
				}
			}
		}
	}
}
