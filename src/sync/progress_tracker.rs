//! Per-host poll statistics.
//!
//! Each host's log state carries a [`PollStats`] that counts polls, appended and refused
//! entries, and records holes in the sequence numbers. Holes are allowed by the backend, they
//! are only kept for diagnostics.

use tracing::debug;

/// Statistics about the log polls of one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
	pub successful_polls: u64,
	pub failed_polls: u64,
	pub entries_appended: u64,
	pub stale_entries_dropped: u64,
	/// Number of appends whose sequence number skipped past the next expected one
	pub gaps: u64,
}

impl PollStats {
	pub(crate) fn record_success(&mut self, appended: usize, dropped: usize) {
		self.successful_polls += 1;
		self.entries_appended += appended as u64;
		self.stale_entries_dropped += dropped as u64;
	}

	pub(crate) fn record_failure(&mut self) {
		self.failed_polls += 1;
	}

	/// Record that `next` was appended right after `previous`.
	pub(crate) fn record_sequence(&mut self, previous: u64, next: u64) {
		if previous > 0 && next > previous + 1 {
			debug!("Log sequence gap between #{} and #{}", previous, next);
			self.gaps += 1;
		}
	}

	/// Get a human-readable summary of the statistics
	pub fn summary(&self) -> String {
		format!(
			"{} polls ({} failed): {} entries appended, {} stale dropped{}",
			self.successful_polls + self.failed_polls,
			self.failed_polls,
			self.entries_appended,
			self.stale_entries_dropped,
			if self.gaps == 0 {
				String::new()
			} else {
				format!(" ({} gaps)", self.gaps)
			}
		)
	}
}
