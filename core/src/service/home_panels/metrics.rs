//! Metrics and observability for the home panels service

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counters for the home panels worker
#[derive(Debug, Default)]
pub struct HomePanelsMetrics {
	/// Changes accepted into the pending queue
	pub changes_enqueued: AtomicU64,
	/// Engine payloads dropped as malformed
	pub malformed_payloads: AtomicU64,
	/// Drain passes executed
	pub drains: AtomicU64,
	/// Changes applied across all drains
	pub total_drained_changes: AtomicU64,
	/// Panels rewritten by refresh passes
	pub panels_refreshed: AtomicU64,
	/// Panel info lookups that hit the bounded wait
	pub lookup_timeouts: AtomicU64,
	/// Refresh passes aborted on a lookup transport failure
	pub refreshes_aborted: AtomicU64,
	/// Dataset invalidations passed straight through
	pub datasets_invalidated: AtomicU64,
}

impl HomePanelsMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record_change_enqueued(&self) {
		self.changes_enqueued.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_malformed_payload(&self) {
		self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_drain(&self, changes: usize) {
		self.drains.fetch_add(1, Ordering::Relaxed);
		self.total_drained_changes
			.fetch_add(changes as u64, Ordering::Relaxed);
	}

	pub fn record_panel_refreshed(&self) {
		self.panels_refreshed.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_lookup_timeout(&self) {
		self.lookup_timeouts.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_refresh_aborted(&self) {
		self.refreshes_aborted.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_dataset_invalidated(&self) {
		self.datasets_invalidated.fetch_add(1, Ordering::Relaxed);
	}

	/// Average number of changes coalesced into one drain.
	pub fn average_drain_size(&self) -> f64 {
		let drains = self.drains.load(Ordering::Relaxed);
		if drains == 0 {
			0.0
		} else {
			self.total_drained_changes.load(Ordering::Relaxed) as f64 / drains as f64
		}
	}

	/// Log current metrics
	pub fn log_metrics(&self) {
		info!(
			"Home panels metrics: enqueued={}, malformed={}, drains={}, avg_drain_size={:.2}, refreshed={}, lookup_timeouts={}, refreshes_aborted={}, datasets_invalidated={}",
			self.changes_enqueued.load(Ordering::Relaxed),
			self.malformed_payloads.load(Ordering::Relaxed),
			self.drains.load(Ordering::Relaxed),
			self.average_drain_size(),
			self.panels_refreshed.load(Ordering::Relaxed),
			self.lookup_timeouts.load(Ordering::Relaxed),
			self.refreshes_aborted.load(Ordering::Relaxed),
			self.datasets_invalidated.load(Ordering::Relaxed)
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_average_drain_size() {
		let metrics = HomePanelsMetrics::new();
		assert_eq!(metrics.average_drain_size(), 0.0);

		metrics.record_drain(3);
		metrics.record_drain(1);

		assert_eq!(metrics.drains.load(Ordering::Relaxed), 2);
		assert_eq!(metrics.average_drain_size(), 2.0);
	}
}
