use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::request::Analysis;
use crate::types::{BufferVersion, SourceId};

/// Most recent full-check result for one source.
#[derive(Debug)]
pub struct RecentResult<T> {
	source: SourceId,
	analysis: Analysis<T>,
}

impl<T> RecentResult<T> {
	pub fn source(&self) -> &SourceId {
		&self.source
	}

	pub fn analysis(&self) -> &Analysis<T> {
		&self.analysis
	}

	/// Buffer version the cached result was computed from.
	pub fn version(&self) -> BufferVersion {
		self.analysis.version()
	}
}

/// Single-slot cache of the active source's latest full check.
///
/// Readers on any thread load the slot lock-free. The entry is only ever
/// replaced as a whole, so a reader never observes a source from one write
/// paired with a result from another.
#[derive(Debug)]
pub(crate) struct RecencyCache<T> {
	active: Mutex<Option<SourceId>>,
	slot: ArcSwapOption<RecentResult<T>>,
}

impl<T> Default for RecencyCache<T> {
	fn default() -> Self {
		Self {
			active: Mutex::new(None),
			slot: ArcSwapOption::empty(),
		}
	}
}

impl<T> RecencyCache<T> {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Switches the active source, clearing the slot when it changes.
	///
	/// Returns `true` if the active source changed.
	pub(crate) fn set_active(&self, source: Option<SourceId>) -> bool {
		let mut active = self.active.lock();
		if *active == source {
			return false;
		}
		*active = source;
		self.slot.store(None);
		true
	}

	pub(crate) fn active(&self) -> Option<SourceId> {
		self.active.lock().clone()
	}

	/// Replaces the slot if `source` is the active source.
	///
	/// Holding the active lock across the store serializes this with
	/// [`Self::set_active`], so an entry for a just-deactivated source cannot
	/// land after the clear.
	pub(crate) fn record(&self, source: &SourceId, analysis: Analysis<T>) -> bool {
		let active = self.active.lock();
		if active.as_ref() != Some(source) {
			return false;
		}
		self.slot.store(Some(Arc::new(RecentResult {
			source: source.clone(),
			analysis,
		})));
		true
	}

	/// Returns the cached entry if it belongs to `source`.
	pub(crate) fn lookup(&self, source: &SourceId) -> Option<Arc<RecentResult<T>>> {
		self.slot.load_full().filter(|entry| entry.source == *source)
	}

	pub(crate) fn current(&self) -> Option<Arc<RecentResult<T>>> {
		self.slot.load_full()
	}
}
