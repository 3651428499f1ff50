//! Idle-loop trigger for speculative full checks.

use std::time::{Duration, Instant};

use crate::analyzer::Analyzer;
use crate::completion::RequestHandle;
use crate::config::SchedulerConfig;
use crate::request::Callback;
use crate::types::{Position, SourceId};

/// Snapshot of editor state handed to [`crate::Scheduler::on_idle`].
pub struct IdleTrigger<A: Analyzer> {
	pub source: SourceId,
	pub position: Position,
	pub snapshot: A::Snapshot,
	/// Instant of the most recent edit to `source`.
	pub last_edit: Instant,
	/// Whether the view's diagnostics are out of date.
	pub needs_refresh: bool,
	pub callback: Option<Callback<A>>,
}

impl<A: Analyzer> IdleTrigger<A> {
	pub fn new(source: impl Into<SourceId>, snapshot: A::Snapshot, last_edit: Instant) -> Self {
		Self {
			source: source.into(),
			position: Position::default(),
			snapshot,
			last_edit,
			needs_refresh: true,
			callback: None,
		}
	}

	pub fn at(mut self, position: Position) -> Self {
		self.position = position;
		self
	}

	pub fn needs_refresh(mut self, needs_refresh: bool) -> Self {
		self.needs_refresh = needs_refresh;
		self
	}

	pub fn on_complete(mut self, callback: impl FnOnce(&crate::Request<A>) + Send + 'static) -> Self {
		self.callback = Some(Box::new(callback));
		self
	}
}

/// What [`crate::Scheduler::on_idle`] did with a trigger.
#[derive(Debug)]
pub enum IdleOutcome<T> {
	/// The view is up to date.
	NotNeeded,
	/// Analysis is already running or queued.
	Busy,
	/// The quiet period since the last edit has not elapsed yet.
	Waiting { remaining: Duration },
	Submitted(RequestHandle<T>),
}

impl<T> IdleOutcome<T> {
	pub fn handle(&self) -> Option<&RequestHandle<T>> {
		match self {
			Self::Submitted(handle) => Some(handle),
			_ => None,
		}
	}
}

/// Quiet period required after an edit before an idle full check.
///
/// Slow analyses push the delay up (a third of the last idle check's
/// duration) but never beyond `max_idle_delay`.
pub fn idle_delay(last_completion: Duration, config: &SchedulerConfig) -> Duration {
	(last_completion / 3).max(config.code_sense_delay()).min(config.max_idle_delay())
}
