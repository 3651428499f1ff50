use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Notify;
use vigil_worker::Latch;

use crate::reason::Reason;
use crate::request::Analysis;
use crate::types::BufferVersion;

/// Terminal state of one request.
#[derive(Debug)]
pub enum RequestOutcome<T> {
	/// The analyzer finished and the result was handed to the callback's
	/// execution context.
	Completed(Analysis<T>),
	/// The analyzer finished but newer work of the same lane was already
	/// queued, so the result was dropped without running the callback.
	Superseded,
	/// Coalesced out of the queue by a newer submission before it ran.
	Displaced,
	/// The analyzer failed or panicked; the callback never runs.
	Abandoned,
	/// The scheduler shut down before the request finished.
	Aborted,
}

impl<T> Clone for RequestOutcome<T> {
	fn clone(&self) -> Self {
		match self {
			Self::Completed(analysis) => Self::Completed(analysis.clone()),
			Self::Superseded => Self::Superseded,
			Self::Displaced => Self::Displaced,
			Self::Abandoned => Self::Abandoned,
			Self::Aborted => Self::Aborted,
		}
	}
}

impl<T> RequestOutcome<T> {
	pub fn analysis(&self) -> Option<&Analysis<T>> {
		match self {
			Self::Completed(analysis) => Some(analysis),
			_ => None,
		}
	}

	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Completed(_) => "completed",
			Self::Superseded => "superseded",
			Self::Displaced => "displaced",
			Self::Abandoned => "abandoned",
			Self::Aborted => "aborted",
		}
	}
}

/// Write-once completion cell shared by a request and its handles.
#[derive(Debug)]
pub(crate) struct Completion<T> {
	outcome: OnceLock<RequestOutcome<T>>,
	done: Latch,
	notify: Notify,
}

impl<T> Completion<T> {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self {
			outcome: OnceLock::new(),
			done: Latch::new(),
			notify: Notify::new(),
		})
	}

	/// Records the outcome. Only the first call has any effect.
	pub(crate) fn finish(&self, outcome: RequestOutcome<T>) -> bool {
		if self.outcome.set(outcome).is_err() {
			return false;
		}
		self.done.set();
		self.notify.notify_waiters();
		true
	}

	pub(crate) fn is_finished(&self) -> bool {
		self.outcome.get().is_some()
	}

	pub(crate) fn outcome(&self) -> Option<RequestOutcome<T>> {
		self.outcome.get().cloned()
	}

	pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
		self.done.wait_timeout(timeout)
	}

	pub(crate) async fn wait(&self) -> RequestOutcome<T> {
		loop {
			// Register before checking so a concurrent finish cannot slip
			// between the check and the await.
			let notified = self.notify.notified();
			if let Some(outcome) = self.outcome.get() {
				return outcome.clone();
			}
			notified.await;
		}
	}
}

/// Caller-side view of one submitted request.
///
/// Handles never block the scheduler; waiting is always bounded or async.
#[derive(Debug)]
pub struct RequestHandle<T> {
	completion: Arc<Completion<T>>,
	reason: Reason,
	buffer_version: BufferVersion,
	synchronous: bool,
	completion_wait: Duration,
}

impl<T> Clone for RequestHandle<T> {
	fn clone(&self) -> Self {
		Self {
			completion: Arc::clone(&self.completion),
			reason: self.reason,
			buffer_version: self.buffer_version,
			synchronous: self.synchronous,
			completion_wait: self.completion_wait,
		}
	}
}

impl<T> RequestHandle<T> {
	pub(crate) fn new(completion: Arc<Completion<T>>, reason: Reason, buffer_version: BufferVersion, synchronous: bool, completion_wait: Duration) -> Self {
		Self {
			completion,
			reason,
			buffer_version,
			synchronous,
			completion_wait,
		}
	}

	pub fn reason(&self) -> Reason {
		self.reason
	}

	/// Buffer version the request was submitted against.
	pub fn buffer_version(&self) -> BufferVersion {
		self.buffer_version
	}

	/// True when the request was answered on the submitting thread.
	pub fn is_synchronous(&self) -> bool {
		self.synchronous
	}

	pub fn is_complete(&self) -> bool {
		self.completion.is_finished()
	}

	pub fn outcome(&self) -> Option<RequestOutcome<T>> {
		self.completion.outcome()
	}

	/// Waits up to `timeout` for the request to reach a terminal state.
	///
	/// Returns `false` when the request is still pending; callers should
	/// proceed with a "not yet ready" answer instead of waiting longer.
	pub fn try_wait_for_completion(&self, timeout: Duration) -> bool {
		self.completion.wait_timeout(timeout)
	}

	/// [`Self::try_wait_for_completion`] bounded by the scheduler's
	/// `completion-wait-ms`.
	pub fn wait_bounded(&self) -> bool {
		self.try_wait_for_completion(self.completion_wait)
	}

	/// Resolves once the request reaches a terminal state.
	pub async fn completed(&self) -> RequestOutcome<T> {
		self.completion.wait().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_outcome_wins() {
		let completion = Completion::<u32>::new();
		assert!(completion.finish(RequestOutcome::Displaced));
		assert!(!completion.finish(RequestOutcome::Abandoned));
		assert!(matches!(completion.outcome(), Some(RequestOutcome::Displaced)));
	}

	#[test]
	fn handle_wait_times_out_while_pending() {
		let completion = Completion::<u32>::new();
		let handle = RequestHandle::new(completion, Reason::QuickInfo, BufferVersion(1), false, Duration::from_millis(5));
		assert!(!handle.try_wait_for_completion(Duration::from_millis(5)));
		assert!(!handle.wait_bounded());
		assert!(!handle.is_complete());
		assert!(handle.outcome().is_none());
	}

	#[tokio::test]
	async fn async_wait_resolves_after_finish_from_other_thread() {
		let completion = Completion::<u32>::new();
		let handle = RequestHandle::new(Arc::clone(&completion), Reason::Goto, BufferVersion(3), false, Duration::from_secs(1));
		let finisher = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(10));
			completion.finish(RequestOutcome::Completed(Analysis::ready(9, BufferVersion(3))));
		});

		let outcome = tokio::time::timeout(Duration::from_secs(5), handle.completed()).await.expect("completion should resolve");
		let analysis = outcome.analysis().expect("completed outcome");
		assert_eq!(analysis.payload().map(|p| **p), Some(9));
		assert_eq!(analysis.version(), BufferVersion(3));
		finisher.join().unwrap();
	}
}
