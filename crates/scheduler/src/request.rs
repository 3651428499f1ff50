use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use vigil_worker::{Classified, TaskClass};

use crate::analyzer::Analyzer;
use crate::completion::{Completion, RequestOutcome};
use crate::reason::Reason;
use crate::types::{BufferVersion, Position, SourceId};

/// Result produced by an [`Analyzer`] for one request.
///
/// `version` is the buffer version the result was computed from. It may lag
/// the request's own version when the analyzer substituted a cached result.
#[derive(Debug)]
pub struct Analysis<T> {
	payload: Option<Arc<T>>,
	version: BufferVersion,
	aborted: bool,
}

impl<T> Clone for Analysis<T> {
	fn clone(&self) -> Self {
		Self {
			payload: self.payload.clone(),
			version: self.version,
			aborted: self.aborted,
		}
	}
}

impl<T> Analysis<T> {
	pub fn ready(payload: T, version: BufferVersion) -> Self {
		Self::shared(Arc::new(payload), version)
	}

	pub fn shared(payload: Arc<T>, version: BufferVersion) -> Self {
		Self {
			payload: Some(payload),
			version,
			aborted: false,
		}
	}

	/// A finished pass that produced no payload (e.g. parse-only updates).
	pub fn empty(version: BufferVersion) -> Self {
		Self {
			payload: None,
			version,
			aborted: false,
		}
	}

	/// The analyzer declined the request; callbacks still run and observe
	/// [`Request::is_aborted`].
	pub fn aborted(version: BufferVersion) -> Self {
		Self {
			payload: None,
			version,
			aborted: true,
		}
	}

	pub fn payload(&self) -> Option<&Arc<T>> {
		self.payload.as_ref()
	}

	pub fn version(&self) -> BufferVersion {
		self.version
	}

	pub fn is_aborted(&self) -> bool {
		self.aborted
	}
}

/// Completion callback. Runs at most once, on the UI execution context.
pub type Callback<A> = Box<dyn FnOnce(&Request<A>) + Send + 'static>;

/// One unit of analysis work.
///
/// Submission data is fixed at construction. The analysis slot is written
/// once by the scheduler, after which the callback may run.
pub struct Request<A: Analyzer> {
	source: SourceId,
	position: Position,
	reason: Reason,
	buffer_version: BufferVersion,
	snapshot: A::Snapshot,
	synchronous: bool,
	require_fresh: bool,
	idle_triggered: bool,
	submitted_at: Instant,
	span: tracing::Span,
	cancel: CancellationToken,
	analysis: Option<Analysis<A::Output>>,
	callback: Option<Callback<A>>,
	completion: Arc<Completion<A::Output>>,
}

pub(crate) struct RequestParts<A: Analyzer> {
	pub(crate) source: SourceId,
	pub(crate) position: Position,
	pub(crate) reason: Reason,
	pub(crate) buffer_version: BufferVersion,
	pub(crate) snapshot: A::Snapshot,
	pub(crate) synchronous: bool,
	pub(crate) require_fresh: bool,
	pub(crate) idle_triggered: bool,
	pub(crate) callback: Option<Callback<A>>,
}

impl<A: Analyzer> Request<A> {
	pub(crate) fn new(parts: RequestParts<A>) -> Self {
		Self {
			source: parts.source,
			position: parts.position,
			reason: parts.reason,
			buffer_version: parts.buffer_version,
			snapshot: parts.snapshot,
			synchronous: parts.synchronous,
			require_fresh: parts.require_fresh,
			idle_triggered: parts.idle_triggered,
			submitted_at: Instant::now(),
			span: tracing::Span::current(),
			cancel: CancellationToken::new(),
			analysis: None,
			callback: parts.callback,
			completion: Completion::new(),
		}
	}

	pub fn source(&self) -> &SourceId {
		&self.source
	}

	pub fn position(&self) -> Position {
		self.position
	}

	pub fn reason(&self) -> Reason {
		self.reason
	}

	/// Buffer version at submission time.
	pub fn buffer_version(&self) -> BufferVersion {
		self.buffer_version
	}

	pub fn snapshot(&self) -> &A::Snapshot {
		&self.snapshot
	}

	pub fn is_synchronous(&self) -> bool {
		self.synchronous
	}

	pub fn requires_fresh(&self) -> bool {
		self.require_fresh
	}

	/// True for full checks submitted from the editor's idle loop.
	pub fn is_idle_triggered(&self) -> bool {
		self.idle_triggered
	}

	pub fn submitted_at(&self) -> Instant {
		self.submitted_at
	}

	pub fn analysis(&self) -> Option<&Analysis<A::Output>> {
		self.analysis.as_ref()
	}

	pub fn result(&self) -> Option<&Arc<A::Output>> {
		self.analysis.as_ref().and_then(Analysis::payload)
	}

	/// Buffer version the result corresponds to, once finalized.
	pub fn result_version(&self) -> Option<BufferVersion> {
		self.analysis.as_ref().map(Analysis::version)
	}

	pub fn is_aborted(&self) -> bool {
		self.analysis.as_ref().is_some_and(Analysis::is_aborted)
	}

	/// Fires when the scheduler shuts down while this request is queued or
	/// running. Long analyses should poll it and return
	/// [`crate::AnalyzerError::Cancelled`].
	///
	/// Never fires for inline (fast-path or synchronous) requests.
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancel
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Ties the request to the worker's shutdown token.
	pub(crate) fn bind_cancellation(&mut self, token: CancellationToken) {
		self.cancel = token;
	}

	pub(crate) fn span(&self) -> &tracing::Span {
		&self.span
	}

	pub(crate) fn completion(&self) -> &Arc<Completion<A::Output>> {
		&self.completion
	}

	pub(crate) fn fill(&mut self, analysis: Analysis<A::Output>) {
		debug_assert!(self.analysis.is_none(), "analysis slot is written once");
		self.analysis = Some(analysis);
	}

	/// Records the terminal outcome for handle holders.
	pub(crate) fn finish(&self, outcome: RequestOutcome<A::Output>) -> bool {
		self.completion.finish(outcome)
	}

	/// Records the filled analysis as the terminal outcome.
	///
	/// Returns `false` if another outcome was recorded first, in which case
	/// the callback must not run.
	pub(crate) fn mark_completed(&self) -> bool {
		let outcome = match &self.analysis {
			Some(analysis) => RequestOutcome::Completed(analysis.clone()),
			None => RequestOutcome::Abandoned,
		};
		self.finish(outcome)
	}

	/// Runs the callback on the current thread, consuming the request.
	///
	/// Returns `false` when the request carried no callback.
	pub(crate) fn run_callback(mut self) -> bool {
		match self.callback.take() {
			Some(callback) => {
				callback(&self);
				true
			}
			None => false,
		}
	}
}

impl<A: Analyzer> Classified for Request<A> {
	fn class(&self) -> TaskClass {
		self.reason.class()
	}
}

impl<A: Analyzer> Drop for Request<A> {
	fn drop(&mut self) {
		// No-op when an outcome was already recorded.
		self.completion.finish(RequestOutcome::Abandoned);
	}
}

impl<A: Analyzer> std::fmt::Debug for Request<A> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Request")
			.field("source", &self.source)
			.field("position", &self.position)
			.field("reason", &self.reason)
			.field("buffer_version", &self.buffer_version)
			.field("synchronous", &self.synchronous)
			.field("require_fresh", &self.require_fresh)
			.field("result_version", &self.result_version())
			.finish_non_exhaustive()
	}
}
