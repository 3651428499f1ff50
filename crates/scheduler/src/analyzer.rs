use thiserror::Error;

use crate::reason::Reason;
use crate::request::{Analysis, Request};
use crate::types::{BufferVersion, SourceId};

/// Parser / type checker behind the scheduler.
///
/// `execute` runs on the scheduler's single worker thread (or on the
/// submitting thread in synchronous mode) and may take arbitrarily long.
/// Errors and panics are contained by the scheduler; the request is then
/// abandoned and its callback never runs.
pub trait Analyzer: Send + Sync + 'static {
	/// Immutable text snapshot the analysis runs against.
	type Snapshot: Send + Sync + 'static;
	/// Opaque result handed back to callers.
	type Output: Send + Sync + 'static;

	fn execute(&self, request: &Request<Self>) -> Result<Analysis<Self::Output>, AnalyzerError>
	where
		Self: Sized;

	/// Whether the most recent full-check result of the active source is an
	/// acceptable answer for `reason`, letting the submission complete
	/// synchronously without scheduling any work.
	fn is_recent_result_sufficient(&self, reason: Reason) -> bool {
		reason.reuses_recent_result()
	}
}

/// Monotonic change counter of each open source document.
pub trait VersionSource: Send + Sync + 'static {
	fn current_version(&self, source: &SourceId) -> BufferVersion;
}

impl<F> VersionSource for F
where
	F: Fn(&SourceId) -> BufferVersion + Send + Sync + 'static,
{
	fn current_version(&self, source: &SourceId) -> BufferVersion {
		self(source)
	}
}

/// Failure reported by an [`Analyzer`].
#[derive(Debug, Error)]
pub enum AnalyzerError {
	/// The source is not part of any project the analyzer knows about.
	#[error("source {0} is not known to the analyzer")]
	UnknownSource(SourceId),
	/// The analyzer observed [`Request::cancellation`] and gave up. Stops
	/// the worker loop.
	#[error("analysis cancelled")]
	Cancelled,
	/// Any other failure.
	#[error("analysis failed: {0}")]
	Failed(String),
}
