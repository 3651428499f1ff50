//! Single-worker scheduler for background analysis requests.
//!
//! Submissions take one of three paths:
//!
//! * fast path: the recency cache already holds a full-check result for the
//!   source and the reason accepts it, so the request completes inline;
//! * synchronous: the analyzer runs on the submitting thread;
//! * queued: the request enters the two-slot [`LaneMailbox`] and is executed
//!   by the dedicated worker thread, which posts the callback to the
//!   [`UiDispatcher`].
//!
//! Shutdown drains the mailbox, enqueues a terminate job and waits a short,
//! bounded interval for the worker to exit. A worker wedged inside the
//! analyzer is detached and its in-flight request is reported as aborted.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use vigil_worker::{Classified, LaneMailbox, Latch, TaskClass, panic_message, spawn_named_thread};

use crate::analyzer::{Analyzer, AnalyzerError, VersionSource};
use crate::cache::{RecencyCache, RecentResult};
use crate::completion::{Completion, RequestHandle, RequestOutcome};
use crate::config::SchedulerConfig;
use crate::dispatch::UiDispatcher;
use crate::error::SchedulerError;
use crate::idle::{IdleOutcome, IdleTrigger, idle_delay};
use crate::reason::Reason;
use crate::request::{Analysis, Callback, Request, RequestParts};
use crate::types::{BufferVersion, Freshness, Position, SourceId};

mod worker;


/// Parameters of one submission.
pub struct Submission<A: Analyzer> {
	source: SourceId,
	position: Position,
	reason: Reason,
	snapshot: A::Snapshot,
	synchronous: bool,
	require_fresh: bool,
	idle_triggered: bool,
	callback: Option<Callback<A>>,
}

impl<A: Analyzer> Submission<A> {
	pub fn new(source: impl Into<SourceId>, position: Position, reason: Reason, snapshot: A::Snapshot) -> Self {
		Self {
			source: source.into(),
			position,
			reason,
			snapshot,
			synchronous: false,
			require_fresh: false,
			idle_triggered: false,
			callback: None,
		}
	}

	/// Runs the analyzer on the submitting thread instead of queueing.
	pub fn synchronous(mut self) -> Self {
		self.synchronous = true;
		self
	}

	/// Bypasses the recency cache.
	pub fn require_fresh(mut self) -> Self {
		self.require_fresh = true;
		self
	}

	pub fn on_complete(mut self, callback: impl FnOnce(&Request<A>) + Send + 'static) -> Self {
		self.callback = Some(Box::new(callback));
		self
	}

	fn into_request(self, buffer_version: BufferVersion) -> Request<A> {
		Request::new(RequestParts {
			source: self.source,
			position: self.position,
			reason: self.reason,
			buffer_version,
			snapshot: self.snapshot,
			synchronous: self.synchronous,
			require_fresh: self.require_fresh,
			idle_triggered: self.idle_triggered,
			callback: self.callback,
		})
	}
}

/// Point-in-time copy of the scheduler's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
	pub submitted: u64,
	/// Analyzer invocations, on the worker or the submitting thread.
	pub executed: u64,
	/// Requests whose callback was handed off for execution.
	pub delivered: u64,
	pub superseded: u64,
	pub displaced: u64,
	pub abandoned: u64,
	pub aborted: u64,
	pub fast_path_hits: u64,
}

#[derive(Debug, Default)]
struct Counters {
	submitted: AtomicU64,
	executed: AtomicU64,
	delivered: AtomicU64,
	superseded: AtomicU64,
	displaced: AtomicU64,
	abandoned: AtomicU64,
	aborted: AtomicU64,
	fast_path_hits: AtomicU64,
}

impl Counters {
	fn bump(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}

	fn snapshot(&self) -> SchedulerStats {
		SchedulerStats {
			submitted: self.submitted.load(Ordering::Relaxed),
			executed: self.executed.load(Ordering::Relaxed),
			delivered: self.delivered.load(Ordering::Relaxed),
			superseded: self.superseded.load(Ordering::Relaxed),
			displaced: self.displaced.load(Ordering::Relaxed),
			abandoned: self.abandoned.load(Ordering::Relaxed),
			aborted: self.aborted.load(Ordering::Relaxed),
			fast_path_hits: self.fast_path_hits.load(Ordering::Relaxed),
		}
	}
}

/// How a call to [`Scheduler::shutdown`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
	/// The worker thread was never started.
	NotStarted,
	/// An earlier shutdown already ran.
	AlreadyStopped,
	/// The worker exited within the shutdown timeout.
	Completed,
	/// The worker did not exit in time and was detached.
	TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
	pub outcome: ShutdownOutcome,
	/// Requests finalized as [`RequestOutcome::Aborted`] by this shutdown.
	pub aborted: usize,
	pub elapsed: Duration,
}

pub(crate) enum Job<A: Analyzer> {
	Analyze(Request<A>),
	Terminate,
}

impl<A: Analyzer> Classified for Job<A> {
	fn class(&self) -> TaskClass {
		match self {
			Self::Analyze(request) => request.class(),
			Self::Terminate => TaskClass::Interactive,
		}
	}
}

/// Raw result of one analyzer call, panics included.
type Execution<T> = std::thread::Result<Result<Analysis<T>, AnalyzerError>>;

/// What became of one analyzer call once failures were contained.
pub(crate) enum Verdict<T> {
	Ready(Analysis<T>),
	/// Failed or panicked; the request is abandoned.
	Failed,
	/// The analyzer honored cancellation; the request is aborted.
	Cancelled,
}

/// State shared between the scheduler handle and its worker thread.
pub(crate) struct Shared<A: Analyzer> {
	analyzer: A,
	versions: Box<dyn VersionSource>,
	dispatcher: Arc<dyn UiDispatcher>,
	mailbox: LaneMailbox<Job<A>>,
	cache: RecencyCache<A::Output>,
	busy: AtomicBool,
	last_completion_ms: AtomicU64,
	in_flight: Mutex<Option<Arc<Completion<A::Output>>>>,
	stats: Counters,
	config: SchedulerConfig,
}

impl<A: Analyzer> Shared<A> {
	/// Records side effects of a successful analysis before it is attached
	/// to the request.
	fn record_result(&self, request: &Request<A>, analysis: &Analysis<A::Output>) {
		let reason = request.reason();
		if reason.updates_recent_result() && !analysis.is_aborted() {
			let current = self.versions.current_version(request.source());
			if analysis.version() == current && self.cache.record(request.source(), analysis.clone()) {
				tracing::trace!(source = %request.source(), version = %analysis.version(), "scheduler.cache.store");
			}
		}
		if request.is_idle_triggered() {
			let elapsed = request.submitted_at().elapsed();
			let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
			self.last_completion_ms.store(elapsed_ms, Ordering::Relaxed);
		}
	}

	/// Unwraps a successful analysis. Otherwise finalizes the request:
	/// aborted when the analyzer honored cancellation, abandoned when it
	/// failed or panicked.
	fn accept(&self, request: &Request<A>, result: Execution<A::Output>) -> Verdict<A::Output> {
		match result {
			Ok(Ok(analysis)) => return Verdict::Ready(analysis),
			Ok(Err(AnalyzerError::Cancelled)) => {
				tracing::debug!(reason = %request.reason(), source = %request.source(), "scheduler.analyzer.cancelled");
				if request.finish(RequestOutcome::Aborted) {
					Counters::bump(&self.stats.aborted);
				}
				return Verdict::Cancelled;
			}
			Ok(Err(error)) => {
				tracing::warn!(reason = %request.reason(), source = %request.source(), %error, "scheduler.analyzer.failed");
			}
			Err(payload) => {
				let message = panic_message(payload.as_ref());
				tracing::error!(
					reason = %request.reason(),
					source = %request.source(),
					panic = message.as_deref().unwrap_or("<non-string panic payload>"),
					"scheduler.analyzer.panicked"
				);
			}
		}
		if request.finish(RequestOutcome::Abandoned) {
			Counters::bump(&self.stats.abandoned);
		}
		Verdict::Failed
	}

	fn execute(&self, request: &Request<A>) -> Execution<A::Output> {
		Counters::bump(&self.stats.executed);
		panic::catch_unwind(AssertUnwindSafe(|| self.analyzer.execute(request)))
	}

	fn abort(&self, job: Job<A>) -> usize {
		match job {
			Job::Analyze(request) => {
				let aborted = request.finish(RequestOutcome::Aborted);
				if aborted {
					Counters::bump(&self.stats.aborted);
				}
				usize::from(aborted)
			}
			Job::Terminate => 0,
		}
	}
}

struct WorkerHandle {
	thread: JoinHandle<()>,
	cancel: CancellationToken,
	terminated: Arc<Latch>,
}

enum Lifecycle {
	Idle,
	Running(WorkerHandle),
	Stopped,
}

/// Background analysis scheduler.
///
/// Owns one worker thread, started lazily on the first queued submission.
/// Dropping the scheduler performs the same bounded shutdown as
/// [`Scheduler::shutdown`].
pub struct Scheduler<A: Analyzer> {
	shared: Arc<Shared<A>>,
	lifecycle: Mutex<Lifecycle>,
}

impl<A: Analyzer> Scheduler<A> {
	pub fn new(analyzer: A, versions: impl VersionSource, dispatcher: impl UiDispatcher, config: SchedulerConfig) -> Self {
		Self::with_dispatcher(analyzer, versions, Arc::new(dispatcher), config)
	}

	/// Like [`Self::new`] but shares an existing dispatcher.
	pub fn with_dispatcher(analyzer: A, versions: impl VersionSource, dispatcher: Arc<dyn UiDispatcher>, config: SchedulerConfig) -> Self {
		Self {
			shared: Arc::new(Shared {
				analyzer,
				versions: Box::new(versions),
				dispatcher,
				mailbox: LaneMailbox::new(),
				cache: RecencyCache::new(),
				busy: AtomicBool::new(false),
				last_completion_ms: AtomicU64::new(0),
				in_flight: Mutex::new(None),
				stats: Counters::default(),
				config,
			}),
			lifecycle: Mutex::new(Lifecycle::Idle),
		}
	}

	pub fn analyzer(&self) -> &A {
		&self.shared.analyzer
	}

	pub fn config(&self) -> &SchedulerConfig {
		&self.shared.config
	}

	/// Starts the worker thread if it is not running yet.
	///
	/// Idempotent. Fails with [`SchedulerError::ShutDown`] after shutdown.
	pub fn ensure_started(&self) -> Result<(), SchedulerError> {
		let mut lifecycle = self.lifecycle.lock();
		self.start_locked(&mut lifecycle)
	}

	fn start_locked(&self, lifecycle: &mut Lifecycle) -> Result<(), SchedulerError> {
		match lifecycle {
			Lifecycle::Running(_) => Ok(()),
			Lifecycle::Stopped => Err(SchedulerError::ShutDown),
			Lifecycle::Idle => {
				let cancel = CancellationToken::new();
				let terminated = Arc::new(Latch::new());
				let thread = {
					let shared = Arc::clone(&self.shared);
					let cancel = cancel.clone();
					let terminated = Arc::clone(&terminated);
					spawn_named_thread(TaskClass::Background, self.shared.config.thread_name.clone(), move || {
						worker::run(&shared, &cancel, &terminated);
					})?
				};
				tracing::debug!(thread = %self.shared.config.thread_name, "scheduler.start");
				*lifecycle = Lifecycle::Running(WorkerHandle { thread, cancel, terminated });
				Ok(())
			}
		}
	}

	/// Submits one request and returns its handle.
	///
	/// The callback runs at most once: inline for fast-path and synchronous
	/// submissions, otherwise on the [`UiDispatcher`] after the worker
	/// finishes.
	pub fn submit(&self, submission: Submission<A>) -> Result<RequestHandle<A::Output>, SchedulerError> {
		if matches!(*self.lifecycle.lock(), Lifecycle::Stopped) {
			return Err(SchedulerError::ShutDown);
		}
		let shared = &self.shared;
		Counters::bump(&shared.stats.submitted);

		let version = shared.versions.current_version(&submission.source);
		let reason = submission.reason;
		let cached = if !submission.require_fresh && shared.analyzer.is_recent_result_sufficient(reason) {
			shared.cache.lookup(&submission.source)
		} else {
			None
		};
		let inline = cached.is_some() || submission.synchronous || !shared.config.async_enabled;
		let mut request = submission.into_request(version);
		let handle = RequestHandle::new(Arc::clone(request.completion()), reason, version, inline, shared.config.completion_wait());
		tracing::trace!(%reason, class = reason.class().as_str(), source = %request.source(), %version, "scheduler.submit");

		if let Some(entry) = cached {
			Counters::bump(&shared.stats.fast_path_hits);
			tracing::trace!(%reason, result_version = %entry.version(), "scheduler.fast_path");
			request.fill(entry.analysis().clone());
			self.deliver_inline(request);
			return Ok(handle);
		}

		if inline {
			let result = shared.execute(&request);
			if let Verdict::Ready(analysis) = shared.accept(&request, result) {
				shared.record_result(&request, &analysis);
				request.fill(analysis);
				self.deliver_inline(request);
			}
			return Ok(handle);
		}

		let displaced = {
			let mut lifecycle = self.lifecycle.lock();
			self.start_locked(&mut lifecycle)?;
			if let Lifecycle::Running(worker) = &*lifecycle {
				request.bind_cancellation(worker.cancel.clone());
			}
			// Enqueue under the lifecycle lock so a terminate job queued by a
			// concurrent shutdown is never displaced.
			shared.mailbox.send(Job::Analyze(request)).displaced
		};
		for job in displaced {
			if let Job::Analyze(request) = job {
				tracing::debug!(reason = %request.reason(), by = %reason, "scheduler.coalesce.displaced");
				request.finish(RequestOutcome::Displaced);
				Counters::bump(&shared.stats.displaced);
			}
		}
		Ok(handle)
	}

	fn deliver_inline(&self, request: Request<A>) {
		if request.mark_completed() {
			Counters::bump(&self.shared.stats.delivered);
			request.run_callback();
		}
	}

	/// Handles one tick of the editor's idle loop.
	///
	/// Submits an idle-triggered [`Reason::FullTypeCheck`] once the view
	/// needs a refresh, no analysis is pending and the adaptive quiet period
	/// since the last edit has passed.
	pub fn on_idle(&self, trigger: IdleTrigger<A>) -> Result<IdleOutcome<A::Output>, SchedulerError> {
		if !trigger.needs_refresh {
			return Ok(IdleOutcome::NotNeeded);
		}
		if self.is_busy() {
			return Ok(IdleOutcome::Busy);
		}
		let delay = idle_delay(self.last_completion_duration(), &self.shared.config);
		let quiet = trigger.last_edit.elapsed();
		if quiet < delay {
			return Ok(IdleOutcome::Waiting { remaining: delay - quiet });
		}
		tracing::debug!(source = %trigger.source, delay_ms = delay.as_millis(), "scheduler.idle.submit");
		let submission = Submission {
			source: trigger.source,
			position: trigger.position,
			reason: Reason::FullTypeCheck,
			snapshot: trigger.snapshot,
			synchronous: false,
			require_fresh: true,
			idle_triggered: true,
			callback: trigger.callback,
		};
		self.submit(submission).map(IdleOutcome::Submitted)
	}

	/// Switches the source whose full-check results feed the recency cache.
	pub fn set_active_source(&self, source: Option<SourceId>) {
		if self.shared.cache.set_active(source.clone()) {
			tracing::debug!(source = ?source.as_ref().map(SourceId::as_str), "scheduler.active_source");
		}
	}

	pub fn active_source(&self) -> Option<SourceId> {
		self.shared.cache.active()
	}

	pub fn recent_result(&self) -> Option<Arc<RecentResult<A::Output>>> {
		self.shared.cache.current()
	}

	/// True while a request is executing on the worker or waiting in the
	/// mailbox.
	pub fn is_busy(&self) -> bool {
		self.shared.busy.load(Ordering::Acquire) || !self.shared.mailbox.is_empty()
	}

	/// Submission-to-completion time of the last idle-triggered full check.
	pub fn last_completion_duration(&self) -> Duration {
		Duration::from_millis(self.shared.last_completion_ms.load(Ordering::Relaxed))
	}

	/// Compares the request's result version with the buffer's current one.
	pub fn freshness(&self, request: &Request<A>) -> Freshness {
		Freshness::of(request.result_version(), self.shared.versions.current_version(request.source()))
	}

	pub fn stats(&self) -> SchedulerStats {
		self.shared.stats.snapshot()
	}

	pub fn is_shut_down(&self) -> bool {
		matches!(*self.lifecycle.lock(), Lifecycle::Stopped)
	}

	/// Stops the worker, waiting at most `shutdown-timeout-ms` for it to exit.
	///
	/// Queued requests are finalized as aborted. If the worker is stuck in
	/// the analyzer past the timeout, its thread is detached and the
	/// in-flight request is aborted so no waiter blocks on it.
	pub fn shutdown(&self) -> ShutdownReport {
		let started = Instant::now();
		let (worker, drained) = {
			let mut lifecycle = self.lifecycle.lock();
			match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
				Lifecycle::Idle => {
					return ShutdownReport {
						outcome: ShutdownOutcome::NotStarted,
						aborted: 0,
						elapsed: started.elapsed(),
					};
				}
				Lifecycle::Stopped => {
					return ShutdownReport {
						outcome: ShutdownOutcome::AlreadyStopped,
						aborted: 0,
						elapsed: started.elapsed(),
					};
				}
				Lifecycle::Running(worker) => {
					worker.cancel.cancel();
					let drained = self.shared.mailbox.reset(Job::Terminate);
					(worker, drained)
				}
			}
		};

		let mut aborted: usize = drained.into_iter().map(|job| self.shared.abort(job)).sum();
		let timeout = self.shared.config.shutdown_timeout();
		let outcome = if worker.terminated.wait_timeout(timeout) {
			if worker.thread.join().is_err() {
				tracing::error!("scheduler.worker.join_panicked");
			}
			ShutdownOutcome::Completed
		} else {
			let in_flight = self.shared.in_flight.lock().take();
			if let Some(completion) = in_flight
				&& completion.finish(RequestOutcome::Aborted)
			{
				Counters::bump(&self.shared.stats.aborted);
				aborted += 1;
			}
			tracing::warn!(timeout_ms = timeout.as_millis(), "scheduler.shutdown.degraded");
			drop(worker.thread);
			ShutdownOutcome::TimedOut
		};

		let report = ShutdownReport {
			outcome,
			aborted,
			elapsed: started.elapsed(),
		};
		tracing::debug!(outcome = ?report.outcome, aborted = report.aborted, elapsed_ms = report.elapsed.as_millis(), "scheduler.shutdown");
		report
	}
}

impl<A: Analyzer> Drop for Scheduler<A> {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl<A: Analyzer> std::fmt::Debug for Scheduler<A> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scheduler")
			.field("busy", &self.is_busy())
			.field("active_source", &self.active_source())
			.field("stats", &self.stats())
			.finish_non_exhaustive()
	}
}
