use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;
use vigil_worker::{Latch, panic_message};

use super::{Counters, Job, Shared, Verdict};
use crate::analyzer::Analyzer;
use crate::completion::RequestOutcome;
use crate::request::Request;

/// Body of the analysis worker thread.
///
/// Exits on a terminate job or once `cancel` fires, then sets `terminated`.
/// A panic anywhere in one iteration, including the version source and the
/// dispatcher, costs only the request being processed.
pub(super) fn run<A: Analyzer>(shared: &Shared<A>, cancel: &CancellationToken, terminated: &Latch) {
	tracing::debug!("scheduler.worker.start");
	let poll = shared.config.poll_interval();
	while !cancel.is_cancelled() {
		let Some(job) = shared.mailbox.recv_timeout(poll) else {
			tracing::trace!(poll_ms = poll.as_millis(), "scheduler.worker.poll");
			continue;
		};
		let request = match job {
			Job::Terminate => break,
			Job::Analyze(request) => request,
		};
		let flow = panic::catch_unwind(AssertUnwindSafe(|| process(shared, cancel, request)));
		shared.in_flight.lock().take();
		shared.busy.store(false, Ordering::Release);
		match flow {
			Ok(ControlFlow::Continue(())) => {}
			Ok(ControlFlow::Break(())) => break,
			Err(payload) => {
				let message = panic_message(payload.as_ref());
				tracing::error!(panic = message.as_deref().unwrap_or("<non-string panic payload>"), "scheduler.worker.panicked");
			}
		}
	}
	terminated.set();
	tracing::debug!("scheduler.worker.stop");
}

/// Runs one dequeued request to its terminal outcome.
///
/// Breaks when shutdown has begun, either before the request started or
/// because the analyzer returned on cancellation.
pub(super) fn process<A: Analyzer>(shared: &Shared<A>, cancel: &CancellationToken, mut request: Request<A>) -> ControlFlow<()> {
	let span = request.span().clone();
	let _guard = span.enter();
	let reason = request.reason();

	{
		// Checked under the in-flight lock: shutdown cancels before it
		// inspects the slot, so a request is either aborted here or visible
		// to a forced shutdown.
		let mut in_flight = shared.in_flight.lock();
		if cancel.is_cancelled() {
			drop(in_flight);
			tracing::debug!(%reason, "scheduler.worker.skip_cancelled");
			if request.finish(RequestOutcome::Aborted) {
				Counters::bump(&shared.stats.aborted);
			}
			return ControlFlow::Break(());
		}
		*in_flight = Some(Arc::clone(request.completion()));
	}
	shared.busy.store(true, Ordering::Release);
	tracing::trace!(%reason, class = reason.class().as_str(), version = %request.buffer_version(), "scheduler.worker.execute");

	// `in_flight` stays published until `run` clears it, so a forced
	// shutdown can still abort a request that is past the analyzer.
	let result = shared.execute(&request);
	match shared.accept(&request, result) {
		Verdict::Ready(analysis) => {
			shared.record_result(&request, &analysis);
			request.fill(analysis);
			deliver(shared, cancel, request);
			ControlFlow::Continue(())
		}
		Verdict::Failed => ControlFlow::Continue(()),
		Verdict::Cancelled if cancel.is_cancelled() => ControlFlow::Break(()),
		Verdict::Cancelled => ControlFlow::Continue(()),
	}
}

/// Posts the callback unless newer work of the same lane is already queued.
///
/// Full checks are always delivered. During shutdown nothing counts as
/// newer, so the in-flight result still reaches its callback.
fn deliver<A: Analyzer>(shared: &Shared<A>, cancel: &CancellationToken, request: Request<A>) {
	let reason = request.reason();
	if !reason.always_delivered() && !cancel.is_cancelled() && shared.mailbox.contains_class(reason.class()) {
		tracing::debug!(%reason, version = ?request.result_version().map(|v| v.get()), "scheduler.worker.superseded");
		if request.finish(RequestOutcome::Superseded) {
			Counters::bump(&shared.stats.superseded);
		}
		return;
	}
	if !request.mark_completed() {
		// Lost to a forced shutdown.
		return;
	}
	Counters::bump(&shared.stats.delivered);
	tracing::trace!(%reason, version = ?request.result_version().map(|v| v.get()), "scheduler.worker.deliver");
	shared.dispatcher.post(Box::new(move || {
		request.run_callback();
	}));
}
