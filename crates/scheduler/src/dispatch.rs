//! Hand-off of completion callbacks to the UI execution context.
//!
//! The worker thread never runs callbacks itself. It posts them to a
//! [`UiDispatcher`], keeping all consumer state single-threaded. Posting is
//! fire-and-forget: the worker must never wait for the UI, because the UI
//! thread may itself be waiting on the scheduler during shutdown.

use tokio::sync::mpsc;

/// Unit of work executed on the UI context.
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Single-threaded execution context that runs completion callbacks.
pub trait UiDispatcher: Send + Sync + 'static {
	/// Queues `job` for execution. Must not block or run `job` inline.
	fn post(&self, job: UiJob);
}

/// Channel-backed [`UiDispatcher`].
///
/// Jobs are run in post order by whichever thread owns the paired
/// [`UiPump`]. Jobs posted after the pump is dropped are discarded.
#[derive(Debug, Clone)]
pub struct UiQueue {
	tx: mpsc::UnboundedSender<UiJob>,
}

/// Receiving half of a [`UiQueue`]; drive it from the UI thread.
#[derive(Debug)]
pub struct UiPump {
	rx: mpsc::UnboundedReceiver<UiJob>,
}

impl UiQueue {
	/// Creates a connected queue and pump.
	pub fn channel() -> (Self, UiPump) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, UiPump { rx })
	}
}

impl UiDispatcher for UiQueue {
	fn post(&self, job: UiJob) {
		if self.tx.send(job).is_err() {
			tracing::debug!("scheduler.ui.post_after_close");
		}
	}
}

impl UiPump {
	/// Runs every job queued right now and returns how many ran.
	pub fn pump_pending(&mut self) -> usize {
		let mut ran = 0usize;
		while let Ok(job) = self.rx.try_recv() {
			job();
			ran = ran.wrapping_add(1);
		}
		ran
	}

	/// Waits for the next job and runs it.
	///
	/// Returns `false` once every [`UiQueue`] handle is gone and the channel
	/// is drained.
	pub async fn pump_next(&mut self) -> bool {
		match self.rx.recv().await {
			Some(job) => {
				job();
				true
			}
			None => false,
		}
	}
}
