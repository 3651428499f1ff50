use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Manual-reset event.
///
/// Once set, every current and future waiter is released until
/// [`Latch::reset`] is called.
#[derive(Debug, Default)]
pub struct Latch {
	set: Mutex<bool>,
	changed: Condvar,
}

impl Latch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the latch and releases all waiters.
	pub fn set(&self) {
		*self.set.lock() = true;
		self.changed.notify_all();
	}

	pub fn reset(&self) {
		*self.set.lock() = false;
	}

	pub fn is_set(&self) -> bool {
		*self.set.lock()
	}

	/// Waits until the latch is set or `timeout` elapses.
	///
	/// Returns `true` if the latch was observed set.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut set = self.set.lock();
		while !*set {
			if self.changed.wait_until(&mut set, deadline).timed_out() {
				return *set;
			}
		}
		true
	}
}
