use std::io;
use std::thread::{self, JoinHandle};

use crate::TaskClass;

/// Spawns the OS thread `name` serving lane `class`.
///
/// The body runs inside a `worker.thread` span carrying the lane and thread
/// name, so every event logged from the thread is attributable to it.
/// Spawn failures are logged before being returned.
pub fn spawn_named_thread<F, R>(class: TaskClass, name: impl Into<String>, f: F) -> io::Result<JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let name = name.into();
	let span = tracing::debug_span!("worker.thread", lane = %class, thread = %name);
	match thread::Builder::new().name(name.clone()).spawn(move || span.in_scope(f)) {
		Ok(handle) => {
			tracing::debug!(lane = %class, thread = %name, "worker.thread.spawned");
			Ok(handle)
		}
		Err(error) => {
			tracing::warn!(lane = %class, thread = %name, %error, "worker.thread.spawn_failed");
			Err(error)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn thread_carries_requested_name() {
		let handle = spawn_named_thread(TaskClass::Background, "vigil-lane-test", || thread::current().name().map(str::to_owned)).unwrap();
		assert_eq!(handle.thread().name(), Some("vigil-lane-test"));
		assert_eq!(handle.join().unwrap().as_deref(), Some("vigil-lane-test"));
	}
}
