use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use crate::{Classified, TaskClass};

/// Outcome from enqueueing an item into a two-lane mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneSendOutcome {
	/// Mailbox was empty; the item is now the sole entry.
	Enqueued,
	/// Item was queued behind a pending interactive item.
	Trailing,
	/// Item replaced one or more queued items.
	Coalesced,
}

/// Items evicted by one enqueue, oldest first.
pub type Displaced<T> = SmallVec<[T; 2]>;

/// Result of one enqueue: the outcome plus everything it pushed out.
///
/// Displaced items are handed back instead of being dropped under the lock
/// so callers can finalize them (and log) outside the critical section.
#[derive(Debug)]
pub struct LaneSend<T> {
	pub outcome: LaneSendOutcome,
	pub displaced: Displaced<T>,
}

/// Two-slot coalescing queue state.
///
/// Holds at most one interactive item followed by at most one background
/// item. Rules applied on every push:
/// 1. an empty queue stores the item as-is;
/// 2. an interactive item discards everything queued before it;
/// 3. a background item replaces a queued background item;
/// 4. a background item behind a queued interactive item trails it.
///
/// The only reachable two-element state is `[Interactive, Background]`.
#[derive(Debug)]
pub struct LaneSlots<T> {
	first: Option<T>,
	second: Option<T>,
}

impl<T> Default for LaneSlots<T> {
	fn default() -> Self {
		Self { first: None, second: None }
	}
}

impl<T: Classified> LaneSlots<T> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		match (&self.first, &self.second) {
			(None, _) => 0,
			(Some(_), None) => 1,
			(Some(_), Some(_)) => 2,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.first.is_none()
	}

	/// Enqueues one item according to the lane coalescing rules.
	pub fn push(&mut self, item: T) -> LaneSend<T> {
		let incoming = item.class();
		match (self.first.take(), self.second.take()) {
			(None, _) => {
				self.first = Some(item);
				LaneSend {
					outcome: LaneSendOutcome::Enqueued,
					displaced: Displaced::new(),
				}
			}
			(Some(first), None) => {
				if incoming == TaskClass::Interactive || incoming == first.class() {
					self.first = Some(item);
					LaneSend {
						outcome: LaneSendOutcome::Coalesced,
						displaced: smallvec::smallvec![first],
					}
				} else {
					self.first = Some(first);
					self.second = Some(item);
					LaneSend {
						outcome: LaneSendOutcome::Trailing,
						displaced: Displaced::new(),
					}
				}
			}
			(Some(first), Some(second)) => {
				debug_assert_eq!(first.class(), TaskClass::Interactive);
				debug_assert_eq!(second.class(), TaskClass::Background);
				if incoming == TaskClass::Interactive {
					self.first = Some(item);
					LaneSend {
						outcome: LaneSendOutcome::Coalesced,
						displaced: smallvec::smallvec![first, second],
					}
				} else {
					self.first = Some(first);
					self.second = Some(item);
					LaneSend {
						outcome: LaneSendOutcome::Coalesced,
						displaced: smallvec::smallvec![second],
					}
				}
			}
		}
	}

	/// Pops the head item, shifting the trailing item forward.
	pub fn pop(&mut self) -> Option<T> {
		let head = self.first.take()?;
		self.first = self.second.take();
		Some(head)
	}

	/// Returns true when an item of `class` is currently queued.
	pub fn contains_class(&self, class: TaskClass) -> bool {
		self.first.iter().chain(self.second.iter()).any(|it| it.class() == class)
	}

	/// Drops every queued item and stores `item` alone.
	pub fn reset(&mut self, item: T) -> Displaced<T> {
		let mut displaced = Displaced::new();
		displaced.extend(self.first.take());
		displaced.extend(self.second.take());
		self.first = Some(item);
		displaced
	}

	/// Iterates queued items, head first.
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.first.iter().chain(self.second.iter())
	}
}

/// Thread-safe [`LaneSlots`] with a "work available" wakeup.
///
/// Any number of producers may send; a single consumer thread blocks in
/// [`LaneMailbox::recv_timeout`]. The slot state is the only shared state
/// and is always accessed under one mutex.
#[derive(Debug)]
pub struct LaneMailbox<T> {
	slots: Mutex<LaneSlots<T>>,
	available: Condvar,
}

impl<T> Default for LaneMailbox<T> {
	fn default() -> Self {
		Self {
			slots: Mutex::new(LaneSlots::default()),
			available: Condvar::new(),
		}
	}
}

impl<T: Classified> LaneMailbox<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Enqueues honoring lane rules and wakes the consumer.
	pub fn send(&self, item: T) -> LaneSend<T> {
		let class = item.class();
		let mut slots = self.slots.lock();
		let sent = slots.push(item);
		let pending = slots.len();
		drop(slots);
		self.available.notify_one();
		tracing::trace!(
			class = class.as_str(),
			pending,
			displaced = sent.displaced.len(),
			outcome = ?sent.outcome,
			"worker.mailbox.send"
		);
		sent
	}

	/// Non-blocking receive.
	pub fn try_recv(&self) -> Option<T> {
		self.slots.lock().pop()
	}

	/// Waits up to `timeout` for an item.
	///
	/// Returns `None` if nothing arrived before the deadline.
	pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
		let deadline = Instant::now() + timeout;
		let mut slots = self.slots.lock();
		loop {
			if let Some(item) = slots.pop() {
				return Some(item);
			}
			if self.available.wait_until(&mut slots, deadline).timed_out() {
				return slots.pop();
			}
		}
	}

	/// Returns true when an item of `class` is queued right now.
	pub fn contains_class(&self, class: TaskClass) -> bool {
		self.slots.lock().contains_class(class)
	}

	/// Clears the mailbox, stores `item` alone, and wakes the consumer.
	pub fn reset(&self, item: T) -> Displaced<T> {
		let displaced = self.slots.lock().reset(item);
		self.available.notify_one();
		displaced
	}

	/// Returns the current queue length.
	pub fn len(&self) -> usize {
		self.slots.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.lock().is_empty()
	}

	/// Returns the lane of each queued item, head first.
	pub fn classes(&self) -> SmallVec<[TaskClass; 2]> {
		self.slots.lock().iter().map(Classified::class).collect()
	}
}
