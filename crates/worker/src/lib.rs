//! Worker primitives shared by the analysis scheduler.
//!
//! * [`TaskClass`] lanes and the [`Classified`] mapping for queued items
//! * [`LaneMailbox`], a two-slot coalescing queue with a consumer wakeup
//! * [`Latch`], a manual-reset event for lifecycle signals
//! * a thread spawn helper that tags threads with their class

mod class;
mod mailbox;
mod panic;
mod signal;
mod spawn;

pub use class::{Classified, TaskClass};
pub use mailbox::{Displaced, LaneMailbox, LaneSend, LaneSendOutcome, LaneSlots};
pub use panic::panic_message;
pub use signal::Latch;
pub use spawn::spawn_named_thread;
