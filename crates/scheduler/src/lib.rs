//! Background analysis request scheduler.
//!
//! Editor features (quick info, completion, brace matching, full type checks)
//! submit [`Request`]s to a [`Scheduler`], which serializes them onto one
//! worker thread through a two-slot coalescing mailbox: at most one
//! interactive request plus one trailing background request are ever queued.
//! Completed results are handed back through a [`UiDispatcher`], and stale or
//! superseded work is dropped instead of delivered.
//!
//! The [`Analyzer`] doing the actual parsing and checking is supplied by the
//! embedder, as is the [`VersionSource`] reporting each buffer's change
//! counter.

mod analyzer;
mod cache;
mod completion;
mod config;
mod dispatch;
mod error;
mod idle;
mod reason;
mod request;
mod scheduler;
mod types;

pub use analyzer::{Analyzer, AnalyzerError, VersionSource};
pub use cache::RecentResult;
pub use completion::{RequestHandle, RequestOutcome};
pub use config::SchedulerConfig;
pub use dispatch::{UiDispatcher, UiJob, UiPump, UiQueue};
pub use error::{ConfigError, SchedulerError};
pub use idle::{IdleOutcome, IdleTrigger, idle_delay};
pub use reason::Reason;
pub use request::{Analysis, Callback, Request};
pub use scheduler::{Scheduler, SchedulerStats, ShutdownOutcome, ShutdownReport, Submission};
pub use types::{BufferVersion, Freshness, Position, SourceId};
pub use vigil_worker::TaskClass;
