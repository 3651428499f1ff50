//! Shared fixtures for scheduler scenario tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use vigil_scheduler::{
	Analysis, Analyzer, AnalyzerError, BufferVersion, Position, Reason, Request, RequestHandle, Scheduler, SchedulerConfig, SourceId, Submission, UiPump, UiQueue,
};
use vigil_worker::Latch;

pub const WAIT: Duration = Duration::from_secs(5);

/// What the fake checker does with one request.
#[derive(Clone)]
pub enum Script {
	Check,
	Explode,
	Hold(Arc<Gate>),
}

/// Parks a request inside the analyzer until released.
#[derive(Default)]
pub struct Gate {
	pub entered: Latch,
	pub release: Latch,
}

impl Gate {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn wait_entered(&self) {
		assert!(self.entered.wait_timeout(WAIT), "analyzer never picked up the held request");
	}
}

/// Fake checker producing `"<reason>@<version>"` strings.
#[derive(Default)]
pub struct FakeChecker {
	pub executions: AtomicUsize,
}

impl Analyzer for FakeChecker {
	type Snapshot = Script;
	type Output = String;

	fn execute(&self, request: &Request<Self>) -> Result<Analysis<String>, AnalyzerError> {
		self.executions.fetch_add(1, Ordering::SeqCst);
		match request.snapshot() {
			Script::Check => {}
			Script::Explode => panic!("checker blew up on {}", request.source()),
			Script::Hold(gate) => {
				gate.entered.set();
				gate.release.wait_timeout(Duration::from_secs(30));
			}
		}
		let version = request.buffer_version();
		Ok(Analysis::ready(format!("{}@{}", request.reason(), version.get()), version))
	}
}

/// One observed callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
	pub tag: u32,
	pub reason: Reason,
	pub result_version: u64,
	pub payload: Option<String>,
}

pub struct Fixture {
	pub scheduler: Scheduler<FakeChecker>,
	pub pump: UiPump,
	version: Arc<AtomicU64>,
	deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl Fixture {
	pub fn new(config: SchedulerConfig) -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let (queue, pump) = UiQueue::channel();
		let version = Arc::new(AtomicU64::new(1));
		let versions = {
			let version = Arc::clone(&version);
			move |_: &SourceId| BufferVersion(version.load(Ordering::SeqCst))
		};
		let scheduler = Scheduler::new(FakeChecker::default(), versions, queue, config);
		scheduler.set_active_source(Some(SourceId::from("Foo")));
		Self {
			scheduler,
			pump,
			version,
			deliveries: Arc::default(),
		}
	}

	pub fn set_version(&self, version: u64) {
		self.version.store(version, Ordering::SeqCst);
	}

	pub fn executions(&self) -> usize {
		self.scheduler.analyzer().executions.load(Ordering::SeqCst)
	}

	pub fn submission(&self, tag: u32, reason: Reason, script: Script) -> Submission<FakeChecker> {
		let deliveries = Arc::clone(&self.deliveries);
		Submission::new("Foo", Position::new(0, tag), reason, script).on_complete(move |request| {
			deliveries.lock().push(Delivery {
				tag,
				reason: request.reason(),
				result_version: request.result_version().map_or(0, BufferVersion::get),
				payload: request.result().map(|r: &Arc<String>| r.to_string()),
			});
		})
	}

	pub fn submit(&self, tag: u32, reason: Reason, script: Script) -> RequestHandle<String> {
		self.scheduler.submit(self.submission(tag, reason, script)).expect("scheduler accepts work")
	}

	/// Drives the UI pump until `count` callbacks have run.
	pub fn pump_until(&mut self, count: usize) {
		let deadline = Instant::now() + WAIT;
		while self.deliveries.lock().len() < count {
			assert!(Instant::now() < deadline, "only {} of {count} callbacks ran", self.deliveries.lock().len());
			if self.pump.pump_pending() == 0 {
				std::thread::sleep(Duration::from_millis(1));
			}
		}
	}

	pub fn deliveries(&self) -> Vec<Delivery> {
		self.deliveries.lock().clone()
	}
}
