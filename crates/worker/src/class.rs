/// Scheduling lanes shared by queued work items.
///
/// Interactive work is triggered by an explicit user gesture and obsoletes
/// everything queued before it. Background work is speculative (idle
/// re-checks, reparses) and only ever trails interactive work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Latency-sensitive work that directly affects interactive UX.
	Interactive,
	/// Speculative work that can be replaced by a newer submission.
	Background,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}

impl std::fmt::Display for TaskClass {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Deterministic mapping from a queued item to its scheduling lane.
pub trait Classified {
	fn class(&self) -> TaskClass;
}
