use std::sync::Arc;

/// Zero-based caret position inside a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
	pub line: u32,
	pub column: u32,
}

impl Position {
	pub const fn new(line: u32, column: u32) -> Self {
		Self { line, column }
	}
}

/// Change counter of one source buffer.
///
/// Incremented by the buffer on every edit. Requests record the version they
/// were submitted against, results record the version they were computed
/// from; the two differ when a cached or stale result was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BufferVersion(pub u64);

impl BufferVersion {
	pub const fn get(self) -> u64 {
		self.0
	}

	pub const fn next(self) -> Self {
		Self(self.0.wrapping_add(1))
	}
}

impl std::fmt::Display for BufferVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "v{}", self.0)
	}
}

/// Identity of one source document (usually its path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(Arc::from(id.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for SourceId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for SourceId {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

impl std::fmt::Display for SourceId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Result of comparing a result's version with the buffer's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
	/// The result was computed from the current buffer contents.
	Current,
	/// The buffer moved on after the result was computed; position-sensitive
	/// data derived from it must be re-validated.
	Stale { result: BufferVersion, current: BufferVersion },
	/// The request carries no result yet.
	Missing,
}

impl Freshness {
	pub fn of(result: Option<BufferVersion>, current: BufferVersion) -> Self {
		match result {
			None => Self::Missing,
			Some(result) if result == current => Self::Current,
			Some(result) => Self::Stale { result, current },
		}
	}

	pub const fn is_current(self) -> bool {
		matches!(self, Self::Current)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn freshness_compares_result_with_current_version() {
		assert_eq!(Freshness::of(Some(BufferVersion(4)), BufferVersion(4)), Freshness::Current);
		assert_eq!(
			Freshness::of(Some(BufferVersion(4)), BufferVersion(6)),
			Freshness::Stale {
				result: BufferVersion(4),
				current: BufferVersion(6),
			}
		);
		assert_eq!(Freshness::of(None, BufferVersion(1)), Freshness::Missing);
	}

	#[test]
	fn source_ids_compare_by_content() {
		assert_eq!(SourceId::from("Foo.fs"), SourceId::from(String::from("Foo.fs")));
		assert_ne!(SourceId::from("Foo.fs"), SourceId::from("Bar.fs"));
	}
}
