//! Scheduler tuning knobs.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Runtime configuration of a [`crate::Scheduler`].
///
/// Every field has a default, so an empty TOML document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SchedulerConfig {
	/// When `false`, every submission runs on the submitting thread.
	pub async_enabled: bool,
	/// Upper bound on one idle wait of the worker before it re-checks for
	/// cancellation.
	pub poll_interval_ms: u64,
	/// How long shutdown waits for the worker to exit cooperatively.
	pub shutdown_timeout_ms: u64,
	/// Suggested bound for callers blocking on an async result.
	pub completion_wait_ms: u64,
	/// Minimum quiet period after an edit before an idle full check.
	pub code_sense_delay_ms: u64,
	/// Cap on the adaptive idle delay.
	pub max_idle_delay_ms: u64,
	/// Name given to the worker thread.
	pub thread_name: String,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			async_enabled: true,
			poll_interval_ms: 10_000,
			shutdown_timeout_ms: 10,
			completion_wait_ms: 1_000,
			code_sense_delay_ms: 1_000,
			max_idle_delay_ms: 1_000,
			thread_name: String::from("vigil-analysis"),
		}
	}
}

impl SchedulerConfig {
	/// Parses a configuration from a TOML string.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	/// Loads a configuration from a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&content)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}

	pub fn completion_wait(&self) -> Duration {
		Duration::from_millis(self.completion_wait_ms)
	}

	pub fn code_sense_delay(&self) -> Duration {
		Duration::from_millis(self.code_sense_delay_ms)
	}

	pub fn max_idle_delay(&self) -> Duration {
		Duration::from_millis(self.max_idle_delay_ms)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		let config = SchedulerConfig::from_toml_str("").unwrap();
		assert_eq!(config, SchedulerConfig::default());
		assert_eq!(config.poll_interval(), Duration::from_secs(10));
		assert_eq!(config.shutdown_timeout(), Duration::from_millis(10));
		assert_eq!(config.completion_wait(), Duration::from_secs(1));
	}

	#[test]
	fn partial_document_overrides_named_fields() {
		let config = SchedulerConfig::from_toml_str(
			r#"
			async-enabled = false
			shutdown-timeout-ms = 250
			thread-name = "fsharp-bg"
			"#,
		)
		.unwrap();
		assert!(!config.async_enabled);
		assert_eq!(config.shutdown_timeout_ms, 250);
		assert_eq!(config.thread_name, "fsharp-bg");
		assert_eq!(config.code_sense_delay_ms, 1_000);
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = SchedulerConfig::from_toml_str("poll-interval = 5").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)), "{err}");
	}

	#[test]
	fn load_reads_file_and_reports_missing_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "code-sense-delay-ms = 300").unwrap();
		let config = SchedulerConfig::load(file.path()).unwrap();
		assert_eq!(config.code_sense_delay(), Duration::from_millis(300));

		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("absent.toml");
		match SchedulerConfig::load(&missing) {
			Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
			other => panic!("expected io error, got {other:?}"),
		}
	}
}
