//! Error types for the analysis scheduler.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the scheduler API.
#[derive(Debug, Error)]
pub enum SchedulerError {
	/// The scheduler was shut down; no further work is accepted.
	#[error("analysis scheduler has been shut down")]
	ShutDown,
	/// The worker thread could not be spawned.
	#[error("failed to spawn analysis worker thread: {0}")]
	Spawn(#[from] std::io::Error),
}

/// Errors that can occur when loading scheduler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or field types.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
}
