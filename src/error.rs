use std::io;
use thiserror::Error;

/// Core error types
///
/// Only startup and observation failures surface as `WatcherError`. A failed
/// move never propagates: it ends as [`MoveFailure`] inside a
/// [`crate::MoveOutcome`] and is only visible through the log.
/// Configuration errors live in `crate::config::ConfigError`.
#[derive(Error, Debug)]
pub enum WatcherError {
	#[error("IO error: {0}")]
	Io(#[from] io::Error),

	#[error("Notify error: {0}")]
	Notify(#[from] notify::Error),

	#[error("Invalid path: {path}")]
	InvalidPath { path: String },

	#[error("Not a directory: {path}")]
	NotADirectory { path: String },

	#[error("Permission denied: {operation} on {path} - {context}")]
	PermissionDenied {
		operation: String,
		path: String,
		context: String,
	},

	#[error("Failed to send stop signal to watcher")]
	StopSignal,

	#[error("Configuration error: {0}")]
	Config(#[from] crate::config::ConfigError),
}

impl WatcherError {
	/// Get error category for logging
	pub fn category(&self) -> &'static str {
		match self {
			WatcherError::Io(_) => "io",
			WatcherError::Notify(_) => "notify",
			WatcherError::InvalidPath { .. } => "configuration",
			WatcherError::NotADirectory { .. } => "configuration",
			WatcherError::PermissionDenied { .. } => "permission",
			WatcherError::StopSignal => "shutdown",
			WatcherError::Config(_) => "configuration",
		}
	}

	/// Create a permission denied error from a failed directory probe
	pub fn from_permission_denied(operation: &str, path: &str, io_err: io::Error) -> Self {
		WatcherError::PermissionDenied {
			operation: operation.to_string(),
			path: path.to_string(),
			context: io_err.to_string(),
		}
	}
}

/// Why a single move was abandoned
#[derive(Error, Debug)]
pub enum MoveFailure {
	#[error("file still busy after {attempts} attempts: {source}")]
	RetriesExhausted {
		attempts: u32,
		#[source]
		source: io::Error,
	},

	#[error("{0}")]
	Io(#[source] io::Error),

	#[error("move task panicked: {0}")]
	Panicked(String),
}

impl MoveFailure {
	/// The underlying I/O error, if the failure came from the filesystem
	pub fn io_error(&self) -> Option<&io::Error> {
		match self {
			MoveFailure::RetriesExhausted { source, .. } => Some(source),
			MoveFailure::Io(err) => Some(err),
			MoveFailure::Panicked(_) => None,
		}
	}
}

/// The single error kind that qualifies for a retry: the file is held open
/// or locked by another process.
pub fn is_busy(err: &io::Error) -> bool {
	match err.raw_os_error() {
		#[cfg(unix)]
		Some(code) => code == nix::errno::Errno::EBUSY as i32,
		// ERROR_SHARING_VIOLATION
		#[cfg(windows)]
		Some(code) => code == 32,
		#[cfg(not(any(unix, windows)))]
		Some(_) => false,
		None => false,
	}
}

/// Rename across filesystems is refused by the OS and needs a copy instead
pub fn is_cross_device(err: &io::Error) -> bool {
	match err.raw_os_error() {
		#[cfg(unix)]
		Some(code) => code == nix::errno::Errno::EXDEV as i32,
		// ERROR_NOT_SAME_DEVICE
		#[cfg(windows)]
		Some(code) => code == 17,
		#[cfg(not(any(unix, windows)))]
		Some(_) => false,
		None => false,
	}
}

pub type Result<T> = std::result::Result<T, WatcherError>;
