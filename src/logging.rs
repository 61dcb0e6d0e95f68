//! Console + rolling file log output
//!
//! Console output goes through the standard `fmt` layer; the file layer
//! writes plain text through a non-blocking appender that rotates daily and
//! keeps a bounded number of files. The returned [`WorkerGuard`] must live
//! as long as the process or buffered lines are lost on exit.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, InitError, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "drop-mover";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const MAX_LOG_FILES: usize = 14;

#[derive(Error, Debug)]
pub enum LoggingError {
	#[error("failed to create log directory {path}")]
	CreateDir {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to open rolling log file: {0}")]
	Appender(#[from] InitError),

	#[error("a global subscriber is already installed: {0}")]
	AlreadyInstalled(#[from] TryInitError),
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
	pub log_dir: PathBuf,
	pub level: Level,
}

impl LoggingConfig {
	pub fn new(log_dir: impl Into<PathBuf>, verbose: bool) -> Self {
		let level = if verbose { Level::DEBUG } else { Level::INFO };
		Self { log_dir: log_dir.into(), level }
	}
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard, LoggingError> {
	let (file_writer, guard) = tracing_appender::non_blocking(rolling_appender(&config.log_dir)?);

	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer())
		.with(fmt::layer().with_ansi(false).with_writer(file_writer))
		.try_init()?;

	Ok(guard)
}

fn rolling_appender(
	log_dir: &Path,
) -> Result<tracing_appender::rolling::RollingFileAppender, LoggingError> {
	std::fs::create_dir_all(log_dir)
		.map_err(|source| LoggingError::CreateDir { path: log_dir.to_path_buf(), source })?;

	Ok(Builder::new()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_FILE_PREFIX)
		.filename_suffix(LOG_FILE_SUFFIX)
		.max_log_files(MAX_LOG_FILES)
		.build(log_dir)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_level_from_verbose_flag() {
		assert_eq!(LoggingConfig::new("logs", false).level, Level::INFO);
		assert_eq!(LoggingConfig::new("logs", true).level, Level::DEBUG);
	}

	#[test]
	fn test_rolling_appender_creates_directory_and_file() {
		let dir = tempfile::TempDir::new().unwrap();
		let log_dir = dir.path().join("logs");

		let mut appender = rolling_appender(&log_dir).unwrap();
		appender.write_all(b"hello\n").unwrap();
		appender.flush().unwrap();

		let names: Vec<String> = std::fs::read_dir(&log_dir)
			.unwrap()
			.filter_map(|e| e.ok())
			.map(|e| e.file_name().to_string_lossy().into_owned())
			.collect();
		assert_eq!(names.len(), 1);
		assert!(names[0].starts_with(LOG_FILE_PREFIX));
		assert!(names[0].ends_with(LOG_FILE_SUFFIX));
	}
}
