//! Logging capability handed to the watcher and the mover
//!
//! Components never reach for a global logger directly. They receive an
//! `Arc<dyn LogSink>` at construction; production code passes [`TracingLog`],
//! tests pass [`MemoryLog`] and count lines per severity.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Severity levels the core relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
	Info,
	Warn,
	Error,
}

pub trait LogSink: Send + Sync {
	fn info(&self, message: &str);
	fn warn(&self, message: &str);
	fn error(&self, message: &str);
}

/// Forwards every line to the `tracing` macros; the subscriber installed in
/// [`crate::logging`] adds timestamps and writes console + rolling file output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
	fn info(&self, message: &str) {
		tracing::info!("{message}");
	}

	fn warn(&self, message: &str) {
		tracing::warn!("{message}");
	}

	fn error(&self, message: &str) {
		tracing::error!("{message}");
	}
}

/// A recorded log line
#[derive(Debug, Clone)]
pub struct LogLine {
	pub level: LogLevel,
	pub message: String,
	pub timestamp: DateTime<Utc>,
}

/// In-memory sink that keeps every line, used to assert on log output
#[derive(Debug, Default)]
pub struct MemoryLog {
	lines: Mutex<Vec<LogLine>>,
}

impl MemoryLog {
	pub fn new() -> Self {
		Self::default()
	}

	fn push(&self, level: LogLevel, message: &str) {
		let line = LogLine { level, message: message.to_string(), timestamp: Utc::now() };
		self.lines.lock().unwrap_or_else(|e| e.into_inner()).push(line);
	}

	/// Snapshot of every line recorded so far
	pub fn lines(&self) -> Vec<LogLine> {
		self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	/// Messages recorded at the given level, in order
	pub fn messages(&self, level: LogLevel) -> Vec<String> {
		self.lines().into_iter().filter(|l| l.level == level).map(|l| l.message).collect()
	}

	pub fn count(&self, level: LogLevel) -> usize {
		self.messages(level).len()
	}
}

impl LogSink for MemoryLog {
	fn info(&self, message: &str) {
		self.push(LogLevel::Info, message);
	}

	fn warn(&self, message: &str) {
		self.push(LogLevel::Warn, message);
	}

	fn error(&self, message: &str) {
		self.push(LogLevel::Error, message);
	}
}
