//! Common test utilities for the drop-mover library

#![allow(dead_code)]

use drop_mover::{FileEvent, WatcherConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const POLL: Duration = Duration::from_millis(50);
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a temporary directory for testing
pub fn setup_temp_dir() -> TempDir {
	TempDir::new().expect("Failed to create temp directory")
}

/// Create a test file with content
pub fn create_test_file(path: &Path, content: &str) -> std::io::Result<()> {
	std::fs::write(path, content)
}

/// Watcher config with a short poll and settle interval
pub fn fast_config(path: &Path) -> WatcherConfig {
	WatcherConfig::new(path).with_poll_interval(POLL)
}

/// Give the poll watcher time to take its initial snapshot
pub async fn wait_for_startup() {
	tokio::time::sleep(POLL * 2).await;
}

/// Wait for the next event, panicking on timeout
pub async fn next_event(rx: &mut UnboundedReceiver<FileEvent>) -> FileEvent {
	tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
		.await
		.expect("Timed out waiting for file event")
		.expect("Event channel closed")
}

/// Assert that no event arrives within a few poll cycles
pub async fn assert_quiet(rx: &mut UnboundedReceiver<FileEvent>) {
	let result = tokio::time::timeout(POLL * 8, rx.recv()).await;
	if let Ok(Some(event)) = result {
		panic!("Unexpected event for {}", event.path.display());
	}
}

/// Poll until `path` exists or the timeout passes
pub async fn wait_for_path(path: &Path) -> bool {
	let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
	while tokio::time::Instant::now() < deadline {
		if path.exists() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	false
}

pub fn file_names(dir: &Path) -> Vec<PathBuf> {
	let mut names: Vec<PathBuf> = std::fs::read_dir(dir)
		.expect("Failed to read dir")
		.filter_map(|e| e.ok())
		.map(|e| PathBuf::from(e.file_name()))
		.collect();
	names.sort();
	names
}
