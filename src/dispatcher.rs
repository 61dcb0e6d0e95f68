//! Turns watcher events into independent move tasks
//!
//! Every event is spawned onto the runtime and never awaited, so a slow or
//! retrying move never delays detection of the next file. Moves are not
//! ordered and nothing serializes two moves that resolve to the same
//! destination; the later rename wins.

use crate::events::FileEvent;
use crate::log_sink::LogSink;
use crate::mover::{MoveOutcome, Mover};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone)]
pub struct Dispatcher {
	mover: Mover,
	dest_dir: PathBuf,
	log: Arc<dyn LogSink>,
}

impl std::fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher")
			.field("mover", &self.mover)
			.field("dest_dir", &self.dest_dir)
			.finish()
	}
}

impl Dispatcher {
	pub fn new(mover: Mover, dest_dir: impl Into<PathBuf>, log: Arc<dyn LogSink>) -> Self {
		Self { mover, dest_dir: dest_dir.into(), log }
	}

	pub fn dest_dir(&self) -> &Path {
		&self.dest_dir
	}

	/// Destination for a detected file: same name, inside the destination directory
	pub fn destination_for(&self, event: &FileEvent) -> Option<PathBuf> {
		event.file_name().map(|name| self.dest_dir.join(name))
	}

	/// Spawn one move for `event` and return immediately.
	///
	/// A panic inside the move is caught at the task boundary by a small
	/// supervisor task and logged; it never reaches the caller.
	pub fn dispatch(&self, event: FileEvent) -> Option<JoinHandle<MoveOutcome>> {
		let Some(dest) = self.destination_for(&event) else {
			self.log.error(&format!("Cannot derive a file name from {}", event.path.display()));
			return None;
		};

		debug!("Dispatching move {} for {}", event.id, event.path.display());
		let mover = self.mover.clone();
		let source = event.path;
		let task = tokio::spawn(async move { mover.move_file(&source, &dest).await });

		let log = self.log.clone();
		let id = event.id;
		Some(tokio::spawn(async move {
			match task.await {
				Ok(outcome) => outcome,
				Err(e) => {
					let failure = crate::error::MoveFailure::Panicked(e.to_string());
					log.error(&format!("Move {} aborted: {}", id, failure));
					MoveOutcome::Failure(failure)
				}
			}
		}))
	}

	/// Consume events until the watcher's channel closes
	pub async fn run(self, mut events: mpsc::UnboundedReceiver<FileEvent>) {
		while let Some(event) = events.recv().await {
			// Fire and forget: the handle is dropped, the task keeps running
			let _ = self.dispatch(event);
		}
		debug!("Event channel closed, dispatcher stopping");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::log_sink::{LogLevel, MemoryLog};
	use crate::mover::MoveOperation;
	use crate::retry::RetryPolicy;
	use std::future::Future;
	use std::io;
	use std::pin::Pin;
	use std::time::Duration;
	use tempfile::TempDir;

	struct PanickingMove;

	impl MoveOperation for PanickingMove {
		fn relocate<'a>(
			&'a self, _source: &'a Path, _dest: &'a Path,
		) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
			Box::pin(async move { panic!("disk on fire") })
		}

		fn operation_name(&self) -> &str {
			"panicking"
		}
	}

	fn dispatcher_for(dest: &Path, log: Arc<MemoryLog>) -> Dispatcher {
		let mover = Mover::new(RetryPolicy::new(3, Duration::from_millis(1)), log.clone());
		Dispatcher::new(mover, dest, log)
	}

	#[tokio::test]
	async fn test_destination_keeps_file_name() {
		let log = Arc::new(MemoryLog::new());
		let dispatcher = dispatcher_for(Path::new("/outbox"), log);

		let event = FileEvent::new(PathBuf::from("/inbox/scan-001.pdf"), None);
		assert_eq!(dispatcher.destination_for(&event), Some(PathBuf::from("/outbox/scan-001.pdf")));
	}

	#[tokio::test]
	async fn test_dispatch_moves_file() {
		let src_dir = TempDir::new().unwrap();
		let dest_dir = TempDir::new().unwrap();
		let source = src_dir.path().join("a.txt");
		std::fs::write(&source, "payload").unwrap();

		let log = Arc::new(MemoryLog::new());
		let dispatcher = dispatcher_for(dest_dir.path(), log.clone());
		let handle = dispatcher.dispatch(FileEvent::new(source.clone(), Some(7))).unwrap();
		let outcome = handle.await.unwrap();

		assert!(outcome.is_success());
		assert!(!source.exists());
		assert_eq!(std::fs::read_to_string(dest_dir.path().join("a.txt")).unwrap(), "payload");
		assert_eq!(log.count(LogLevel::Info), 1);
	}

	#[tokio::test]
	async fn test_event_without_file_name_is_rejected() {
		let log = Arc::new(MemoryLog::new());
		let dispatcher = dispatcher_for(Path::new("/outbox"), log.clone());

		assert!(dispatcher.dispatch(FileEvent::new(PathBuf::from("/"), None)).is_none());
		assert_eq!(log.count(LogLevel::Error), 1);
	}

	#[tokio::test]
	async fn test_panicking_move_is_contained() {
		let log = Arc::new(MemoryLog::new());
		let mover = Mover::with_operation(
			Arc::new(PanickingMove),
			RetryPolicy::new(0, Duration::from_millis(1)),
			log.clone(),
		);
		let dispatcher = Dispatcher::new(mover, "/outbox", log.clone());

		let handle = dispatcher.dispatch(FileEvent::new(PathBuf::from("/inbox/x"), None)).unwrap();
		let outcome = handle.await.unwrap();

		assert!(matches!(outcome, MoveOutcome::Failure(crate::error::MoveFailure::Panicked(_))));
		assert_eq!(log.count(LogLevel::Error), 1);

		// Dispatcher is still usable afterwards
		assert!(dispatcher.dispatch(FileEvent::new(PathBuf::from("/inbox/y"), None)).is_some());
	}

	#[tokio::test]
	async fn test_run_returns_when_channel_closes() {
		let log = Arc::new(MemoryLog::new());
		let dispatcher = dispatcher_for(Path::new("/outbox"), log);
		let (tx, rx) = mpsc::unbounded_channel();
		drop(tx);

		tokio::time::timeout(Duration::from_secs(1), dispatcher.run(rx)).await.unwrap();
	}
}
