use crate::error::{Result, WatcherError};
use crate::events::{ChangeKind, FileEvent};
use crate::log_sink::LogSink;
use chrono::{DateTime, Utc};
use notify::{Config, Event, PollWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct WatcherConfig {
	/// Directory to watch; only its direct children are reported
	pub path: PathBuf,
	/// How often the directory is rescanned
	pub poll_interval: Duration,
	/// A new file must keep the same size and mtime for this long before it is reported
	pub settle_interval: Duration,
}

impl WatcherConfig {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			poll_interval: DEFAULT_POLL_INTERVAL,
			settle_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	/// Poll and settle at the same cadence
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self.settle_interval = interval;
		self
	}

	pub fn with_settle_interval(mut self, interval: Duration) -> Self {
		self.settle_interval = interval;
		self
	}
}

/// Keeps the poll watcher alive. Dropping it without [`WatcherHandle::stop`]
/// also ends observation, but without waiting for the event task.
pub struct WatcherHandle {
	path: PathBuf,
	watcher: Option<PollWatcher>,
	stop_tx: Option<oneshot::Sender<()>>,
	task: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WatcherHandle").field("path", &self.path).finish_non_exhaustive()
	}
}

impl WatcherHandle {
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Stop observing and wait for the event task to finish.
	/// Files still settling are dropped without an event.
	pub async fn stop(mut self) -> Result<()> {
		if let Some(stop_tx) = self.stop_tx.take() {
			// The loop also ends on its own once the event receiver is dropped
			if stop_tx.send(()).is_err() && !self.task.is_finished() {
				return Err(WatcherError::StopSignal);
			}
		}
		drop(self.watcher.take());

		if let Err(e) = (&mut self.task).await {
			warn!("Watcher event task ended abnormally: {}", e);
		}
		Ok(())
	}
}

/// Start watching `config.path`.
///
/// Fails fast if the directory is missing, not a directory or unreadable.
/// Files already present are part of the initial snapshot and are never
/// reported. Observation errors after startup go to `log` at `error` level
/// and the watcher keeps polling.
///
/// Must be called from within a tokio runtime.
pub fn start(
	config: WatcherConfig, log: Arc<dyn LogSink>,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<FileEvent>)> {
	validate_target(&config.path)?;

	let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
	let (event_tx, event_rx) = mpsc::unbounded_channel();
	let (stop_tx, stop_rx) = oneshot::channel();

	let mut watcher = PollWatcher::new(
		move |res: notify::Result<Event>| {
			// Receiver only goes away once the event task has stopped
			let _ = raw_tx.send(res);
		},
		Config::default().with_poll_interval(config.poll_interval),
	)?;
	watcher.watch(&config.path, RecursiveMode::NonRecursive)?;

	log.info(&format!(
		"Watching {} for new files (poll interval {:?})",
		config.path.display(),
		config.poll_interval
	));

	let task = tokio::spawn(process_events(
		config.path.clone(),
		config.settle_interval,
		raw_rx,
		event_tx,
		stop_rx,
		log,
	));

	let handle = WatcherHandle {
		path: config.path,
		watcher: Some(watcher),
		stop_tx: Some(stop_tx),
		task,
	};
	Ok((handle, event_rx))
}

fn validate_target(path: &Path) -> Result<()> {
	let display = path.to_string_lossy().to_string();

	let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
		io::ErrorKind::NotFound => WatcherError::InvalidPath { path: display.clone() },
		io::ErrorKind::PermissionDenied => {
			WatcherError::from_permission_denied("stat", &display, e)
		}
		_ => WatcherError::Io(e),
	})?;

	if !metadata.is_dir() {
		return Err(WatcherError::NotADirectory { path: display });
	}

	std::fs::read_dir(path).map_err(|e| match e.kind() {
		io::ErrorKind::PermissionDenied => {
			WatcherError::from_permission_denied("read_dir", &display, e)
		}
		_ => WatcherError::Io(e),
	})?;

	Ok(())
}

/// How a tracked settle task ended
#[derive(Debug)]
enum Settled {
	Ready(FileEvent),
	Skipped(PathBuf),
	Failed(PathBuf, JoinError),
}

/// Paths seen as created whose write has not settled yet, one task each.
/// A path is tracked at most once and always leaves the queue when its task
/// ends, panics included, so it can be reported again later.
#[derive(Default)]
struct SettleQueue {
	first_seen: HashMap<PathBuf, DateTime<Utc>>,
	paths: HashMap<task::Id, PathBuf>,
	tasks: JoinSet<Option<u64>>,
}

impl SettleQueue {
	/// Returns false if `path` is already settling
	fn track<F>(&mut self, path: PathBuf, settle: F) -> bool
	where
		F: Future<Output = Option<u64>> + Send + 'static,
	{
		if self.first_seen.contains_key(&path) {
			return false;
		}
		self.first_seen.insert(path.clone(), Utc::now());
		let abort = self.tasks.spawn(settle);
		self.paths.insert(abort.id(), path);
		true
	}

	fn is_empty(&self) -> bool {
		self.tasks.is_empty()
	}

	/// Wait for the next task to end. `None` once nothing is settling.
	async fn next(&mut self) -> Option<Settled> {
		loop {
			let (id, result) = match self.tasks.join_next_with_id().await? {
				Ok((id, size)) => (id, Ok(size)),
				Err(e) => (e.id(), Err(e)),
			};
			let Some(path) = self.paths.remove(&id) else {
				continue;
			};
			let first_seen = self.first_seen.remove(&path).unwrap_or_else(Utc::now);
			return Some(match result {
				Ok(Some(size)) => Settled::Ready(FileEvent::detected(path, Some(size), first_seen)),
				Ok(None) => Settled::Skipped(path),
				Err(e) => Settled::Failed(path, e),
			});
		}
	}

	async fn shutdown(&mut self) {
		self.tasks.shutdown().await;
		self.paths.clear();
		self.first_seen.clear();
	}
}

async fn process_events(
	root: PathBuf, settle_interval: Duration,
	mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
	event_tx: mpsc::UnboundedSender<FileEvent>, mut stop_rx: oneshot::Receiver<()>,
	log: Arc<dyn LogSink>,
) {
	let mut settling = SettleQueue::default();

	debug!("Event processing loop started for {}", root.display());

	loop {
		tokio::select! {
			_ = &mut stop_rx => break,
			msg = raw_rx.recv() => match msg {
				Some(Ok(event)) => {
					if ChangeKind::from(event.kind) != ChangeKind::Created {
						continue;
					}
					for path in event.paths {
						if path == root {
							continue;
						}
						let settle_path = path.clone();
						let settle = async move {
							wait_until_settled(&settle_path, settle_interval).await
						};
						if settling.track(path.clone(), settle) {
							debug!("New path {}, waiting for writes to settle", path.display());
						}
					}
				}
				Some(Err(e)) => {
					log.error(&format!("Watch error on {}: {}", root.display(), e));
				}
				None => break,
			},
			Some(done) = settling.next(), if !settling.is_empty() => match done {
				Settled::Ready(event) => {
					if let Ok(json) = event.to_json() {
						debug!("File ready: {}", json);
					}
					if event_tx.send(event).is_err() {
						debug!("Event receiver dropped, stopping watcher loop");
						break;
					}
				}
				Settled::Skipped(path) => {
					debug!("{} is gone or not a regular file, skipping", path.display());
				}
				Settled::Failed(path, e) => {
					log.error(&format!("Settle task for {} failed: {}", path.display(), e));
				}
			},
		}
	}

	settling.shutdown().await;
	debug!("Event processing loop ended for {}", root.display());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WriteSnapshot {
	size: u64,
	modified: Option<SystemTime>,
}

async fn snapshot(path: &Path) -> Option<WriteSnapshot> {
	let metadata = tokio::fs::metadata(path).await.ok()?;
	if !metadata.is_file() {
		return None;
	}
	Some(WriteSnapshot { size: metadata.len(), modified: metadata.modified().ok() })
}

/// Wait until two consecutive snapshots one interval apart agree.
/// Returns the final size, or `None` if the path vanished or is not a file.
async fn wait_until_settled(path: &Path, interval: Duration) -> Option<u64> {
	let mut last = snapshot(path).await?;
	loop {
		tokio::time::sleep(interval).await;
		let next = snapshot(path).await?;
		if next == last {
			return Some(next.size);
		}
		last = next;
	}
}
