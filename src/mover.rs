//! Relocates one file from the watched directory to the destination
//!
//! A move is a bounded loop over a single move primitive:
//!
//! ```text
//! Pending -> Attempting -> Succeeded
//!                       -> Retrying -> Attempting   (busy, retries left)
//!                       -> Failed                   (any other error, or busy with none left)
//! ```
//!
//! Outcomes are reported through the injected [`LogSink`]: one `warn` per
//! retry, then exactly one `info` (success) or `error` (failure) line.

use crate::error::{is_busy, is_cross_device, MoveFailure};
use crate::log_sink::LogSink;
use crate::retry::RetryPolicy;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// The filesystem primitive a move is built on
pub trait MoveOperation: Send + Sync {
	/// Move `source` to `dest`, replacing whatever is at `dest`
	fn relocate<'a>(
		&'a self, source: &'a Path, dest: &'a Path,
	) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

	/// Get a description of the operation for logging
	fn operation_name(&self) -> &str;
}

/// `rename` with overwrite, falling back to copy-then-remove when the
/// destination sits on another filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMove;

impl MoveOperation for FsMove {
	fn relocate<'a>(
		&'a self, source: &'a Path, dest: &'a Path,
	) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
		Box::pin(async move {
			match tokio::fs::rename(source, dest).await {
				Ok(()) => Ok(()),
				Err(err) if is_cross_device(&err) => {
					debug!(
						"Cross-device move, copying {} -> {}",
						source.display(),
						dest.display()
					);
					tokio::fs::copy(source, dest).await?;
					tokio::fs::remove_file(source).await
				}
				Err(err) => Err(err),
			}
		})
	}

	fn operation_name(&self) -> &str {
		"rename"
	}
}

/// Terminal result of one move
#[derive(Debug)]
pub enum MoveOutcome {
	Success { attempts: u32 },
	Failure(MoveFailure),
}

impl MoveOutcome {
	pub fn is_success(&self) -> bool {
		matches!(self, MoveOutcome::Success { .. })
	}
}

/// Where a move is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
	Pending,
	Attempting,
	Retrying,
	Succeeded,
	Failed,
}

/// State owned by exactly one move invocation
#[derive(Debug)]
pub struct MoveAttempt {
	pub source: PathBuf,
	pub dest: PathBuf,
	pub retries_remaining: u32,
	pub attempts: u32,
	pub state: MoveState,
}

impl MoveAttempt {
	pub fn new(source: &Path, dest: &Path, max_retries: u32) -> Self {
		Self {
			source: source.to_path_buf(),
			dest: dest.to_path_buf(),
			retries_remaining: max_retries,
			attempts: 0,
			state: MoveState::Pending,
		}
	}

	fn transition(&mut self, next: MoveState) {
		debug!(
			"Move {} -> {}: {:?} => {:?}",
			self.source.display(),
			self.dest.display(),
			self.state,
			next
		);
		self.state = next;
	}
}

/// Runs moves against a [`MoveOperation`] under a [`RetryPolicy`]
#[derive(Clone)]
pub struct Mover {
	operation: Arc<dyn MoveOperation>,
	policy: RetryPolicy,
	log: Arc<dyn LogSink>,
}

impl std::fmt::Debug for Mover {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Mover")
			.field("operation", &self.operation.operation_name())
			.field("policy", &self.policy)
			.finish()
	}
}

impl Mover {
	/// Mover over the real filesystem
	pub fn new(policy: RetryPolicy, log: Arc<dyn LogSink>) -> Self {
		Self::with_operation(Arc::new(FsMove), policy, log)
	}

	pub fn with_operation(
		operation: Arc<dyn MoveOperation>, policy: RetryPolicy, log: Arc<dyn LogSink>,
	) -> Self {
		Self { operation, policy, log }
	}

	pub fn policy(&self) -> RetryPolicy {
		self.policy
	}

	/// Move `source` to `dest` using the configured retry budget
	pub async fn move_file(&self, source: &Path, dest: &Path) -> MoveOutcome {
		self.move_file_with_retries(source, dest, self.policy.max_retries).await
	}

	/// Move `source` to `dest`, retrying at most `max_retries` times on a busy file
	pub async fn move_file_with_retries(
		&self, source: &Path, dest: &Path, max_retries: u32,
	) -> MoveOutcome {
		let mut attempt = MoveAttempt::new(source, dest, max_retries);

		loop {
			attempt.transition(MoveState::Attempting);
			attempt.attempts += 1;

			let result = self.operation.relocate(&attempt.source, &attempt.dest).await;
			let err = match result {
				Ok(()) => {
					attempt.transition(MoveState::Succeeded);
					self.log.info(&format!(
						"Moved {} -> {}",
						attempt.source.display(),
						attempt.dest.display()
					));
					return MoveOutcome::Success { attempts: attempt.attempts };
				}
				Err(err) => err,
			};

			if !is_busy(&err) {
				attempt.transition(MoveState::Failed);
				self.log.error(&format!(
					"Failed to move {} -> {}: {}",
					attempt.source.display(),
					attempt.dest.display(),
					err
				));
				return MoveOutcome::Failure(MoveFailure::Io(err));
			}

			if attempt.retries_remaining == 0 {
				attempt.transition(MoveState::Failed);
				let failure =
					MoveFailure::RetriesExhausted { attempts: attempt.attempts, source: err };
				self.log.error(&format!(
					"Giving up on {} -> {}: {}",
					attempt.source.display(),
					attempt.dest.display(),
					failure
				));
				return MoveOutcome::Failure(failure);
			}

			attempt.transition(MoveState::Retrying);
			attempt.retries_remaining -= 1;
			self.log.warn(&format!(
				"{} is busy, retrying in {:?} ({} retries left)",
				attempt.source.display(),
				self.policy.backoff,
				attempt.retries_remaining
			));
			tokio::time::sleep(self.policy.backoff).await;
		}
	}
}
