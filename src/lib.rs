pub mod config;
mod dispatcher;
mod error;
mod events;
pub mod log_sink;
pub mod logging;
mod mover;
mod retry;
mod watcher;

pub use config::{AppConfig, ConfigError, ConfigLoad, ConfigLoader};
pub use dispatcher::Dispatcher;
pub use error::{is_busy, MoveFailure, Result, WatcherError};
pub use events::{ChangeKind, FileEvent};
pub use log_sink::{LogLevel, LogSink, MemoryLog, TracingLog};
pub use mover::{FsMove, MoveAttempt, MoveOperation, MoveOutcome, MoveState, Mover};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use watcher::{start, WatcherConfig, WatcherHandle};
