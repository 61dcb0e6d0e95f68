use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// What the poll watcher reported for a path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ChangeKind {
	Created,
	Modified,
	Removed,
	Other(String),
}

impl From<notify::EventKind> for ChangeKind {
	fn from(kind: notify::EventKind) -> Self {
		match kind {
			notify::EventKind::Create(_) => ChangeKind::Created,
			notify::EventKind::Modify(modify_kind) => match modify_kind {
				// A rename into the directory is an appearance
				notify::event::ModifyKind::Name(notify::event::RenameMode::To) => {
					ChangeKind::Created
				}
				_ => ChangeKind::Modified,
			},
			notify::EventKind::Remove(_) => ChangeKind::Removed,
			notify::EventKind::Access(_) => ChangeKind::Other("Access".to_string()),
			notify::EventKind::Other => ChangeKind::Other("Unknown".to_string()),
			_ => ChangeKind::Other(format!("{kind:?}")),
		}
	}
}

/// A file that newly appeared in the watched directory and finished being written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
	pub id: Uuid,
	pub path: PathBuf,
	pub detected_at: DateTime<Utc>,
	pub size: Option<u64>,
}

impl FileEvent {
	pub fn new(path: PathBuf, size: Option<u64>) -> Self {
		Self::detected(path, size, Utc::now())
	}

	/// Event for a path first seen at `detected_at`, possibly well before it settled
	pub fn detected(path: PathBuf, size: Option<u64>, detected_at: DateTime<Utc>) -> Self {
		Self { id: Uuid::new_v4(), path, detected_at, size }
	}

	pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
		self.path.file_name()
	}

	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}
