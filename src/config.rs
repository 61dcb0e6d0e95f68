//! Startup configuration read from an environment file
//!
//! Values come from the process environment first and the env file second,
//! matching `dotenvy`'s rule that it never overrides variables already set.
//! A missing env file is replaced by a default one before loading.

use crate::retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES};
use crate::watcher::DEFAULT_POLL_INTERVAL;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const KEY_SOURCE_DIR: &str = "SOURCE_DIR";
pub const KEY_DEST_DIR: &str = "DEST_DIR";
pub const KEY_FILE_NAME: &str = "FILE_NAME";
pub const KEY_POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
pub const KEY_MAX_RETRIES: &str = "MOVE_MAX_RETRIES";
pub const KEY_RETRY_DELAY_MS: &str = "MOVE_RETRY_DELAY_MS";
pub const KEY_LOG_DIR: &str = "LOG_DIR";

const DEFAULT_ENV_CONTENTS: &str = "\
# drop-mover configuration
# Directory watched for new files
SOURCE_DIR=./inbox
# Directory new files are moved into
DEST_DIR=./outbox
# File name hint
FILE_NAME=*
# Optional tuning
# POLL_INTERVAL_MS=1000
# MOVE_MAX_RETRIES=3
# MOVE_RETRY_DELAY_MS=1000
# LOG_DIR=logs
";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("required setting {key} is missing or empty")]
	Missing { key: &'static str },

	#[error("invalid value for {key}: '{value}' ({reason})")]
	InvalidValue {
		key: &'static str,
		value: String,
		reason: String,
	},

	#[error("failed to write default env file {path}")]
	WriteDefault {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	EnvFile(#[from] dotenvy::Error),
}

/// Everything the process needs after startup
#[derive(Debug, Clone)]
pub struct AppConfig {
	pub source_dir: PathBuf,
	pub dest_dir: PathBuf,
	/// Presence-checked only
	pub file_name: String,
	pub poll_interval: Duration,
	pub retry: RetryPolicy,
	pub log_dir: PathBuf,
}

/// Result of a load, with whether the default env file had to be written
#[derive(Debug)]
pub struct ConfigLoad {
	pub config: AppConfig,
	pub created_default: bool,
	pub env_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
	env_file: PathBuf,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self { env_file: PathBuf::from(DEFAULT_ENV_FILE) }
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
		self.env_file = path.into();
		self
	}

	pub fn load(&self) -> Result<ConfigLoad, ConfigError> {
		let created_default = ensure_env_file(&self.env_file)?;
		let file_values = read_env_file(&self.env_file)?;
		let config = resolve(|key| {
			std::env::var(key)
				.ok()
				.filter(|v| !v.trim().is_empty())
				.or_else(|| file_values.get(key).cloned())
		})?;

		Ok(ConfigLoad { config, created_default, env_file: self.env_file.clone() })
	}
}

/// Write the default env file if none exists. Returns whether it was written.
pub fn ensure_env_file(path: &Path) -> Result<bool, ConfigError> {
	if path.exists() {
		return Ok(false);
	}

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)
			.map_err(|source| ConfigError::WriteDefault { path: path.to_path_buf(), source })?;
	}
	std::fs::write(path, DEFAULT_ENV_CONTENTS)
		.map_err(|source| ConfigError::WriteDefault { path: path.to_path_buf(), source })?;
	debug!("Wrote default env file {}", path.display());
	Ok(true)
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
	let mut values = HashMap::new();
	for entry in dotenvy::from_path_iter(path)? {
		let (key, value) = entry?;
		values.insert(key, value);
	}
	Ok(values)
}

/// Build an [`AppConfig`] from a key lookup
pub fn resolve<F>(lookup: F) -> Result<AppConfig, ConfigError>
where F: Fn(&str) -> Option<String> {
	let required = |key: &'static str| {
		lookup(key)
			.map(|v| v.trim().to_string())
			.filter(|v| !v.is_empty())
			.ok_or(ConfigError::Missing { key })
	};
	let optional_u64 = |key: &'static str| -> Result<Option<u64>, ConfigError> {
		match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
			None => Ok(None),
			Some(raw) => raw.parse::<u64>().map(Some).map_err(|e| ConfigError::InvalidValue {
				key,
				value: raw,
				reason: e.to_string(),
			}),
		}
	};

	let source_dir = PathBuf::from(required(KEY_SOURCE_DIR)?);
	let dest_dir = PathBuf::from(required(KEY_DEST_DIR)?);
	let file_name = required(KEY_FILE_NAME)?;

	let poll_interval = match optional_u64(KEY_POLL_INTERVAL_MS)? {
		Some(0) => {
			return Err(ConfigError::InvalidValue {
				key: KEY_POLL_INTERVAL_MS,
				value: "0".to_string(),
				reason: "must be greater than 0".to_string(),
			})
		}
		Some(ms) => Duration::from_millis(ms),
		None => DEFAULT_POLL_INTERVAL,
	};

	let max_retries = match optional_u64(KEY_MAX_RETRIES)? {
		Some(n) => u32::try_from(n).map_err(|e| ConfigError::InvalidValue {
			key: KEY_MAX_RETRIES,
			value: n.to_string(),
			reason: e.to_string(),
		})?,
		None => DEFAULT_MAX_RETRIES,
	};
	let backoff =
		optional_u64(KEY_RETRY_DELAY_MS)?.map(Duration::from_millis).unwrap_or(DEFAULT_BACKOFF);

	let log_dir = lookup(KEY_LOG_DIR)
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

	Ok(AppConfig {
		source_dir,
		dest_dir,
		file_name,
		poll_interval,
		retry: RetryPolicy::new(max_retries, backoff),
		log_dir,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |key: &str| map.get(key).cloned()
	}

	#[test]
	fn test_resolve_defaults() {
		let config = resolve(lookup_from(&[
			("SOURCE_DIR", "/data/in"),
			("DEST_DIR", "/data/out"),
			("FILE_NAME", "report"),
		]))
		.unwrap();

		assert_eq!(config.source_dir, PathBuf::from("/data/in"));
		assert_eq!(config.dest_dir, PathBuf::from("/data/out"));
		assert_eq!(config.file_name, "report");
		assert_eq!(config.poll_interval, Duration::from_millis(1000));
		assert_eq!(config.retry, RetryPolicy::default());
		assert_eq!(config.log_dir, PathBuf::from("logs"));
	}

	#[test]
	fn test_missing_required_values() {
		let err = resolve(lookup_from(&[("DEST_DIR", "/out"), ("FILE_NAME", "x")])).unwrap_err();
		assert!(matches!(err, ConfigError::Missing { key: "SOURCE_DIR" }));

		let err = resolve(lookup_from(&[
			("SOURCE_DIR", "/in"),
			("DEST_DIR", "   "),
			("FILE_NAME", "x"),
		]))
		.unwrap_err();
		assert!(matches!(err, ConfigError::Missing { key: "DEST_DIR" }));

		let err = resolve(lookup_from(&[("SOURCE_DIR", "/in"), ("DEST_DIR", "/out")])).unwrap_err();
		assert!(matches!(err, ConfigError::Missing { key: "FILE_NAME" }));
	}

	#[test]
	fn test_tuning_overrides() {
		let config = resolve(lookup_from(&[
			("SOURCE_DIR", "/in"),
			("DEST_DIR", "/out"),
			("FILE_NAME", "x"),
			("POLL_INTERVAL_MS", "250"),
			("MOVE_MAX_RETRIES", "5"),
			("MOVE_RETRY_DELAY_MS", "20"),
			("LOG_DIR", "/var/log/drop-mover"),
		]))
		.unwrap();

		assert_eq!(config.poll_interval, Duration::from_millis(250));
		assert_eq!(config.retry, RetryPolicy::new(5, Duration::from_millis(20)));
		assert_eq!(config.log_dir, PathBuf::from("/var/log/drop-mover"));
	}

	#[test]
	fn test_invalid_numbers_are_rejected() {
		let base = [("SOURCE_DIR", "/in"), ("DEST_DIR", "/out"), ("FILE_NAME", "x")];

		let mut pairs = base.to_vec();
		pairs.push(("MOVE_MAX_RETRIES", "three"));
		let err = resolve(lookup_from(&pairs)).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { key: "MOVE_MAX_RETRIES", .. }));

		let mut pairs = base.to_vec();
		pairs.push(("POLL_INTERVAL_MS", "0"));
		let err = resolve(lookup_from(&pairs)).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { key: "POLL_INTERVAL_MS", .. }));
	}

	#[test]
	fn test_default_env_file_is_written_once() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("nested").join(".env");

		assert!(ensure_env_file(&path).unwrap());
		assert!(!ensure_env_file(&path).unwrap());

		let values = read_env_file(&path).unwrap();
		assert_eq!(values.get("SOURCE_DIR").map(String::as_str), Some("./inbox"));
		assert_eq!(values.get("DEST_DIR").map(String::as_str), Some("./outbox"));
		assert!(values.contains_key("FILE_NAME"));
	}
}
