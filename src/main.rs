use clap::Parser;
use drop_mover::config::DEFAULT_LOG_DIR;
use drop_mover::logging::{self, LoggingConfig};
use drop_mover::{
	start, ConfigLoader, Dispatcher, LogSink, Mover, TracingLog, WatcherConfig, WatcherError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Log a startup failure with its category and hand it back for the exit code
fn startup_failed(log: &dyn LogSink, context: String, err: WatcherError) -> anyhow::Error {
	log.error(&format!("{context} [{}]: {err}", err.category()));
	err.into()
}

#[derive(Parser)]
#[command(name = "drop-mover")]
#[command(about = "Watches a directory and moves every new file into a destination directory")]
struct Cli {
	/// Environment file holding SOURCE_DIR, DEST_DIR and FILE_NAME (created if missing)
	#[arg(short, long, default_value = drop_mover::config::DEFAULT_ENV_FILE)]
	env_file: PathBuf,

	/// Enable verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let loaded = ConfigLoader::new().with_env_file(&cli.env_file).load();
	let log_dir = loaded
		.as_ref()
		.map(|l| l.config.log_dir.clone())
		.unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));
	let _log_guard = logging::init(&LoggingConfig::new(log_dir, cli.verbose))?;
	let log: Arc<dyn LogSink> = Arc::new(TracingLog);

	let loaded = match loaded {
		Ok(loaded) => loaded,
		Err(e) => {
			let context = format!("Cannot load {}", cli.env_file.display());
			return Err(startup_failed(log.as_ref(), context, WatcherError::Config(e)));
		}
	};
	if loaded.created_default {
		log.info(&format!(
			"No env file found, wrote defaults to {}",
			loaded.env_file.display()
		));
	}
	let config = loaded.config;
	info!(
		"Moving new files from {} to {} (file name hint: {})",
		config.source_dir.display(),
		config.dest_dir.display(),
		config.file_name
	);

	if let Err(e) = tokio::fs::create_dir_all(&config.dest_dir).await {
		let context = format!("Cannot create destination directory {}", config.dest_dir.display());
		return Err(startup_failed(log.as_ref(), context, WatcherError::Io(e)));
	}

	let watcher_config =
		WatcherConfig::new(config.source_dir.clone()).with_poll_interval(config.poll_interval);
	let (handle, events) = match start(watcher_config, log.clone()) {
		Ok(started) => started,
		Err(e) => {
			let context = format!("Cannot watch {}", config.source_dir.display());
			return Err(startup_failed(log.as_ref(), context, e));
		}
	};

	let mover = Mover::new(config.retry, log.clone());
	let policy = mover.policy();
	info!(
		"Busy files are tried up to {} times, {:?} apart (at most {:?} of waiting per file)",
		policy.max_attempts(),
		policy.backoff,
		policy.worst_case_wait()
	);
	let dispatcher = Dispatcher::new(mover, config.dest_dir.clone(), log.clone());
	let dispatch_task = tokio::spawn(dispatcher.run(events));

	// Keep the program running
	tokio::signal::ctrl_c().await?;
	info!("Shutting down watcher...");

	handle.stop().await?;
	if let Err(e) = dispatch_task.await {
		log.error(&format!("Dispatcher task ended abnormally: {}", e));
	}

	Ok(())
}
