use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variable holding the log filter
pub const LOG_LEVEL_ENV: &str = "ECS_CNI_LOGLEVEL";

/// Open the log file for appending, creating missing directories
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Where log lines end up
#[derive(Debug)]
pub enum LogSink {
    File(File),
    Stderr,
}

/// Open `path` for logging, falling back to stderr when it cannot be opened
pub fn select_sink(path: &Path) -> LogSink {
    match open_log_file(path) {
        Ok(file) => LogSink::File(file),
        Err(e) => {
            eprintln!("failed to open log file {}: {}", path.display(), e);
            LogSink::Stderr
        }
    }
}

/// Install the global subscriber. Logs go to `path`, or to stderr when the
/// file cannot be opened; stdout belongs to the CNI result.
pub fn init(path: &Path) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_thread_names(true);

    let _ = match select_sink(path) {
        LogSink::File(file) => tracing::subscriber::set_global_default(
            builder.with_writer(Mutex::new(file)).finish(),
        ),
        LogSink::Stderr => {
            tracing::subscriber::set_global_default(builder.with_writer(io::stderr).finish())
        }
    };
}
