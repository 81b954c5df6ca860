use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// stderr, unless a log file is configured
    Console,
    /// Always a file; the terminal belongs to the TUI
    File,
}

/// Set up application logging based on configuration
pub fn setup_logging(config: &Config, target: LogTarget) -> Option<WorkerGuard> {
    // RUST_LOG wins over the configured level
    let log_level = config.log_level();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if target == LogTarget::Console && config.log_file_path().is_none() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("A global tracing subscriber is already installed");
        }
        return None;
    }

    let (file_writer, guard) = match create_file_logger(config.log_file_path()) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("Failed to set up file logging ({}), logging disabled", e);
            return None;
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(file_writer)
        .with_ansi(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("A global tracing subscriber is already installed");
    }

    Some(guard)
}

/// Default log directory under the platform data dir
pub fn default_log_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("drive-manager")
        .join("logs")
}

// Create file logger
fn create_file_logger(
    log_file_path: &Option<String>,
) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    if let Some(path) = log_file_path {
        let log_path = std::path::PathBuf::from(path);
        let log_dir = log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(default_log_dir);

        std::fs::create_dir_all(&log_dir)?;

        let log_file_name = log_path
            .file_name()
            .unwrap_or(std::ffi::OsStr::new("drive-manager.log"));

        // Custom paths are not rotated
        let file_appender = tracing_appender::rolling::never(&log_dir, log_file_name);
        Ok(tracing_appender::non_blocking(file_appender))
    } else {
        let log_dir = default_log_dir();
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = RollingFileAppender::new(
            tracing_appender::rolling::Rotation::DAILY,
            log_dir,
            "drive-manager.log",
        );

        Ok(tracing_appender::non_blocking(file_appender))
    }
}
