use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOGGER_NAME: &str = "oracle";

/// File logging. The terminal belongs to the TUI, so nothing goes to stdout.
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init(level: &str) -> Result<WorkerGuard> {
    let log_dir = log_directory()?;
    init_in(&log_dir, level)
}

pub fn init_in(log_dir: &Path, level: &str) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(7)
        .filename_prefix(LOGGER_NAME)
        .filename_suffix("log")
        .build(log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

pub fn log_directory() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("digital-oracle").join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_log_file_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let guard = init_in(&log_dir, "debug").unwrap();
        tracing::info!("the oracle wakes");
        drop(guard);

        let entries: Vec<_> = std::fs::read_dir(&log_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().to_string_lossy().into_owned();
        assert!(name.starts_with("oracle"));
        let contents = std::fs::read_to_string(entries[0].path()).unwrap();
        assert!(contents.contains("the oracle wakes"));
    }
}
