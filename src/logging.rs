use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::{NotifierError, Result};

const DEFAULT_FILTER: &str = "info";

pub struct FileLogger<'a> {
    config: &'a LoggingConfig,
    rotation: Rotation,
}

impl<'a> FileLogger<'a> {
    pub fn new(config: &'a LoggingConfig) -> Self {
        Self {
            config,
            rotation: Rotation::DAILY,
        }
    }

    /// Build a non-blocking writer over a rolling file appender.
    /// Returns `None` when no log directory is configured.
    pub fn setup_file_logging(
        &self,
    ) -> Result<
        Option<(
            tracing_appender::non_blocking::NonBlocking,
            tracing_appender::non_blocking::WorkerGuard,
        )>,
    > {
        let Some(directory) = &self.config.directory else {
            return Ok(None);
        };
        std::fs::create_dir_all(directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_prefix(&self.config.file_prefix)
            .filename_suffix("log")
            .max_log_files(self.config.max_files)
            .build(directory)
            .map_err(|e| NotifierError::Config(format!("Failed to set up log files: {}", e)))?;

        Ok(Some(tracing_appender::non_blocking(file_appender)))
    }
}

/// Install the global subscriber: console output plus optional rolling files.
/// The returned guard must be held for as long as file logs should be flushed.
pub fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match FileLogger::new(config).setup_file_logging()? {
        Some((file_writer, guard)) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Ok(None)
        }
    }
}
