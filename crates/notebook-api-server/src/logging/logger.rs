use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. When `logging.directory` is set a
/// daily-rolling `notebook-api.<date>.log` is written next to stdout.
pub fn init_logger(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let file_layer = match &config.directory {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("notebook-api")
                .filename_suffix("log")
                .build(dir)?;
            let layer = match config.format {
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_writer(appender)
                    .with_target(true)
                    .boxed(),
                LogFormat::Pretty => fmt::layer()
                    .with_writer(appender)
                    .with_target(true)
                    .with_ansi(false) // No colors in file
                    .boxed(),
            };
            Some(layer)
        }
        None => None,
    };

    let stdout_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stdout)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
