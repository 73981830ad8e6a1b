//! Logging setup: console plus an optional daily rolling file.

use posflow_core::{config_dir, LoggingSettings};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn log_dir() -> PathBuf {
    config_dir().join("logs")
}

/// `RUST_LOG` wins over the configured level.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize logging. `verbose` raises the console level to `debug`.
pub fn setup(settings: &LoggingSettings, verbose: bool) {
    let level = if verbose { "debug" } else { settings.level.as_str() };

    // Console output goes to stderr so stdout stays for command output.
    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter(level));

    let file_layer = if settings.file {
        let dir = log_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("Warning: Failed to create log directory {:?}: {}", dir, e);
            None
        } else {
            let appender = RollingFileAppender::new(Rotation::DAILY, &dir, "posflow.log");
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(appender)
                    .with_filter(filter(&settings.level)),
            )
        }
    } else {
        None
    };

    let result = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
    if let Err(e) = result {
        eprintln!("Warning: logging already initialized: {}", e);
        return;
    }

    if settings.file {
        tracing::info!("File logging enabled: {:?}", log_dir());
    }
}
