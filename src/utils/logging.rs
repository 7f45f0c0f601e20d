use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "shopmind.log";

/// Builds the filter for a level or directive string, falling back to `info`
fn level_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        EnvFilter::new("info")
    })
}

/// Initialize the logging system with the specified log level.
///
/// # Arguments
///
/// * `log_level` - The desired log level or filter directive (e.g. "info", "shopmind=debug")
/// * `with_file` - Whether to also log to a daily rotating `logs/shopmind.log`
pub fn init_logging(log_level: &str, with_file: bool) {
    let filter = level_filter(log_level);
    let stdout_layer = fmt::layer().with_line_number(true).with_target(false);

    if with_file {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOG_FILE);
        let file_layer = fmt::layer()
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
    }
}
