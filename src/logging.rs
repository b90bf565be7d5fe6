//! Tracing subscriber setup
//!
//! Application logs go to `log_file` (plus stderr in text mode). When
//! `event_log_file` is set, records on [`EVENT_TARGET`] are split off into
//! their own JSON file and dropped from the application log.

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Target used by the log event sink for lifecycle events
pub const EVENT_TARGET: &str = "transfer_events";

/// Install the global subscriber; keep the guards alive until exit
pub fn init_logging(config: &AppConfig) -> Vec<WorkerGuard> {
    let (app_writer, app_guard) =
        tracing_appender::non_blocking(rolling_appender(config, &config.log_file));
    let mut guards = vec![app_guard];

    let event_layer = config.event_log_file.as_deref().map(|file| {
        let (event_writer, event_guard) =
            tracing_appender::non_blocking(rolling_appender(config, file));
        guards.push(event_guard);
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(event_writer)
            .with_ansi(false)
            .with_filter(Targets::new().with_target(EVENT_TARGET, Level::INFO))
    });

    let registry = tracing_subscriber::registry().with(event_layer);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(app_writer)
            .with_ansi(false)
            .with_filter(app_filter(config));
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(app_writer)
            .with_ansi(false)
            .with_filter(app_filter(config));
        let stderr_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_filter(app_filter(config));
        registry.with(file_layer).with(stderr_layer).init();
    }

    guards
}

fn rolling_appender(config: &AppConfig, file: &str) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, file),
        _ => tracing_appender::rolling::never(&config.log_dir, file),
    }
}

/// `RUST_LOG` wins over the configured level
fn app_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(app_directives(config)))
}

fn app_directives(config: &AppConfig) -> String {
    if config.event_log_file.is_some() {
        format!("{},{}=off", config.log_level, EVENT_TARGET)
    } else {
        config.log_level.clone()
    }
}
