/*!
 * Logging initialization, shaped after `orbit::logging::init_logging`: stdout
 * by default, optional JSON file output, env-filter driven.
 */

use std::fs::File;
use std::path::Path;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{BackdriftError, Result};

/// Logging configuration: a verbosity level and an optional output file.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub log_file: Option<std::path::PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: Level::INFO, log_file: None }
    }
}

/// Install a global `tracing` subscriber. Call at most once per process.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("backdrift={}", config.level)))
        .map_err(|e| BackdriftError::Config(format!("failed to build log filter: {e}")))?;

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter)
    } else {
        init_stdout_logging(env_filter);
        Ok(())
    }
}

fn init_stdout_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| BackdriftError::Config(format!("failed to create log file: {e}")))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
    Ok(())
}

/// Initialize logging for tests, idempotently.
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("backdrift=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
