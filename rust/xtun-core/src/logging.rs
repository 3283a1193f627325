use crate::config::LogLevel;
use crate::error::{Error, Result};
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

/// Crates whose events follow the session log level
const XTUN_TARGETS: &[&str] = &["xtun_core", "xtun"];

/// Build the filter shared by every subscriber the process installs.
///
/// Returns `None` for `LogLevel::Silent`.
pub fn log_filter(level: LogLevel) -> Result<Option<EnvFilter>> {
    let tracing_level = match level {
        LogLevel::Silent => return Ok(None),
        LogLevel::Error => Level::ERROR,
        LogLevel::Warning => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
    };

    let mut filter = EnvFilter::from_default_env();
    for target in XTUN_TARGETS {
        filter = filter.add_directive(
            format!("{}={}", target, tracing_level)
                .parse()
                .map_err(|e| Error::config(format!("Invalid log directive: {}", e)))?,
        );
    }

    Ok(Some(filter))
}

/// Initialize console logging. Only the first call in a process has any effect.
pub fn init_logging(level: LogLevel) -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = init_logging_inner(level);
    });

    result
}

fn init_logging_inner(level: LogLevel) -> Result<()> {
    let Some(filter) = log_filter(level)? else {
        return Ok(());
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .compact()
        .with_filter(filter);

    // try_init: the host may already own a global subscriber
    if tracing_subscriber::registry().with(fmt_layer).try_init().is_ok() {
        tracing::info!("Logging initialized at level: {:?}", level);
    }
    Ok(())
}

/// Log an error with context, at a level matching its severity
pub fn log_error(error: &Error, context: Option<&str>) {
    match error {
        Error::InvalidState { .. } => match context {
            Some(ctx) => tracing::warn!("{}: [{}] {}", ctx, error.code(), error),
            None => tracing::warn!("[{}] {}", error.code(), error),
        },
        _ => match context {
            Some(ctx) => tracing::error!("{}: [{}] {}", ctx, error.code(), error),
            None => tracing::error!("[{}] {}", error.code(), error),
        },
    }
}

/// Performance logging
pub struct PerformanceLogger {
    operation: String,
    start_time: std::time::Instant,
}

impl PerformanceLogger {
    pub fn new<S: Into<String>>(operation: S) -> Self {
        Self {
            operation: operation.into(),
            start_time: std::time::Instant::now(),
        }
    }
}

impl Drop for PerformanceLogger {
    fn drop(&mut self) {
        tracing::debug!(
            "{} completed in {:?}",
            self.operation,
            self.start_time.elapsed()
        );
    }
}

/// Create a performance logger guard
pub fn time_operation<S: Into<String>>(operation: S) -> PerformanceLogger {
    PerformanceLogger::new(operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_has_no_filter() {
        assert!(log_filter(LogLevel::Silent).unwrap().is_none());
    }

    #[test]
    fn test_filter_for_each_level() {
        for level in [
            LogLevel::Error,
            LogLevel::Warning,
            LogLevel::Info,
            LogLevel::Debug,
        ] {
            assert!(log_filter(level).unwrap().is_some());
        }
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        assert!(init_logging(LogLevel::Debug).is_ok());
        assert!(init_logging(LogLevel::Error).is_ok());
    }
}
