use std::fs;

use thiserror::Error;
use time::UtcOffset;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{reload::Handle, EnvFilter};

/// First line holds the filter, e.g. `info,pool_filtration=debug`.
const FILTER_FILE: &str = "logging.env";

pub fn init_logging() -> Result<LoggingHandle<EnvFilter, impl Subscriber>, String> {
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or_else(|err| {
            eprintln!("Failed to get local offset, logging in UTC: {}", err);
            UtcOffset::UTC
        }),
        time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second] +[offset_hour]"),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = read_env_filter().unwrap_or_else(|err| {
        eprintln!("{}, using RUST_LOG or the default", err);
        EnvFilter::builder()
            .with_default_directive(Level::DEBUG.into())
            .from_env_lossy()
    });
    println!("Log filter: {}", env_filter);

    let builder = tracing_subscriber::fmt()
        .with_timer(timer)
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_filter_reloading();
    let handle = builder.reload_handle();

    tracing::subscriber::set_global_default(builder.finish())
        .map_err(|err| format!("Failed to install subscriber: {}", err))?;
    // Everything outside main logs through the log facade.
    tracing_log::LogTracer::init().map_err(|err| format!("Failed to bridge log records: {}", err))?;

    Ok(LoggingHandle {
        _non_blocking_guard: guard,
        handle,
    })
}

#[derive(Error, Debug)]
pub enum ReloadLogLevelError {
    #[error("{0}")]
    InvalidFilter(String),
    #[error("failed to swap log filter: {0}")]
    ReloadFailed(#[from] tracing_subscriber::reload::Error),
}

/// Re-read the filter file and swap it into the running subscriber.
pub fn reload_log_level(logging_handle: &LoggingHandle<EnvFilter, impl Subscriber>) -> Result<String, ReloadLogLevelError> {
    let new_filter = read_env_filter().map_err(ReloadLogLevelError::InvalidFilter)?;
    let filter_string = new_filter.to_string();
    logging_handle.handle.reload(new_filter)?;
    Ok(filter_string)
}

fn read_env_filter() -> Result<EnvFilter, String> {
    let s = fs::read_to_string(FILTER_FILE).map_err(|err| format!("Failed to read {}: {}", FILTER_FILE, err))?;
    let first_line = s
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| format!("{} has no filter in it", FILTER_FILE))?;
    EnvFilter::builder()
        .with_default_directive(Level::DEBUG.into())
        .parse(first_line)
        .map_err(|err| format!("Failed to parse log filter {:?}: {}", first_line, err))
}

/// Keeps the background writer alive, dropping it flushes and stops logging.
pub struct LoggingHandle<L, S> {
    _non_blocking_guard: WorkerGuard,
    handle: Handle<L, S>,
}
