//! Logging setup
//!
//! Console output on stderr (format from `PIXSTAR_SUPERVISOR_LOG_FORMAT`:
//! `json`, `pretty`, or compact by default) plus a daily-rotated file in the
//! log directory. At most two log files are kept.

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FORMAT_ENV: &str = "PIXSTAR_SUPERVISOR_LOG_FORMAT";
const LOG_FILE_PREFIX: &str = "immich-pixstar-supervisor";
const MAX_LOG_FILES: usize = 2;

/// Install the global subscriber
///
/// The returned guard flushes the file writer when dropped; hold it until
/// exit (or until just before `exec`).
pub fn init(log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "compact".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("pixstar_supervisor=info"))?;

    // A read-only base directory must not prevent stopping the worker
    let (file_layer, guard) = match Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
    {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "warning: file logging disabled ({}): {}",
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?,
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(guard)
}
