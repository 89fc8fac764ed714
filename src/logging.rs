use std::env;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Logs go to stderr, since stdout may carry the snapshot itself. When
/// `LOG_FILE_PATH` is set, they are also appended to that file.
pub fn init_logger(verbose: bool) -> Option<WorkerGuard> {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| default_filter.to_string());
    let filter_layer = EnvFilter::new(filter);

    let (file_layer, guard) = match env::var("LOG_FILE_PATH") {
        Ok(log_file_path) => {
            let file_appender = tracing_appender::rolling::never("./", log_file_path);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (
                Some(fmt::layer().with_writer(non_blocking).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter_layer)
        .init();

    debug!("Tracing is configured for stderr{}", if guard.is_some() { " and file logging" } else { "" });

    guard
}
