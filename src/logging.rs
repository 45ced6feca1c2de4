//! Tracing setup for the server and the indexer.
//!
//! Events always go to stdout. When [`Config::log_file`] is set they are also appended, without
//! ANSI colors, to that file through a non-blocking writer. Filtering follows `RUST_LOG` and
//! defaults to `info`.

use std::io;
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. A log file that cannot be opened disables file logging only.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = config
        .log_file
        .as_deref()
        .and_then(|path| match open_log_file(path) {
            Ok(writer) => Some(writer),
            Err(error) => {
                eprintln!("File logging disabled; cannot open {}: {error}", path.display());
                None
            }
        })
        .map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .compact()
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();

    tracing::debug!(
        chat_model = %config.chat_model,
        embedding_provider = ?config.embedding_provider,
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        has_api_key = config.openai_api_key.is_some(),
        server_port = ?config.server_port,
        log_file = ?config.log_file,
        "Loaded configuration"
    );
}

/// Open `path` for appending, creating its directory first. The writer guard lives for the
/// rest of the process.
fn open_log_file(path: &Path) -> io::Result<NonBlocking> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(io::Error::other)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}
