use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::program_dir;
use crate::constants::LOG_DIR;

/// `logs/` next to the config file when one is given, else next to the executable,
/// matching how every other relative path resolves.
pub fn log_dir(config_path: Option<&Path>) -> PathBuf {
    let base = match config_path {
        Some(path) => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        None => program_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join(LOG_DIR)
}

/// Console output plus a daily rolling JSON file under `dir`.
///
/// `RUST_LOG` overrides the default `rental_zones=info` directive. The returned
/// guard flushes the file writer when dropped, so keep it alive until exit.
pub fn init_logging(dir: &Path) -> WorkerGuard {
    let _ = fs::create_dir_all(dir);

    let file_appender = tracing_appender::rolling::daily(dir, "rental_zones.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rental_zones=info"));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}
