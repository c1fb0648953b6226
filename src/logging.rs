//! Tracing setup.
//!
//! `RUST_LOG` wins when set. Otherwise the level is `info`, or `debug` with
//! `--verbose`. Logs go to stderr so `snapshot` output on stdout stays clean.

use std::path::Path;
use std::sync::Once;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON lines, for shipping to a collector.
    Json,
    #[default]
    Pretty,
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "lineboard=debug,info" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. Subsequent calls are no-ops.
///
/// With `log_dir`, events are also written to a daily-rotated
/// `lineboard.log` there. Keep the returned guard alive until exit or the
/// file writer drops buffered lines.
pub fn init(format: LogFormat, verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let mut guard = None;
    INIT.call_once(|| {
        let (file_layer, file_guard) = match log_dir {
            Some(dir) => {
                let appender = tracing_appender::rolling::daily(dir, "lineboard.log");
                let (writer, g) = tracing_appender::non_blocking(appender);
                (Some(fmt::layer().json().with_writer(writer)), Some(g))
            }
            None => (None, None),
        };
        guard = file_guard;

        let registry = tracing_subscriber::registry()
            .with(env_filter(verbose))
            .with(file_layer);

        let result = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init(),
        };
        if let Err(e) = result {
            eprintln!("logging already initialised: {}", e);
        }
    });
    guard
}

/// Debug-level logging captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
