//! # Observability
//!
//! Log sink setup for portald.
//!
//! Components never decide where their logs go. They use the standard `tracing`
//! macros and the binary calls [`init_with_config`] once at startup.
//!
//! Two sinks are available:
//!
//! - a compact human-readable stream on stderr (always on). In `plain` mode
//!   timestamps, targets and colors are dropped, which suits systemd journals
//!   that add their own attributes.
//! - an optional JSONL file where every event becomes one JSON object:
//!   `tail -f portald.jsonl | jq`.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "portald".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/var/log/portald.jsonl".into()),
//!     ..Default::default()
//! })?;
//! tracing::info!("daemon started");
//! ```

mod file;
mod json_layer;

use std::io;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file::{AppendFileWriter, AppendWriterFactory};
pub use json_layer::{JsonLayer, LogEntry, REDACTED};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name written into every JSONL entry.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info", "portal_client=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Optional JSONL log file. Parent directories are created on demand.
    pub log_path: Option<PathBuf>,

    /// Drop timestamps, targets and ANSI colors from the stderr stream.
    pub plain: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "portald".into(),
            default_level: "info".into(),
            log_path: None,
            plain: false,
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if the log file cannot be opened or a global subscriber was already
/// installed.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let env_filter = build_filter(&config.default_level);

    let stderr_layer = if config.plain {
        tracing_subscriber::fmt::layer()
            .without_time()
            .with_target(false)
            .with_ansi(false)
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed()
    };

    let json_layer = match &config.log_path {
        Some(path) => {
            let writer = AppendFileWriter::open(path)?;
            Some(JsonLayer::new(
                config.service_name.clone(),
                AppendWriterFactory::new(writer),
            ))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(json_layer)
        .try_init()
        .map_err(io::Error::other)?;

    if let Some(path) = &config.log_path {
        tracing::debug!(log_path = %path.display(), "JSONL log sink enabled");
    }

    Ok(())
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
