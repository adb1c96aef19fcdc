// Logging setup for the vigil binary

use crate::error::{Result, VigilError};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{Level, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
/// With a `log_file`, lines are appended there without colors instead of
/// going to stdout.
pub fn init(level: Level, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let installed = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    VigilError::ConfigError(format!(
                        "Failed to open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file)
                        .with_ansi(false),
                )
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };

    installed.map_err(|e| VigilError::ConfigError(format!("Failed to install logger: {}", e)))
}

/// Root span tagging every event of one invocation with the program name.
/// Built at ERROR so it stays enabled whatever level the filter allows.
pub fn program_span(program: &str) -> Span {
    tracing::span!(Level::ERROR, "vigil", program = %program)
}
