//! Logging initialisation for the command-line tool.
//!
//! Installs a global `tracing` subscriber writing to stderr so stimuli printed
//! on stdout stay clean. `RUST_LOG` controls the level and `AGL_LOG_FORMAT`
//! selects `human` (default) or `json` output.

use std::env;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

const LOG_FORMAT_ENV: &str = "AGL_LOG_FORMAT";

/// Errors raised while initialising logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("environment variable `{name}` contained invalid UTF-8: {source}")]
    InvalidUnicode {
        name: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("unsupported log format `{provided}`; expected `human` or `json`")]
    UnsupportedFormat { provided: String },
    #[error("failed to install tracing subscriber: {0}")]
    InstallFailed(String),
}

/// Whether `raw` asks for JSON output
fn parse_log_format(raw: &str) -> Result<bool, LoggingError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "human" => Ok(false),
        "json" => Ok(true),
        _ => Err(LoggingError::UnsupportedFormat {
            provided: raw.to_string(),
        }),
    }
}

/// Install the global subscriber
pub fn init_logging() -> Result<(), LoggingError> {
    let use_json = match env::var(LOG_FORMAT_ENV) {
        Ok(raw) => parse_log_format(&raw)?,
        Err(env::VarError::NotPresent) => false,
        Err(err @ env::VarError::NotUnicode(_)) => {
            return Err(LoggingError::InvalidUnicode {
                name: LOG_FORMAT_ENV,
                source: err,
            });
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if use_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| LoggingError::InstallFailed(e.to_string()))
}
