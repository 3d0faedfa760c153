//! Subscriber setup for the operator binary.
//!
//! The engine logs through the `log` facade; the fmt subscriber installs
//! the `tracing-log` bridge so those records land in the same output.

use crate::config::LogConfig;
use crate::error::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count: 0 → configured, 1 → debug, 2+ → trace.
pub fn directive(config: &LogConfig, verbosity: u8) -> String {
    match verbosity {
        0 => config.level.clone(),
        1 => "debug".into(),
        _ => "trace".into(),
    }
}

/// Build the filter: `-v` beats `RUST_LOG`, which beats the config file.
pub fn filter(config: &LogConfig, verbosity: u8) -> AppResult<EnvFilter> {
    if verbosity == 0 {
        if let Ok(from_env) = EnvFilter::try_from_default_env() {
            return Ok(from_env);
        }
    }
    EnvFilter::try_new(directive(config, verbosity)).map_err(|e| AppError::Logging(e.to_string()))
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init(config: &LogConfig, verbosity: u8) -> AppResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config, verbosity)?)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| AppError::Logging(e.to_string()))
}
