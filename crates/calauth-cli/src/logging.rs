//! Log subscriber setup.
//!
//! Operator-facing text goes to stdout through `println!`-style writes; log
//! records go to stderr so the two never interleave in a pipe.
//!
//! ```ignore
//! use calauth_cli::logging::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::default())?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The level used when RUST_LOG is not set
    pub default_level: Level,
    /// Whether to include file/line information
    pub include_location: bool,
    /// Whether to include the module path
    pub include_target: bool,
    /// Custom env filter directive (overrides both RUST_LOG and default_level)
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            include_location: false,
            include_target: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Verbose settings for `--debug`.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_location: true,
            include_target: true,
            env_filter: None,
        }
    }

    /// Set the default log level
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom env filter directive
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// The directive used when neither `env_filter` nor RUST_LOG is set.
    ///
    /// Dependencies stay at `warn` so `--debug` does not dump HTTP internals.
    pub fn default_directive(&self) -> String {
        format!(
            "warn,calauth={0},calauth_cli={0},calauth_google={0}",
            self.default_level
        )
    }
}

/// Installs the global subscriber. Call once, before any work.
///
/// An explicit `--debug` wins over `RUST_LOG`.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed or the directive
/// does not parse.
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = match config.env_filter {
        Some(ref filter) => EnvFilter::try_new(filter)?,
        None if config.default_level == Level::DEBUG => {
            EnvFilter::try_new(config.default_directive())?
        }
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(config.default_directive())?,
        },
    };

    let layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target)
        .without_time();

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
