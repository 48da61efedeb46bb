//! Bootstrapper error types.

use std::error::Error as StdError;
use std::io::{self, Write};

use calauth_google::AuthError;
use thiserror::Error;

use crate::logging::LoggingError;

/// Result type for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Errors that end a bootstrap run.
///
/// A missing client secret file is not among them: it is an expected
/// outcome, reported as guidance.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Loading, refreshing, obtaining or storing the credential failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The configuration file is unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Writing to the console failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The log subscriber could not be installed.
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Writes a fatal error and its chain of causes, one per line.
pub fn report(out: &mut impl Write, err: &dyn StdError) -> io::Result<()> {
    writeln!(out, "error: {}", err)?;
    let mut source = err.source();
    while let Some(cause) = source {
        writeln!(out, "  caused by: {}", cause)?;
        source = cause.source();
    }
    Ok(())
}
