//! Command-line interface definition.
//!
//! Running `calauth` with no arguments performs the whole bootstrap; both
//! options only exist for troubleshooting.

use std::path::PathBuf;

use clap::Parser;

/// calauth - obtain and store a Google Calendar token for dan-brain
#[derive(Debug, Parser)]
#[command(name = "calauth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML file overriding token/secret paths and the loopback port
    #[arg(long, short, env = "CALAUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output on stderr
    #[arg(long, short = 'v', env = "CALAUTH_DEBUG")]
    pub debug: bool,
}
