//! Bootstrapper for the Google Calendar token used by dan-brain.
//!
//! This crate provides the `calauth` command-line tool. It is meant to be run
//! by hand on a machine with a browser, once, and again whenever the stored
//! token can no longer be refreshed.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;

pub use bootstrap::{Bootstrapper, Outcome};
pub use cli::Cli;
pub use config::BootstrapConfig;
pub use error::{BootstrapError, BootstrapResult};
