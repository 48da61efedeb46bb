//! calauth CLI entry point.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use calauth_cli::bootstrap::{Bootstrapper, Outcome};
use calauth_cli::cli::Cli;
use calauth_cli::config::BootstrapConfig;
use calauth_cli::error::{BootstrapError, BootstrapResult, report};
use calauth_cli::logging::{LoggingConfig, init_logging};
use calauth_google::google::OAuthClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(outcome) => {
            debug!(?outcome, "bootstrap finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let _ = report(&mut io::stderr().lock(), &e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> BootstrapResult<Outcome> {
    let logging = if cli.debug {
        LoggingConfig::debug()
    } else {
        LoggingConfig::default()
    };
    init_logging(logging)?;

    let config = match cli.config {
        Some(ref path) => BootstrapConfig::load_from(path).map_err(BootstrapError::Config)?,
        None => BootstrapConfig::default(),
    };
    config.validate().map_err(BootstrapError::Config)?;
    debug!(?config, "loaded configuration");

    let provider = OAuthClient::new(config.http_timeout())?;
    let mut bootstrapper = Bootstrapper::new(config, provider, io::stdout());
    bootstrapper.ensure_credential().await
}
