//! Ensures a usable Google credential is on disk.
//!
//! One pass, no retries:
//!
//! 1. Load the token file, if any
//! 2. A valid token ends the run silently
//! 3. An expired token with a refresh token is refreshed
//! 4. Otherwise a new authorization runs, which needs the client secret file;
//!    without it the operator gets setup instructions and nothing is written
//! 5. The refreshed or new token overwrites the token file
//! 6. The operator is told to restart the consuming service

use std::io::{self, Write};
use std::path::Path;

use calauth_google::AuthProvider;
use calauth_google::google::{OAuthCredentials, TokenInfo, TokenStorage};
use tracing::{debug, info};

use crate::config::BootstrapConfig;
use crate::error::BootstrapResult;

/// How a bootstrap run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The stored token was valid; nothing was written or printed.
    AlreadyValid,
    /// A new authorization was needed but the client secret file is missing.
    MissingClientSecrets,
    /// The stored token was refreshed and rewritten.
    Refreshed,
    /// A new token was obtained interactively and written.
    Authorized,
}

/// Runs the credential bootstrap against an [`AuthProvider`].
///
/// Operator text is written to `out`; the provider may print its own
/// authorization prompt.
pub struct Bootstrapper<P, W> {
    config: BootstrapConfig,
    store: TokenStorage,
    provider: P,
    out: W,
}

impl<P, W> Bootstrapper<P, W>
where
    P: AuthProvider,
    W: Write,
{
    pub fn new(config: BootstrapConfig, provider: P, out: W) -> Self {
        let store = TokenStorage::new(&config.token_path);
        Self {
            config,
            store,
            provider,
            out,
        }
    }

    /// Makes sure a valid credential is stored, acquiring or refreshing it
    /// if needed.
    ///
    /// # Errors
    ///
    /// Any failure to read the token file, refresh, authorize or save is
    /// returned as-is. A missing client secret file is not an error.
    pub async fn ensure_credential(&mut self) -> BootstrapResult<Outcome> {
        let stored = self.store.load()?;

        if stored.as_ref().is_some_and(TokenInfo::is_valid) {
            debug!("stored token is valid, nothing to do");
            return Ok(Outcome::AlreadyValid);
        }

        let (tokens, outcome) = match stored {
            Some(mut tokens) if tokens.is_refreshable() => {
                info!("stored token expired, refreshing");
                self.provider.refresh(&mut tokens).await?;
                (tokens, Outcome::Refreshed)
            }
            _ => {
                let secrets_path = &self.config.client_secrets_path;
                if !secrets_path.exists() {
                    write_missing_secrets_help(&mut self.out, secrets_path)?;
                    return Ok(Outcome::MissingClientSecrets);
                }

                let client = OAuthCredentials::from_file(secrets_path)?;
                let scopes = OAuthCredentials::scopes();
                info!("no usable token, starting authorization");
                let tokens = self
                    .provider
                    .authorize(&client, &scopes, self.config.loopback_port)
                    .await?;
                (tokens, Outcome::Authorized)
            }
        };

        self.store.save(&tokens)?;
        write_success(&mut self.out, self.store.path(), &self.config.service_name)?;
        Ok(outcome)
    }

    #[cfg(test)]
    fn provider(&self) -> &P {
        &self.provider
    }

    #[cfg(test)]
    fn output(&self) -> &W {
        &self.out
    }
}

/// Prints how to obtain the client secret file.
pub fn write_missing_secrets_help(out: &mut impl Write, path: &Path) -> io::Result<()> {
    let path = path.display();
    writeln!(out, "ERROR: Missing {}", path)?;
    writeln!(out)?;
    writeln!(out, "To get this file:")?;
    writeln!(out, "1. Go to https://console.cloud.google.com")?;
    writeln!(out, "2. Create/select a project")?;
    writeln!(out, "3. Enable 'Google Calendar API'")?;
    writeln!(
        out,
        "4. Go to Credentials → Create Credentials → OAuth client ID"
    )?;
    writeln!(out, "5. Choose 'Desktop app'")?;
    writeln!(out, "6. Download JSON and save as {}", path)?;
    out.flush()
}

/// Prints where the token went and which service to restart.
pub fn write_success(out: &mut impl Write, token_path: &Path, service: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Success! Token saved to {}", token_path.display())?;
    writeln!(out, "Restart the Docker container to use it:")?;
    writeln!(out, "  docker-compose restart {}", service)?;
    out.flush()
}
