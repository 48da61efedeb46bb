//! Bootstrapper configuration.
//!
//! The defaults are the fixed locations the downstream service expects. A
//! TOML file passed with `--config` may override them, e.g.:
//!
//! ```toml
//! token_path = "/srv/brain/data/google_token.pickle"
//! loopback_port = 8081
//! ```
//!
//! The OAuth scope set is deliberately absent: it is a constant in
//! [`calauth_google::google::SCOPES`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the credential is written.
pub const DEFAULT_TOKEN_PATH: &str = "data/google_token.pickle";

/// Where the Google Cloud Console client secret is expected.
pub const DEFAULT_CLIENT_SECRETS_PATH: &str = "data/google_credentials.json";

/// Port of the loopback listener receiving the OAuth redirect.
pub const DEFAULT_LOOPBACK_PORT: u16 = 8080;

/// The compose service that reads the token at startup.
pub const DEFAULT_SERVICE_NAME: &str = "dan-brain";

/// Settings for one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Token file, overwritten whenever a credential is obtained or refreshed.
    pub token_path: PathBuf,

    /// Client secret JSON, needed only for a new authorization.
    pub client_secrets_path: PathBuf,

    /// Loopback port for the authorization redirect.
    pub loopback_port: u16,

    /// Service named in the restart instruction.
    pub service_name: String,

    /// Timeout for token endpoint requests, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            client_secrets_path: PathBuf::from(DEFAULT_CLIENT_SECRETS_PATH),
            loopback_port: DEFAULT_LOOPBACK_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl BootstrapConfig {
    /// Loads configuration from a TOML file; missing keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))
    }

    /// Token request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_path.as_os_str().is_empty() {
            return Err("token_path must not be empty".to_string());
        }
        if self.client_secrets_path.as_os_str().is_empty() {
            return Err("client_secrets_path must not be empty".to_string());
        }
        if self.loopback_port == 0 {
            return Err("loopback_port must not be 0".to_string());
        }
        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be positive".to_string());
        }
        Ok(())
    }
}
