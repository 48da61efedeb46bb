//! The persisted credential and its file-backed store.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult};

use super::config::OAuthCredentials;

/// Seconds subtracted from the provider's `expires_in` so the token is
/// refreshed before the provider rejects it.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An OAuth credential as written to the token file.
///
/// Besides the token pair it carries the client identity and token endpoint,
/// so it can be refreshed without the client secret file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// Present only when the user granted offline access.
    pub refresh_token: Option<String>,

    /// When the access token expires, margin already applied.
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were requested.
    pub scopes: Vec<String>,

    /// When the tokens were last obtained or refreshed.
    pub last_refresh: DateTime<Utc>,

    pub client_id: String,

    pub client_secret: String,

    pub token_uri: String,
}

impl TokenInfo {
    /// Creates a credential from token endpoint response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
        client: &OAuthCredentials,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
            last_refresh: Utc::now(),
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            token_uri: client.token_uri.clone(),
        }
    }

    /// Returns true if an expiry is known and has passed.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Returns true if the credential can be used as-is.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Returns the refresh token, if offline access was granted.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns true if the token can be renewed without user interaction.
    pub fn is_refreshable(&self) -> bool {
        self.is_expired() && self.refresh_token.is_some()
    }

    /// Applies the result of a refresh grant.
    ///
    /// Google may rotate the refresh token; a returned one replaces ours.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(expiry_from_now);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.last_refresh = Utc::now();
    }
}

/// Expiry for a token living `secs` seconds, or `None` if that is not a
/// representable instant.
pub(crate) fn checked_expiry(secs: i64) -> Option<DateTime<Utc>> {
    let lifetime = Duration::try_seconds(secs)?
        .checked_sub(&Duration::seconds(EXPIRY_MARGIN_SECS))?;
    Utc::now().checked_add_signed(lifetime)
}

/// Unrepresentable lifetimes count as already expired.
fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    checked_expiry(secs).unwrap_or_else(Utc::now)
}

/// File-backed credential storage.
///
/// The file is JSON; it is replaced through a temporary sibling so a reader
/// never sees a partial write.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    /// Creates a store for the given path. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the stored credential, or `None` if the file does not exist.
    pub fn load(&self) -> AuthResult<Option<TokenInfo>> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::storage(format!("failed to read token file {}", self.path.display()))
                .with_source(e)
        })?;

        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            AuthError::storage(format!(
                "failed to parse token file {}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        info!("loaded token from {:?}", self.path);
        Ok(Some(tokens))
    }

    /// Overwrites the token file with the given credential.
    pub fn save(&self, tokens: &TokenInfo) -> AuthResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::storage(format!(
                    "failed to create token directory {}",
                    parent.display()
                ))
                .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(tokens).map_err(|e| {
            AuthError::internal(format!("failed to serialize token: {}", e))
        })?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, &content).map_err(|e| {
            AuthError::storage(format!(
                "failed to write token file {}",
                temp_path.display()
            ))
            .with_source(e)
        })?;

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(AuthError::storage(format!(
                "failed to replace token file {}",
                self.path.display()
            ))
            .with_source(e));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!("saved token to {:?}", self.path);
        Ok(())
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
