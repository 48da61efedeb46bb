//! Client secret file handling and Google endpoint constants.

use std::path::Path;

use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

/// Google OAuth authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read-only access to the user's calendars.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// The scope set requested by every authorization.
///
/// Tokens granted for a different set are not detected as stale; changing this
/// requires deleting the stored token by hand.
pub const SCOPES: &[&str] = &[CALENDAR_READONLY_SCOPE];

/// OAuth 2.0 client identity issued by the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Authorization endpoint announced by the secret file.
    pub auth_uri: String,
    /// Token endpoint announced by the secret file.
    pub token_uri: String,
}

/// Structure of Google's client secret JSON file.
///
/// Accepts the Console download (`installed` or `web` section) and the flat
/// layout written by gcloud.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

impl OAuthCredentials {
    /// Creates credentials pointing at the default Google endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: GOOGLE_AUTH_URL.to_string(),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Overrides the token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Loads the client secret file downloaded from the Google Cloud Console.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::configuration(format!(
                "failed to read client secret file {}",
                path.display()
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses a client secret JSON document.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            AuthError::configuration(format!("failed to parse client secret JSON: {}", e))
        })?;

        if let Some(nested) = file.installed.or(file.web) {
            let mut creds = Self::new(nested.client_id, nested.client_secret);
            if let Some(auth_uri) = nested.auth_uri {
                creds.auth_uri = auth_uri;
            }
            if let Some(token_uri) = nested.token_uri {
                creds.token_uri = token_uri;
            }
            return creds.validated();
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Self::new(client_id, client_secret).validated();
        }

        Err(AuthError::configuration(
            "client secret file must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
        ))
    }

    fn validated(self) -> AuthResult<Self> {
        if self.client_id.is_empty() {
            return Err(AuthError::configuration("client_id is empty"));
        }
        if self.client_secret.is_empty() {
            return Err(AuthError::configuration("client_secret is empty"));
        }
        Ok(self)
    }

    /// Returns the fixed scope set as owned strings.
    pub fn scopes() -> Vec<String> {
        SCOPES.iter().map(|s| s.to_string()).collect()
    }
}
