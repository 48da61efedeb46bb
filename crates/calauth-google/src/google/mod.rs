//! Google OAuth for installed applications.
//!
//! # Authentication Flow
//!
//! 1. The operator downloads a client secret file from the Google Cloud Console
//! 2. [`OAuthClient::authorize`] binds a loopback listener and prints the consent URL
//! 3. The operator grants read-only calendar access in the browser
//! 4. Google redirects to the listener with an authorization code
//! 5. The code is exchanged for access and refresh tokens
//! 6. [`TokenStorage`] persists the resulting [`TokenInfo`]
//!
//! Later runs renew an expired token with [`OAuthClient::refresh`] and never
//! need the client secret file again.

mod config;
mod oauth;
mod tokens;

pub use config::{
    CALENDAR_READONLY_SCOPE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, OAuthCredentials, SCOPES,
};
pub use oauth::{OAuthClient, PkceFlow};
pub use tokens::{TokenInfo, TokenStorage};
