//! Google OAuth credential acquisition and storage.
//!
//! - [`AuthProvider`] - the two OAuth capabilities: interactive authorization and refresh
//! - [`google::OAuthClient`] - Google implementation (PKCE + loopback redirect)
//! - [`google::TokenInfo`] / [`google::TokenStorage`] - the credential and its file
//! - [`AuthError`] - error type for all of the above

pub mod error;
pub mod google;
pub mod provider;

pub use error::{AuthError, AuthErrorCode, AuthResult};
pub use provider::{AuthProvider, BoxFuture};
