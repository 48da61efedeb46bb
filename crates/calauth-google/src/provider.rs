//! The seam between the bootstrapper and whatever performs OAuth.
//!
//! [`AuthProvider`] exposes exactly the two capabilities the bootstrapper
//! needs. [`OAuthClient`](crate::google::OAuthClient) is the production
//! implementation; tests substitute their own.

use std::future::Future;
use std::pin::Pin;

use crate::error::AuthResult;
use crate::google::{OAuthClient, OAuthCredentials, TokenInfo};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Obtains and renews OAuth credentials.
///
/// Implementations attempt each call once; retrying is never the provider's
/// job.
pub trait AuthProvider: Send + Sync {
    /// Runs the interactive consent flow with a loopback redirect on `port`.
    fn authorize<'a>(
        &'a self,
        client: &'a OAuthCredentials,
        scopes: &'a [String],
        port: u16,
    ) -> BoxFuture<'a, AuthResult<TokenInfo>>;

    /// Renews an expired credential in place using its refresh token.
    fn refresh<'a>(&'a self, tokens: &'a mut TokenInfo) -> BoxFuture<'a, AuthResult<()>>;
}

impl AuthProvider for OAuthClient {
    fn authorize<'a>(
        &'a self,
        client: &'a OAuthCredentials,
        scopes: &'a [String],
        port: u16,
    ) -> BoxFuture<'a, AuthResult<TokenInfo>> {
        Box::pin(OAuthClient::authorize(self, client, scopes, port))
    }

    fn refresh<'a>(&'a self, tokens: &'a mut TokenInfo) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(OAuthClient::refresh(self, tokens))
    }
}
