//! OAuth 2.0 installed-application flow for Google APIs.
//!
//! Authorization Code flow with PKCE, redirected to a loopback listener on a
//! fixed port.
//!
//! # Flow Overview
//!
//! 1. Generate a code verifier, its SHA-256 challenge and a random state
//! 2. Bind the loopback listener on the configured port
//! 3. Print the authorization URL and try to open the browser
//! 4. Serve redirects until one carries a code or an error
//! 5. Exchange the code (with verifier) for access and refresh tokens
//!
//! There is no timeout on step 4: the operator aborts by killing the process.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};

use super::config::OAuthCredentials;
use super::tokens::{TokenInfo, checked_expiry};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\n\
    The authentication flow has completed. You may close this window.";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\n\
    Authorization failed. You may close this window.";

const NOT_FOUND_PAGE: &str =
    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// OAuth client for Google's token endpoint and the loopback redirect.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
    open_browser: bool,
}

impl OAuthClient {
    /// Creates a client whose token requests time out after `timeout`.
    pub fn new(timeout: Duration) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("calauth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            open_browser: true,
        })
    }

    /// Controls whether [`authorize`](Self::authorize) launches a browser.
    /// The URL is printed either way.
    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Runs the interactive flow and returns a fresh credential.
    ///
    /// Blocks until the browser is redirected to `127.0.0.1:{port}`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The port cannot be bound
    /// - The user denies authorization or the state does not match
    /// - Token exchange fails
    pub async fn authorize(
        &self,
        client: &OAuthCredentials,
        scopes: &[String],
        port: u16,
    ) -> AuthResult<TokenInfo> {
        let pkce = PkceFlow::new();

        let listener = Self::bind_loopback_server(port)?;
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let auth_url =
            pkce.build_auth_url(&client.auth_uri, &client.client_id, &redirect_uri, scopes);

        info!("starting OAuth flow on port {}", port);
        println!(
            "Please visit this URL to authorize this application: {}",
            auth_url
        );

        if self.open_browser
            && let Err(e) = open::that(&auth_url)
        {
            warn!("failed to open browser: {}", e);
        }

        let code = Self::wait_for_callback(listener, &pkce.state)?;

        info!("received authorization code, exchanging for tokens...");
        self.exchange_code(client, &code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Refreshes an expired credential in place using its refresh token.
    pub async fn refresh(&self, tokens: &mut TokenInfo) -> AuthResult<()> {
        let refresh_token = tokens
            .refresh_token()
            .ok_or_else(|| AuthError::authentication("credential has no refresh token"))?
            .to_string();

        let params = [
            ("client_id", tokens.client_id.as_str()),
            ("client_secret", tokens.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .post_token(&tokens.token_uri, &params, "token refresh")
            .await?;

        tokens.apply_refresh(
            response.access_token,
            response.expires_in,
            response.refresh_token,
        );
        info!("successfully refreshed access token");
        Ok(())
    }

    async fn exchange_code(
        &self,
        client: &OAuthCredentials,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> AuthResult<TokenInfo> {
        let params = [
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .post_token(&client.token_uri, &params, "token exchange")
            .await?;

        if response.refresh_token.is_none() {
            warn!("token response carried no refresh token; re-authorization will be needed on expiry");
        }

        info!("successfully obtained tokens");
        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
            client,
        ))
    }

    async fn post_token(
        &self,
        token_uri: &str,
        params: &[(&str, &str)],
        what: &str,
    ) -> AuthResult<TokenResponse> {
        let response = self
            .http_client
            .post(token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::network(format!("{} request failed", what)).with_source(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::network("failed to read token response").with_source(e))?;

        if !status.is_success() {
            return Err(AuthError::authentication(format!(
                "{} failed ({}): {}",
                what, status, body
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::invalid_response(format!("invalid token response: {}", e))
        })?;

        if let Some(secs) = token_response.expires_in
            && checked_expiry(secs).is_none()
        {
            return Err(AuthError::invalid_response(format!(
                "expires_in out of range: {}",
                secs
            )));
        }

        Ok(token_response)
    }

    fn bind_loopback_server(port: u16) -> AuthResult<TcpListener> {
        let listener = TcpListener::bind(("127.0.0.1", port)).map_err(|e| {
            AuthError::configuration(format!("failed to bind loopback server on port {}", port))
                .with_source(e)
        })?;
        debug!("bound loopback server on port {}", port);
        Ok(listener)
    }

    /// Serves the loopback listener until a redirect carries a code or an error.
    ///
    /// Returns the code only if the redirect echoes `expected_state`.
    fn wait_for_callback(listener: TcpListener, expected_state: &str) -> AuthResult<String> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = Self::handle_callback(stream, expected_state) {
                        return result;
                    }
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
        Err(AuthError::internal("loopback listener closed"))
    }

    fn handle_callback(
        mut stream: TcpStream,
        expected_state: &str,
    ) -> Option<AuthResult<String>> {
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return None;
        }
        // Drain headers so closing the socket does not reset the browser.
        let mut header = String::new();
        while reader.read_line(&mut header).is_ok_and(|n| n > 0) && !header.trim_end().is_empty() {
            header.clear();
        }
        drop(reader);

        let result = match parse_callback(&request_line) {
            Callback::Code { code, state } if state == expected_state => Some(Ok(code)),
            Callback::Code { .. } => Some(Err(AuthError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ))),
            Callback::Denied(reason) => Some(Err(AuthError::authentication(format!(
                "authorization denied: {}",
                reason
            )))),
            Callback::Ignored => None,
        };

        let page = match result {
            Some(Ok(_)) => SUCCESS_PAGE,
            Some(Err(_)) => FAILURE_PAGE,
            None => NOT_FOUND_PAGE,
        };
        let _ = stream.write_all(page.as_bytes());
        let _ = stream.flush();

        result
    }
}

/// What a single request to the loopback listener amounted to.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code { code: String, state: String },
    Denied(String),
    /// Not a redirect (favicon, port scanners); keep listening.
    Ignored,
}

/// Parses `GET /?code=...&state=... HTTP/1.1`.
fn parse_callback(request_line: &str) -> Callback {
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 || parts[0] != "GET" {
        return Callback::Ignored;
    }

    let Ok(url) = Url::parse(&format!("http://127.0.0.1{}", parts[1])) else {
        return Callback::Ignored;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (error, code) {
        (Some(error), _) => Callback::Denied(error),
        (None, Some(code)) => Callback::Code {
            code,
            state: state.unwrap_or_default(),
        },
        (None, None) => Callback::Ignored,
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = Self::random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::random_token(16);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn random_token(len: usize) -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the authorization URL against the given endpoint.
    ///
    /// Requests offline access with forced consent so a refresh token is
    /// always issued.
    pub fn build_auth_url(
        &self,
        auth_uri: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_uri,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorCode;
    use crate::google::config::{CALENDAR_READONLY_SCOPE, GOOGLE_AUTH_URL};
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    /// Serves one canned response on an ephemeral port and reports the
    /// request body it received.
    fn stub_token_endpoint(
        status: &'static str,
        body: &'static str,
    ) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':')
                    && name.eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();
            tx.send(String::from_utf8(request_body).unwrap()).unwrap();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        (url, rx)
    }

    fn expired_token(token_uri: &str) -> TokenInfo {
        let client = OAuthCredentials::new("client-id", "client-secret").with_token_uri(token_uri);
        TokenInfo::new(
            "stale",
            Some("refresh-1".to_string()),
            Some(0),
            vec![CALENDAR_READONLY_SCOPE.to_string()],
            &client,
        )
    }

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        // Base64 encoding of 32 bytes = 43 characters (no padding)
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_is_deterministic() {
        let verifier = "test-verifier-string";
        assert_eq!(
            PkceFlow::compute_challenge(verifier),
            PkceFlow::compute_challenge(verifier)
        );
    }

    #[test]
    fn pkce_state_is_random() {
        assert_ne!(PkceFlow::new().state, PkceFlow::new().state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            GOOGLE_AUTH_URL,
            "test-client.apps.googleusercontent.com",
            "http://127.0.0.1:8080/",
            &[CALENDAR_READONLY_SCOPE.to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2F"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcalendar.readonly"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn parse_callback_with_code() {
        assert_eq!(
            parse_callback("GET /?state=abc&code=4%2F0Ab&scope=x HTTP/1.1\r\n"),
            Callback::Code {
                code: "4/0Ab".to_string(),
                state: "abc".to_string()
            }
        );
    }

    #[test]
    fn parse_callback_with_error() {
        assert_eq!(
            parse_callback("GET /?error=access_denied&state=abc HTTP/1.1\r\n"),
            Callback::Denied("access_denied".to_string())
        );
    }

    #[test]
    fn parse_callback_ignores_unrelated_requests() {
        assert_eq!(parse_callback("GET /favicon.ico HTTP/1.1\r\n"), Callback::Ignored);
        assert_eq!(parse_callback("POST /?code=x HTTP/1.1\r\n"), Callback::Ignored);
        assert_eq!(parse_callback(""), Callback::Ignored);
    }

    #[test]
    fn wait_for_callback_skips_noise_until_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = thread::spawn(move || {
            let mut responses = Vec::new();
            for request in [
                "GET /favicon.ico HTTP/1.1\r\n\r\n",
                "GET /?code=the-code&state=the-state HTTP/1.1\r\n\r\n",
            ] {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.write_all(request.as_bytes()).unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).unwrap();
                responses.push(response);
            }
            responses
        });

        let code = OAuthClient::wait_for_callback(listener, "the-state").unwrap();
        assert_eq!(code, "the-code");

        let responses = browser.join().unwrap();
        assert!(responses[0].starts_with("HTTP/1.1 404"));
        assert!(responses[1].contains("The authentication flow has completed."));
    }

    #[test]
    fn wait_for_callback_reports_denial() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(b"GET /?error=access_denied HTTP/1.1\r\n\r\n")
                .unwrap();
            let mut response = String::new();
            let _ = stream.read_to_string(&mut response);
        });

        let err = OAuthClient::wait_for_callback(listener, "the-state").unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::AuthenticationFailed);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn bind_fails_when_port_is_taken() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = OAuthClient::bind_loopback_server(port).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn authorize_rejects_forged_state() {
        let port = {
            let free = TcpListener::bind("127.0.0.1:0").unwrap();
            free.local_addr().unwrap().port()
        };

        let browser = thread::spawn(move || {
            // retry until authorize has bound the port
            let mut stream = loop {
                match TcpStream::connect(("127.0.0.1", port)) {
                    Ok(stream) => break stream,
                    Err(_) => thread::sleep(Duration::from_millis(20)),
                }
            };
            stream
                .write_all(b"GET /?code=c&state=forged HTTP/1.1\r\n\r\n")
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();
            response
        });

        let oauth = OAuthClient::new(Duration::from_secs(5))
            .unwrap()
            .with_open_browser(false);
        let client = OAuthCredentials::new("client-id", "client-secret")
            .with_token_uri("http://127.0.0.1:9/token");
        let scopes = vec![CALENDAR_READONLY_SCOPE.to_string()];

        let err = oauth.authorize(&client, &scopes, port).await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::AuthenticationFailed);
        assert!(err.message().contains("state mismatch"));

        let response = browser.join().unwrap();
        assert!(response.starts_with("HTTP/1.1 400"));
        assert!(!response.contains("The authentication flow has completed."));
    }

    #[tokio::test]
    async fn exchange_code_rejects_out_of_range_expiry() {
        let (url, _requests) = stub_token_endpoint(
            "200 OK",
            r#"{"access_token":"a1","expires_in":9223372036854775807}"#,
        );
        let oauth = OAuthClient::new(Duration::from_secs(5)).unwrap();
        let client = OAuthCredentials::new("id", "secret").with_token_uri(&url);

        let err = oauth
            .exchange_code(&client, "c", "v", "http://127.0.0.1:8080/", &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::InvalidResponse);
        assert!(err.message().contains("expires_in"));
    }

    #[tokio::test]
    async fn refresh_updates_token_in_place() {
        let (url, requests) = stub_token_endpoint(
            "200 OK",
            r#"{"access_token":"fresh","expires_in":3599,"token_type":"Bearer"}"#,
        );
        let client = OAuthClient::new(Duration::from_secs(5)).unwrap();
        let mut token = expired_token(&url);
        assert!(token.is_refreshable());

        client.refresh(&mut token).await.unwrap();

        assert_eq!(token.access_token, "fresh");
        assert_eq!(token.refresh_token(), Some("refresh-1"));
        assert!(token.is_valid());

        let body = requests.recv().unwrap();
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=refresh-1"));
        assert!(body.contains("client_id=client-id"));
    }

    #[tokio::test]
    async fn refresh_rejected_by_provider() {
        let (url, _requests) =
            stub_token_endpoint("400 Bad Request", r#"{"error":"invalid_grant"}"#);
        let client = OAuthClient::new(Duration::from_secs(5)).unwrap();
        let mut token = expired_token(&url);

        let err = client.refresh(&mut token).await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::AuthenticationFailed);
        assert!(err.message().contains("invalid_grant"));
        assert_eq!(token.access_token, "stale");
    }

    #[tokio::test]
    async fn refresh_without_refresh_token() {
        let client = OAuthClient::new(Duration::from_secs(5)).unwrap();
        let mut token = expired_token("http://127.0.0.1:9/token");
        token.refresh_token = None;

        let err = client.refresh(&mut token).await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::AuthenticationFailed);
    }

    #[tokio::test]
    async fn exchange_code_builds_credential() {
        let (url, requests) = stub_token_endpoint(
            "200 OK",
            r#"{"access_token":"a1","refresh_token":"r1","expires_in":3599,"scope":"https://www.googleapis.com/auth/calendar.readonly"}"#,
        );
        let oauth = OAuthClient::new(Duration::from_secs(5)).unwrap();
        let client = OAuthCredentials::new("client-id", "client-secret").with_token_uri(&url);
        let scopes = vec![CALENDAR_READONLY_SCOPE.to_string()];

        let token = oauth
            .exchange_code(&client, "the-code", "verifier", "http://127.0.0.1:8080/", &scopes)
            .await
            .unwrap();

        assert_eq!(token.access_token, "a1");
        assert_eq!(token.refresh_token(), Some("r1"));
        assert_eq!(token.scopes, scopes);
        assert_eq!(token.token_uri, url);
        assert!(token.is_valid());

        let body = requests.recv().unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code_verifier=verifier"));
    }

    #[tokio::test]
    async fn exchange_code_rejects_garbage() {
        let (url, _requests) = stub_token_endpoint("200 OK", "<html>nope</html>");
        let oauth = OAuthClient::new(Duration::from_secs(5)).unwrap();
        let client = OAuthCredentials::new("id", "secret").with_token_uri(&url);

        let err = oauth
            .exchange_code(&client, "c", "v", "http://127.0.0.1:8080/", &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::InvalidResponse);
    }
}
