//! OAuth2 client-credentials exchange.
//!
//! One token is fetched per batch, before any record is read. There is no
//! refresh and no retry: if the exchange fails the batch is aborted.

use crate::error::{ResolveError, Result};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

/// Key/secret pair presented to the token endpoint with HTTP Basic auth.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client id
    pub key: String,
    /// Client secret
    pub secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token held for the duration of one batch.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    scope: String,
    expires_in: Option<u64>,
}

impl Credential {
    /// Build a credential from an already issued token.
    #[must_use]
    pub fn new(access_token: &str, scope: &str) -> Self {
        Credential {
            access_token: access_token.to_string(),
            scope: scope.to_string(),
            expires_in: None,
        }
    }

    /// The bearer token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Scope the token was issued for.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Lifetime in seconds reported by the token endpoint, if any.
    #[must_use]
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Perform the client-credentials exchange.
///
/// Sends `grant_type=client_credentials&scope=<scope>` to `token_url`.
///
/// # Errors
///
/// Every failure (transport, non-2xx status, body without `access_token`) is
/// reported as [`ResolveError::Auth`].
pub async fn acquire(
    http: &reqwest::Client,
    credentials: &ClientCredentials,
    scope: &str,
    token_url: &str,
) -> Result<Credential> {
    debug!(token_url, scope, "requesting access token");

    let response = http
        .post(token_url)
        .basic_auth(&credentials.key, Some(&credentials.secret))
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[("grant_type", "client_credentials"), ("scope", scope)])
        .send()
        .await
        .map_err(|e| ResolveError::Auth(format!("token request to {token_url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ResolveError::Auth(format!(
            "token endpoint returned {status}: {}",
            body.chars().take(200).collect::<String>()
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ResolveError::Auth(format!("invalid token response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(ResolveError::Auth("token endpoint returned an empty access_token".to_string()));
    }
    if let Some(token_type) = token.token_type.as_deref() {
        if !token_type.eq_ignore_ascii_case("bearer") {
            return Err(ResolveError::Auth(format!("unsupported token type {token_type}")));
        }
    }

    info!(expires_in = ?token.expires_in, "access token acquired");
    Ok(Credential {
        access_token: token.access_token,
        scope: token.scope.unwrap_or_else(|| scope.to_string()),
        expires_in: token.expires_in,
    })
}
