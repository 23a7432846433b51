//! Metadata search client.
//!
//! The client owns only the transport and the endpoint. The bearer
//! [`Credential`] is passed into every call, so the client carries no
//! authentication state of its own.

use crate::auth::Credential;
use crate::config::ServiceConfig;
use crate::error::{ResolveError, Result};
use crate::identifier::Identifier;
use std::time::Duration;
use tracing::debug;

/// `Accept` header sent with every search request.
pub const SEARCH_ACCEPT: &str = "application/json;content=\"application/json\"";

/// Build the shared HTTP transport with a request timeout.
///
/// # Errors
///
/// Returns [`ResolveError::Config`] if the TLS backend cannot be initialised.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("oclc-resolver/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ResolveError::Config(format!("failed to create HTTP client: {e}")))
}

/// Client for the bibliographic search endpoint.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    service_url: String,
}

impl MetadataClient {
    /// Create a client for `service_url` using an existing transport.
    #[must_use]
    pub fn new(http: reqwest::Client, service_url: &str) -> Self {
        MetadataClient {
            http,
            service_url: service_url.to_string(),
        }
    }

    /// Create a client and its transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(
            build_http_client(config.timeout())?,
            &config.metadata_service_url,
        ))
    }

    /// The underlying transport, shared with the token exchange.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Search for one identifier and return the raw response body.
    ///
    /// The identifier is appended to the endpoint as the `q` query
    /// parameter; any query string already present on the endpoint is kept.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Network`] if the request could not be completed
    ///   (connection failure, timeout, truncated body)
    /// - [`ResolveError::Http`] if the service answered with a non-2xx status
    pub async fn query(&self, identifier: &Identifier, credential: &Credential) -> Result<String> {
        let response = self
            .http
            .get(&self.service_url)
            .query(&[("q", identifier.as_str())])
            .bearer_auth(credential.access_token())
            .header(reqwest::header::ACCEPT, SEARCH_ACCEPT)
            .send()
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        let status = response.status();
        debug!(identifier = %identifier, status = status.as_u16(), "search response");
        if !status.is_success() {
            return Err(ResolveError::Http {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))
    }
}
