//! Service configuration loaded from `config.yml`.
//!
//! ```yaml
//! metadata_service_url: https://americas.discovery.api.oclc.org/worldcat/search/v2/bibs
//! token_url: https://oauth.oclc.org/token
//! key: my-client-id
//! secret: my-client-secret
//! ```
//!
//! `scope` and `timeout_secs` are optional.

use crate::auth::ClientCredentials;
use crate::error::{ResolveError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Scope requested for bibliographic search.
pub const DEFAULT_SCOPE: &str = "wcapi:view_bib";

/// Transport timeout applied to every request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Endpoints and client credentials for one batch run.
#[derive(Clone, Deserialize)]
pub struct ServiceConfig {
    /// Search endpoint; the identifier is appended as `q=<identifier>`
    pub metadata_service_url: String,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// Client id
    pub key: String,
    /// Client secret
    pub secret: String,
    /// Requested scope
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ServiceConfig {
    /// Build a configuration with the default scope and timeout.
    #[must_use]
    pub fn new(metadata_service_url: &str, token_url: &str, key: &str, secret: &str) -> Self {
        ServiceConfig {
            metadata_service_url: metadata_service_url.to_string(),
            token_url: token_url.to_string(),
            key: key.to_string(),
            secret: secret.to_string(),
            scope: default_scope(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Parse and validate YAML configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] if the YAML is invalid or a required
    /// value is empty.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ServiceConfig =
            serde_yaml::from_str(text).map_err(|e| ResolveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ResolveError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check that every required value is present.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] naming the first empty value.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("metadata_service_url", &self.metadata_service_url),
            ("token_url", &self.token_url),
            ("key", &self.key),
            ("secret", &self.secret),
            ("scope", &self.scope),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ResolveError::Config(format!("{name} must not be empty")));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ResolveError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The key/secret pair for the token exchange.
    #[must_use]
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            key: self.key.clone(),
            secret: self.secret.clone(),
        }
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("metadata_service_url", &self.metadata_service_url)
            .field("token_url", &self.token_url)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
