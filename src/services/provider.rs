//! Shared plumbing for the external HTTP providers (geocoding, matrix, optimization)

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use thiserror::Error;

pub const USER_AGENT: &str = "dispatch-worker/0.1";

/// Failure of an external provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unusable response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} is temporarily unavailable (circuit breaker open)")]
    CircuitOpen { provider: &'static str },
}

impl ProviderError {
    pub fn invalid(provider: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            message: message.into(),
        }
    }
}

/// OpenRouteService connection settings
#[derive(Debug, Clone)]
pub struct OpenRouteConfig {
    /// Base URL, e.g. "https://api.openrouteservice.org"
    pub base_url: String,
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl OpenRouteConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_seconds: 30,
        }
    }

    #[cfg(test)]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::new(crate::defaults::DEFAULT_ORS_BASE_URL, api_key)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// HTTP client with this provider's timeout.
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")
    }
}

/// Turn a non-success response into `ProviderError::Status`.
pub async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status { provider, status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = OpenRouteConfig::new("https://ors.example/", "key");
        assert_eq!(config.endpoint("/v2/matrix/driving-car"), "https://ors.example/v2/matrix/driving-car");
        assert_eq!(config.endpoint("optimization"), "https://ors.example/optimization");
    }

    #[test]
    fn default_base_url_is_public_api() {
        let config = OpenRouteConfig::with_api_key("key");
        assert_eq!(config.base_url, "https://api.openrouteservice.org");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn circuit_open_message_mentions_breaker() {
        let err = ProviderError::CircuitOpen { provider: "openroute-geocode" };
        assert!(err.to_string().contains("circuit breaker"));
    }

    #[test]
    fn http_client_builds() {
        assert!(OpenRouteConfig::with_api_key("key").http_client().is_ok());
    }
}
