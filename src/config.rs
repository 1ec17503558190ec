//! Configuration management

use std::str::FromStr;
use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::defaults;
use crate::services::provider::OpenRouteConfig;

/// Default minimum interval between geocoding requests
const DEFAULT_GEOCODE_RATE_LIMIT_MS: u64 = 250;

/// Default circuit breaker threshold (consecutive failures)
const DEFAULT_GEOCODE_CB_THRESHOLD: u32 = 3;

/// Default circuit breaker recovery time (5 minutes)
const DEFAULT_GEOCODE_CB_RECOVERY_SECS: u64 = 300;

/// Which implementation backs geocoding, matrix and optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBackend {
    /// Deterministic offline providers
    Mock,
    /// OpenRouteService HTTP API
    OpenRoute,
}

impl FromStr for ProviderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "openroute" | "ors" => Ok(Self::OpenRoute),
            other => anyhow::bail!("Unknown PROVIDER_BACKEND '{}' (expected 'openroute' or 'mock')", other),
        }
    }
}

/// External provider settings
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub backend: ProviderBackend,
    pub openroute: OpenRouteConfig,
    pub geocode_rate_limit: Duration,
    pub geocode_cb_threshold: u32,
    pub geocode_cb_recovery: Duration,
}

/// Route planning settings
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    /// Start and end of optimized routes
    pub depot_address: String,
    pub manual_warm_up_hours: f64,
    pub route_warm_up_hours: f64,
}

/// Object storage holding order photos
#[derive(Debug, Clone)]
pub struct BlobSettings {
    pub base_url: String,
    pub token: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS user/password
    pub nats_credentials: Option<(String, String)>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Directory of the rolling log file
    pub logs_dir: String,

    pub providers: ProviderSettings,

    pub planner: PlannerSettings,

    /// None disables photo release
    pub blob: Option<BlobSettings>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let nats_url = var("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let nats_credentials = match (var("NATS_USER"), lookup("NATS_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let logs_dir = var("LOGS_DIR").unwrap_or_else(|| "../logs".to_string());

        let api_key = var("ORS_API_KEY");
        let backend = match var("PROVIDER_BACKEND") {
            Some(value) => value.parse()?,
            None if api_key.is_some() => ProviderBackend::OpenRoute,
            None => ProviderBackend::Mock,
        };
        if backend == ProviderBackend::OpenRoute && api_key.is_none() {
            anyhow::bail!("ORS_API_KEY must be set when PROVIDER_BACKEND is 'openroute'");
        }

        let base_url = var("ORS_BASE_URL").unwrap_or_else(|| defaults::DEFAULT_ORS_BASE_URL.to_string());

        let providers = ProviderSettings {
            backend,
            openroute: OpenRouteConfig::new(base_url, api_key.unwrap_or_default()),
            geocode_rate_limit: Duration::from_millis(
                parse_or(&var, "GEOCODE_RATE_LIMIT_MS", DEFAULT_GEOCODE_RATE_LIMIT_MS)?,
            ),
            geocode_cb_threshold: parse_or(&var, "GEOCODE_CB_THRESHOLD", DEFAULT_GEOCODE_CB_THRESHOLD)?,
            geocode_cb_recovery: Duration::from_secs(
                parse_or(&var, "GEOCODE_CB_RECOVERY_SECS", DEFAULT_GEOCODE_CB_RECOVERY_SECS)?,
            ),
        };

        let planner = PlannerSettings {
            depot_address: var("DEPOT_ADDRESS")
                .unwrap_or_else(|| defaults::DEFAULT_DEPOT_ADDRESS.to_string()),
            manual_warm_up_hours: warm_up(&var, "MANUAL_WARM_UP_HOURS", defaults::DEFAULT_MANUAL_WARM_UP_HOURS)?,
            route_warm_up_hours: warm_up(&var, "ROUTE_WARM_UP_HOURS", defaults::DEFAULT_ROUTE_WARM_UP_HOURS)?,
        };

        let blob = var("BLOB_READ_WRITE_TOKEN").map(|token| BlobSettings {
            base_url: var("BLOB_BASE_URL").unwrap_or_else(|| defaults::DEFAULT_BLOB_BASE_URL.to_string()),
            token,
        });

        Ok(Self {
            nats_url,
            nats_credentials,
            database_url,
            logs_dir,
            providers,
            planner,
            blob,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn warm_up<F>(var: &F, key: &str, default: f64) -> Result<f64>
where
    F: Fn(&str) -> Option<String>,
{
    let hours: f64 = parse_or(var, key, default)?;
    if !hours.is_finite() || hours < 0.0 {
        anyhow::bail!("{} must be a non-negative number of hours (got {})", key, hours);
    }
    Ok(hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_config_requires_database_url() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://test")]).unwrap();

        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert!(config.nats_credentials.is_none());
        assert_eq!(config.logs_dir, "../logs");
        assert_eq!(config.providers.backend, ProviderBackend::Mock);
        assert_eq!(config.providers.openroute.base_url, "https://api.openrouteservice.org");
        assert_eq!(config.providers.geocode_cb_threshold, 3);
        assert_eq!(config.planner.depot_address, "Starowiejska 10, 08-110 Siedlce");
        assert_eq!(config.planner.manual_warm_up_hours, 0.0);
        assert_eq!(config.planner.route_warm_up_hours, 0.5);
        assert!(config.blob.is_none());
    }

    #[test]
    fn test_config_api_key_selects_openroute() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("ORS_API_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(config.providers.backend, ProviderBackend::OpenRoute);
        assert_eq!(config.providers.openroute.api_key, "secret");
    }

    #[test]
    fn test_config_explicit_mock_wins_over_api_key() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("ORS_API_KEY", "secret"),
            ("PROVIDER_BACKEND", "mock"),
        ])
        .unwrap();
        assert_eq!(config.providers.backend, ProviderBackend::Mock);
    }

    #[test]
    fn test_config_openroute_without_key_fails() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("PROVIDER_BACKEND", "openroute"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("ORS_API_KEY"));
    }

    #[test]
    fn test_config_unknown_backend_fails() {
        assert!(config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("PROVIDER_BACKEND", "valhalla"),
        ])
        .is_err());
    }

    #[test]
    fn test_config_invalid_numbers_fail() {
        assert!(config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("GEOCODE_RATE_LIMIT_MS", "fast"),
        ])
        .is_err());
        assert!(config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("ROUTE_WARM_UP_HOURS", "-1"),
        ])
        .is_err());
    }

    #[test]
    fn test_config_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("NATS_URL", "nats://nats:4222"),
            ("NATS_USER", "worker"),
            ("NATS_PASSWORD", "pw"),
            ("DEPOT_ADDRESS", "Magazynowa 1, Siedlce"),
            ("MANUAL_WARM_UP_HOURS", "0.25"),
            ("GEOCODE_CB_RECOVERY_SECS", "60"),
            ("BLOB_READ_WRITE_TOKEN", "tok"),
        ])
        .unwrap();

        assert_eq!(config.nats_url, "nats://nats:4222");
        assert_eq!(
            config.nats_credentials,
            Some(("worker".to_string(), "pw".to_string()))
        );
        assert_eq!(config.planner.depot_address, "Magazynowa 1, Siedlce");
        assert_eq!(config.planner.manual_warm_up_hours, 0.25);
        assert_eq!(config.providers.geocode_cb_recovery, Duration::from_secs(60));

        let blob = config.blob.unwrap();
        assert_eq!(blob.token, "tok");
        assert_eq!(blob.base_url, "https://blob.vercel-storage.com");
    }

    #[test]
    fn test_config_blank_values_are_unset() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("ORS_API_KEY", "  "),
            ("BLOB_READ_WRITE_TOKEN", ""),
        ])
        .unwrap();
        assert_eq!(config.providers.backend, ProviderBackend::Mock);
        assert!(config.blob.is_none());
    }
}
