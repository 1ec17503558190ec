//! Geocoding abstraction layer with safety features
//!
//! - `MockGeocoder` for tests and development (deterministic, no network)
//! - `RateLimitedOpenRouteGeocoder` for production (rate limit + circuit breaker)
//!
//! The backend is picked by `PROVIDER_BACKEND`, see [`create_geocoder`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::{ProviderBackend, ProviderSettings};
use crate::defaults;
use crate::services::openroute::{GeocodeRegion, OpenRouteGeocodeClient};
use crate::services::provider::ProviderError;
use crate::types::Coordinates;

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode a free-text address.
    /// Returns None if the address cannot be found.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, ProviderError>;

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

/// Result of geocoding operation
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodingResult {
    pub coordinates: Coordinates,
    /// Confidence score 0.0-1.0
    pub confidence: f64,
    /// Display name returned by geocoder
    pub display_name: String,
}

// ==========================================================================
// MockGeocoder Implementation
// ==========================================================================

/// Mock geocoder - returns deterministic fake coordinates around the depot
#[derive(Default)]
pub struct MockGeocoder {
    unresolvable: HashSet<String>,
    failing: HashSet<String>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses that will come back as not found
    #[cfg(test)]
    pub fn with_unresolvable<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unresolvable.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Addresses whose lookup fails with a provider error
    #[cfg(test)]
    pub fn with_failing<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Generate deterministic coordinates from the address hash.
    /// Points stay well inside the service region.
    pub fn hash_to_coordinates(address: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        address.trim().to_lowercase().hash(&mut hasher);
        let hash = hasher.finish();

        // Inner box around Siedlce
        const LAT_MIN: f64 = 52.05;
        const LAT_MAX: f64 = 52.30;
        const LNG_MIN: f64 = 22.05;
        const LNG_MAX: f64 = 22.55;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            lng: LNG_MIN + lng_normalized * (LNG_MAX - LNG_MIN),
        }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, ProviderError> {
        let key = address.trim();
        if self.failing.contains(key) {
            return Err(ProviderError::invalid("mock", format!("lookup of '{}' failed", key)));
        }
        if key.is_empty() || self.unresolvable.contains(key) {
            return Ok(None);
        }

        Ok(Some(GeocodingResult {
            coordinates: Self::hash_to_coordinates(key),
            confidence: 0.95,
            display_name: format!("{}, Poland", key),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// RateLimiter Implementation
// ==========================================================================

/// Rate limiter that enforces minimum interval between calls
pub struct RateLimiter {
    last_call: tokio::sync::Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: tokio::sync::Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        // Holding the lock across the sleep queues concurrent callers.
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// CircuitBreaker Implementation
// ==========================================================================

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker to prevent hammering a failing service
pub struct CircuitBreaker {
    state: parking_lot::Mutex<BreakerState>,
    threshold: u32,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            state: parking_lot::Mutex::new(BreakerState::default()),
            threshold: threshold.max(1),
            recovery_time,
        }
    }

    /// Check if circuit is open (blocking calls)
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        if state.failures < self.threshold {
            return false;
        }
        // Half-open once the recovery time has passed
        !matches!(state.last_failure, Some(at) if at.elapsed() >= self.recovery_time)
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Some(Instant::now());
    }

    /// Record a success (resets failure count)
    pub fn record_success(&self) {
        *self.state.lock() = BreakerState::default();
    }
}

// ==========================================================================
// RateLimitedOpenRouteGeocoder Implementation
// ==========================================================================

/// OpenRouteService geocoder with rate limiting and circuit breaker protection
pub struct RateLimitedOpenRouteGeocoder {
    client: OpenRouteGeocodeClient,
    rate_limiter: RateLimiter,
    pub(crate) circuit_breaker: CircuitBreaker,
}

impl RateLimitedOpenRouteGeocoder {
    pub fn new(client: OpenRouteGeocodeClient, settings: &ProviderSettings) -> Self {
        Self {
            client,
            rate_limiter: RateLimiter::new(settings.geocode_rate_limit),
            circuit_breaker: CircuitBreaker::new(
                settings.geocode_cb_threshold,
                settings.geocode_cb_recovery,
            ),
        }
    }
}

#[async_trait]
impl Geocoder for RateLimitedOpenRouteGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, ProviderError> {
        if self.circuit_breaker.is_open() {
            warn!("Circuit breaker is open, rejecting geocoding request");
            return Err(ProviderError::CircuitOpen { provider: self.name() });
        }

        self.rate_limiter.wait().await;

        match self.client.geocode(address).await {
            Ok(hit) => {
                // Not found is not a failure
                self.circuit_breaker.record_success();
                Ok(hit.map(|hit| GeocodingResult {
                    coordinates: hit.coordinates,
                    confidence: hit.confidence.unwrap_or(0.8),
                    display_name: hit.label.unwrap_or_else(|| address.to_string()),
                }))
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                error!("Geocoding '{}' failed: {}", address, e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "openroute"
    }
}

// ==========================================================================
// Factory function
// ==========================================================================

/// Create the geocoder selected by the provider backend
pub fn create_geocoder(settings: &ProviderSettings) -> Result<Arc<dyn Geocoder>> {
    match settings.backend {
        ProviderBackend::Mock => {
            info!("Using MockGeocoder");
            Ok(Arc::new(MockGeocoder::new()))
        }
        ProviderBackend::OpenRoute => {
            info!(
                "Using RateLimitedOpenRouteGeocoder ({}ms interval)",
                settings.geocode_rate_limit.as_millis()
            );
            let client = OpenRouteGeocodeClient::new(settings.openroute.clone(), GeocodeRegion::default())?;
            Ok(Arc::new(RateLimitedOpenRouteGeocoder::new(client, settings)))
        }
    }
}

/// Geocode the depot, `None` when it cannot be found.
pub async fn geocode_depot(
    geocoder: &dyn Geocoder,
    address: &str,
) -> Result<Option<Coordinates>, ProviderError> {
    let address = if address.trim().is_empty() {
        defaults::DEFAULT_DEPOT_ADDRESS
    } else {
        address
    };
    Ok(geocoder.geocode(address).await?.map(|r| r.coordinates))
}
