//! OpenRouteService geocoding client
//!
//! Wraps `GET /geocode/search` (Pelias). The search is biased towards the
//! service region; hits that land outside it are retried once with the
//! region's locality appended to the query.

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::defaults;
use crate::services::provider::{ensure_success, OpenRouteConfig, ProviderError};
use crate::types::Coordinates;

const PROVIDER: &str = "openroute-geocode";

/// Area deliveries are expected in.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeRegion {
    /// ISO 3166 alpha-3 country the search is restricted to
    pub country: String,
    pub focus: Coordinates,
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    /// Appended to the query when the first hit falls outside the box
    pub locality: String,
}

impl Default for GeocodeRegion {
    fn default() -> Self {
        Self {
            country: defaults::REGION_COUNTRY.to_string(),
            focus: Coordinates::new(defaults::REGION_FOCUS_LAT, defaults::REGION_FOCUS_LON),
            lon_min: defaults::REGION_LON_MIN,
            lon_max: defaults::REGION_LON_MAX,
            lat_min: defaults::REGION_LAT_MIN,
            lat_max: defaults::REGION_LAT_MAX,
            locality: defaults::REGION_LOCALITY.to_string(),
        }
    }
}

impl GeocodeRegion {
    pub fn contains(&self, c: &Coordinates) -> bool {
        (self.lon_min..=self.lon_max).contains(&c.lng)
            && (self.lat_min..=self.lat_max).contains(&c.lat)
    }
}

/// Pelias search response
#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Option<FeatureProperties>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    /// `[lon, lat]`
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureProperties {
    pub label: Option<String>,
    pub confidence: Option<f64>,
}

/// First usable search hit
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub coordinates: Coordinates,
    pub label: Option<String>,
    pub confidence: Option<f64>,
}

impl FeatureCollection {
    pub fn first_hit(&self) -> Result<Option<GeocodeHit>, ProviderError> {
        let Some(feature) = self.features.first() else {
            return Ok(None);
        };
        let coordinates = Coordinates::from_lon_lat(&feature.geometry.coordinates)
            .filter(Coordinates::is_well_formed)
            .ok_or_else(|| {
                ProviderError::invalid(
                    PROVIDER,
                    format!("malformed coordinates {:?}", feature.geometry.coordinates),
                )
            })?;
        let properties = feature.properties.as_ref();

        Ok(Some(GeocodeHit {
            coordinates,
            label: properties.and_then(|p| p.label.clone()),
            confidence: properties.and_then(|p| p.confidence),
        }))
    }
}

/// OpenRouteService geocoding client
pub struct OpenRouteGeocodeClient {
    client: Client,
    config: OpenRouteConfig,
    region: GeocodeRegion,
}

impl OpenRouteGeocodeClient {
    pub fn new(config: OpenRouteConfig, region: GeocodeRegion) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
            region,
        })
    }

    #[cfg(test)]
    pub fn region(&self) -> &GeocodeRegion {
        &self.region
    }

    fn search_url(&self, text: &str) -> String {
        format!(
            "{}?api_key={}&text={}&boundary.country={}&focus.point.lon={}&focus.point.lat={}&size=1",
            self.config.endpoint("geocode/search"),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(text),
            self.region.country,
            self.region.focus.lng,
            self.region.focus.lat,
        )
    }

    async fn search(&self, text: &str) -> Result<Option<GeocodeHit>, ProviderError> {
        let response = self
            .client
            .get(self.search_url(text))
            .send()
            .await
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        let collection: FeatureCollection = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(PROVIDER, e.to_string()))?;

        collection.first_hit()
    }

    /// Geocode a free-text address. `Ok(None)` when nothing was found.
    pub async fn geocode(&self, address: &str) -> Result<Option<GeocodeHit>, ProviderError> {
        let Some(hit) = self.search(address).await? else {
            debug!("No geocoding result for '{}'", address);
            return Ok(None);
        };

        let Some(query) = retry_query(&self.region, address, &hit) else {
            return Ok(Some(hit));
        };

        warn!(
            "'{}' resolved outside the service region ({}, {}), retrying as '{}'",
            address, hit.coordinates.lng, hit.coordinates.lat, query
        );
        let retry = self.search(&query).await?;
        Ok(Some(pick_hit(hit, retry)))
    }
}

/// Second query for a hit outside the region, `None` when the hit is usable.
fn retry_query(region: &GeocodeRegion, address: &str, hit: &GeocodeHit) -> Option<String> {
    if region.contains(&hit.coordinates) {
        None
    } else {
        Some(format!("{}, {}", address.trim(), region.locality))
    }
}

/// The retry wins when it found anything; otherwise the first hit stands.
fn pick_hit(first: GeocodeHit, retry: Option<GeocodeHit>) -> GeocodeHit {
    retry.unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_feature() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [22.2902, 52.1676] },
                    "properties": { "label": "Starowiejska 10, Siedlce, MA, Poland", "confidence": 1 }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [21.0, 52.0] }
                }
            ]
        }"#;
        let collection: FeatureCollection = serde_json::from_str(json).unwrap();
        let hit = collection.first_hit().unwrap().unwrap();

        assert_eq!(hit.coordinates, Coordinates::new(52.1676, 22.2902));
        assert_eq!(hit.label.as_deref(), Some("Starowiejska 10, Siedlce, MA, Poland"));
        assert_eq!(hit.confidence, Some(1.0));
    }

    #[test]
    fn zero_features_is_not_found() {
        let collection: FeatureCollection =
            serde_json::from_str(r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        assert!(collection.first_hit().unwrap().is_none());

        let missing: FeatureCollection = serde_json::from_str(r#"{}"#).unwrap();
        assert!(missing.first_hit().unwrap().is_none());
    }

    #[test]
    fn malformed_coordinates_are_an_error() {
        let json = r#"{"features":[{"geometry":{"coordinates":[22.29]}}]}"#;
        let collection: FeatureCollection = serde_json::from_str(json).unwrap();
        assert!(collection.first_hit().is_err());
    }

    #[test]
    fn default_region_covers_siedlce_only() {
        let region = GeocodeRegion::default();
        assert!(region.contains(&Coordinates::new(52.1676, 22.2902)));
        // Kraków
        assert!(!region.contains(&Coordinates::new(50.0647, 19.945)));
    }

    #[test]
    fn search_url_encodes_text_and_bias() {
        let client = OpenRouteGeocodeClient::new(
            OpenRouteConfig::new("https://ors.example", "k3y"),
            GeocodeRegion::default(),
        )
        .unwrap();
        let url = client.search_url("Piłsudskiego 1, Siedlce");

        assert!(url.starts_with("https://ors.example/geocode/search?api_key=k3y&text="));
        assert!(url.contains("Pi%C5%82sudskiego%201%2C%20Siedlce"));
        assert!(url.contains("boundary.country=POL"));
        assert!(url.contains("focus.point.lon=22.3"));
        assert!(url.contains("size=1"));
    }

    // Note: requires network access and an ORS_API_KEY
    #[tokio::test]
    #[ignore]
    async fn test_geocode_depot() {
        let key = std::env::var("ORS_API_KEY").unwrap();
        let client = OpenRouteGeocodeClient::new(
            OpenRouteConfig::with_api_key(key),
            GeocodeRegion::default(),
        )
        .unwrap();

        let hit = client.geocode(defaults::DEFAULT_DEPOT_ADDRESS).await.unwrap().unwrap();
        assert!(client.region().contains(&hit.coordinates));
    }

    fn hit(lng: f64, lat: f64) -> GeocodeHit {
        GeocodeHit {
            coordinates: Coordinates::new(lat, lng),
            label: None,
            confidence: Some(0.9),
        }
    }

    #[test]
    fn hit_inside_region_is_kept_without_retry() {
        let region = GeocodeRegion::default();
        assert_eq!(retry_query(&region, "Bema 2", &hit(22.29, 52.17)), None);
    }

    #[test]
    fn hit_outside_region_is_retried_with_locality() {
        let region = GeocodeRegion::default();
        assert_eq!(
            retry_query(&region, " Bema 2 ", &hit(19.94, 50.06)).as_deref(),
            Some("Bema 2, Siedlce")
        );
    }

    #[test]
    fn retry_hit_wins() {
        let first = hit(19.94, 50.06);
        let retry = hit(22.29, 52.17);
        assert_eq!(pick_hit(first, Some(retry.clone())), retry);
    }

    #[test]
    fn empty_retry_keeps_first_hit() {
        let first = hit(19.94, 50.06);
        assert_eq!(pick_hit(first.clone(), None), first);
    }
}
