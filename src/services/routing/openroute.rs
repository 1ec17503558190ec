//! OpenRouteService matrix client
//!
//! API documentation:
//! https://openrouteservice.org/dev/#/api-docs/v2/matrix/{profile}/post

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DistanceTimeMatrices, RoutingService};
use crate::services::provider::{ensure_success, OpenRouteConfig, ProviderError};
use crate::types::Coordinates;

const PROVIDER: &str = "openroute-matrix";

#[derive(Debug, Serialize)]
struct MatrixRequest {
    locations: Vec<[f64; 2]>,
    metrics: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatrixResponse {
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl MatrixResponse {
    /// Validate dimensions against the number of requested locations.
    pub(crate) fn into_matrices(self, size: usize) -> Result<DistanceTimeMatrices, ProviderError> {
        let durations = self
            .durations
            .ok_or_else(|| ProviderError::invalid(PROVIDER, "response has no durations"))?;
        // Distances are optional in practice; a missing table means unknown distances.
        let distances = self
            .distances
            .unwrap_or_else(|| vec![vec![None; size]; size]);

        let matrices = DistanceTimeMatrices {
            distances,
            durations,
            size,
        };
        if !matrices.is_square() {
            return Err(ProviderError::invalid(
                PROVIDER,
                format!("expected a {size}x{size} matrix"),
            ));
        }
        Ok(matrices)
    }
}

/// OpenRouteService driving-car matrix client
pub struct OpenRouteMatrixClient {
    client: Client,
    config: OpenRouteConfig,
}

impl OpenRouteMatrixClient {
    pub fn new(config: OpenRouteConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl RoutingService for OpenRouteMatrixClient {
    async fn get_matrices(&self, locations: &[Coordinates]) -> Result<DistanceTimeMatrices, ProviderError> {
        match locations.len() {
            0 => return Ok(DistanceTimeMatrices::empty()),
            1 => {
                return Ok(DistanceTimeMatrices {
                    distances: vec![vec![Some(0.0)]],
                    durations: vec![vec![Some(0.0)]],
                    size: 1,
                })
            }
            _ => {}
        }

        let request = MatrixRequest {
            locations: locations.iter().map(|c| c.to_lon_lat()).collect(),
            metrics: ["duration", "distance"],
        };
        debug!("Requesting {}x{} matrix", locations.len(), locations.len());

        let response = self
            .client
            .post(self.config.endpoint("v2/matrix/driving-car"))
            .header("Authorization", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        let body: MatrixResponse = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(PROVIDER, e.to_string()))?;

        body.into_matrices(locations.len())
    }

    fn name(&self) -> &'static str {
        "OpenRouteService"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_matrix_with_null_cells() {
        let json = r#"{
            "durations": [[0.0, 812.4, null], [805.1, 0.0, 300.0], [null, 310.2, 0.0]],
            "distances": [[0.0, 9120.5, null], [9050.0, 0.0, 2500.0], [null, 2600.0, 0.0]],
            "metadata": { "service": "matrix" }
        }"#;
        let response: MatrixResponse = serde_json::from_str(json).unwrap();
        let matrices = response.into_matrices(3).unwrap();

        assert_eq!(matrices.duration(0, 1), Some(812.4));
        assert_eq!(matrices.distance(1, 2), Some(2500.0));
        assert_eq!(matrices.duration(0, 2), None);
        assert!(matrices.leg(2, 0).is_none());
    }

    #[test]
    fn missing_distances_leave_durations_usable() {
        let json = r#"{"durations": [[0, 60], [60, 0]]}"#;
        let response: MatrixResponse = serde_json::from_str(json).unwrap();
        let matrices = response.into_matrices(2).unwrap();

        let leg = matrices.leg(0, 1).unwrap();
        assert_eq!(leg.duration_seconds, 60.0);
        assert_eq!(leg.distance_meters, None);
    }

    #[test]
    fn wrong_dimensions_are_rejected() {
        let json = r#"{"durations": [[0, 60], [60, 0]], "distances": [[0, 1], [1, 0]]}"#;
        let response: MatrixResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_matrices(3).is_err());

        let no_durations: MatrixResponse = serde_json::from_str(r#"{"distances": [[0]]}"#).unwrap();
        assert!(no_durations.into_matrices(1).is_err());
    }

    #[test]
    fn request_uses_lon_lat_order() {
        let request = MatrixRequest {
            locations: vec![Coordinates::new(52.1676, 22.2902).to_lon_lat()],
            metrics: ["duration", "distance"],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["locations"][0][0], 22.2902);
        assert_eq!(json["metrics"][1], "distance");
    }

    #[tokio::test]
    async fn trivial_sizes_skip_the_network() {
        // Unroutable base URL: any request would fail.
        let client = OpenRouteMatrixClient::new(OpenRouteConfig::new("http://127.0.0.1:9", "key")).unwrap();

        assert_eq!(client.get_matrices(&[]).await.unwrap().size, 0);
        let single = client.get_matrices(&[Coordinates::new(52.1, 22.2)]).await.unwrap();
        assert_eq!(single.duration(0, 0), Some(0.0));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let client = OpenRouteMatrixClient::new(OpenRouteConfig::new("http://127.0.0.1:9", "key")).unwrap();
        let err = client
            .get_matrices(&[Coordinates::new(52.1, 22.2), Coordinates::new(52.2, 22.3)])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));
    }
}
