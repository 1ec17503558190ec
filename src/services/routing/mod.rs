//! Routing service for distance/time matrix calculations
//!
//! Uses OpenRouteService in production, haversine estimates for tests and development.

mod openroute;

pub use openroute::OpenRouteMatrixClient;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::{ProviderBackend, ProviderSettings};
use crate::services::geo::{road_distance_km, travel_time_seconds, AVERAGE_SPEED_KMH, ROAD_COEFFICIENT};
use crate::services::provider::ProviderError;
use crate::services::schedule::Leg;
use crate::types::Coordinates;

/// Distance and time matrices between locations.
///
/// A `None` cell means the provider could not route that pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTimeMatrices {
    /// Distance in meters [i][j] from location i to location j
    pub distances: Vec<Vec<Option<f64>>>,
    /// Duration in seconds [i][j] from location i to location j
    pub durations: Vec<Vec<Option<f64>>>,
    /// Number of locations
    pub size: usize,
}

impl DistanceTimeMatrices {
    /// Create empty matrices
    pub fn empty() -> Self {
        Self {
            distances: vec![],
            durations: vec![],
            size: 0,
        }
    }

    fn cell(matrix: &[Vec<Option<f64>>], from: usize, to: usize) -> Option<f64> {
        matrix
            .get(from)?
            .get(to)
            .copied()
            .flatten()
            .filter(|v| v.is_finite() && *v >= 0.0)
    }

    /// Distance from location i to location j in meters
    pub fn distance(&self, from: usize, to: usize) -> Option<f64> {
        Self::cell(&self.distances, from, to)
    }

    /// Duration from location i to location j in seconds
    pub fn duration(&self, from: usize, to: usize) -> Option<f64> {
        Self::cell(&self.durations, from, to)
    }

    /// Travel leg between two locations. Unknown without a duration.
    pub fn leg(&self, from: usize, to: usize) -> Option<Leg> {
        Some(Leg {
            duration_seconds: self.duration(from, to)?,
            distance_meters: self.distance(from, to),
        })
    }

    /// Rows and columns both match `size`.
    pub fn is_square(&self) -> bool {
        let square = |m: &Vec<Vec<Option<f64>>>| m.len() == self.size && m.iter().all(|row| row.len() == self.size);
        square(&self.distances) && square(&self.durations)
    }
}

/// Routing service trait (OpenRouteService, mock)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Get distance and time matrices for a list of locations
    async fn get_matrices(&self, locations: &[Coordinates]) -> Result<DistanceTimeMatrices, ProviderError>;

    /// Get service name for logging
    fn name(&self) -> &'static str;
}

/// Mock routing service
/// Uses Haversine distance × coefficient for estimation
pub struct MockRoutingService {
    road_coefficient: f64,
    average_speed_kmh: f64,
}

impl Default for MockRoutingService {
    fn default() -> Self {
        Self {
            road_coefficient: ROAD_COEFFICIENT,
            average_speed_kmh: AVERAGE_SPEED_KMH,
        }
    }
}

impl MockRoutingService {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn get_matrices(&self, locations: &[Coordinates]) -> Result<DistanceTimeMatrices, ProviderError> {
        let n = locations.len();
        if n == 0 {
            return Ok(DistanceTimeMatrices::empty());
        }

        let mut distances = vec![vec![Some(0.0); n]; n];
        let mut durations = vec![vec![Some(0.0); n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let road_km = road_distance_km(&locations[i], &locations[j], self.road_coefficient);
                    distances[i][j] = Some(road_km * 1000.0);
                    durations[i][j] = Some(travel_time_seconds(road_km, self.average_speed_kmh));
                }
            }
        }

        Ok(DistanceTimeMatrices {
            distances,
            durations,
            size: n,
        })
    }

    fn name(&self) -> &'static str {
        "MockRouting"
    }
}

/// Create routing service for the configured backend
pub fn create_routing_service(settings: &ProviderSettings) -> Result<Arc<dyn RoutingService>> {
    match settings.backend {
        ProviderBackend::Mock => {
            info!("Using mock routing service");
            Ok(Arc::new(MockRoutingService::new()))
        }
        ProviderBackend::OpenRoute => {
            info!("Using OpenRouteService matrix at {}", settings.openroute.base_url);
            Ok(Arc::new(OpenRouteMatrixClient::new(settings.openroute.clone())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siedlce() -> Coordinates {
        Coordinates { lat: 52.1676, lng: 22.2902 }
    }

    fn mordy() -> Coordinates {
        Coordinates { lat: 52.2113, lng: 22.5222 }
    }

    fn skorzec() -> Coordinates {
        Coordinates { lat: 52.0833, lng: 22.1667 }
    }

    #[tokio::test]
    async fn test_mock_routing_empty_locations() {
        let matrices = MockRoutingService::new().get_matrices(&[]).await.unwrap();
        assert_eq!(matrices, DistanceTimeMatrices::empty());
    }

    #[tokio::test]
    async fn test_mock_routing_single_location() {
        let matrices = MockRoutingService::new().get_matrices(&[siedlce()]).await.unwrap();

        assert_eq!(matrices.size, 1);
        assert_eq!(matrices.distance(0, 0), Some(0.0));
        assert_eq!(matrices.duration(0, 0), Some(0.0));
    }

    #[tokio::test]
    async fn test_mock_routing_is_symmetric_with_zero_diagonal() {
        let service = MockRoutingService::new();
        let matrices = service.get_matrices(&[siedlce(), mordy(), skorzec()]).await.unwrap();

        assert!(matrices.is_square());
        for i in 0..3 {
            assert_eq!(matrices.duration(i, i), Some(0.0));
            for j in 0..3 {
                assert_eq!(matrices.duration(i, j), matrices.duration(j, i));
                if i != j {
                    assert!(matrices.distance(i, j).unwrap() > 0.0);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_mock_routing_travel_time_reasonable() {
        let matrices = MockRoutingService::new()
            .get_matrices(&[siedlce(), mordy()])
            .await
            .unwrap();

        // ~17 km straight line, ~22 km by road at 40 km/h is about half an hour
        let km = matrices.distance(0, 1).unwrap() / 1000.0;
        let minutes = matrices.duration(0, 1).unwrap() / 60.0;
        assert!(km > 18.0 && km < 26.0, "got {} km", km);
        assert!(minutes > 25.0 && minutes < 40.0, "got {} min", minutes);
    }

    #[tokio::test]
    async fn test_mock_routing_custom_params() {
        let slow = MockRoutingService::with_params(1.3, 20.0)
            .get_matrices(&[siedlce(), mordy()])
            .await
            .unwrap();
        let fast = MockRoutingService::new()
            .get_matrices(&[siedlce(), mordy()])
            .await
            .unwrap();

        let ratio = slow.duration(0, 1).unwrap() / fast.duration(0, 1).unwrap();
        assert!((ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cells_outside_or_unusable_are_none() {
        let matrices = DistanceTimeMatrices {
            distances: vec![vec![Some(0.0), None], vec![Some(f64::NAN), Some(0.0)]],
            durations: vec![vec![Some(0.0), Some(-5.0)], vec![Some(120.0), Some(0.0)]],
            size: 2,
        };

        assert_eq!(matrices.duration(0, 1), None);
        assert_eq!(matrices.distance(1, 0), None);
        assert_eq!(matrices.duration(5, 0), None);
        assert_eq!(matrices.leg(0, 1), None);
        assert_eq!(
            matrices.leg(1, 0),
            Some(Leg { duration_seconds: 120.0, distance_meters: None })
        );
    }

    #[test]
    fn test_routing_service_name() {
        assert_eq!(MockRoutingService::new().name(), "MockRouting");
    }
}
