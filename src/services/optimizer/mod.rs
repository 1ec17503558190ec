//! Single-vehicle visiting order optimization
//!
//! Uses the OpenRouteService optimization endpoint in production and a
//! nearest neighbour heuristic for tests and development.

mod openroute;

pub use openroute::OpenRouteOptimizer;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::{ProviderBackend, ProviderSettings};
use crate::services::geo::{haversine_distance, road_distance_km, travel_time_seconds, AVERAGE_SPEED_KMH, ROAD_COEFFICIENT};
use crate::services::provider::ProviderError;
use crate::types::Coordinates;

/// Seconds the optimizer assumes per job
pub const JOB_SERVICE_SECONDS: u32 = 300;

/// A location to visit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationJob {
    pub id: i64,
    pub location: Coordinates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Start,
    Job,
    End,
    #[serde(other)]
    Other,
}

/// One step of the optimized route
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RouteStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Job id, present on job steps
    #[serde(default)]
    pub id: Option<i64>,
    /// Seconds since the vehicle left
    #[serde(default)]
    pub arrival: f64,
    /// Cumulated travel seconds
    #[serde(default)]
    pub duration: f64,
    /// Cumulated meters
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Route returned by an optimizer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptimizedRoute {
    pub steps: Vec<RouteStep>,
    /// Jobs the optimizer declined to route
    pub unassigned: Vec<i64>,
}

impl OptimizedRoute {
    /// Job ids in visiting order
    pub fn job_sequence(&self) -> Vec<i64> {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Job)
            .filter_map(|s| s.id)
            .collect()
    }
}

/// Visiting order optimizer trait
#[async_trait]
pub trait RouteOptimizer: Send + Sync {
    /// Order `jobs` for one vehicle leaving and returning to `depot`.
    /// `Ok(None)` when the optimizer produced no route.
    async fn optimize(
        &self,
        depot: Coordinates,
        jobs: &[OptimizationJob],
    ) -> Result<Option<OptimizedRoute>, ProviderError>;

    fn name(&self) -> &'static str;
}

/// Greedy nearest neighbour from the depot. Ties go to the lower id.
#[derive(Debug, Default)]
pub struct NearestNeighbourOptimizer;

impl NearestNeighbourOptimizer {
    pub fn new() -> Self {
        Self
    }

    fn order(depot: Coordinates, jobs: &[OptimizationJob]) -> Vec<OptimizationJob> {
        let mut remaining: Vec<OptimizationJob> = jobs.to_vec();
        remaining.sort_by_key(|j| j.id);

        let mut ordered = Vec::with_capacity(remaining.len());
        let mut current = depot;

        while !remaining.is_empty() {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (i, job) in remaining.iter().enumerate() {
                let d = haversine_distance(&current, &job.location);
                // Strict comparison keeps the lower id on ties
                if d < best_distance {
                    best = i;
                    best_distance = d;
                }
            }
            let next = remaining.remove(best);
            current = next.location;
            ordered.push(next);
        }

        ordered
    }
}

#[async_trait]
impl RouteOptimizer for NearestNeighbourOptimizer {
    async fn optimize(
        &self,
        depot: Coordinates,
        jobs: &[OptimizationJob],
    ) -> Result<Option<OptimizedRoute>, ProviderError> {
        if jobs.is_empty() {
            return Ok(None);
        }

        let ordered = Self::order(depot, jobs);

        let mut steps = vec![RouteStep {
            kind: StepKind::Start,
            id: None,
            arrival: 0.0,
            duration: 0.0,
            distance: Some(0.0),
        }];
        let mut position = depot;
        let mut clock = 0.0;
        let mut travel = 0.0;
        let mut meters = 0.0;

        let stops = ordered.iter().map(|j| (Some(j.id), j.location));
        for (id, location) in stops.chain(std::iter::once((None, depot))) {
            let road_km = road_distance_km(&position, &location, ROAD_COEFFICIENT);
            let seconds = travel_time_seconds(road_km, AVERAGE_SPEED_KMH);
            clock += seconds;
            travel += seconds;
            meters += road_km * 1000.0;

            steps.push(RouteStep {
                kind: if id.is_some() { StepKind::Job } else { StepKind::End },
                id,
                arrival: clock,
                duration: travel,
                distance: Some(meters),
            });

            if id.is_some() {
                clock += f64::from(JOB_SERVICE_SECONDS);
            }
            position = location;
        }

        Ok(Some(OptimizedRoute {
            steps,
            unassigned: vec![],
        }))
    }

    fn name(&self) -> &'static str {
        "NearestNeighbour"
    }
}

/// Create optimizer for the configured backend
pub fn create_optimizer(settings: &ProviderSettings) -> Result<Arc<dyn RouteOptimizer>> {
    match settings.backend {
        ProviderBackend::Mock => {
            info!("Using nearest neighbour optimizer");
            Ok(Arc::new(NearestNeighbourOptimizer::new()))
        }
        ProviderBackend::OpenRoute => {
            info!("Using OpenRouteService optimization");
            Ok(Arc::new(OpenRouteOptimizer::new(settings.openroute.clone())?))
        }
    }
}
