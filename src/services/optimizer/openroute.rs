//! OpenRouteService optimization client (VROOM)
//!
//! API documentation:
//! https://openrouteservice.org/dev/#/api-docs/optimization/post

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{OptimizationJob, OptimizedRoute, RouteOptimizer, RouteStep, JOB_SERVICE_SECONDS};
use crate::services::provider::{ensure_success, OpenRouteConfig, ProviderError};
use crate::types::Coordinates;

const PROVIDER: &str = "openroute-optimization";
const PROFILE: &str = "driving-car";

#[derive(Debug, Serialize)]
struct OptimizationRequest {
    jobs: Vec<Job>,
    vehicles: Vec<Vehicle>,
}

#[derive(Debug, Serialize)]
struct Job {
    id: i64,
    service: u32,
    location: [f64; 2],
}

#[derive(Debug, Serialize)]
struct Vehicle {
    id: i64,
    profile: &'static str,
    start: [f64; 2],
    end: [f64; 2],
}

impl OptimizationRequest {
    fn new(depot: Coordinates, jobs: &[OptimizationJob]) -> Self {
        Self {
            jobs: jobs
                .iter()
                .map(|j| Job {
                    id: j.id,
                    service: JOB_SERVICE_SECONDS,
                    location: j.location.to_lon_lat(),
                })
                .collect(),
            vehicles: vec![Vehicle {
                id: 1,
                profile: PROFILE,
                start: depot.to_lon_lat(),
                end: depot.to_lon_lat(),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OptimizationResponse {
    #[serde(default)]
    routes: Vec<ResponseRoute>,
    #[serde(default)]
    unassigned: Vec<Unassigned>,
}

#[derive(Debug, Deserialize)]
struct ResponseRoute {
    #[serde(default)]
    steps: Vec<RouteStep>,
}

#[derive(Debug, Deserialize)]
struct Unassigned {
    id: i64,
}

impl OptimizationResponse {
    /// First route, `None` when the optimizer found no solution.
    pub(crate) fn into_route(self) -> Option<OptimizedRoute> {
        let unassigned: Vec<i64> = self.unassigned.iter().map(|u| u.id).collect();
        let route = self.routes.into_iter().next()?;
        Some(OptimizedRoute {
            steps: route.steps,
            unassigned,
        })
    }
}

/// OpenRouteService optimization client
pub struct OpenRouteOptimizer {
    client: Client,
    config: OpenRouteConfig,
}

impl OpenRouteOptimizer {
    pub fn new(config: OpenRouteConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl RouteOptimizer for OpenRouteOptimizer {
    async fn optimize(
        &self,
        depot: Coordinates,
        jobs: &[OptimizationJob],
    ) -> Result<Option<OptimizedRoute>, ProviderError> {
        if jobs.is_empty() {
            return Ok(None);
        }

        debug!("Optimizing {} jobs", jobs.len());
        let response = self
            .client
            .post(self.config.endpoint("optimization"))
            .header("Authorization", &self.config.api_key)
            .json(&OptimizationRequest::new(depot, jobs))
            .send()
            .await
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        let body: OptimizationResponse = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(PROVIDER, e.to_string()))?;

        let route = body.into_route();
        if route.is_none() {
            warn!("Optimizer returned no route for {} jobs", jobs.len());
        }
        Ok(route)
    }

    fn name(&self) -> &'static str {
        "OpenRouteService"
    }
}
