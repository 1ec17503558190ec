//! Route planning pipeline
//!
//! geocode → optimize-or-fallback → matrix → schedule walk → persist → respond.
//!
//! Every external call happens before the first write. A provider failure
//! therefore aborts the run with the stored windows untouched; only per-address
//! geocoding failures are tolerated.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PlannerSettings;
use crate::services::collation::by_address;
use crate::services::geocoding::{geocode_depot, Geocoder};
use crate::services::optimizer::{OptimizationJob, RouteOptimizer};
use crate::services::provider::ProviderError;
use crate::services::routing::RoutingService;
use crate::services::schedule::{compute_schedule, legs_from_matrix, ScheduleConfig, ScheduleResult, ScheduleStop};
use crate::services::time_window::TimeWindow;
use crate::types::{
    settings::validate_start_hour, Coordinates, Order, RoutePlanMode, RoutePlanRequest,
    RoutePlanResponse, ScheduledOrder, Settings,
};

/// Concurrent geocoding requests per run
const GEOCODE_CONCURRENCY: usize = 4;

/// Persistence the planner reads from and commits windows to.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders in id order
    async fn load_orders(&self) -> anyhow::Result<Vec<Order>>;

    async fn load_settings(&self) -> anyhow::Result<Settings>;

    /// Overwrite the committed window of one order. `false` when no such order is stored.
    async fn save_time_window(&self, order_id: i32, window: &str) -> anyhow::Result<bool>;
}

/// Why a planning run produced no schedule.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("there are no orders to plan")]
    NoOrders,

    #[error("{0}")]
    InvalidStartHour(String),

    #[error("invalid orders: {0}")]
    InvalidOrders(String),

    #[error("depot address '{0}' could not be geocoded")]
    DepotNotFound(String),

    #[error("none of the {0} order addresses could be resolved")]
    NoResolvableAddresses(usize),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("order store failed: {0:#}")]
    Store(anyhow::Error),
}

impl PlanError {
    /// Error code sent back to the panel
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::NoOrders => "NO_ORDERS",
            PlanError::InvalidStartHour(_) | PlanError::InvalidOrders(_) => "VALIDATION_ERROR",
            PlanError::DepotNotFound(_) => "DEPOT_NOT_FOUND",
            PlanError::NoResolvableAddresses(_) => "NO_RESOLVABLE_ADDRESSES",
            PlanError::Provider(_) => "PROVIDER_UNAVAILABLE",
            PlanError::Store(_) => "DATABASE_ERROR",
        }
    }
}

/// Coordinates a stop is planned with.
///
/// A fresh geocoding result wins when it is well formed; otherwise the
/// coordinates the caller already knew are kept, if they are usable.
pub fn merge_coordinates(fresh: Option<Coordinates>, original: Option<Coordinates>) -> Option<Coordinates> {
    fresh
        .filter(Coordinates::is_well_formed)
        .or_else(|| original.filter(Coordinates::is_well_formed))
}

/// Reject order sets that cannot be keyed by id, and stored windows that
/// cannot be read back.
pub fn validate_orders(orders: &[Order]) -> Result<(), PlanError> {
    let mut seen = HashSet::with_capacity(orders.len());
    for order in orders {
        if !seen.insert(order.id) {
            return Err(PlanError::InvalidOrders(format!(
                "order id {} appears more than once",
                order.id
            )));
        }
        if let Some(window) = &order.time_range {
            window
                .parse::<TimeWindow>()
                .map_err(|e| PlanError::InvalidOrders(format!("order {}: {}", order.id, e)))?;
        }
    }
    Ok(())
}

/// An order with the coordinates it is routed with
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedOrder {
    pub order: Order,
    pub coords: Coordinates,
}

/// Turn an optimizer job sequence back into orders.
///
/// Ids the optimizer made up (or repeated) are skipped. Orders it did not
/// route are appended in address order; `unassigned` lists the ones it
/// reported as such. Both cases produce a warning.
pub fn reconcile_visiting_order(
    job_sequence: &[i64],
    unassigned: &[i64],
    located: Vec<LocatedOrder>,
) -> (Vec<LocatedOrder>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut by_id: HashMap<i32, LocatedOrder> = located
        .into_iter()
        .map(|l| (l.order.id, l))
        .collect();

    let mut visiting = Vec::with_capacity(by_id.len());
    for &job_id in job_sequence {
        match i32::try_from(job_id).ok().and_then(|id| by_id.remove(&id)) {
            Some(stop) => visiting.push(stop),
            None => {
                warn!("Optimizer returned unknown job id {}, skipping", job_id);
                warnings.push(format!("Optimizer returned unknown job {}; skipped", job_id));
            }
        }
    }

    let mut unrouted: Vec<LocatedOrder> = by_id.into_values().collect();
    unrouted.sort_by(|a, b| by_address(&a.order, &b.order));
    for stop in unrouted {
        let reason = if unassigned.contains(&i64::from(stop.order.id)) {
            "left unassigned"
        } else {
            "not routed"
        };
        warn!("Order {} was {} by the optimizer", stop.order.id, reason);
        warnings.push(format!(
            "Order {} was {} by the optimizer; appended in address order",
            stop.order.id, reason
        ));
        visiting.push(stop);
    }

    (visiting, warnings)
}

/// Orchestrates one recompute of the committed windows.
pub struct RoutePlanner {
    geocoder: Arc<dyn Geocoder>,
    routing: Arc<dyn RoutingService>,
    optimizer: Arc<dyn RouteOptimizer>,
    depot_address: String,
    manual: ScheduleConfig,
    optimized: ScheduleConfig,
}

impl RoutePlanner {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        routing: Arc<dyn RoutingService>,
        optimizer: Arc<dyn RouteOptimizer>,
        settings: &PlannerSettings,
    ) -> Self {
        Self {
            geocoder,
            routing,
            optimizer,
            depot_address: settings.depot_address.clone(),
            manual: ScheduleConfig::new(settings.manual_warm_up_hours),
            optimized: ScheduleConfig::new(settings.route_warm_up_hours),
        }
    }

    /// Plan a request, loading orders and the start hour from the store when
    /// the caller did not supply them.
    pub async fn plan(
        &self,
        store: &dyn OrderStore,
        request: RoutePlanRequest,
    ) -> Result<RoutePlanResponse, PlanError> {
        let start_hour = match request.start_hour {
            Some(hour) => hour,
            None => store.load_settings().await.map_err(PlanError::Store)?.start_hour,
        };
        validate_start_hour(start_hour).map_err(PlanError::InvalidStartHour)?;

        let orders = match request.orders {
            Some(orders) => orders,
            None => store.load_orders().await.map_err(PlanError::Store)?,
        };

        info!(
            "Planning {} orders in {} mode from {:.2}h",
            orders.len(),
            request.mode.as_str(),
            start_hour
        );

        match request.mode {
            RoutePlanMode::Manual => self.build_schedule_manual(store, orders, start_hour).await,
            RoutePlanMode::Auto => self.build_schedule_optimized(store, orders, start_hour).await,
        }
    }

    /// Keep the supplied visiting order. The first stop is reached without travel.
    pub async fn build_schedule_manual(
        &self,
        store: &dyn OrderStore,
        orders: Vec<Order>,
        start_hour: f64,
    ) -> Result<RoutePlanResponse, PlanError> {
        if orders.is_empty() {
            return Err(PlanError::NoOrders);
        }
        validate_orders(&orders)?;

        let fresh = self.geocode_orders(&orders).await;
        let coords: Vec<Option<Coordinates>> = orders
            .iter()
            .zip(fresh)
            .map(|(order, fresh)| merge_coordinates(fresh, order.coords))
            .collect();

        let mut warnings = Vec::new();
        for (order, c) in orders.iter().zip(&coords) {
            if c.is_none() {
                warnings.push(unresolved_warning(order));
            }
        }

        // Matrix only over the stops that have a location
        let located: Vec<Coordinates> = coords.iter().flatten().copied().collect();
        let mut next = 0;
        let positions: Vec<Option<usize>> = coords
            .iter()
            .map(|c| {
                c.map(|_| {
                    next += 1;
                    next - 1
                })
            })
            .collect();

        let matrices = self.routing.get_matrices(&located).await?;
        let legs = legs_from_matrix(&matrices, None, &positions);

        let stops: Vec<ScheduleStop> = orders
            .iter()
            .zip(legs)
            .map(|(order, leg)| ScheduleStop {
                order_id: order.id,
                service_type: order.service_type,
                leg,
            })
            .collect();
        let schedule = compute_schedule(&stops, start_hour, &self.manual);

        let visiting: Vec<(Order, Option<Coordinates>)> = orders.into_iter().zip(coords).collect();
        let scheduled = commit(store, visiting, &schedule, &mut warnings).await?;

        Ok(RoutePlanResponse {
            mode: RoutePlanMode::Manual,
            orders: scheduled,
            warehouse_used: None,
            warnings,
            total_distance_km: schedule.total_distance_km,
            total_travel_minutes: schedule.total_travel_minutes,
        })
    }

    /// Depot-anchored route in the optimizer's visiting order.
    pub async fn build_schedule_optimized(
        &self,
        store: &dyn OrderStore,
        orders: Vec<Order>,
        start_hour: f64,
    ) -> Result<RoutePlanResponse, PlanError> {
        if orders.is_empty() {
            return Err(PlanError::NoOrders);
        }
        validate_orders(&orders)?;

        let depot = geocode_depot(self.geocoder.as_ref(), &self.depot_address)
            .await?
            .ok_or_else(|| PlanError::DepotNotFound(self.depot_address.clone()))?;

        let total = orders.len();
        let fresh = self.geocode_orders(&orders).await;

        let mut warnings = Vec::new();
        let mut located = Vec::new();
        let mut unresolved = Vec::new();
        for (order, fresh) in orders.into_iter().zip(fresh) {
            // Only a successful lookup puts an order on the route
            match fresh.and_then(|f| merge_coordinates(Some(f), order.coords)) {
                Some(coords) => located.push(LocatedOrder { order, coords }),
                None => {
                    warnings.push(unresolved_warning(&order));
                    unresolved.push(order);
                }
            }
        }
        if located.is_empty() {
            return Err(PlanError::NoResolvableAddresses(total));
        }

        let jobs: Vec<OptimizationJob> = located
            .iter()
            .map(|l| OptimizationJob {
                id: i64::from(l.order.id),
                location: l.coords,
            })
            .collect();

        let visiting = match self.optimizer.optimize(depot, &jobs).await? {
            Some(route) => {
                let (visiting, reconcile_warnings) =
                    reconcile_visiting_order(&route.job_sequence(), &route.unassigned, located);
                warnings.extend(reconcile_warnings);
                visiting
            }
            None => {
                warn!("{} found no route, falling back to address order", self.optimizer.name());
                warnings.push("Optimizer found no route; orders sorted by address".to_string());
                let mut located = located;
                located.sort_by(|a, b| by_address(&a.order, &b.order));
                located
            }
        };

        // Depot is index 0, stop i is index i + 1
        let locations: Vec<Coordinates> = std::iter::once(depot)
            .chain(visiting.iter().map(|l| l.coords))
            .collect();
        let matrices = self.routing.get_matrices(&locations).await?;
        let positions: Vec<Option<usize>> = (1..=visiting.len()).map(Some).collect();
        let legs = legs_from_matrix(&matrices, Some(0), &positions);

        let stops: Vec<ScheduleStop> = visiting
            .iter()
            .zip(legs)
            .map(|(l, leg)| ScheduleStop {
                order_id: l.order.id,
                service_type: l.order.service_type,
                leg,
            })
            .collect();
        let schedule = compute_schedule(&stops, start_hour, &self.optimized);

        let mut scheduled = commit(
            store,
            visiting.into_iter().map(|l| (l.order, Some(l.coords))).collect(),
            &schedule,
            &mut warnings,
        )
        .await?;

        // Unresolved orders come back exactly as they were sent
        scheduled.extend(unresolved.into_iter().map(|order| ScheduledOrder {
            order,
            travel_time: 0.0,
            distance_km: 0.0,
            travel_estimated: false,
            scheduled: false,
        }));

        Ok(RoutePlanResponse {
            mode: RoutePlanMode::Auto,
            orders: scheduled,
            warehouse_used: Some(self.depot_address.clone()),
            warnings,
            total_distance_km: schedule.total_distance_km,
            total_travel_minutes: schedule.total_travel_minutes,
        })
    }

    /// Fresh coordinates per order, `None` where the lookup failed.
    async fn geocode_orders(&self, orders: &[Order]) -> Vec<Option<Coordinates>> {
        let lookups: Vec<(i32, String)> = orders.iter().map(|o| (o.id, o.address.clone())).collect();
        let geocoder = Arc::clone(&self.geocoder);

        stream::iter(lookups)
            .map(move |(id, address)| {
                let geocoder = Arc::clone(&geocoder);
                async move { geocode_order(geocoder.as_ref(), id, &address).await }
            })
            .buffered(GEOCODE_CONCURRENCY)
            .collect()
            .await
    }
}

async fn geocode_order(geocoder: &dyn Geocoder, id: i32, address: &str) -> Option<Coordinates> {
    match geocoder.geocode(address).await {
        Ok(Some(result)) => {
            debug!(
                "Order {} resolved to '{}' ({:.2}) at {:?}",
                id, result.display_name, result.confidence, result.coordinates
            );
            Some(result.coordinates)
        }
        Ok(None) => {
            warn!("Address of order {} not found: '{}'", id, address);
            None
        }
        Err(e) => {
            warn!("Geocoding order {} failed: {}", id, e);
            None
        }
    }
}

fn unresolved_warning(order: &Order) -> String {
    format!(
        "Address of order {} could not be resolved: '{}'",
        order.id, order.address
    )
}

/// Persist the computed windows in visiting order and build the response rows.
///
/// Orders the store does not know keep their computed window in the response
/// but are marked unscheduled.
async fn commit(
    store: &dyn OrderStore,
    visiting: Vec<(Order, Option<Coordinates>)>,
    schedule: &ScheduleResult,
    warnings: &mut Vec<String>,
) -> Result<Vec<ScheduledOrder>, PlanError> {
    let mut scheduled = Vec::with_capacity(visiting.len());

    for ((mut order, coords), stop) in visiting.into_iter().zip(&schedule.stops) {
        let window = stop.window.to_string();
        let saved = store
            .save_time_window(order.id, &window)
            .await
            .map_err(PlanError::Store)?;
        if !saved {
            warn!("Order {} is not stored, window {} was not saved", order.id, window);
            warnings.push(format!("Order {} is not stored; its window was not saved", order.id));
        }

        order.time_range = Some(window);
        order.coords = coords.or(order.coords);
        scheduled.push(ScheduledOrder {
            order,
            travel_time: stop.travel_minutes,
            distance_km: stop.distance_km,
            travel_estimated: stop.travel_estimated,
            scheduled: saved,
        });
    }

    Ok(scheduled)
}
