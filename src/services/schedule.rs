//! Sequential schedule computation for a fixed visiting order.
//!
//! Given the stops in visiting order, the depot departure time and one travel
//! leg per stop, this module walks the route and produces an arrival/departure
//! pair and a committed half-hour window for every stop. It does NOT choose the
//! order; that is decided upstream (manual order or the optimizer).
//!
//! The running clock is carried through an explicit fold on exact values.
//! Rounding happens per stop when the window is committed and is never fed back
//! into the clock, so rounding error cannot accumulate along a long route.

use crate::services::routing::DistanceTimeMatrices;
use crate::services::time_window::{window_for, TimeWindow};
use crate::types::ServiceType;

/// Tunables of the schedule walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleConfig {
    /// Added to the start hour before the first leg (loading, briefing).
    pub warm_up_hours: f64,
}

impl ScheduleConfig {
    pub const fn new(warm_up_hours: f64) -> Self {
        Self { warm_up_hours }
    }
}

/// Travel from the previous location to a stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub duration_seconds: f64,
    pub distance_meters: Option<f64>,
}

impl Leg {
    pub const ZERO: Leg = Leg {
        duration_seconds: 0.0,
        distance_meters: Some(0.0),
    };
}

/// A single stop fed into the schedule computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleStop {
    pub order_id: i32,
    pub service_type: ServiceType,
    /// `None` when the routing provider had no value for this leg.
    pub leg: Option<Leg>,
}

/// Computed arrival/departure for a single stop.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStopSchedule {
    pub order_id: i32,
    /// Exact arrival, fractional hours.
    pub arrival: f64,
    /// Exact departure, fractional hours.
    pub departure: f64,
    pub travel_minutes: f64,
    pub distance_km: f64,
    /// The leg was unavailable and the service duration was used instead.
    pub travel_estimated: bool,
    pub window: TimeWindow,
}

/// Result of the sequential schedule computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleResult {
    /// Per-stop schedule, parallel to the input stops.
    pub stops: Vec<ComputedStopSchedule>,
    pub total_distance_km: f64,
    pub total_travel_minutes: f64,
}

/// Walk the stops in order and compute their windows.
pub fn compute_schedule(
    stops: &[ScheduleStop],
    start_hour: f64,
    config: &ScheduleConfig,
) -> ScheduleResult {
    let computed: Vec<ComputedStopSchedule> = stops
        .iter()
        .scan(start_hour + config.warm_up_hours, |clock, stop| {
            let computed = schedule_stop(*clock, stop);
            *clock = computed.departure;
            Some(computed)
        })
        .collect();

    let total_distance_km = computed.iter().map(|s| s.distance_km).sum();
    let total_travel_minutes = computed.iter().map(|s| s.travel_minutes).sum();

    ScheduleResult {
        stops: computed,
        total_distance_km,
        total_travel_minutes,
    }
}

fn schedule_stop(clock: f64, stop: &ScheduleStop) -> ComputedStopSchedule {
    let service_hours = stop.service_type.duration_hours();

    let (travel_minutes, distance_km, travel_estimated) = match stop.leg {
        Some(leg) => (
            leg.duration_seconds / 60.0,
            leg.distance_meters.unwrap_or(0.0) / 1000.0,
            false,
        ),
        // Unknown leg: assume it takes as long as the visit itself.
        None => (stop.service_type.duration_minutes(), 0.0, true),
    };

    let arrival = clock + travel_minutes / 60.0;
    let departure = arrival + service_hours;

    ComputedStopSchedule {
        order_id: stop.order_id,
        arrival,
        departure,
        travel_minutes,
        distance_km,
        travel_estimated,
        window: window_for(arrival, departure),
    }
}

/// Legs along a visiting order, looked up in a matrix.
///
/// `positions[i]` is the matrix index of stop `i` (`None` when the stop has no
/// location). `origin` is the matrix index the route leaves from; without one
/// the first stop is reached with a zero leg.
pub fn legs_from_matrix(
    matrices: &DistanceTimeMatrices,
    origin: Option<usize>,
    positions: &[Option<usize>],
) -> Vec<Option<Leg>> {
    positions
        .iter()
        .enumerate()
        .map(|(i, to)| {
            let from = if i == 0 {
                match origin {
                    Some(origin) => Some(origin),
                    None => return Some(Leg::ZERO),
                }
            } else {
                positions[i - 1]
            };
            matrices.leg(from?, (*to)?)
        })
        .collect()
}
