//! Route planning types

use serde::{Deserialize, Serialize};

use super::Order;

/// How the visiting order is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePlanMode {
    /// Keep the order the stops were supplied in.
    Manual,
    /// Ask the optimizer for a visiting order, starting from the depot.
    Auto,
}

impl RoutePlanMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            RoutePlanMode::Manual => "manual",
            RoutePlanMode::Auto => "auto",
        }
    }
}

/// Request to recompute time windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanRequest {
    pub mode: RoutePlanMode,
    /// Orders as the panel currently shows them. When absent, all stored orders are planned in id order.
    #[serde(default)]
    pub orders: Option<Vec<Order>>,
    /// Overrides the stored start hour for this run only.
    #[serde(default)]
    pub start_hour: Option<f64>,
}

/// An order with the outcome of a schedule run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    #[serde(flatten)]
    pub order: Order,
    /// Travel time from the previous stop (or depot), minutes.
    #[serde(rename = "travelTime")]
    pub travel_time: f64,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
    /// True when the leg was missing and the service duration stood in for it.
    #[serde(rename = "travelEstimated")]
    pub travel_estimated: bool,
    /// False for orders carried through unchanged (address could not be resolved).
    pub scheduled: bool,
}

/// Result of a schedule run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanResponse {
    pub mode: RoutePlanMode,
    pub orders: Vec<ScheduledOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_used: Option<String>,
    pub warnings: Vec<String>,
    pub total_distance_km: f64,
    pub total_travel_minutes: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_request_defaults_to_stored_orders() {
        let request: RoutePlanRequest =
            serde_json::from_value(serde_json::json!({ "mode": "auto" })).unwrap();
        assert_eq!(request.mode, RoutePlanMode::Auto);
        assert!(request.orders.is_none());
        assert!(request.start_hour.is_none());
    }

    #[test]
    fn scheduled_order_flattens_order_fields() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": 1,
            "client_name": "A",
            "phone_number": "1",
            "address": "X",
            "type": "Transport"
        }))
        .unwrap();
        let scheduled = ScheduledOrder {
            order,
            travel_time: 20.0,
            distance_km: 7.5,
            travel_estimated: false,
            scheduled: true,
        };

        let json = serde_json::to_value(&scheduled).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["travelTime"], 20.0);
        assert_eq!(json["distanceKm"], 7.5);
        assert_eq!(json["type"], "Transport");
    }
}
