//! Delivery order types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// Service ordered with the delivery. Determines how long the crew stays at the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "service_type")]
pub enum ServiceType {
    #[serde(rename = "Transport")]
    #[sqlx(rename = "Transport")]
    Transport,
    #[serde(rename = "Transport + wniesienie")]
    #[sqlx(rename = "Transport + wniesienie")]
    CarryIn,
    #[serde(rename = "Transport + wniesienie + montaż")]
    #[sqlx(rename = "Transport + wniesienie + montaż")]
    CarryInAssembly,
}

impl ServiceType {
    #[cfg(test)]
    pub const ALL: [ServiceType; 3] = [
        ServiceType::Transport,
        ServiceType::CarryIn,
        ServiceType::CarryInAssembly,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ServiceType::Transport => "Transport",
            ServiceType::CarryIn => "Transport + wniesienie",
            ServiceType::CarryInAssembly => "Transport + wniesienie + montaż",
        }
    }

    /// Nominal time spent at the stop, in hours.
    pub const fn duration_hours(self) -> f64 {
        match self {
            ServiceType::Transport => 0.5,
            ServiceType::CarryIn => 1.0,
            ServiceType::CarryInAssembly => 1.7,
        }
    }

    pub fn duration_minutes(self) -> f64 {
        self.duration_hours() * 60.0
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the WGS84 value ranges.
    pub fn is_well_formed(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// `[lon, lat]` pair as used by GeoJSON-style APIs.
    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    pub fn from_lon_lat(pair: &[f64]) -> Option<Self> {
        match pair {
            [lng, lat] => Some(Self { lat: *lat, lng: *lng }),
            _ => None,
        }
    }
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i32,
    pub client_name: String,
    pub phone_number: String,
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Committed "HH:MM - HH:MM" window, absent until the first schedule run.
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Known position of the address. Not stored; filled by route planning
    /// and echoed back by clients.
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
}

/// Create order request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub client_name: String,
    pub phone_number: String,
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
}

impl CreateOrderRequest {
    /// Check required fields; returns the list of missing field names.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_name.trim().is_empty() {
            missing.push("clientName");
        }
        if self.phone_number.trim().is_empty() {
            missing.push("phoneNumber");
        }
        if self.address.trim().is_empty() {
            missing.push("address");
        }
        missing
    }

    /// Description with blank input collapsed to `None`.
    pub fn normalized_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Complete order request (driver panel)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOrderRequest {
    pub id: i32,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

/// Delete order request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrderRequest {
    pub id: i32,
}

/// Delete response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrdersResponse {
    pub deleted: u64,
    pub photos_released: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_uses_panel_labels_on_the_wire() {
        let json = serde_json::to_string(&ServiceType::CarryInAssembly).unwrap();
        assert_eq!(json, "\"Transport + wniesienie + montaż\"");

        let parsed: ServiceType = serde_json::from_str("\"Transport + wniesienie\"").unwrap();
        assert_eq!(parsed, ServiceType::CarryIn);

        for service in ServiceType::ALL {
            let label = serde_json::to_value(service).unwrap();
            assert_eq!(label, service.as_str());
        }
    }

    #[test]
    fn unknown_service_type_is_rejected() {
        assert!(serde_json::from_str::<ServiceType>("\"Montaż\"").is_err());
    }

    #[test]
    fn service_durations_follow_canonical_table() {
        assert_eq!(ServiceType::Transport.duration_hours(), 0.5);
        assert_eq!(ServiceType::CarryIn.duration_hours(), 1.0);
        assert_eq!(ServiceType::CarryInAssembly.duration_hours(), 1.7);
        assert_eq!(ServiceType::Transport.duration_minutes(), 30.0);
    }

    #[test]
    fn coordinates_well_formed() {
        assert!(Coordinates::new(52.17, 22.29).is_well_formed());
        assert!(!Coordinates::new(f64::NAN, 22.29).is_well_formed());
        assert!(!Coordinates::new(52.17, f64::INFINITY).is_well_formed());
        assert!(!Coordinates::new(95.0, 22.29).is_well_formed());
    }

    #[test]
    fn coordinates_lon_lat_pairs() {
        let c = Coordinates::from_lon_lat(&[22.29, 52.17]).unwrap();
        assert_eq!(c.lat, 52.17);
        assert_eq!(c.lng, 22.29);
        assert_eq!(c.to_lon_lat(), [22.29, 52.17]);
        assert!(Coordinates::from_lon_lat(&[22.29]).is_none());
        assert!(Coordinates::from_lon_lat(&[22.29, 52.17, 0.0]).is_none());
    }

    #[test]
    fn create_request_reports_missing_fields() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "clientName": "Jan Kowalski",
            "phoneNumber": "  ",
            "address": "",
            "type": "Transport"
        }))
        .unwrap();

        assert_eq!(request.missing_fields(), vec!["phoneNumber", "address"]);
        assert_eq!(request.normalized_description(), None);
    }

    #[test]
    fn order_round_trips_panel_json() {
        let raw = serde_json::json!({
            "id": 3,
            "client_name": "Anna Nowak",
            "phone_number": "600100200",
            "address": "Piłsudskiego 1, Siedlce",
            "type": "Transport",
            "time_range": "10:00 - 10:30",
            "coords": { "lat": 52.16, "lng": 22.27 }
        });
        let order: Order = serde_json::from_value(raw).unwrap();
        assert_eq!(order.service_type, ServiceType::Transport);
        assert!(!order.completed);
        assert!(order.photo_urls.is_empty());
        assert_eq!(order.coords, Some(Coordinates::new(52.16, 22.27)));

        let back = serde_json::to_value(&order).unwrap();
        assert_eq!(back["type"], "Transport");
        assert_eq!(back["time_range"], "10:00 - 10:30");
    }
}
