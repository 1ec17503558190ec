//! Settings types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::defaults::{DEFAULT_PAGE_TITLE, DEFAULT_START_HOUR};

/// The single settings row shared by both panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Depot departure time in fractional hours (10.5 = 10:30).
    pub start_hour: f64,
    pub page_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_hour: DEFAULT_START_HOUR,
            page_title: DEFAULT_PAGE_TITLE.to_string(),
        }
    }
}

/// Update settings request. Replaces the whole row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub start_hour: f64,
    pub page_title: String,
}

impl UpdateSettingsRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_start_hour(self.start_hour)?;
        if self.page_title.trim().is_empty() {
            return Err("pageTitle must not be empty".to_string());
        }
        Ok(())
    }
}

/// Start hours are clock times within one day.
pub fn validate_start_hour(start_hour: f64) -> Result<(), String> {
    if !start_hour.is_finite() || !(0.0..24.0).contains(&start_hour) {
        return Err(format!("startHour must be within [0, 24), got {}", start_hour));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start_hour: f64, title: &str) -> UpdateSettingsRequest {
        UpdateSettingsRequest {
            start_hour,
            page_title: title.to_string(),
        }
    }

    #[test]
    fn default_settings_depart_at_ten() {
        let settings = Settings::default();
        assert_eq!(settings.start_hour, 10.0);
        assert!(!settings.page_title.is_empty());
    }

    #[test]
    fn accepts_fractional_start_hour() {
        assert!(request(10.5, "Transporty").validate().is_ok());
        assert!(request(0.0, "Transporty").validate().is_ok());
    }

    #[test]
    fn rejects_start_hour_outside_day() {
        assert!(request(24.0, "Transporty").validate().is_err());
        assert!(request(-0.5, "Transporty").validate().is_err());
        assert!(request(f64::NAN, "Transporty").validate().is_err());
    }

    #[test]
    fn rejects_blank_title() {
        let err = request(9.0, "   ").validate().unwrap_err();
        assert!(err.contains("pageTitle"));
    }

    #[test]
    fn settings_use_camel_case_on_the_wire() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["startHour"], 10.0);
        assert!(json.get("pageTitle").is_some());
    }
}
