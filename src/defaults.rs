//! Built-in defaults used when neither the settings row nor the environment says otherwise.

/// Depot departure time (fractional hours) when the settings row is missing.
pub const DEFAULT_START_HOUR: f64 = 10.0;

pub const DEFAULT_PAGE_TITLE: &str = "Transporty";

/// Warehouse every optimized route starts and ends at.
pub const DEFAULT_DEPOT_ADDRESS: &str = "Starowiejska 10, 08-110 Siedlce";

/// Offset added to the start hour before the first stop of a manual schedule.
pub const DEFAULT_MANUAL_WARM_UP_HOURS: f64 = 0.0;

/// Offset added to the start hour before leaving the depot on an optimized route (loading time).
pub const DEFAULT_ROUTE_WARM_UP_HOURS: f64 = 0.5;

pub const DEFAULT_ORS_BASE_URL: &str = "https://api.openrouteservice.org";

pub const DEFAULT_BLOB_BASE_URL: &str = "https://blob.vercel-storage.com";

/// Service area for geocoding: addresses outside this box are re-queried with the locality appended.
pub const REGION_LON_MIN: f64 = 21.0;
pub const REGION_LON_MAX: f64 = 23.0;
pub const REGION_LAT_MIN: f64 = 51.5;
pub const REGION_LAT_MAX: f64 = 52.5;
pub const REGION_FOCUS_LON: f64 = 22.3;
pub const REGION_FOCUS_LAT: f64 = 52.2;
pub const REGION_COUNTRY: &str = "POL";
pub const REGION_LOCALITY: &str = "Siedlce";
