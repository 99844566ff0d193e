//! # Incident Route
//!
//! Client core for a municipal incident-reporting service: citizens report
//! urban problems (flooding, potholes, fallen trees, ...) at map locations,
//! and a route check highlights the reports lying along a planned path.
//!
//! This library provides:
//! - Proximity filtering of reports against a route polyline
//! - Cached, id-indexed report collections reloaded from the backend
//! - A lifecycle controller for resolve / undo / delete transitions
//! - Pure view state (markers, lists, popups, widgets) derived from the above
//!
//! ## Features
//!
//! - **`http`** - Enable the reqwest client for the reporting backend (default)
//! - **`parallel`** - Enable parallel proximity filtering with rayon
//! - **`cli`** - Build the `incident-route` command-line client
//!
//! ## Quick Start
//!
//! ```rust
//! use incident_route::{filter_on_route, ProximityConfig, Report, RouteGeometry};
//!
//! let route = RouteGeometry::from_lat_lngs(&[[-9.6650, -35.7350], [-9.6650, -35.7300]]).unwrap();
//! let reports: Vec<Report> = serde_json::from_str(
//!     r#"[
//!         {"id": 1, "type": "alagamento", "description": "Rua alagada",
//!          "latitude": -9.66520, "longitude": -35.7320, "timestamp": "2024-05-01T10:00:00"},
//!         {"id": 2, "type": "buraco", "description": "Buraco",
//!          "latitude": -9.6700, "longitude": -35.7320, "timestamp": "2024-05-01T11:00:00"}
//!     ]"#,
//! ).unwrap();
//!
//! let on_route = filter_on_route(&reports, &route, &ProximityConfig::default());
//! assert_eq!(on_route.len(), 1);
//! assert_eq!(on_route[0].description, "Rua alagada");
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{IncidentError, OptionExt, Result};

// Geographic primitives
pub mod geo_utils;

// Wire types
pub mod report;
pub use report::{
    FloodAlert, Forecast, MapConfig, NewReport, Report, ReportId, Weather, UNKNOWN_ADDRESS,
};

pub mod route;
pub use route::{Directions, RouteGeometry, RouteRequest};

// Proximity filter
pub mod proximity;
pub use proximity::{
    distance_to_route, filter_on_route, is_on_route, DistanceMetric, ProximityConfig,
    RouteAnalysis, DEFAULT_TOLERANCE_METERS,
};
#[cfg(feature = "parallel")]
pub use proximity::filter_on_route_parallel;

// Lifecycle state machine
pub mod lifecycle;
pub use lifecycle::{ReportState, Transition};

// Backend seam
pub mod backend;
pub use backend::{Backend, Collection};

// Report store
pub mod store;
pub use store::ReportStore;

// View synchronizer
pub mod view;
pub use view::{UiEvent, ViewAction, ViewState};

// Lifecycle controller / page state
pub mod app;
pub use app::{App, Controls, Notification, NotificationLevel, ReportDraft, SelectedLocation};

pub mod config;
pub use config::ClientConfig;

// HTTP client (feature-gated)
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::ApiClient;

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use incident_route::GpsPoint;
/// let point = GpsPoint::new(-9.6658, -35.7351); // Maceió
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(-9.6658, -35.7351).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }
}
