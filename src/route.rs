//! Route geometry and route requests.
//!
//! Computing a route is the map provider's job. This module only holds the
//! result (an ordered point sequence) and the seam through which a provider
//! turns an address pair into one.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{IncidentError, Result};
use crate::GpsPoint;

/// Coordinate precision of provider-encoded polylines (1e-5 degrees).
pub const POLYLINE_PRECISION: u32 = 5;

/// An ordered sequence of points describing a computed path.
///
/// Every point is a valid coordinate. Dropping a bad point would join its
/// neighbours into a segment the route never followed, so construction
/// fails instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GpsPoint>", into = "Vec<GpsPoint>")]
pub struct RouteGeometry {
    points: Vec<GpsPoint>,
}

impl RouteGeometry {
    /// Create a geometry from points. Fails with a parse error on the first
    /// point with non-finite or out-of-range coordinates.
    pub fn new(points: Vec<GpsPoint>) -> Result<Self> {
        if let Some((i, p)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(IncidentError::parse(format!(
                "invalid route point {} at index {}",
                format_point(p),
                i
            )));
        }
        Ok(Self { points })
    }

    /// Decode a precision-5 encoded polyline (the `overview_polyline` format).
    ///
    /// # Example
    /// ```
    /// use incident_route::RouteGeometry;
    ///
    /// let route = RouteGeometry::from_encoded_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
    /// assert_eq!(route.len(), 3);
    /// assert!((route.points()[0].latitude - 38.5).abs() < 1e-9);
    /// ```
    pub fn from_encoded_polyline(encoded: &str) -> Result<Self> {
        let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION)
            .map_err(|e| IncidentError::parse(format!("invalid encoded polyline: {}", e)))?;
        Self::new(line.coords().map(|c| GpsPoint::new(c.y, c.x)).collect())
    }

    /// Build a geometry from `[lat, lng]` pairs.
    pub fn from_lat_lngs(pairs: &[[f64; 2]]) -> Result<Self> {
        Self::new(pairs.iter().map(|[lat, lng]| GpsPoint::new(*lat, *lng)).collect())
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl TryFrom<Vec<GpsPoint>> for RouteGeometry {
    type Error = IncidentError;

    fn try_from(points: Vec<GpsPoint>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<RouteGeometry> for Vec<GpsPoint> {
    fn from(route: RouteGeometry) -> Self {
        route.points
    }
}

fn format_point(p: &GpsPoint) -> String {
    format!("({}, {})", p.latitude, p.longitude)
}

/// The two addresses a route check starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequest {
    pub start_address: String,
    pub end_address: String,
}

impl RouteRequest {
    pub fn new(start_address: impl Into<String>, end_address: impl Into<String>) -> Self {
        Self {
            start_address: start_address.into(),
            end_address: end_address.into(),
        }
    }

    /// Both addresses must be filled in before asking for directions.
    pub fn validate(&self) -> Result<()> {
        if self.start_address.trim().is_empty() || self.end_address.trim().is_empty() {
            return Err(IncidentError::validation(
                "Por favor, preencha os endereços de partida e destino.",
            ));
        }
        Ok(())
    }
}

/// Directions provider: turns an address pair into a driving route.
pub trait Directions {
    fn route(&self, request: &RouteRequest) -> impl Future<Output = Result<RouteGeometry>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_google_sample_polyline() {
        let route = RouteGeometry::from_encoded_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        let pts = route.points();
        assert_eq!(pts.len(), 3);
        assert!((pts[0].latitude - 38.5).abs() < 1e-9);
        assert!((pts[0].longitude + 120.2).abs() < 1e-9);
        assert!((pts[2].latitude - 43.252).abs() < 1e-9);
        assert!((pts[2].longitude + 126.453).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_point_rejected() {
        // A gap in the middle must not be bridged by a new segment
        let err = RouteGeometry::from_lat_lngs(&[[-9.66, -35.73], [f64::NAN, 0.0], [-9.67, -35.74]])
            .unwrap_err();
        assert!(matches!(err, IncidentError::Parse { .. }));
        assert!(err.to_string().contains("index 1"));
        assert!(RouteGeometry::from_lat_lngs(&[[95.0, 0.0]]).is_err());
    }

    #[test]
    fn test_deserialize_validates_points() {
        let route: RouteGeometry =
            serde_json::from_str(r#"[{"latitude": -9.66, "longitude": -35.73}]"#).unwrap();
        assert_eq!(route.len(), 1);

        let bad = serde_json::from_str::<RouteGeometry>(r#"[{"latitude": 120.0, "longitude": 0.0}]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_route_request_validation() {
        assert!(RouteRequest::new("Ponta Verde", "Farol").validate().is_ok());
        let err = RouteRequest::new("Ponta Verde", "  ").validate().unwrap_err();
        assert!(matches!(err, IncidentError::Validation { .. }));
        assert!(RouteRequest::default().validate().is_err());
    }

    #[test]
    fn test_empty_geometry() {
        let route = RouteGeometry::default();
        assert!(route.is_empty());
        assert_eq!(RouteGeometry::new(Vec::new()).unwrap(), route);
    }
}
