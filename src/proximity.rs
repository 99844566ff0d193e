//! Route-impact analysis: which reports lie on a route.
//!
//! A report is "on the route" when its point lies within the tolerance of
//! the nearest *segment* of the route polyline. Distance to vertices alone
//! is not enough: long straight roads have few vertices.
//!
//! Two metrics are supported:
//! - [`DistanceMetric::PlanarDegrees`] (default) measures Euclidean distance
//!   in (lng, lat) degree space against `tolerance_meters / 100_000`
//!   degrees. This is the historical behaviour of the service, including its
//!   latitude dependence.
//! - [`DistanceMetric::Geodesic`] measures the haversine distance in meters
//!   from the report to its closest point on the route. Borderline reports
//!   qualify differently under this metric.

use std::collections::HashSet;

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{geodesic_polyline_distance, meters_to_degrees, planar_polyline_distance};
use crate::report::{Report, ReportId};
use crate::route::RouteGeometry;
use crate::GpsPoint;

/// Default proximity tolerance in meters.
pub const DEFAULT_TOLERANCE_METERS: f64 = 50.0;

/// How distance from a report to the route is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Planar degrees, with meters converted at a fixed 100 000 m per degree
    #[default]
    PlanarDegrees,
    /// Great-circle meters to the closest point on the route
    Geodesic,
}

/// Configuration for the proximity filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityConfig {
    /// Maximum distance at which a report counts as on the route.
    /// Default: 50.0 meters
    pub tolerance_meters: f64,
    /// Distance metric. Default: planar degrees
    pub metric: DistanceMetric,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            tolerance_meters: DEFAULT_TOLERANCE_METERS,
            metric: DistanceMetric::default(),
        }
    }
}

impl ProximityConfig {
    /// Tolerance expressed in the unit of the configured metric.
    pub fn threshold(&self) -> f64 {
        match self.metric {
            DistanceMetric::PlanarDegrees => meters_to_degrees(self.tolerance_meters),
            DistanceMetric::Geodesic => self.tolerance_meters,
        }
    }
}

/// Distance from a point to the route in the metric's unit
/// (degrees for planar, meters for geodesic).
///
/// Returns `f64::INFINITY` for an empty route or an invalid point.
pub fn distance_to_route(point: &GpsPoint, route: &RouteGeometry, metric: DistanceMetric) -> f64 {
    if !point.is_valid() {
        return f64::INFINITY;
    }
    match metric {
        DistanceMetric::PlanarDegrees => planar_polyline_distance(point, route.points()),
        DistanceMetric::Geodesic => geodesic_polyline_distance(point, route.points()),
    }
}

/// Whether a single point lies within the configured tolerance of the route.
pub fn is_on_route(point: &GpsPoint, route: &RouteGeometry, config: &ProximityConfig) -> bool {
    distance_to_route(point, route, config.metric) <= config.threshold()
}

/// Return the reports that lie within tolerance of the route, in input order.
///
/// An empty route or an empty report set yields an empty result.
///
/// # Example
/// ```
/// use incident_route::{filter_on_route, GpsPoint, ProximityConfig, Report, RouteGeometry};
///
/// let reports: Vec<Report> = serde_json::from_str(r#"[
///     {"id": 1, "type": "alagamento", "description": "", "latitude": -9.66,
///      "longitude": -35.73, "timestamp": "2024-05-01T12:00:00Z"},
///     {"id": 2, "type": "buraco", "description": "", "latitude": -9.80,
///      "longitude": -36.0, "timestamp": "2024-05-01T12:00:00Z"}
/// ]"#).unwrap();
/// let route = RouteGeometry::new(vec![
///     GpsPoint::new(-9.6605, -35.73),
///     GpsPoint::new(-9.6595, -35.73),
/// ]).unwrap();
///
/// let on_route = filter_on_route(&reports, &route, &ProximityConfig::default());
/// assert_eq!(on_route.len(), 1);
/// assert_eq!(on_route[0].id.to_string(), "1");
/// ```
pub fn filter_on_route(
    reports: &[Report],
    route: &RouteGeometry,
    config: &ProximityConfig,
) -> Vec<Report> {
    if reports.is_empty() || route.is_empty() {
        return Vec::new();
    }
    let on_route: Vec<Report> = reports
        .iter()
        .filter(|r| is_on_route(&r.point(), route, config))
        .cloned()
        .collect();
    debug!(
        "[ProximityFilter] {}/{} reports within {} m of a {}-point route",
        on_route.len(),
        reports.len(),
        config.tolerance_meters,
        route.len()
    );
    on_route
}

/// Parallel version of [`filter_on_route`]. Output order matches input order.
#[cfg(feature = "parallel")]
pub fn filter_on_route_parallel(
    reports: &[Report],
    route: &RouteGeometry,
    config: &ProximityConfig,
) -> Vec<Report> {
    if reports.is_empty() || route.is_empty() {
        return Vec::new();
    }
    reports
        .par_iter()
        .filter(|r| is_on_route(&r.point(), route, config))
        .cloned()
        .collect()
}

/// Result of analysing one route against the loaded reports.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAnalysis {
    pub route: RouteGeometry,
    pub config: ProximityConfig,
    /// Reports on the route, in store order
    pub on_route: Vec<Report>,
}

impl RouteAnalysis {
    /// Run the proximity filter and keep everything needed to re-run it.
    pub fn run(reports: &[Report], route: RouteGeometry, config: ProximityConfig) -> Self {
        let on_route = filter_on_route(reports, &route, &config);
        Self {
            route,
            config,
            on_route,
        }
    }

    /// Re-run the same route against a refreshed report set.
    pub fn rerun(&mut self, reports: &[Report]) {
        self.on_route = filter_on_route(reports, &self.route, &self.config);
    }

    pub fn on_route_ids(&self) -> HashSet<ReportId> {
        self.on_route.iter().map(|r| r.id.clone()).collect()
    }

    /// Summary line shown above the on-route list.
    pub fn summary(&self) -> String {
        format!(
            "Análise da Rota: {} problema(s) encontrado(s)",
            self.on_route.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn report(id: u64, lat: f64, lng: f64) -> Report {
        Report {
            id: ReportId::Number(id),
            report_type: "alagamento".to_string(),
            description: String::new(),
            latitude: lat,
            longitude: lng,
            address: None,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            resolved_at: None,
        }
    }

    fn maceio_route() -> RouteGeometry {
        RouteGeometry::new(vec![
            GpsPoint::new(-9.6605, -35.73),
            GpsPoint::new(-9.6595, -35.73),
        ]).unwrap()
    }

    #[test]
    fn test_two_report_scenario() {
        let reports = vec![report(1, -9.66, -35.73), report(2, -9.80, -36.0)];
        let result = filter_on_route(&reports, &maceio_route(), &ProximityConfig::default());
        assert_eq!(result, vec![reports[0].clone()]);
    }

    #[test]
    fn test_empty_inputs() {
        let config = ProximityConfig::default();
        assert!(filter_on_route(&[], &maceio_route(), &config).is_empty());
        let reports = vec![report(1, -9.66, -35.73)];
        assert!(filter_on_route(&reports, &RouteGeometry::default(), &config).is_empty());
    }

    #[test]
    fn test_segment_interior_counts() {
        // Two vertices ~11 km apart; report sits beside the middle of the segment
        let route = RouteGeometry::new(vec![
            GpsPoint::new(-9.66, -35.80),
            GpsPoint::new(-9.66, -35.70),
        ]).unwrap();
        let reports = vec![report(1, -9.6603, -35.75), report(2, -9.6610, -35.75)];
        let result = filter_on_route(&reports, &route, &ProximityConfig::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, ReportId::Number(1));
    }

    #[test]
    fn test_single_point_route() {
        let route = RouteGeometry::new(vec![GpsPoint::new(-9.66, -35.73)]).unwrap();
        let reports = vec![report(1, -9.6601, -35.73), report(2, -9.67, -35.73)];
        let result = filter_on_route(&reports, &route, &ProximityConfig::default());
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_invalid_report_coordinates_never_match() {
        let reports = vec![report(1, f64::NAN, -35.73)];
        assert!(filter_on_route(&reports, &maceio_route(), &ProximityConfig::default()).is_empty());
    }

    #[test]
    fn test_geodesic_metric_differs_on_borderline() {
        // 0.00048 deg of longitude at -9.66 is ~52.6 m on the ground:
        // inside the planar 0.0005 deg threshold, outside a true 50 m
        let route = RouteGeometry::new(vec![
            GpsPoint::new(-9.67, -35.73),
            GpsPoint::new(-9.65, -35.73),
        ]).unwrap();
        let reports = vec![report(1, -9.66, -35.72952)];

        let planar = ProximityConfig::default();
        assert_eq!(filter_on_route(&reports, &route, &planar).len(), 1);

        let geodesic = ProximityConfig {
            metric: DistanceMetric::Geodesic,
            ..ProximityConfig::default()
        };
        assert!(filter_on_route(&reports, &route, &geodesic).is_empty());
    }

    #[test]
    fn test_analysis_rerun_and_summary() {
        let reports = vec![report(1, -9.66, -35.73), report(3, -9.6601, -35.73)];
        let mut analysis =
            RouteAnalysis::run(&reports, maceio_route(), ProximityConfig::default());
        assert_eq!(analysis.on_route.len(), 2);
        assert_eq!(
            analysis.summary(),
            "Análise da Rota: 2 problema(s) encontrado(s)"
        );

        analysis.rerun(&reports[1..]);
        assert_eq!(analysis.on_route_ids().len(), 1);
        assert!(analysis.on_route_ids().contains(&ReportId::Number(3)));
    }

    fn arb_reports() -> impl Strategy<Value = Vec<Report>> {
        prop::collection::vec((-9.70..-9.62f64, -35.77..-35.69f64), 0..40).prop_map(|coords| {
            coords
                .into_iter()
                .enumerate()
                .map(|(i, (lat, lng))| report(i as u64, lat, lng))
                .collect()
        })
    }

    fn arb_route() -> impl Strategy<Value = RouteGeometry> {
        prop::collection::vec((-9.70..-9.62f64, -35.77..-35.69f64), 0..8).prop_map(|coords| {
            RouteGeometry::new(
                coords
                    .into_iter()
                    .map(|(lat, lng)| GpsPoint::new(lat, lng))
                    .collect(),
            ).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_output_is_ordered_subset_within_tolerance(
            reports in arb_reports(),
            route in arb_route(),
            tolerance in 1.0..2000.0f64,
            geodesic in any::<bool>(),
        ) {
            let config = ProximityConfig {
                tolerance_meters: tolerance,
                metric: if geodesic { DistanceMetric::Geodesic } else { DistanceMetric::PlanarDegrees },
            };
            let result = filter_on_route(&reports, &route, &config);

            // Ordered subsequence of the input
            let mut cursor = reports.iter();
            for r in &result {
                prop_assert!(cursor.any(|candidate| candidate == r));
            }

            // Included iff within tolerance
            let included: HashSet<ReportId> = result.iter().map(|r| r.id.clone()).collect();
            for r in &reports {
                let d = distance_to_route(&r.point(), &route, config.metric);
                if included.contains(&r.id) {
                    prop_assert!(d <= config.threshold() + 1e-12);
                } else {
                    prop_assert!(d > config.threshold());
                }
            }
        }

        #[test]
        fn prop_filter_is_idempotent(reports in arb_reports(), route in arb_route()) {
            let config = ProximityConfig::default();
            let first = filter_on_route(&reports, &route, &config);
            let second = filter_on_route(&reports, &route, &config);
            prop_assert_eq!(first, second);
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let reports: Vec<Report> = (0..500)
            .map(|i| report(i, -9.70 + i as f64 * 0.0002, -35.73 + (i % 7) as f64 * 0.0001))
            .collect();
        let route = RouteGeometry::new(vec![
            GpsPoint::new(-9.70, -35.7302),
            GpsPoint::new(-9.60, -35.7302),
        ]).unwrap();
        let config = ProximityConfig::default();
        assert_eq!(
            filter_on_route(&reports, &route, &config),
            filter_on_route_parallel(&reports, &route, &config)
        );
    }
}
