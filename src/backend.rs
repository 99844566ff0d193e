//! The reporting backend seam.
//!
//! Persistence, flood-alert computation and weather live on the server.
//! [`Backend`] is everything the client needs from it; `ApiClient` (feature
//! `http`) implements it over REST.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lifecycle::Transition;
use crate::report::{FloodAlert, MapConfig, NewReport, Report, ReportId, Weather};

/// Which server-side report collection a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Active,
    Resolved,
}

impl Collection {
    /// Path of the listing endpoint.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Active => "/api/reports",
            Collection::Resolved => "/api/reports/resolved",
        }
    }
}

/// HTTP method and path segments for a lifecycle transition. The report id
/// is appended as one more segment, percent-encoded by the HTTP client.
pub fn transition_endpoint(transition: Transition) -> (&'static str, &'static [&'static str]) {
    match transition {
        Transition::Resolve => ("POST", &["api", "report", "resolve"]),
        Transition::Undo => ("POST", &["api", "report", "undo"]),
        Transition::Delete => ("DELETE", &["api", "report", "resolved"]),
    }
}

/// Operations the client consumes from the reporting backend.
pub trait Backend {
    /// List the reports in a collection, in server order.
    fn fetch_reports(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Report>>> + Send;

    fn submit_report(&self, report: &NewReport) -> impl Future<Output = Result<()>> + Send;

    /// Ask the server to move a report along the lifecycle.
    fn transition(
        &self,
        id: &ReportId,
        transition: Transition,
    ) -> impl Future<Output = Result<()>> + Send;

    fn flood_alerts(&self) -> impl Future<Output = Result<Vec<FloodAlert>>> + Send;

    fn weather(&self) -> impl Future<Output = Result<Weather>> + Send;

    fn map_config(&self) -> impl Future<Output = Result<MapConfig>> + Send;
}
