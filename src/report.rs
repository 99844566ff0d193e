//! Wire data model for the reporting backend.
//!
//! These types mirror the JSON the backend sends and accepts. Field names on
//! the wire follow the backend (`type`, `resolved_at`, `googleMapsApiKey`).

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::GpsPoint;

/// Address placeholder sent when the geocoder found nothing for a location.
pub const UNKNOWN_ADDRESS: &str = "Endereço não disponível";

/// Server-assigned report identifier.
///
/// Backends hand these out either as integers or as strings; both forms are
/// kept as received so they round-trip unchanged into request paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportId::Number(n) => write!(f, "{}", n),
            ReportId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ReportId {
    fn from(n: u64) -> Self {
        ReportId::Number(n)
    }
}

impl From<&str> for ReportId {
    fn from(s: &str) -> Self {
        s.parse::<u64>()
            .map(ReportId::Number)
            .unwrap_or_else(|_| ReportId::Text(s.to_string()))
    }
}

/// A user-submitted record of a localized problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    /// Problem category, e.g. "alagamento"
    #[serde(rename = "type")]
    pub report_type: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub timestamp: DateTime<Utc>,
    /// Present only once the report has been resolved
    #[serde(
        default,
        deserialize_with = "deserialize_optional_instant",
        skip_serializing_if = "Option::is_none"
    )]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Location of the report.
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Address for display, with the placeholder used across the UI.
    pub fn display_address(&self) -> &str {
        match self.address.as_deref() {
            Some(a) if !a.trim().is_empty() => a,
            _ => "Não informado",
        }
    }
}

/// Submission payload: report fields minus the server-assigned ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReport {
    #[serde(rename = "type")]
    pub report_type: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub timestamp: DateTime<Utc>,
}

/// Flood risk point computed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodAlert {
    pub latitude: f64,
    pub longitude: f64,
    pub risk_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// One forecast entry from the weather endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// OpenWeatherMap icon code, e.g. "10d"
    pub icon: String,
    pub description: String,
    /// Temperature in °C
    pub temp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub forecasts: Vec<Forecast>,
}

impl Weather {
    /// The forecast shown in the header widget.
    pub fn current(&self) -> Option<&Forecast> {
        self.forecasts.first()
    }
}

/// Client configuration served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(rename = "googleMapsApiKey")]
    pub google_maps_api_key: String,
}

/// Body of a non-2xx response from the submit endpoint.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: Option<String>,
}

/// Parse a timestamp as RFC 3339, falling back to a naive ISO-8601 value in UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

fn deserialize_optional_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_instant(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
    }
}
