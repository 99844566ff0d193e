//! Unified error handling for the incident-route library.
//!
//! Every fallible operation returns [`IncidentError`]. The variants follow the
//! taxonomy the client surfaces to users: network failures, malformed
//! payloads, and missing or invalid user input.

use thiserror::Error;

/// Unified error type for incident-route operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IncidentError {
    /// Request failed to complete, or the backend answered with a non-2xx status
    #[error("{}", format_network(.message, .status_code))]
    Network {
        message: String,
        status_code: Option<u16>,
    },
    /// Response body, polyline or timestamp could not be decoded
    #[error("Parse error: {message}")]
    Parse { message: String },
    /// Required user input is missing, or a transition is not allowed
    #[error("{message}")]
    Validation { message: String },
    /// Client configuration is invalid
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn format_network(message: &str, status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!("HTTP error ({}): {}", code, message),
        None => format!("HTTP error: {}", message),
    }
}

impl IncidentError {
    pub fn network(message: impl Into<String>, status_code: Option<u16>) -> Self {
        IncidentError::Network {
            message: message.into(),
            status_code,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        IncidentError::Parse {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        IncidentError::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        IncidentError::Config {
            message: message.into(),
        }
    }

    /// HTTP status attached to a network failure, if the backend answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            IncidentError::Network { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for IncidentError {
    fn from(e: serde_json::Error) -> Self {
        IncidentError::parse(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for IncidentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            IncidentError::parse(e.to_string())
        } else {
            IncidentError::network(e.to_string(), e.status().map(|s| s.as_u16()))
        }
    }
}

/// Result type alias for incident-route operations.
pub type Result<T> = std::result::Result<T, IncidentError>;

/// Extension trait for converting Option to IncidentError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a validation error.
    fn ok_or_validation(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_validation(self, message: &str) -> Result<T> {
        self.ok_or_else(|| IncidentError::validation(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IncidentError::network("connection refused", None);
        assert_eq!(err.to_string(), "HTTP error: connection refused");

        let err = IncidentError::network("Internal Server Error", Some(500));
        assert!(err.to_string().contains("(500)"));
        assert_eq!(err.status_code(), Some(500));

        let err = IncidentError::validation("Selecione um local no mapa.");
        assert_eq!(err.to_string(), "Selecione um local no mapa.");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_validation("missing"),
            Err(IncidentError::Validation { .. })
        ));
        assert_eq!(Some(3).ok_or_validation("never"), Ok(3));
    }

    #[test]
    fn test_from_serde_json() {
        let err: IncidentError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, IncidentError::Parse { .. }));
    }
}
