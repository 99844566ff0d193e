//! REST client for the reporting backend.
//!
//! - One pooled reqwest client with a per-request timeout
//! - GET requests retried with exponential backoff on connect errors,
//!   timeouts, 5xx and 429
//! - Commands (POST/DELETE) sent exactly once: the backend has no
//!   idempotency key, so a retry could duplicate a report

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::backend::{transition_endpoint, Backend, Collection};
use crate::config::ClientConfig;
use crate::error::{IncidentError, Result};
use crate::lifecycle::Transition;
use crate::report::{ApiErrorBody, FloodAlert, MapConfig, NewReport, Report, ReportId, Weather};

const SUBMIT_FAILED: &str = "Falha no envio do relato.";

/// Backoff before the n-th retry (1-based): 1s, 2s, 4s, ...
fn retry_backoff(retry: u32) -> Duration {
    Duration::from_millis(500 * (1 << retry.min(6)))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// reqwest-backed [`Backend`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IncidentError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn parse_url(&self, path: &str) -> Result<Url> {
        Url::parse(&self.config.url(path))
            .map_err(|e| IncidentError::config(format!("invalid base URL: {}", e)))
    }

    /// Method and URL for a transition. The id becomes a single escaped path
    /// segment, so `/`, `?` or `#` inside it cannot change the endpoint.
    fn transition_request(&self, transition: Transition, id: &ReportId) -> Result<(Method, Url)> {
        let (method, segments) = transition_endpoint(transition);
        let method = match method {
            "DELETE" => Method::DELETE,
            _ => Method::POST,
        };
        let mut url = self.parse_url("")?;
        url.path_segments_mut()
            .map_err(|_| IncidentError::config("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments)
            .push(&id.to_string());
        Ok((method, url))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.url(path);
        let mut retries = 0;

        loop {
            debug!("[ApiClient] GET {}", url);
            match self.client.get(&url).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if is_retryable_status(status) && retries < self.config.max_retries {
                        retries += 1;
                        let backoff = retry_backoff(retries);
                        warn!(
                            "[ApiClient] {} for {}, retry {} after {:?}",
                            status, path, retries, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(IncidentError::network(
                            format!("GET {} returned {}", path, status),
                            Some(status.as_u16()),
                        ));
                    }

                    let body = resp.bytes().await?;
                    return serde_json::from_slice(&body)
                        .map_err(|e| IncidentError::parse(format!("{}: {}", path, e)));
                }
                Err(e) => {
                    if (e.is_connect() || e.is_timeout()) && retries < self.config.max_retries {
                        retries += 1;
                        let backoff = retry_backoff(retries);
                        warn!(
                            "[ApiClient] Error for {}: {}, retry {} after {:?}",
                            path, e, retries, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Send a command once. Non-2xx responses carry the backend's
    /// `{"error": ...}` message when it sends one.
    async fn send_command(
        &self,
        method: Method,
        url: Url,
        body: Option<&NewReport>,
        fallback: &str,
    ) -> Result<()> {
        debug!("[ApiClient] {} {}", method, url);

        let path = url.path().to_string();
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| fallback.to_string());
        warn!("[ApiClient] {} {} returned {}: {}", method, path, status, message);
        Err(IncidentError::network(message, Some(status.as_u16())))
    }
}

impl Backend for ApiClient {
    async fn fetch_reports(&self, collection: Collection) -> Result<Vec<Report>> {
        self.get_json(collection.path()).await
    }

    async fn submit_report(&self, report: &NewReport) -> Result<()> {
        let url = self.parse_url("/api/report")?;
        self.send_command(Method::POST, url, Some(report), SUBMIT_FAILED)
            .await?;
        info!(
            "[ApiClient] Submitted {} report at ({}, {})",
            report.report_type, report.latitude, report.longitude
        );
        Ok(())
    }

    async fn transition(&self, id: &ReportId, transition: Transition) -> Result<()> {
        let (method, url) = self.transition_request(transition, id)?;
        let fallback = format!("Falha ao executar {} na ocorrência {}.", transition, id);
        self.send_command(method, url, None, &fallback).await
    }

    async fn flood_alerts(&self) -> Result<Vec<FloodAlert>> {
        self.get_json("/api/flood-alerts").await
    }

    async fn weather(&self) -> Result<Weather> {
        self.get_json("/api/weather").await
    }

    async fn map_config(&self) -> Result<MapConfig> {
        self.get_json("/api/config").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_backoff_doubles() {
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(2), Duration::from_secs(2));
        assert_eq!(retry_backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::OK));
    }

    #[test]
    fn test_transition_url_escapes_id() {
        let api = ApiClient::new(ClientConfig::new("http://127.0.0.1:5000/")).unwrap();

        let (method, url) = api
            .transition_request(Transition::Delete, &ReportId::Number(7))
            .unwrap();
        assert_eq!(method, Method::DELETE);
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/api/report/resolved/7");

        let (_, url) = api
            .transition_request(Transition::Resolve, &ReportId::Text("a/b?c#d".to_string()))
            .unwrap();
        assert_eq!(url.path(), "/api/report/resolve/a%2Fb%3Fc%23d");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_transition_url_keeps_base_prefix() {
        let api = ApiClient::new(ClientConfig::new("https://example.org/alerta")).unwrap();
        let (_, url) = api
            .transition_request(Transition::Undo, &ReportId::Number(3))
            .unwrap();
        assert_eq!(url.as_str(), "https://example.org/alerta/api/report/undo/3");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = ApiClient::new(ClientConfig::new("localhost:5000")).unwrap_err();
        assert!(matches!(err, IncidentError::Config { .. }));
    }
}
