//! Backend connection and readiness checks.
//!
//! This module provides the `BackendConnection` type for validating that the
//! metrics and logs backends are reachable before any runner executes.

use super::{LokiBackend, PrometheusBackend};
use crate::config::HarnessConfig;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Timeout applied to every backend HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Backend readiness check failed: {message}")]
    NotReady { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Connection to the metrics and logs backends.
///
/// Provides readiness checks and hands out backend clients sharing one
/// HTTP client.
pub struct BackendConnection {
    pub prometheus_base_url: String,
    pub loki_base_url: String,
    http_client: reqwest::Client,
}

impl BackendConnection {
    /// Create a connection from the harness configuration.
    ///
    /// Verifies that both backends report ready.
    pub async fn connect(config: &HarnessConfig) -> Result<Self, ConnectionError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConnectionError::NotReady {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let connection = Self {
            prometheus_base_url: config.prometheus_url.trim_end_matches('/').to_string(),
            loki_base_url: config.loki_url.trim_end_matches('/').to_string(),
            http_client,
        };

        connection.check_prometheus().await?;
        connection.check_loki().await?;

        info!(
            target: "agent_validation.backend",
            prometheus = %connection.prometheus_base_url,
            loki = %connection.loki_base_url,
            "Backends ready"
        );

        Ok(connection)
    }

    /// Get the HTTP client for making requests.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Check if Prometheus is ready to serve queries.
    pub async fn check_prometheus(&self) -> Result<(), ConnectionError> {
        self.check_ready("Prometheus", &format!("{}/-/ready", self.prometheus_base_url))
            .await
    }

    /// Check if Loki is ready to serve queries.
    pub async fn check_loki(&self) -> Result<(), ConnectionError> {
        self.check_ready("Loki", &format!("{}/ready", self.loki_base_url))
            .await
    }

    async fn check_ready(&self, backend: &str, url: &str) -> Result<(), ConnectionError> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ConnectionError::NotReady {
                message: format!("{} returned status {}", backend, response.status()),
            });
        }

        Ok(())
    }

    /// Metrics backend sharing this connection's HTTP client.
    pub fn metrics_backend(&self) -> PrometheusBackend {
        PrometheusBackend::new(&self.prometheus_base_url, self.http_client.clone())
    }

    /// Logs backend sharing this connection's HTTP client.
    pub fn logs_backend(&self) -> LokiBackend {
        LokiBackend::new(&self.loki_base_url, self.http_client.clone())
    }
}
