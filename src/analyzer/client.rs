//! HTTP client for the statistics and audit endpoints.
//!
//! Thin typed wrappers with no retry logic of their own; the polling
//! behavior lives in [`crate::analyzer::poller`].

use super::types::{AuditData, AuditStatusResponse, TokenStatistics};
use super::AnalyzerError;
use crate::config::get_analyzer_http_timeout_secs;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Remote endpoints the audit poller depends on.
///
/// Implemented by [`AnalyzerClient`] over HTTP; tests substitute scripted
/// backends.
#[async_trait]
pub trait AuditBackend: Send + Sync {
    /// Baseline market/security statistics, `None` when the token is unknown.
    async fn fetch_token_statistics(
        &self,
        address: &str,
    ) -> Result<Option<TokenStatistics>, AnalyzerError>;

    /// Stored audit payload, `None` when no audit exists yet.
    async fn fetch_audit_data(&self, address: &str) -> Result<Option<AuditData>, AnalyzerError>;

    /// Kick off audit generation for the address.
    async fn trigger_audit(&self, address: &str) -> Result<(), AnalyzerError>;

    /// Current status of the audit job.
    async fn fetch_audit_status(
        &self,
        address: &str,
    ) -> Result<AuditStatusResponse, AnalyzerError>;
}

/// HTTP client for the analyzer API
pub struct AnalyzerClient {
    http: HttpClient,
    base_url: String,
}

impl AnalyzerClient {
    /// Create a client for the given API base URL.
    ///
    /// The underlying HTTP client carries an explicit request timeout so a
    /// slow upstream cannot hang a poll tick forever.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let timeout = Duration::from_secs(get_analyzer_http_timeout_secs());
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Register a wallet address for air drops and early access.
    ///
    /// # Errors
    ///
    /// Returns `AnalyzerError::Network` or `AnalyzerError::Api`; callers
    /// treat this as best-effort and only log failures.
    pub async fn register_wallet(&self, address: &str) -> Result<(), AnalyzerError> {
        self.post_empty(&format!("register/{address}")).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AnalyzerError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "analyzer GET");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalyzerError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api(format!(
                "{status}: {}",
                crate::utils::truncate_str(body, 200)
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalyzerError::Json(e.to_string()))?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AnalyzerError::Json(e.to_string()))
    }

    async fn post_empty(&self, path: &str) -> Result<(), AnalyzerError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "analyzer POST");

        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| AnalyzerError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api(format!(
                "{status}: {}",
                crate::utils::truncate_str(body, 200)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditBackend for AnalyzerClient {
    async fn fetch_token_statistics(
        &self,
        address: &str,
    ) -> Result<Option<TokenStatistics>, AnalyzerError> {
        self.get_json(&format!("stats/{address}")).await
    }

    async fn fetch_audit_data(&self, address: &str) -> Result<Option<AuditData>, AnalyzerError> {
        self.get_json(&format!("audit/{address}")).await
    }

    async fn trigger_audit(&self, address: &str) -> Result<(), AnalyzerError> {
        self.post_empty(&format!("trigger-audit/{address}")).await
    }

    async fn fetch_audit_status(
        &self,
        address: &str,
    ) -> Result<AuditStatusResponse, AnalyzerError> {
        self.get_json::<AuditStatusResponse>(&format!("audit-status/{address}"))
            .await?
            .ok_or_else(|| AnalyzerError::Api("empty audit status response".to_string()))
    }
}
