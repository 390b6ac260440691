//! Data shapes returned by the remote statistics and audit endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Market profile and raw security flags for a token
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenStatistics {
    /// Token name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Contract address the statistics were fetched for
    pub address: String,
    /// Spot price in USD
    pub price_usd: f64,
    /// Market capitalization in USD
    pub market_cap_usd: f64,
    /// Pooled liquidity in USD
    pub liquidity_usd: f64,
    /// Trading volume over the last 24 hours in USD
    pub volume_24h_usd: f64,
    /// Price change over the last 24 hours, in percent
    pub price_change_24h: f64,
    /// Number of holder addresses
    pub holder_count: u64,
    /// Provider-shaped security flags (string "0"/"1" flags and ratio fields)
    #[serde(default)]
    pub security: Value,
}

/// Stored audit payload as returned by the audit endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AuditData {
    /// Payload state; `success` means the report is ready
    pub status: String,
    /// JSON-encoded report, present once the audit has completed
    #[serde(default)]
    pub data: Option<String>,
}

impl AuditData {
    /// Parse the embedded report when the payload is in `success` state.
    ///
    /// Returns `None` when the audit is not finished or the embedded JSON
    /// does not decode into a report.
    #[must_use]
    pub fn report(&self) -> Option<AuditReport> {
        if self.status != "success" {
            return None;
        }
        self.data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Status-check response for a running audit job
#[derive(Debug, Clone, Deserialize)]
pub struct AuditStatusResponse {
    /// Raw status string reported by the remote
    pub status: String,
    /// Error detail, populated when the job failed
    #[serde(default)]
    pub error: Option<String>,
}

/// Parsed audit report
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuditReport {
    /// Issues found by the audit, most severe first
    #[serde(default)]
    pub issues: Vec<AuditIssue>,
}

/// A single issue found by the audit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditIssue {
    /// Severity tag (`high`, `medium`, `low`, ...), free-form
    #[serde(default)]
    pub severity: Option<String>,
    /// Short issue title
    pub title: String,
    /// Free-text description, may be arbitrarily long
    #[serde(default)]
    pub description: String,
}
