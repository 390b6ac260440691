//! Token statistics and AI-audit analyzer.
//!
//! Wraps the remote statistics/audit endpoints, drives the audit polling
//! state machine, and composes the MarkdownV2 report messages.

/// Typed wrappers over the remote endpoints.
pub mod client;
/// Report message composition.
pub mod format;
/// Audit polling state machine.
pub mod poller;
/// Data shapes returned by the remote endpoints.
pub mod types;

use thiserror::Error;

/// Errors that can occur while talking to the analyzer endpoints
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Error returned by the remote API
    #[error("API error: {0}")]
    Api(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(String),
}

pub use client::{AnalyzerClient, AuditBackend};
pub use poller::{AuditEvent, AuditPoller};
