//! Audit polling state machine.
//!
//! One watch task per report request walks
//! `Idle → Started → Polling → {Ended | Errored}` and emits lifecycle
//! events over an mpsc channel. The poller never touches the chat API;
//! the bot layer consumes the events and performs the message edits.

use super::client::AuditBackend;
use super::format::{format_token_statistics, with_audit_fallback};
use super::types::TokenStatistics;
use crate::config::AUDIT_POLL_INTERVAL_SECS;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Remote audit job status as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    /// Job accepted, generation not started yet
    Queued,
    /// Opaque generation substate reported by the remote
    Running(String),
    /// Generation finished, the report can be fetched
    Ended,
    /// Generation failed
    Errored,
    /// The remote does not know the job
    Unknown,
}

impl AuditStatus {
    fn from_remote(raw: &str) -> Self {
        match raw {
            "queued" => Self::Queued,
            "ended" => Self::Ended,
            "errored" => Self::Errored,
            "unknown" => Self::Unknown,
            other => Self::Running(other.to_string()),
        }
    }

    /// Whether this status stops the polling loop.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Errored | Self::Unknown)
    }

    /// Display label used for status-change notifications.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running(substate) => substate,
            Self::Ended => "ended",
            Self::Errored => "errored",
            Self::Unknown => "unknown",
        }
    }
}

/// Lifecycle events emitted to the subscriber
#[derive(Debug, Clone)]
pub enum AuditEvent {
    /// Baseline report composed; `complete` when the audit section is
    /// already included and no polling will follow
    Report {
        /// Full report message text
        text: String,
        /// Whether the audit section is already part of `text`
        complete: bool,
    },
    /// Audit generation moved to a new non-terminal status
    StatusChanged {
        /// Display label of the new status
        status: String,
    },
    /// Final report including the audit issues section
    Ended {
        /// Full report message text
        text: String,
    },
    /// Terminal failure
    Errored {
        /// Human-readable failure reason
        message: String,
        /// Statistics report with the web-app fallback section, present
        /// when the baseline fetch had succeeded
        report: Option<String>,
    },
}

/// Spawns one polling task per report request.
///
/// The poller itself is stateless and shared; each subscription owns its
/// channel and task, so concurrent report requests never interact.
pub struct AuditPoller {
    backend: Arc<dyn AuditBackend>,
    webapp_url: String,
    poll_interval: Duration,
}

impl AuditPoller {
    /// Create a poller over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn AuditBackend>, webapp_url: &str) -> Self {
        Self {
            backend,
            webapp_url: webapp_url.to_string(),
            poll_interval: Duration::from_secs(AUDIT_POLL_INTERVAL_SECS),
        }
    }

    /// Start watching an audit for `address`.
    ///
    /// Returns the event stream for this request. The watch task ends when
    /// a terminal event has been emitted or the receiver is dropped.
    pub fn subscribe(&self, address: &str) -> mpsc::Receiver<AuditEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let watch = AuditWatch {
            backend: self.backend.clone(),
            webapp_url: self.webapp_url.clone(),
            poll_interval: self.poll_interval,
            address: address.to_string(),
            events: tx,
        };
        tokio::spawn(watch.run());
        rx
    }
}

/// One in-flight report request
struct AuditWatch {
    backend: Arc<dyn AuditBackend>,
    webapp_url: String,
    poll_interval: Duration,
    address: String,
    events: mpsc::Sender<AuditEvent>,
}

impl AuditWatch {
    /// `Idle → Started`: fetch the baseline, then either finish immediately
    /// (audit already generated), fail, or move on to `Polling`.
    async fn run(self) {
        let (statistics, initial) = tokio::join!(
            self.backend.fetch_token_statistics(&self.address),
            self.backend.fetch_audit_data(&self.address),
        );

        let statistics = match statistics {
            Ok(Some(statistics)) => statistics,
            Ok(None) => {
                self.fail_baseline().await;
                return;
            }
            Err(e) => {
                warn!(address = %self.address, error = %e, "baseline statistics fetch failed");
                self.fail_baseline().await;
                return;
            }
        };

        let initial_report = match initial {
            Ok(data) => data.and_then(|d| d.report()),
            Err(e) => {
                warn!(address = %self.address, error = %e, "initial audit fetch failed");
                None
            }
        };

        if let Some(report) = initial_report {
            info!(address = %self.address, "audit already generated, skipping polling");
            let text = format_token_statistics(&statistics, Some(&report));
            self.emit(AuditEvent::Report {
                text,
                complete: true,
            })
            .await;
            return;
        }

        let waiting_report = format_token_statistics(&statistics, None);
        if !self
            .emit(AuditEvent::Report {
                text: waiting_report.clone(),
                complete: false,
            })
            .await
        {
            return;
        }

        self.spawn_trigger();
        self.poll(&statistics, &waiting_report).await;
    }

    /// `Started → Polling`: check the job status on a fixed interval until
    /// a terminal status is observed. Ticks are strictly sequential, so a
    /// slow status fetch can never race a later tick or outlive a terminal
    /// transition.
    async fn poll(&self, statistics: &TokenStatistics, waiting_report: &str) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; consume it so the
        // remote has one full interval after the trigger before the first
        // status check.
        ticker.tick().await;

        let mut last_status: Option<String> = None;

        loop {
            ticker.tick().await;

            let response = match self.backend.fetch_audit_status(&self.address).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(address = %self.address, error = %e, "status check failed, retrying on next tick");
                    continue;
                }
            };

            match AuditStatus::from_remote(&response.status) {
                AuditStatus::Ended => {
                    self.finish(statistics, waiting_report).await;
                    return;
                }
                AuditStatus::Errored | AuditStatus::Unknown => {
                    let message = response
                        .error
                        .unwrap_or_else(|| "audit generation failed".to_string());
                    self.fail(message, waiting_report).await;
                    return;
                }
                status => {
                    let label = status.label();
                    if last_status.as_deref() != Some(label) {
                        debug!(address = %self.address, status = %label, "audit status changed");
                        if !self
                            .emit(AuditEvent::StatusChanged {
                                status: label.to_string(),
                            })
                            .await
                        {
                            return;
                        }
                        last_status = Some(label.to_string());
                    }
                }
            }
        }
    }

    /// `Polling → Ended`: fetch the finished payload and emit the full
    /// report. Degrades to the error path when the payload cannot be
    /// fetched or parsed anymore.
    async fn finish(&self, statistics: &TokenStatistics, waiting_report: &str) {
        let report = match self.backend.fetch_audit_data(&self.address).await {
            Ok(data) => data.and_then(|d| d.report()),
            Err(e) => {
                warn!(address = %self.address, error = %e, "final audit fetch failed");
                None
            }
        };

        match report {
            Some(report) => {
                info!(address = %self.address, issues = report.issues.len(), "audit ended");
                let text = format_token_statistics(statistics, Some(&report));
                self.emit(AuditEvent::Ended { text }).await;
            }
            None => {
                self.fail("could not fetch the finished audit".to_string(), waiting_report)
                    .await;
            }
        }
    }

    /// `Polling → Errored`: one error event carrying the remote reason and
    /// the report with the web-app fallback section.
    async fn fail(&self, message: String, waiting_report: &str) {
        info!(address = %self.address, reason = %message, "audit errored");
        let fallback = with_audit_fallback(waiting_report, &self.webapp_url);
        self.emit(AuditEvent::Errored {
            message,
            report: Some(fallback),
        })
        .await;
    }

    /// `Started → Errored` without ever reaching `Polling`: the baseline
    /// data is unavailable, exactly one error event, no partial report.
    async fn fail_baseline(&self) {
        info!(address = %self.address, "baseline fetch failed, aborting report");
        self.emit(AuditEvent::Errored {
            message: "could not fetch token data".to_string(),
            report: None,
        })
        .await;
    }

    /// The trigger call is fire-and-forget: its response is not awaited for
    /// correctness and failures are only logged.
    fn spawn_trigger(&self) {
        let backend = self.backend.clone();
        let address = self.address.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.trigger_audit(&address).await {
                warn!(address = %address, error = %e, "trigger audit call failed");
            }
        });
    }

    /// Returns `false` when the subscriber is gone and polling should stop.
    async fn emit(&self, event: AuditEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}
