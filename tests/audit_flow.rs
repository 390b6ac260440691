//! Lifecycle tests for the audit polling state machine.
//!
//! The remote endpoints are replaced by a scripted backend; tests run
//! under paused virtual time so the 2-second polling interval advances
//! instantly.

use async_trait::async_trait;
use luckblock_bot::analyzer::format::WAITING_GENERATION_AUDIT_MESSAGE;
use luckblock_bot::analyzer::types::{AuditData, AuditStatusResponse, TokenStatistics};
use luckblock_bot::analyzer::{AnalyzerError, AuditBackend, AuditEvent, AuditPoller};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const WEBAPP_URL: &str = "https://app.luckblock.io/audit";
const ADDRESS: &str = "0x00000000000000000000000000000000deadbeef";

fn sample_statistics() -> TokenStatistics {
    TokenStatistics {
        name: "Mock Token".to_string(),
        symbol: "MOCK".to_string(),
        address: ADDRESS.to_string(),
        price_usd: 0.0042,
        market_cap_usd: 12_400_000.0,
        liquidity_usd: 384_000.0,
        volume_24h_usd: 95_200.0,
        price_change_24h: 1.25,
        holder_count: 10_432,
        security: json!({ "is_honeypot": "0", "buy_tax": "0.05" }),
    }
}

fn ready_audit() -> AuditData {
    AuditData {
        status: "success".to_string(),
        data: Some(
            json!({
                "issues": [
                    { "severity": "high", "title": "Owner can pause trading", "description": "The owner may pause all transfers at any time." }
                ]
            })
            .to_string(),
        ),
    }
}

/// Scripted stand-in for the remote endpoints.
struct ScriptedBackend {
    statistics: Option<TokenStatistics>,
    initial_audit: Option<AuditData>,
    final_audit: Option<AuditData>,
    statuses: Mutex<VecDeque<AuditStatusResponse>>,
    audit_fetches: AtomicUsize,
    trigger_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(statistics: Option<TokenStatistics>) -> Self {
        Self {
            statistics,
            initial_audit: None,
            final_audit: None,
            statuses: Mutex::new(VecDeque::new()),
            audit_fetches: AtomicUsize::new(0),
            trigger_calls: AtomicUsize::new(0),
        }
    }

    fn with_initial_audit(mut self, audit: AuditData) -> Self {
        self.initial_audit = Some(audit);
        self
    }

    fn with_final_audit(mut self, audit: AuditData) -> Self {
        self.final_audit = Some(audit);
        self
    }

    fn with_statuses(self, statuses: &[(&str, Option<&str>)]) -> Self {
        {
            let mut queue = self.statuses.lock().expect("status queue poisoned");
            for (status, error) in statuses {
                queue.push_back(AuditStatusResponse {
                    status: (*status).to_string(),
                    error: error.map(ToString::to_string),
                });
            }
        }
        self
    }
}

#[async_trait]
impl AuditBackend for ScriptedBackend {
    async fn fetch_token_statistics(
        &self,
        _address: &str,
    ) -> Result<Option<TokenStatistics>, AnalyzerError> {
        Ok(self.statistics.clone())
    }

    async fn fetch_audit_data(&self, _address: &str) -> Result<Option<AuditData>, AnalyzerError> {
        let call = self.audit_fetches.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            Ok(self.initial_audit.clone())
        } else {
            Ok(self.final_audit.clone())
        }
    }

    async fn trigger_audit(&self, _address: &str) -> Result<(), AnalyzerError> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_audit_status(
        &self,
        _address: &str,
    ) -> Result<AuditStatusResponse, AnalyzerError> {
        match self
            .statuses
            .lock()
            .expect("status queue poisoned")
            .pop_front()
        {
            Some(response) => Ok(response),
            None => panic!("status script exhausted"),
        }
    }
}

async fn collect_events(backend: Arc<ScriptedBackend>) -> Vec<AuditEvent> {
    let poller = AuditPoller::new(backend, WEBAPP_URL);
    let mut events = poller.subscribe(ADDRESS);
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        collected.push(event);
    }
    collected
}

#[tokio::test(start_paused = true)]
async fn baseline_failure_emits_exactly_one_error() {
    let backend = Arc::new(ScriptedBackend::new(None));
    let events = collect_events(backend.clone()).await;

    assert_eq!(events.len(), 1, "expected a single event, got {events:?}");
    match &events[0] {
        AuditEvent::Errored { message, report } => {
            assert_eq!(message, "could not fetch token data");
            assert!(report.is_none(), "no partial report on baseline failure");
        }
        other => panic!("expected Errored, got {other:?}"),
    }
    assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn completed_audit_short_circuits_polling() {
    let backend =
        Arc::new(ScriptedBackend::new(Some(sample_statistics())).with_initial_audit(ready_audit()));
    let events = collect_events(backend.clone()).await;

    assert_eq!(events.len(), 1, "expected a single event, got {events:?}");
    match &events[0] {
        AuditEvent::Report { text, complete } => {
            assert!(*complete);
            assert!(text.contains("Owner can pause trading"));
            assert!(!text.contains(WAITING_GENERATION_AUDIT_MESSAGE));
        }
        other => panic!("expected Report, got {other:?}"),
    }
    assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn duplicate_statuses_notify_once() {
    let backend = Arc::new(
        ScriptedBackend::new(Some(sample_statistics()))
            .with_statuses(&[
                ("queued", None),
                ("queued", None),
                ("running", None),
                ("ended", None),
            ])
            .with_final_audit(ready_audit()),
    );
    let events = collect_events(backend.clone()).await;

    assert_eq!(events.len(), 4, "unexpected events: {events:?}");
    match &events[0] {
        AuditEvent::Report { text, complete } => {
            assert!(!*complete);
            assert!(text.contains(WAITING_GENERATION_AUDIT_MESSAGE));
        }
        other => panic!("expected Report, got {other:?}"),
    }

    let changes: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            AuditEvent::StatusChanged { status } => Some(status.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec!["queued", "running"]);

    match events.last() {
        Some(AuditEvent::Ended { text }) => {
            assert!(text.contains("Owner can pause trading"));
            assert!(!text.contains(WAITING_GENERATION_AUDIT_MESSAGE));
        }
        other => panic!("expected Ended, got {other:?}"),
    }
    assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn remote_error_carries_webapp_fallback() {
    let backend = Arc::new(
        ScriptedBackend::new(Some(sample_statistics()))
            .with_statuses(&[("queued", None), ("errored", Some("model exploded"))]),
    );
    let events = collect_events(backend).await;

    match events.last() {
        Some(AuditEvent::Errored { message, report }) => {
            assert_eq!(message, "model exploded");
            let report = report.as_deref().expect("fallback report present");
            assert!(report.contains("[Use our web app]"));
            assert!(report.contains(WEBAPP_URL));
            assert!(!report.contains(WAITING_GENERATION_AUDIT_MESSAGE));
        }
        other => panic!("expected Errored, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_status_is_terminal_with_generic_reason() {
    let backend = Arc::new(
        ScriptedBackend::new(Some(sample_statistics())).with_statuses(&[("unknown", None)]),
    );
    let events = collect_events(backend).await;

    match events.last() {
        Some(AuditEvent::Errored { message, report }) => {
            assert_eq!(message, "audit generation failed");
            assert!(report.is_some());
        }
        other => panic!("expected Errored, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn ended_without_payload_degrades_to_error() {
    let backend = Arc::new(
        ScriptedBackend::new(Some(sample_statistics())).with_statuses(&[("ended", None)]),
    );
    let events = collect_events(backend).await;

    match events.last() {
        Some(AuditEvent::Errored { message, report }) => {
            assert_eq!(message, "could not fetch the finished audit");
            assert!(report.is_some());
        }
        other => panic!("expected Errored, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transient_status_failure_skips_tick() {
    struct FlakyOnce {
        inner: ScriptedBackend,
        failed: AtomicUsize,
    }

    #[async_trait]
    impl AuditBackend for FlakyOnce {
        async fn fetch_token_statistics(
            &self,
            address: &str,
        ) -> Result<Option<TokenStatistics>, AnalyzerError> {
            self.inner.fetch_token_statistics(address).await
        }

        async fn fetch_audit_data(
            &self,
            address: &str,
        ) -> Result<Option<AuditData>, AnalyzerError> {
            self.inner.fetch_audit_data(address).await
        }

        async fn trigger_audit(&self, address: &str) -> Result<(), AnalyzerError> {
            self.inner.trigger_audit(address).await
        }

        async fn fetch_audit_status(
            &self,
            address: &str,
        ) -> Result<AuditStatusResponse, AnalyzerError> {
            if self.failed.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AnalyzerError::Network("connection reset".to_string()));
            }
            self.inner.fetch_audit_status(address).await
        }
    }

    let backend = Arc::new(FlakyOnce {
        inner: ScriptedBackend::new(Some(sample_statistics()))
            .with_statuses(&[("queued", None), ("ended", None)])
            .with_final_audit(ready_audit()),
        failed: AtomicUsize::new(0),
    });

    let poller = AuditPoller::new(backend, WEBAPP_URL);
    let mut events = poller.subscribe(ADDRESS);
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        collected.push(event);
    }

    // The failed tick is skipped; the poll continues to completion.
    assert!(matches!(collected.last(), Some(AuditEvent::Ended { .. })));
}
