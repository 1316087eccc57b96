use std::sync::{Arc, Mutex};
use std::time::Duration;

use surfscan_core::{BackendReceipt, ScanRecord, StoredResult};
use surfscan_engine::{
    BackendClient, BackendError, EngineEvent, EngineHandle, InjectionError, TabHost, TabInfo,
};

#[derive(Default)]
struct StubBackend {
    sources: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl BackendClient for StubBackend {
    async fn submit(
        &self,
        record: &ScanRecord,
        source: &str,
        _timestamp: &str,
    ) -> Result<BackendReceipt, BackendError> {
        self.sources.lock().unwrap().push(source.to_string());
        if record.title == "boom" {
            Err(BackendError::Server(503))
        } else {
            Ok(BackendReceipt {
                file_id: Some("id".into()),
                ..BackendReceipt::default()
            })
        }
    }

    async fn export(
        &self,
        results: &[StoredResult],
        _timestamp: &str,
    ) -> Result<BackendReceipt, BackendError> {
        let mut receipt = BackendReceipt::default();
        receipt
            .extra
            .insert("recordCount".into(), results.len().into());
        Ok(receipt)
    }
}

struct OneTab;

#[async_trait::async_trait]
impl TabHost for OneTab {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, InjectionError> {
        Ok(vec![TabInfo {
            id: 1,
            url: "https://example.com".into(),
        }])
    }

    async fn active_tab(&self) -> Result<TabInfo, InjectionError> {
        Err(InjectionError::NoActiveTab)
    }

    async fn inject_extractor(&self, _tab: &TabInfo) -> Result<(), InjectionError> {
        Ok(())
    }

    async fn set_auto_scan(&self, _tab: &TabInfo, _enabled: bool) -> Result<(), InjectionError> {
        Ok(())
    }

    async fn scan_tab(&self, tab: &TabInfo) -> Result<ScanRecord, InjectionError> {
        Err(InjectionError::NoResponse {
            tab_id: tab.id,
            reason: "unreachable".into(),
        })
    }
}

fn spawn(backend: Arc<StubBackend>) -> (EngineHandle, std::sync::mpsc::Receiver<EngineEvent>) {
    EngineHandle::spawn(backend, Arc::new(OneTab), Arc::new(|| "2025-10-09T00:00:00Z".to_string()))
        .expect("engine")
}

fn next_event(rx: &std::sync::mpsc::Receiver<EngineEvent>) -> EngineEvent {
    rx.recv_timeout(Duration::from_secs(5)).expect("engine event")
}

#[test]
fn submission_outcomes_come_back_with_their_ticket() {
    let backend = Arc::new(StubBackend::default());
    let (engine, events) = spawn(backend.clone());

    engine.submit(
        7,
        ScanRecord {
            title: "boom".into(),
            ..ScanRecord::default()
        },
        None,
    );

    match next_event(&events) {
        EngineEvent::BackendCompleted {
            ticket,
            outcome,
            completed_at,
        } => {
            assert_eq!(ticket, 7);
            assert_eq!(outcome, Err(BackendError::Server(503)));
            assert_eq!(completed_at, "2025-10-09T00:00:00Z");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(backend.sources.lock().unwrap().clone(), vec!["unknown"]);
}

#[test]
fn export_and_broadcast_report_back() {
    let (engine, events) = spawn(Arc::new(StubBackend::default()));

    engine.broadcast(true);
    match next_event(&events) {
        EngineEvent::BroadcastFinished(report) => {
            assert!(report.enabled);
            assert_eq!(report.activated, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }

    engine.export(3, Vec::new());
    match next_event(&events) {
        EngineEvent::BackendCompleted { ticket, outcome, .. } => {
            assert_eq!(ticket, 3);
            let receipt = outcome.expect("export ok");
            assert_eq!(receipt.extra.get("recordCount"), Some(&serde_json::json!(0)));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn late_tab_activation_reports_one_tab() {
    let (engine, events) = spawn(Arc::new(StubBackend::default()));

    engine.activate_tab(5, "https://example.com/late".into());
    match next_event(&events) {
        EngineEvent::BroadcastFinished(report) => {
            assert!(report.enabled);
            assert_eq!(report.activated, 1);
            assert_eq!(report.failed, 0);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn manual_scan_failure_is_reported_as_page_scanned() {
    let (engine, events) = spawn(Arc::new(StubBackend::default()));

    engine.scan_active_tab(Some(11));
    match next_event(&events) {
        EngineEvent::PageScanned { request_id, result } => {
            assert_eq!(request_id, Some(11));
            assert_eq!(result.unwrap_err().message, "no active tab");
        }
        other => panic!("unexpected event {other:?}"),
    }
}
