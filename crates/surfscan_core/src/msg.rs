use crate::{BackendOutcome, ScanRecord, SessionState, StoredResult};

/// Caller-chosen id echoed back on replies.
pub type RequestId = u64;
/// Coordinator-assigned id of an in-flight backend request.
pub type Ticket = u64;
/// Browser-assigned tab id.
pub type TabId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// UI started (`true`) or stopped (`false`) auto-scan.
    ToggleAutoScan {
        enabled: bool,
        request_id: Option<RequestId>,
    },
    /// A page pushed freshly extracted data.
    AutoScanData {
        record: ScanRecord,
        tab_url: Option<String>,
    },
    /// UI or a freshly loaded page asks whether auto-scan is on.
    GetAutoScanState { request_id: Option<RequestId> },
    /// User clicked Manual Scan.
    ManualScanClicked { request_id: Option<RequestId> },
    /// User left manual scan mode.
    BackClicked { request_id: Option<RequestId> },
    /// User asked to scan the active tab.
    ScanPage { request_id: Option<RequestId> },
    /// The active tab answered a scan request.
    PageScanned {
        request_id: Option<RequestId>,
        result: Result<ScanRecord, ScanFailure>,
    },
    /// User saved a record; `None` sends the cached manual preview.
    SendToBackend {
        request_id: Option<RequestId>,
        record: Option<ScanRecord>,
    },
    /// Engine finished a submission or an export.
    BackendCompleted {
        ticket: Ticket,
        outcome: BackendOutcome,
        completed_at: String,
    },
    /// User clicked Export All.
    ExportClicked { request_id: Option<RequestId> },
    /// User clicked Clear.
    ClearResults { request_id: Option<RequestId> },
    /// Engine finished telling tabs about an auto-scan toggle.
    BroadcastFinished {
        enabled: bool,
        activated: usize,
        failed: usize,
    },
    /// A tab was opened or loaded a new document.
    TabNavigated { tab_id: TabId, url: String },
    /// Restore persisted state at startup.
    RestoreSession {
        session: SessionState,
        results: Vec<StoredResult>,
    },
    /// Periodic tick from the host loop.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}

/// Why the active tab could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub tab_url: Option<String>,
    pub message: String,
}
