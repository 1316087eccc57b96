use serde::{Deserialize, Serialize};

use crate::{Phase, RequestId, ScanRecord, SessionState, StoredResult, TabId, Ticket};

/// What the backend answered to a successful request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendReceipt {
    /// The server's `fileId`; a numeric id is carried as its decimal text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Remaining fields of the server's JSON reply, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `Err` holds the message shown to the user and stored as `backendError`.
pub type BackendOutcome = Result<BackendReceipt, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PersistSession(SessionState),
    PersistResults(Vec<StoredResult>),
    /// Enabling injects the extractor into every http(s) tab first.
    SetTabsAutoScan { enabled: bool },
    /// Injects the extractor into one tab and switches auto-scan on there.
    ActivateTab { tab_id: TabId, url: String },
    ScanActiveTab { request_id: Option<RequestId> },
    SubmitToBackend {
        ticket: Ticket,
        record: ScanRecord,
        source_url: Option<String>,
    },
    ExportResults {
        ticket: Ticket,
        results: Vec<StoredResult>,
    },
    /// Best-effort event for a listening UI.
    NotifyNewScanData {
        result: StoredResult,
        outcome: BackendOutcome,
    },
    Reply {
        request_id: Option<RequestId>,
        reply: Reply,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    AutoScanState { enabled: bool, phase: Phase },
    Scanned { record: ScanRecord },
    Submitted { receipt: BackendReceipt },
    Exported { receipt: BackendReceipt },
    Failed { error: String },
}

impl Reply {
    pub fn failed(error: impl Into<String>) -> Self {
        Reply::Failed {
            error: error.into(),
        }
    }
}
