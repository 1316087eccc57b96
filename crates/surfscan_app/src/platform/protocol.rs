//! Line protocol spoken with the browser-side shim.
//!
//! One JSON object per line in both directions. Every object carries an
//! `action` tag; requests may carry a numeric `id` that is echoed on the
//! matching `response`.

use serde::{Deserialize, Serialize};
use surfscan_core::{
    BackendOutcome, BackendReceipt, Msg, Phase, Reply, RequestId, ScanRecord, StoredResult,
};
use surfscan_engine::TabId;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub body: Inbound,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Inbound {
    ToggleAutoScan {
        enabled: bool,
    },
    StartAutoScan,
    StopAutoScan,
    AutoScanData {
        data: ScanRecord,
        #[serde(default)]
        tab_url: Option<String>,
    },
    GetAutoScanState,
    SendToBackend {
        #[serde(default)]
        data: Option<ScanRecord>,
    },
    ScanPage,
    ManualScan,
    Back,
    ExportResults,
    ClearResults,
    TabUpdated {
        tab_id: TabId,
        url: String,
        #[serde(default)]
        active: bool,
        #[serde(default)]
        has_extractor: bool,
    },
    TabRemoved {
        tab_id: TabId,
    },
    ScanResult {
        scan_id: u64,
        #[serde(default)]
        data: Option<ScanRecord>,
        #[serde(default)]
        error: Option<String>,
    },
    InjectResult {
        inject_id: u64,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Browser-side bookkeeping, applied by the tab host.
#[derive(Debug, Clone, PartialEq)]
pub enum TabEvent {
    Updated {
        tab_id: TabId,
        url: String,
        active: bool,
        has_extractor: bool,
    },
    Removed {
        tab_id: TabId,
    },
    /// `Ok(None)`: the page answered without data.
    ScanResult {
        scan_id: u64,
        result: Result<Option<ScanRecord>, String>,
    },
    InjectResult {
        inject_id: u64,
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Coordinator(Msg),
    Tabs(TabEvent),
}

impl Envelope {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Best-effort `id` of a line that failed to parse, so the error can be
    /// answered on the right request.
    pub fn salvage_id(line: &str) -> Option<RequestId> {
        serde_json::from_str::<serde_json::Value>(line)
            .ok()?
            .get("id")?
            .as_u64()
    }

    pub fn into_route(self) -> Route {
        let request_id = self.id;
        let msg = match self.body {
            Inbound::ToggleAutoScan { enabled } => Msg::ToggleAutoScan {
                enabled,
                request_id,
            },
            Inbound::StartAutoScan => Msg::ToggleAutoScan {
                enabled: true,
                request_id,
            },
            Inbound::StopAutoScan => Msg::ToggleAutoScan {
                enabled: false,
                request_id,
            },
            Inbound::AutoScanData { data, tab_url } => Msg::AutoScanData {
                record: data,
                tab_url,
            },
            Inbound::GetAutoScanState => Msg::GetAutoScanState { request_id },
            Inbound::SendToBackend { data } => Msg::SendToBackend {
                request_id,
                record: data,
            },
            Inbound::ScanPage => Msg::ScanPage { request_id },
            Inbound::ManualScan => Msg::ManualScanClicked { request_id },
            Inbound::Back => Msg::BackClicked { request_id },
            Inbound::ExportResults => Msg::ExportClicked { request_id },
            Inbound::ClearResults => Msg::ClearResults { request_id },
            Inbound::TabUpdated {
                tab_id,
                url,
                active,
                has_extractor,
            } => {
                return Route::Tabs(TabEvent::Updated {
                    tab_id,
                    url,
                    active,
                    has_extractor,
                })
            }
            Inbound::TabRemoved { tab_id } => return Route::Tabs(TabEvent::Removed { tab_id }),
            Inbound::ScanResult {
                scan_id,
                data,
                error,
            } => {
                let result = match error {
                    Some(error) => Err(error),
                    None => Ok(data),
                };
                return Route::Tabs(TabEvent::ScanResult { scan_id, result });
            }
            Inbound::InjectResult { inject_id, error } => {
                return Route::Tabs(TabEvent::InjectResult {
                    inject_id,
                    result: error.map_or(Ok(()), Err),
                });
            }
        };
        Route::Coordinator(msg)
    }
}

/// `backendResult` as the popup expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<BackendReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BackendOutcome> for BackendResult {
    fn from(outcome: BackendOutcome) -> Self {
        match outcome {
            Ok(receipt) => Self {
                success: true,
                result: Some(receipt),
                error: None,
            },
            Err(error) => Self {
                success: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Outbound {
    Response {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        enabled: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        phase: Option<Phase>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<ScanRecord>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<BackendReceipt>,
    },
    NewScanData {
        data: StoredResult,
        backend_result: BackendResult,
    },
    InjectExtractor {
        tab_id: TabId,
        inject_id: u64,
    },
    SetAutoScan {
        tab_id: TabId,
        enabled: bool,
    },
    ScanPage {
        tab_id: TabId,
        scan_id: u64,
    },
}

impl Outbound {
    fn success(id: Option<RequestId>) -> Self {
        Outbound::Response {
            id,
            success: true,
            error: None,
            enabled: None,
            phase: None,
            data: None,
            result: None,
        }
    }

    pub fn failure(id: Option<RequestId>, error: impl Into<String>) -> Self {
        Outbound::Response {
            id,
            success: false,
            error: Some(error.into()),
            enabled: None,
            phase: None,
            data: None,
            result: None,
        }
    }

    pub fn from_reply(id: Option<RequestId>, reply: Reply) -> Self {
        let mut response = Self::success(id);
        if let Outbound::Response {
            enabled: enabled_slot,
            phase: phase_slot,
            data: data_slot,
            result: result_slot,
            ..
        } = &mut response
        {
            match reply {
                Reply::Ack => {}
                Reply::AutoScanState { enabled, phase } => {
                    *enabled_slot = Some(enabled);
                    *phase_slot = Some(phase);
                }
                Reply::Scanned { record } => *data_slot = Some(record),
                Reply::Submitted { receipt } | Reply::Exported { receipt } => {
                    *result_slot = Some(receipt)
                }
                Reply::Failed { error } => return Self::failure(id, error),
            }
        }
        response
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
