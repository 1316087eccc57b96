use crate::{BackendStatus, ScanRecord, ScanSource, SessionState, StoredResult};

/// The results table only shows this many of the newest entries.
pub const RECENT_ROWS: usize = 50;

/// Read-only snapshot handed to the UI; never written back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub result_count: usize,
    pub recent: Vec<ResultRowView>,
    pub manual_preview: Option<ScanRecord>,
    pub in_flight: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRowView {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub date: String,
    pub backend_status: BackendStatus,
    pub source: Option<ScanSource>,
}

impl From<&StoredResult> for ResultRowView {
    fn from(result: &StoredResult) -> Self {
        Self {
            title: result.record.title.clone(),
            author: result.record.author.clone(),
            publisher: result.record.publisher.clone(),
            date: result.record.date.clone(),
            backend_status: result.backend_status,
            source: result.source,
        }
    }
}
