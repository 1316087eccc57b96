use std::sync::Arc;

use surfscan_core::{BackendReceipt, RequestId, ScanFailure, ScanRecord, Ticket};

use crate::{BackendError, BroadcastReport};

/// Produces RFC 3339 timestamps; injected so tests control time.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    BackendCompleted {
        ticket: Ticket,
        outcome: Result<BackendReceipt, BackendError>,
        completed_at: String,
    },
    BroadcastFinished(BroadcastReport),
    PageScanned {
        request_id: Option<RequestId>,
        result: Result<ScanRecord, ScanFailure>,
    },
}
