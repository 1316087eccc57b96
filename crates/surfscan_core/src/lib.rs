//! SurfScan core: the relay coordinator as a pure state machine, plus the
//! scan data model shared with the engine and the host.
mod effect;
mod msg;
mod record;
mod results;
mod session;
mod state;
mod update;
mod view_model;

pub use effect::{BackendOutcome, BackendReceipt, Effect, Reply};
pub use msg::{Msg, RequestId, ScanFailure, TabId, Ticket};
pub use record::{
    is_scannable_url, ScanRecord, ValidationError, FIELD_NAMES, NULL_SENTINEL, REQUIRED_FIELDS,
};
pub use results::{BackendStatus, ResultLog, ScanSource, StoredResult, MAX_STORED_RESULTS};
pub use session::{Phase, SessionState};
pub use state::AppState;
pub use update::update;
pub use view_model::{AppViewModel, ResultRowView, RECENT_ROWS};
