//! SurfScan engine: backend submission, tab broadcast and the IO worker
//! that executes coordinator effects.
mod backend;
mod engine;
mod page;
mod tabs;
mod types;

pub use backend::{
    BackendClient, BackendError, BackendSettings, ReqwestBackendClient, SubmitPolicy,
    DEFAULT_ENDPOINT, EXTENSION_VERSION_HEADER,
};
pub use engine::EngineHandle;
pub use page::{
    NavigationWatcher, PageExtractor, ScanSink, ACTIVATION_DELAY, NAVIGATION_SETTLE_DELAY,
    PAGE_LOAD_DELAY,
};
pub use tabs::{
    activate_tab, broadcast_auto_scan, is_manually_scannable, scan_active_tab, BroadcastReport,
    InjectionError, TabHost, TabId, TabInfo,
};
pub use types::{Clock, EngineEvent};
