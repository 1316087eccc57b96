use futures_util::future::join_all;
use surfscan_core::{is_scannable_url, ScanFailure, ScanRecord};
pub use surfscan_core::TabId;
use surfscan_logging::{scan_debug, scan_error, scan_info, scan_warn};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    #[error("tab {0} not found")]
    TabNotFound(TabId),
    #[error("no active tab")]
    NoActiveTab,
    #[error("cannot access tab {tab_id}: {reason}")]
    Denied { tab_id: TabId, reason: String },
    #[error("tab {tab_id} did not answer: {reason}")]
    NoResponse { tab_id: TabId, reason: String },
    #[error("tab host unavailable: {0}")]
    HostUnavailable(String),
}

/// The browser side: enumerates tabs and talks to the extractor inside them.
#[async_trait::async_trait]
pub trait TabHost: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, InjectionError>;
    async fn active_tab(&self) -> Result<TabInfo, InjectionError>;
    /// Attaches the page extractor; a tab that already has one succeeds.
    async fn inject_extractor(&self, tab: &TabInfo) -> Result<(), InjectionError>;
    async fn set_auto_scan(&self, tab: &TabInfo, enabled: bool) -> Result<(), InjectionError>;
    async fn scan_tab(&self, tab: &TabInfo) -> Result<ScanRecord, InjectionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    pub enabled: bool,
    pub activated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Tells every http(s) tab to start or stop auto-scanning.
///
/// Tabs are handled independently: a failing tab is logged and counted and
/// never prevents the others from being reached.
pub async fn broadcast_auto_scan(host: &dyn TabHost, enabled: bool) -> BroadcastReport {
    let mut report = BroadcastReport {
        enabled,
        ..BroadcastReport::default()
    };

    let tabs = match host.list_tabs().await {
        Ok(tabs) => tabs,
        Err(err) => {
            scan_error!("Cannot enumerate tabs: {}", err);
            return report;
        }
    };

    let (targets, skipped): (Vec<_>, Vec<_>) =
        tabs.into_iter().partition(|tab| is_scannable_url(&tab.url));
    report.skipped = skipped.len();

    let outcomes = join_all(targets.iter().map(|tab| reach_tab(host, tab, enabled))).await;
    for (tab, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            Ok(()) => report.activated += 1,
            Err(err) => {
                scan_warn!("Cannot reach tab {} ({}): {}", tab.id, tab.url, err);
                report.failed += 1;
            }
        }
    }

    scan_info!(
        "Auto-scan {} sent to {} tabs, {} failed, {} skipped",
        if enabled { "enable" } else { "disable" },
        report.activated,
        report.failed,
        report.skipped
    );
    report
}

/// Switches auto-scan on in a single tab that appeared after the last
/// broadcast. The report counts that one tab.
pub async fn activate_tab(host: &dyn TabHost, tab: &TabInfo) -> BroadcastReport {
    let mut report = BroadcastReport {
        enabled: true,
        ..BroadcastReport::default()
    };
    if !is_scannable_url(&tab.url) {
        report.skipped = 1;
        return report;
    }
    match reach_tab(host, tab, true).await {
        Ok(()) => report.activated = 1,
        Err(err) => {
            scan_warn!("Cannot activate tab {} ({}): {}", tab.id, tab.url, err);
            report.failed = 1;
        }
    }
    report
}

async fn reach_tab(host: &dyn TabHost, tab: &TabInfo, enabled: bool) -> Result<(), InjectionError> {
    if enabled {
        host.inject_extractor(tab).await?;
    }
    host.set_auto_scan(tab, enabled).await
}

/// Manual scans also accept local files, unlike auto-scan.
pub fn is_manually_scannable(url: &str) -> bool {
    is_scannable_url(url) || url.trim_start().starts_with("file://")
}

/// Extracts the active tab for a manual scan.
pub async fn scan_active_tab(host: &dyn TabHost) -> Result<ScanRecord, ScanFailure> {
    let tab = host.active_tab().await.map_err(|err| ScanFailure {
        tab_url: None,
        message: err.to_string(),
    })?;

    if !is_manually_scannable(&tab.url) {
        return Err(ScanFailure {
            tab_url: Some(tab.url),
            message: "Cannot scan this page. Please navigate to a valid website.".to_string(),
        });
    }

    if let Err(err) = host.inject_extractor(&tab).await {
        scan_debug!("Extractor injection into tab {}: {}", tab.id, err);
    }

    host.scan_tab(&tab).await.map_err(|err| ScanFailure {
        tab_url: Some(tab.url.clone()),
        message: err.to_string(),
    })
}
