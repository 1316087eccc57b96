//! Tab host backed by the browser-side shim.
//!
//! The shim reports tab lifecycle with `tab_updated`/`tab_removed`. Commands
//! for a tab go out on stdout; injection and scan requests are answered with
//! `inject_result` and `scan_result` carrying the request's id.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex, MutexGuard};
use std::time::Duration;

use surfscan_core::ScanRecord;
use surfscan_engine::{InjectionError, TabHost, TabId, TabInfo};
use surfscan_logging::{scan_debug, scan_warn};
use tokio::sync::oneshot;

use super::protocol::{Outbound, TabEvent};

pub(crate) const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct TabEntry {
    url: String,
    active: bool,
    /// Only set once the shim confirmed the extractor is present.
    has_extractor: bool,
}

type Reply<T> = Result<T, String>;

/// Requests waiting for the shim, keyed by the id sent along with them.
struct Waiting<T> {
    next_id: AtomicU64,
    senders: Mutex<HashMap<u64, oneshot::Sender<Reply<T>>>>,
}

impl<T> Waiting<T> {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            senders: Mutex::new(HashMap::new()),
        }
    }

    fn open(&self) -> (u64, oneshot::Receiver<Reply<T>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.senders).insert(id, tx);
        (id, rx)
    }

    fn resolve(&self, id: u64, reply: Reply<T>) -> bool {
        match lock(&self.senders).remove(&id) {
            Some(tx) => {
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    fn forget(&self, id: u64) {
        lock(&self.senders).remove(&id);
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        lock(&self.senders).is_empty()
    }
}

pub(crate) struct StdioTabHost {
    tabs: Mutex<BTreeMap<TabId, TabEntry>>,
    injections: Waiting<()>,
    scans: Waiting<Option<ScanRecord>>,
    outbound: mpsc::Sender<Outbound>,
    reply_timeout: Duration,
}

impl StdioTabHost {
    pub(crate) fn new(outbound: mpsc::Sender<Outbound>, reply_timeout: Duration) -> Self {
        Self {
            tabs: Mutex::new(BTreeMap::new()),
            injections: Waiting::new(),
            scans: Waiting::new(),
            outbound,
            reply_timeout,
        }
    }

    /// Applies a shim report. Returns true when a tab now shows a document
    /// the relay has not seen yet (new tab or changed URL).
    pub(crate) fn apply(&self, event: TabEvent) -> bool {
        match event {
            TabEvent::Updated {
                tab_id,
                url,
                active,
                has_extractor,
            } => {
                let mut tabs = lock(&self.tabs);
                if active {
                    for entry in tabs.values_mut() {
                        entry.active = false;
                    }
                }
                let new_document = tabs.get(&tab_id).map_or(true, |entry| entry.url != url);
                let entry = tabs.entry(tab_id).or_insert_with(|| TabEntry {
                    url: url.clone(),
                    active,
                    has_extractor: false,
                });
                if new_document {
                    entry.has_extractor = false;
                }
                entry.url = url;
                entry.active = active;
                entry.has_extractor |= has_extractor;
                new_document
            }
            TabEvent::Removed { tab_id } => {
                lock(&self.tabs).remove(&tab_id);
                false
            }
            TabEvent::ScanResult { scan_id, result } => {
                if !self.scans.resolve(scan_id, result) {
                    scan_debug!("Dropping late scan result {}", scan_id);
                }
                false
            }
            TabEvent::InjectResult { inject_id, result } => {
                if !self.injections.resolve(inject_id, result) {
                    scan_debug!("Dropping late injection result {}", inject_id);
                }
                false
            }
        }
    }

    fn send(&self, command: Outbound) -> Result<(), InjectionError> {
        self.outbound
            .send(command)
            .map_err(|_| InjectionError::HostUnavailable("stdout writer closed".into()))
    }

    fn known(&self, tab: &TabInfo) -> Result<TabEntry, InjectionError> {
        lock(&self.tabs)
            .get(&tab.id)
            .cloned()
            .ok_or(InjectionError::TabNotFound(tab.id))
    }

    /// Sends `command` and waits for the matching answer.
    async fn round_trip<T>(
        &self,
        waiting: &Waiting<T>,
        tab: &TabInfo,
        command: impl FnOnce(u64) -> Outbound,
    ) -> Result<Reply<T>, InjectionError> {
        let (id, reply_rx) = waiting.open();
        if let Err(err) = self.send(command(id)) {
            waiting.forget(id);
            return Err(err);
        }

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(InjectionError::NoResponse {
                tab_id: tab.id,
                reason: "request dropped".into(),
            }),
            Err(_) => {
                waiting.forget(id);
                scan_warn!("Request {} to tab {} timed out", id, tab.id);
                Err(InjectionError::NoResponse {
                    tab_id: tab.id,
                    reason: format!("timed out after {} ms", self.reply_timeout.as_millis()),
                })
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl TabHost for StdioTabHost {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, InjectionError> {
        Ok(lock(&self.tabs)
            .iter()
            .map(|(id, entry)| TabInfo {
                id: *id,
                url: entry.url.clone(),
            })
            .collect())
    }

    async fn active_tab(&self) -> Result<TabInfo, InjectionError> {
        lock(&self.tabs)
            .iter()
            .find(|(_, entry)| entry.active)
            .map(|(id, entry)| TabInfo {
                id: *id,
                url: entry.url.clone(),
            })
            .ok_or(InjectionError::NoActiveTab)
    }

    async fn inject_extractor(&self, tab: &TabInfo) -> Result<(), InjectionError> {
        if self.known(tab)?.has_extractor {
            return Ok(());
        }
        let tab_id = tab.id;
        self.round_trip(&self.injections, tab, |inject_id| Outbound::InjectExtractor {
            tab_id,
            inject_id,
        })
        .await?
        .map_err(|reason| InjectionError::Denied { tab_id, reason })?;

        if let Some(entry) = lock(&self.tabs).get_mut(&tab_id) {
            if entry.url == tab.url {
                entry.has_extractor = true;
            }
        }
        Ok(())
    }

    async fn set_auto_scan(&self, tab: &TabInfo, enabled: bool) -> Result<(), InjectionError> {
        self.known(tab)?;
        self.send(Outbound::SetAutoScan {
            tab_id: tab.id,
            enabled,
        })
    }

    async fn scan_tab(&self, tab: &TabInfo) -> Result<ScanRecord, InjectionError> {
        let entry = self.known(tab)?;
        let tab_id = tab.id;
        let reply = self
            .round_trip(&self.scans, tab, |scan_id| Outbound::ScanPage { tab_id, scan_id })
            .await?;
        match reply {
            Ok(Some(record)) => Ok(record),
            // The page answered but found nothing; the user may still fill in and save.
            Ok(None) => Ok(ScanRecord::placeholder(entry.url)),
            Err(reason) => Err(InjectionError::NoResponse { tab_id, reason }),
        }
    }
}
