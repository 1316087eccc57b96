use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use surfscan_core::ScanRecord;
use surfscan_logging::{scan_debug, scan_trace};
use tokio::task::JoinHandle;

/// Wait after an in-page navigation before extracting.
pub const NAVIGATION_SETTLE_DELAY: Duration = Duration::from_millis(2000);
/// Wait after auto-scan is switched on for a tab.
pub const ACTIVATION_DELAY: Duration = Duration::from_millis(1000);
/// Wait after a full page load when auto-scan was already on.
pub const PAGE_LOAD_DELAY: Duration = Duration::from_millis(2000);

/// Produces a record from the current document. Never fails: unavailable
/// fields come back as empty strings.
pub trait PageExtractor: Send + Sync {
    fn extract(&self) -> ScanRecord;
}

/// Receives `auto_scan_data` emitted by the page.
pub trait ScanSink: Send + Sync {
    fn auto_scan_data(&self, record: ScanRecord);
}

struct Inner {
    extractor: Arc<dyn PageExtractor>,
    sink: Arc<dyn ScanSink>,
    enabled: AtomicBool,
}

impl Inner {
    fn emit_if_enabled(&self) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        let record = self.extractor.extract();
        if record.is_worth_sending() {
            self.sink.auto_scan_data(record);
        } else {
            scan_trace!("Nothing worth sending on {}", record.url);
        }
    }
}

/// Page-side auto-scan driver.
///
/// Re-extracts after single-page-app navigations once the page had time to
/// render. A newer trigger replaces a pending one, so a burst of URL changes
/// yields a single scan. Must be used inside a tokio runtime.
pub struct NavigationWatcher {
    inner: Arc<Inner>,
    current_url: Mutex<String>,
    pending: Mutex<Option<JoinHandle<()>>>,
    settle_delay: Duration,
}

impl NavigationWatcher {
    pub fn new(
        extractor: Arc<dyn PageExtractor>,
        sink: Arc<dyn ScanSink>,
        initial_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                extractor,
                sink,
                enabled: AtomicBool::new(false),
            }),
            current_url: Mutex::new(initial_url.into()),
            pending: Mutex::new(None),
            settle_delay: NAVIGATION_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Handles the coordinator's activation command.
    pub fn set_auto_scan(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
        if enabled {
            self.schedule(ACTIVATION_DELAY);
        } else {
            self.cancel_pending();
        }
    }

    /// Handles the load event, with the answer of the `get_auto_scan_state` query.
    pub fn page_loaded(&self, auto_scan_enabled: bool) {
        if auto_scan_enabled {
            self.inner.enabled.store(true, Ordering::Release);
            self.schedule(PAGE_LOAD_DELAY);
        }
    }

    /// Called on every DOM mutation with the current location.
    pub fn url_changed(&self, url: &str) {
        {
            let mut current = match self.current_url.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *current == url {
                return;
            }
            *current = url.to_string();
        }
        scan_debug!("URL changed to {}", url);
        if self.is_enabled() {
            self.schedule(self.settle_delay);
        }
    }

    /// Extracts immediately, for `scan_page`. Ignores the auto-scan flag.
    pub fn scan_now(&self) -> ScanRecord {
        self.inner.extractor.extract()
    }

    fn schedule(&self, delay: Duration) {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.emit_if_enabled();
        });
        if let Some(previous) = self.lock_pending().replace(task) {
            previous.abort();
        }
    }

    fn cancel_pending(&self) {
        if let Some(previous) = self.lock_pending().take() {
            previous.abort();
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for NavigationWatcher {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
