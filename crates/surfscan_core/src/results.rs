use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ScanRecord;

/// Upper bound of the persisted result log.
pub const MAX_STORED_RESULTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Manual,
    Auto,
}

/// One extraction plus what happened when it was relayed to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    #[serde(flatten)]
    pub record: ScanRecord,
    pub timestamp: String,
    #[serde(default)]
    pub tab_url: Option<String>,
    pub backend_status: BackendStatus,
    #[serde(default)]
    pub backend_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ScanSource>,
}

/// FIFO log that drops its oldest entries beyond `capacity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLog {
    entries: VecDeque<StoredResult>,
    capacity: usize,
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::with_capacity(MAX_STORED_RESULTS)
    }
}

impl ResultLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(MAX_STORED_RESULTS)),
            capacity: capacity.max(1),
        }
    }

    /// Rebuilds a log from persisted entries, keeping only the newest `capacity`.
    pub fn from_entries(entries: Vec<StoredResult>) -> Self {
        let mut log = Self::default();
        for entry in entries {
            log.push(entry);
        }
        log
    }

    /// Appends `entry` and returns how many old entries were evicted.
    pub fn push(&mut self, entry: StoredResult) -> usize {
        self.entries.push_back(entry);
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first, as persisted.
    pub fn snapshot(&self) -> Vec<StoredResult> {
        self.entries.iter().cloned().collect()
    }

    /// Newest first, at most `limit` entries.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &StoredResult> {
        self.entries.iter().rev().take(limit)
    }
}
