use serde::{Deserialize, Serialize};

/// Coordinator-tracked UI mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    #[serde(rename = "phase1")]
    Idle,
    #[serde(rename = "phase2")]
    AutoScan,
    #[serde(rename = "phase3")]
    Manual,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "phase1",
            Phase::AutoScan => "phase2",
            Phase::Manual => "phase3",
        }
    }
}

/// Persisted session flags, owned by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub auto_scan_enabled: bool,
    pub current_phase: Phase,
}

impl SessionState {
    /// Auto-scan data is only forwarded while auto-scan is on and the UI is in phase 2.
    pub fn accepts_auto_scan_data(&self) -> bool {
        self.auto_scan_enabled && self.current_phase == Phase::AutoScan
    }
}
