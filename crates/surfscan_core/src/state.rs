use std::collections::BTreeMap;

use crate::view_model::{AppViewModel, ResultRowView, RECENT_ROWS};
use crate::{
    Phase, RequestId, ResultLog, ScanRecord, SessionState, StoredResult, Ticket,
};

/// Why a ticket was issued, resolved when the backend answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pending {
    Auto {
        record: ScanRecord,
        tab_url: Option<String>,
    },
    Manual {
        record: ScanRecord,
        request_id: Option<RequestId>,
    },
    Export {
        request_id: Option<RequestId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    session: SessionState,
    results: ResultLog,
    pending: BTreeMap<Ticket, Pending>,
    next_ticket: Ticket,
    manual_preview: Option<ScanRecord>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            session: SessionState::default(),
            results: ResultLog::default(),
            pending: BTreeMap::new(),
            next_ticket: 1,
            manual_preview: None,
            dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn results(&self) -> &ResultLog {
        &self.results
    }

    pub fn results_snapshot(&self) -> Vec<StoredResult> {
        self.results.snapshot()
    }

    pub fn manual_preview(&self) -> Option<&ScanRecord> {
        self.manual_preview.as_ref()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            session: self.session,
            result_count: self.results.len(),
            recent: self
                .results
                .recent(RECENT_ROWS)
                .map(ResultRowView::from)
                .collect(),
            manual_preview: self.manual_preview.clone(),
            in_flight: self.pending.len(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_session(&mut self, session: SessionState) {
        if self.session != session {
            self.session = session;
            self.dirty = true;
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        let mut session = self.session;
        session.current_phase = phase;
        self.set_session(session);
    }

    pub(crate) fn set_manual_preview(&mut self, preview: Option<ScanRecord>) {
        self.manual_preview = preview;
        self.dirty = true;
    }

    pub(crate) fn replace_results(&mut self, results: ResultLog) {
        self.results = results;
        self.dirty = true;
    }

    pub(crate) fn append_result(&mut self, result: StoredResult) -> usize {
        self.dirty = true;
        self.results.push(result)
    }

    pub(crate) fn clear_results(&mut self) {
        self.results.clear();
        self.dirty = true;
    }

    pub(crate) fn issue_ticket(&mut self, pending: Pending) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.insert(ticket, pending);
        self.dirty = true;
        ticket
    }

    pub(crate) fn resolve_ticket(&mut self, ticket: Ticket) -> Option<Pending> {
        let pending = self.pending.remove(&ticket);
        if pending.is_some() {
            self.dirty = true;
        }
        pending
    }
}
