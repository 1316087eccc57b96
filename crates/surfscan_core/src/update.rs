use surfscan_logging::{scan_debug, scan_info, scan_warn};

use crate::state::Pending;
use crate::{
    is_scannable_url, AppState, BackendOutcome, BackendStatus, Effect, Msg, Phase, Reply, RequestId, ResultLog,
    ScanRecord, ScanSource, SessionState, StoredResult, Ticket,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ToggleAutoScan {
            enabled,
            request_id,
        } => toggle_auto_scan(&mut state, enabled, request_id),
        Msg::AutoScanData { record, tab_url } => {
            let session = state.session();
            if !session.accepts_auto_scan_data() {
                scan_debug!(
                    "Auto-scan data ignored (enabled={}, phase={}) from {:?}",
                    session.auto_scan_enabled,
                    session.current_phase.as_str(),
                    tab_url
                );
                return (state, Vec::new());
            }
            scan_info!("Received auto-scan data from {:?}", tab_url);
            let source_url = tab_url.clone();
            let ticket = state.issue_ticket(Pending::Auto {
                record: record.clone(),
                tab_url,
            });
            vec![Effect::SubmitToBackend {
                ticket,
                record,
                source_url,
            }]
        }
        Msg::GetAutoScanState { request_id } => {
            let session = state.session();
            vec![reply(
                request_id,
                Reply::AutoScanState {
                    enabled: session.auto_scan_enabled,
                    phase: session.current_phase,
                },
            )]
        }
        Msg::ManualScanClicked { request_id } => match state.session().current_phase {
            Phase::Idle => {
                state.set_phase(Phase::Manual);
                state.set_manual_preview(None);
                vec![
                    Effect::PersistSession(state.session()),
                    reply(request_id, Reply::Ack),
                ]
            }
            Phase::Manual => vec![reply(request_id, Reply::Ack)],
            Phase::AutoScan => vec![reply(
                request_id,
                Reply::failed("Stop auto-scan before starting a manual scan"),
            )],
        },
        Msg::BackClicked { request_id } => {
            if state.session().current_phase == Phase::Manual {
                state.set_phase(Phase::Idle);
                state.set_manual_preview(None);
                vec![
                    Effect::PersistSession(state.session()),
                    reply(request_id, Reply::Ack),
                ]
            } else {
                vec![reply(request_id, Reply::Ack)]
            }
        }
        Msg::ScanPage { request_id } => {
            if state.session().current_phase == Phase::Manual {
                vec![Effect::ScanActiveTab { request_id }]
            } else {
                vec![reply(
                    request_id,
                    Reply::failed("Manual scan mode is not active"),
                )]
            }
        }
        Msg::PageScanned { request_id, result } => {
            let in_manual = state.session().current_phase == Phase::Manual;
            match result {
                Ok(record) => {
                    if in_manual {
                        state.set_manual_preview(Some(record.clone()));
                    }
                    vec![reply(request_id, Reply::Scanned { record })]
                }
                Err(failure) => {
                    scan_warn!("Scan failed: {}", failure.message);
                    if in_manual {
                        // Saving stays possible with an all-"null" record.
                        let url = failure.tab_url.unwrap_or_default();
                        state.set_manual_preview(Some(ScanRecord::placeholder(url)));
                    }
                    vec![reply(
                        request_id,
                        Reply::failed(format!("Scan failed: {}", failure.message)),
                    )]
                }
            }
        }
        Msg::SendToBackend { request_id, record } => {
            let Some(record) = record.or_else(|| state.manual_preview().cloned()) else {
                return (state, vec![reply(request_id, Reply::failed("No data to save"))]);
            };
            let source_url = crate::is_scannable_url(&record.url).then(|| record.url.clone());
            let ticket = state.issue_ticket(Pending::Manual {
                record: record.clone(),
                request_id,
            });
            vec![Effect::SubmitToBackend {
                ticket,
                record,
                source_url,
            }]
        }
        Msg::BackendCompleted {
            ticket,
            outcome,
            completed_at,
        } => backend_completed(&mut state, ticket, outcome, completed_at),
        Msg::ExportClicked { request_id } => {
            if state.results().is_empty() {
                vec![reply(request_id, Reply::failed("No data to export"))]
            } else {
                let results = state.results_snapshot();
                scan_info!("Exporting {} stored results", results.len());
                let ticket = state.issue_ticket(Pending::Export { request_id });
                vec![Effect::ExportResults { ticket, results }]
            }
        }
        Msg::ClearResults { request_id } => {
            state.clear_results();
            vec![
                Effect::PersistResults(Vec::new()),
                reply(request_id, Reply::Ack),
            ]
        }
        Msg::BroadcastFinished {
            enabled,
            activated,
            failed,
        } => {
            scan_info!(
                "Auto-scan {} broadcast reached {} tabs ({} failed)",
                if enabled { "enable" } else { "disable" },
                activated,
                failed
            );
            Vec::new()
        }
        Msg::TabNavigated { tab_id, url } => {
            // Tabs that show up after a toggle or a restore missed the broadcast.
            if state.session().accepts_auto_scan_data() && is_scannable_url(&url) {
                scan_debug!("Activating auto-scan in new document of tab {}", tab_id);
                vec![Effect::ActivateTab { tab_id, url }]
            } else {
                Vec::new()
            }
        }
        Msg::RestoreSession { session, results } => restore(&mut state, session, results),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn reply(request_id: Option<RequestId>, reply: Reply) -> Effect {
    Effect::Reply { request_id, reply }
}

fn toggle_auto_scan(
    state: &mut AppState,
    enabled: bool,
    request_id: Option<RequestId>,
) -> Vec<Effect> {
    let before = state.session();
    if enabled && before.current_phase == Phase::Manual {
        return vec![reply(
            request_id,
            Reply::failed("Leave manual scan mode before starting auto-scan"),
        )];
    }

    let after = if enabled {
        SessionState {
            auto_scan_enabled: true,
            current_phase: Phase::AutoScan,
        }
    } else {
        SessionState {
            auto_scan_enabled: false,
            current_phase: match before.current_phase {
                Phase::AutoScan => Phase::Idle,
                other => other,
            },
        }
    };
    scan_info!("Auto-scan {}", if enabled { "enabled" } else { "disabled" });

    let mut effects = Vec::with_capacity(3);
    if after != before {
        state.set_session(after);
        effects.push(Effect::PersistSession(after));
    }
    // Re-enabling while running still reaches tabs opened since the last broadcast.
    if enabled || before.auto_scan_enabled {
        effects.push(Effect::SetTabsAutoScan { enabled });
    }
    effects.push(reply(request_id, Reply::Ack));
    effects
}

fn backend_completed(
    state: &mut AppState,
    ticket: Ticket,
    outcome: BackendOutcome,
    completed_at: String,
) -> Vec<Effect> {
    let Some(pending) = state.resolve_ticket(ticket) else {
        scan_warn!("Completion for unknown ticket {}", ticket);
        return Vec::new();
    };

    match pending {
        Pending::Auto { record, tab_url } => {
            if let Err(error) = &outcome {
                scan_warn!("Auto-scan submission failed: {}", error);
            }
            let result = stored_result(record, completed_at, tab_url, &outcome, ScanSource::Auto);
            append_and_notify(state, result, outcome)
        }
        // Manual saves only land in the log once the backend accepted them.
        Pending::Manual { record, request_id } => match &outcome {
            Ok(receipt) => {
                let done = reply(
                    request_id,
                    Reply::Submitted {
                        receipt: receipt.clone(),
                    },
                );
                let result = stored_result(record, completed_at, None, &outcome, ScanSource::Manual);
                let mut effects = append_and_notify(state, result, outcome);
                effects.push(done);
                effects
            }
            Err(error) => {
                scan_warn!("Manual save failed: {}", error);
                vec![reply(request_id, Reply::failed(error.as_str()))]
            }
        },
        Pending::Export { request_id } => match outcome {
            Ok(receipt) => vec![reply(request_id, Reply::Exported { receipt })],
            Err(error) => {
                scan_warn!("Export failed: {}", error);
                vec![reply(request_id, Reply::Failed { error })]
            }
        },
    }
}

fn stored_result(
    record: ScanRecord,
    timestamp: String,
    tab_url: Option<String>,
    outcome: &BackendOutcome,
    source: ScanSource,
) -> StoredResult {
    let (backend_status, backend_error) = match outcome {
        Ok(_) => (BackendStatus::Sent, None),
        Err(error) => (BackendStatus::Failed, Some(error.clone())),
    };
    StoredResult {
        record,
        timestamp,
        tab_url,
        backend_status,
        backend_error,
        source: Some(source),
    }
}

fn append_and_notify(
    state: &mut AppState,
    result: StoredResult,
    outcome: BackendOutcome,
) -> Vec<Effect> {
    let evicted = state.append_result(result.clone());
    if evicted > 0 {
        scan_debug!("Result log full; dropped {} oldest entries", evicted);
    }
    vec![
        Effect::PersistResults(state.results_snapshot()),
        Effect::NotifyNewScanData { result, outcome },
    ]
}

fn restore(state: &mut AppState, session: SessionState, results: Vec<StoredResult>) -> Vec<Effect> {
    // An enabled flag wins over a stale phase, as the popup did on open.
    let session = if session.auto_scan_enabled {
        SessionState {
            auto_scan_enabled: true,
            current_phase: Phase::AutoScan,
        }
    } else if session.current_phase == Phase::AutoScan {
        SessionState {
            auto_scan_enabled: false,
            current_phase: Phase::Idle,
        }
    } else {
        session
    };
    state.set_session(session);
    state.replace_results(ResultLog::from_entries(results));
    scan_info!(
        "Restored session (enabled={}, phase={}, results={})",
        session.auto_scan_enabled,
        session.current_phase.as_str(),
        state.results().len()
    );

    if session.auto_scan_enabled {
        vec![Effect::SetTabsAutoScan { enabled: true }]
    } else {
        Vec::new()
    }
}
