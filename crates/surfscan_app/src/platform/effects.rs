use std::sync::mpsc;
use std::thread;

use surfscan_core::{Effect, Msg};
use surfscan_engine::{EngineEvent, EngineHandle};
use surfscan_logging::{scan_debug, scan_error, scan_info, scan_warn, set_component};

use super::persistence::StateStore;
use super::protocol::Outbound;
use super::HostEvent;

/// Carries coordinator effects out to the engine, the state directory and
/// the shim.
pub struct EffectRunner {
    engine: EngineHandle,
    outbound: mpsc::Sender<Outbound>,
    store: StateStore,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, outbound: mpsc::Sender<Outbound>, store: StateStore) -> Self {
        Self {
            engine,
            outbound,
            store,
        }
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistSession(session) => {
                    if let Err(err) = self.store.save_session(&session) {
                        scan_error!("Failed to persist session: {}", err);
                    }
                }
                Effect::PersistResults(results) => {
                    if let Err(err) = self.store.save_results(&results) {
                        scan_error!("Failed to persist results: {}", err);
                    }
                }
                Effect::SetTabsAutoScan { enabled } => {
                    scan_info!("SetTabsAutoScan enabled={}", enabled);
                    self.engine.broadcast(enabled);
                }
                Effect::ActivateTab { tab_id, url } => {
                    self.engine.activate_tab(tab_id, url);
                }
                Effect::ScanActiveTab { request_id } => {
                    self.engine.scan_active_tab(request_id);
                }
                Effect::SubmitToBackend {
                    ticket,
                    record,
                    source_url,
                } => {
                    scan_info!(
                        "SubmitToBackend ticket={} source={}",
                        ticket,
                        source_url.as_deref().unwrap_or("unknown")
                    );
                    self.engine.submit(ticket, record, source_url);
                }
                Effect::ExportResults { ticket, results } => {
                    scan_info!("ExportResults ticket={} count={}", ticket, results.len());
                    self.engine.export(ticket, results);
                }
                Effect::NotifyNewScanData { result, outcome } => {
                    // Nobody may be listening; the notification is not retried.
                    self.emit(Outbound::NewScanData {
                        data: result,
                        backend_result: outcome.into(),
                    });
                }
                Effect::Reply { request_id, reply } => {
                    self.emit(Outbound::from_reply(request_id, reply));
                }
            }
        }
    }

    fn emit(&self, message: Outbound) {
        if self.outbound.send(message).is_err() {
            scan_debug!("stdout writer gone; dropping outbound message");
        }
    }
}

/// Forwards engine completions to the dispatcher as coordinator messages.
pub(crate) fn spawn_event_pump(
    events: mpsc::Receiver<EngineEvent>,
    host_tx: mpsc::Sender<HostEvent>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("surfscan-engine-events".into())
        .spawn(move || {
            set_component("engine-events");
            while let Ok(event) = events.recv() {
                if host_tx.send(HostEvent::Msg(map_event(event))).is_err() {
                    break;
                }
            }
        })
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::BackendCompleted {
            ticket,
            outcome,
            completed_at,
        } => Msg::BackendCompleted {
            ticket,
            outcome: outcome.map_err(|err| {
                scan_warn!("Backend request {} failed: {}", ticket, err);
                err.to_string()
            }),
            completed_at,
        },
        EngineEvent::BroadcastFinished(report) => Msg::BroadcastFinished {
            enabled: report.enabled,
            activated: report.activated,
            failed: report.failed,
        },
        EngineEvent::PageScanned { request_id, result } => {
            Msg::PageScanned { request_id, result }
        }
    }
}
