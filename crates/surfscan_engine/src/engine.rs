use std::io;
use std::sync::{mpsc, Arc};
use std::thread;

use surfscan_core::{RequestId, ScanRecord, StoredResult, Ticket};
use surfscan_logging::{scan_debug, set_component};

use crate::tabs::{activate_tab, broadcast_auto_scan, scan_active_tab};
use crate::{BackendClient, Clock, EngineEvent, TabHost, TabId, TabInfo};

enum EngineCommand {
    Submit {
        ticket: Ticket,
        record: ScanRecord,
        source_url: Option<String>,
    },
    Export {
        ticket: Ticket,
        results: Vec<StoredResult>,
    },
    Broadcast {
        enabled: bool,
    },
    ActivateTab {
        tab: TabInfo,
    },
    ScanActiveTab {
        request_id: Option<RequestId>,
    },
}

struct Services {
    backend: Arc<dyn BackendClient>,
    tabs: Arc<dyn TabHost>,
    clock: Clock,
}

/// Handle to the IO worker. Commands run concurrently on a tokio runtime;
/// each one produces exactly one [`EngineEvent`].
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn spawn(
        backend: Arc<dyn BackendClient>,
        tabs: Arc<dyn TabHost>,
        clock: Clock,
    ) -> io::Result<(Self, mpsc::Receiver<EngineEvent>)> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("surfscan-engine")
            .on_thread_start(|| set_component("engine"))
            .build()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let services = Arc::new(Services {
            backend,
            tabs,
            clock,
        });

        thread::Builder::new()
            .name("surfscan-engine-dispatch".into())
            .spawn(move || {
                set_component("engine");
                while let Ok(command) = cmd_rx.recv() {
                    let services = services.clone();
                    let event_tx = event_tx.clone();
                    runtime.spawn(async move {
                        let event = handle_command(&services, command).await;
                        // The host may already be gone during shutdown.
                        let _ = event_tx.send(event);
                    });
                }
                scan_debug!("Engine command channel closed");
            })?;

        Ok((Self { cmd_tx }, event_rx))
    }

    pub fn submit(&self, ticket: Ticket, record: ScanRecord, source_url: Option<String>) {
        self.send(EngineCommand::Submit {
            ticket,
            record,
            source_url,
        });
    }

    pub fn export(&self, ticket: Ticket, results: Vec<StoredResult>) {
        self.send(EngineCommand::Export { ticket, results });
    }

    pub fn broadcast(&self, enabled: bool) {
        self.send(EngineCommand::Broadcast { enabled });
    }

    pub fn activate_tab(&self, tab_id: TabId, url: String) {
        self.send(EngineCommand::ActivateTab {
            tab: TabInfo { id: tab_id, url },
        });
    }

    pub fn scan_active_tab(&self, request_id: Option<RequestId>) {
        self.send(EngineCommand::ScanActiveTab { request_id });
    }

    fn send(&self, command: EngineCommand) {
        let _ = self.cmd_tx.send(command);
    }
}

async fn handle_command(services: &Services, command: EngineCommand) -> EngineEvent {
    match command {
        EngineCommand::Submit {
            ticket,
            record,
            source_url,
        } => {
            let source = source_url.unwrap_or_else(|| "unknown".to_string());
            let timestamp = (services.clock)();
            let outcome = services.backend.submit(&record, &source, &timestamp).await;
            EngineEvent::BackendCompleted {
                ticket,
                outcome,
                completed_at: (services.clock)(),
            }
        }
        EngineCommand::Export { ticket, results } => {
            let timestamp = (services.clock)();
            let outcome = services.backend.export(&results, &timestamp).await;
            EngineEvent::BackendCompleted {
                ticket,
                outcome,
                completed_at: (services.clock)(),
            }
        }
        EngineCommand::Broadcast { enabled } => {
            EngineEvent::BroadcastFinished(broadcast_auto_scan(services.tabs.as_ref(), enabled).await)
        }
        EngineCommand::ActivateTab { tab } => {
            EngineEvent::BroadcastFinished(activate_tab(services.tabs.as_ref(), &tab).await)
        }
        EngineCommand::ScanActiveTab { request_id } => EngineEvent::PageScanned {
            request_id,
            result: scan_active_tab(services.tabs.as_ref()).await,
        },
    }
}
