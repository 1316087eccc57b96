use std::io::{self, BufRead, Write};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use surfscan_core::{update, AppState, Effect, Msg};
use surfscan_engine::{Clock, EngineHandle, ReqwestBackendClient};
use surfscan_logging::{scan_debug, scan_error, scan_info, scan_warn, set_component};

use super::config::{Cli, RelayConfig};
use super::effects::{spawn_event_pump, EffectRunner};
use super::persistence::StateStore;
use super::protocol::{Envelope, Outbound, Route, TabEvent};
use super::stdio_tabs::StdioTabHost;
use super::HostEvent;

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RelayConfig::from_cli(&cli)?;
    let store = StateStore::new(config.state_dir.clone());
    store
        .prepare()
        .with_context(|| format!("preparing state dir {:?}", store.dir()))?;
    surfscan_logging::initialize(config.log_destination, config.log_level, &config.log_path);
    set_component("coordinator");
    scan_info!(
        "surfscan-relay {} endpoint={} policy={:?} state_dir={:?}",
        env!("CARGO_PKG_VERSION"),
        config.backend.endpoint,
        config.backend.policy,
        config.state_dir
    );

    let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>();
    thread::Builder::new()
        .name("surfscan-stdout".into())
        .spawn(move || {
            set_component("stdout");
            write_lines(outbound_rx, io::stdout().lock());
        })?;

    let tabs = Arc::new(StdioTabHost::new(outbound_tx.clone(), config.scan_timeout));
    let backend = Arc::new(ReqwestBackendClient::new(config.backend.clone())?);
    let clock: Clock = Arc::new(|| Utc::now().to_rfc3339());
    let (engine, engine_events) = EngineHandle::spawn(backend, tabs.clone(), clock)?;

    let (host_tx, host_rx) = mpsc::channel::<HostEvent>();
    spawn_event_pump(engine_events, host_tx.clone())?;

    {
        let host_tx = host_tx.clone();
        let outbound_tx = outbound_tx.clone();
        thread::Builder::new()
            .name("surfscan-stdin".into())
            .spawn(move || {
                set_component("stdin");
                read_lines(io::stdin().lock(), &host_tx, &tabs, &outbound_tx);
                let _ = host_tx.send(HostEvent::Shutdown);
            })?;
    }

    // Status heartbeat; the dispatcher logs a summary only when state moved.
    thread::Builder::new()
        .name("surfscan-tick".into())
        .spawn(move || {
            while host_tx.send(HostEvent::Msg(Msg::Tick)).is_ok() {
                thread::sleep(STATUS_INTERVAL);
            }
        })?;

    let persisted = store.load();
    let mut coordinator = Coordinator::new(EffectRunner::new(engine, outbound_tx, store));
    coordinator.dispatch(Msg::RestoreSession {
        session: persisted.session,
        results: persisted.results,
    });

    while let Ok(event) = host_rx.recv() {
        match event {
            HostEvent::Msg(msg) => coordinator.dispatch(msg),
            HostEvent::Shutdown => break,
        }
    }
    scan_info!("Relay stopped");
    Ok(())
}

/// Sole owner of the coordinator state; every state change and every
/// persisted write goes through `dispatch` on one thread.
struct Coordinator<R: EffectSink> {
    state: AppState,
    sink: R,
}

trait EffectSink {
    fn run(&self, effects: Vec<Effect>);
}

impl EffectSink for EffectRunner {
    fn run(&self, effects: Vec<Effect>) {
        EffectRunner::run(self, effects)
    }
}

impl<R: EffectSink> Coordinator<R> {
    fn new(sink: R) -> Self {
        Self {
            state: AppState::default(),
            sink,
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let is_tick = matches!(msg, Msg::Tick);
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if is_tick && state.consume_dirty() {
            let view = state.view();
            scan_debug!(
                "auto_scan={} phase={} results={} in_flight={}",
                view.session.auto_scan_enabled,
                view.session.current_phase.as_str(),
                view.result_count,
                view.in_flight
            );
        }
        self.state = state;
        self.sink.run(effects);
    }
}

fn read_lines(
    reader: impl BufRead,
    host_tx: &mpsc::Sender<HostEvent>,
    tabs: &StdioTabHost,
    outbound: &mpsc::Sender<Outbound>,
) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                scan_error!("Failed to read from stdin: {}", err);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Envelope::parse(line) {
            Ok(envelope) => match envelope.into_route() {
                Route::Coordinator(msg) => {
                    if host_tx.send(HostEvent::Msg(msg)).is_err() {
                        break;
                    }
                }
                Route::Tabs(event) => {
                    let navigated = match &event {
                        TabEvent::Updated { tab_id, url, .. } => Some((*tab_id, url.clone())),
                        _ => None,
                    };
                    if !tabs.apply(event) {
                        continue;
                    }
                    if let Some((tab_id, url)) = navigated {
                        if host_tx
                            .send(HostEvent::Msg(Msg::TabNavigated { tab_id, url }))
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            },
            Err(err) => {
                scan_warn!("Ignoring malformed message: {}", err);
                let _ = outbound.send(Outbound::failure(
                    Envelope::salvage_id(line),
                    format!("Invalid message: {err}"),
                ));
            }
        }
    }
    scan_info!("stdin closed");
}

fn write_lines(outbound: mpsc::Receiver<Outbound>, mut out: impl Write) {
    while let Ok(message) = outbound.recv() {
        let line = match message.to_line() {
            Ok(line) => line,
            Err(err) => {
                scan_error!("Failed to encode outbound message: {}", err);
                continue;
            }
        };
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            scan_error!("Failed to write to stdout: {}", err);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;
    use surfscan_core::{Phase, Reply, SessionState};

    #[derive(Default)]
    struct Recorded(RefCell<Vec<Effect>>);

    impl EffectSink for &Recorded {
        fn run(&self, effects: Vec<Effect>) {
            self.0.borrow_mut().extend(effects);
        }
    }

    fn tab_host() -> (StdioTabHost, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel();
        (StdioTabHost::new(tx, Duration::from_secs(1)), rx)
    }

    #[test]
    fn dispatcher_threads_state_through_update() {
        let recorded = Recorded::default();
        let mut coordinator = Coordinator::new(&recorded);
        coordinator.dispatch(Msg::ToggleAutoScan {
            enabled: true,
            request_id: Some(1),
        });
        coordinator.dispatch(Msg::GetAutoScanState {
            request_id: Some(2),
        });

        assert_eq!(
            coordinator.state.session(),
            SessionState {
                auto_scan_enabled: true,
                current_phase: Phase::AutoScan,
            }
        );
        assert!(recorded.0.borrow().contains(&Effect::Reply {
            request_id: Some(2),
            reply: Reply::AutoScanState {
                enabled: true,
                phase: Phase::AutoScan,
            },
        }));
    }

    #[test]
    fn tick_clears_dirty_flag() {
        let recorded = Recorded::default();
        let mut coordinator = Coordinator::new(&recorded);
        coordinator.dispatch(Msg::ManualScanClicked { request_id: None });
        coordinator.dispatch(Msg::Tick);
        assert!(!coordinator.state.consume_dirty());
    }

    #[test]
    fn reader_routes_lines_and_answers_garbage() {
        let (host_tx, host_rx) = mpsc::channel();
        let (tabs, _tab_rx) = tab_host();
        let (out_tx, out_rx) = mpsc::channel();
        let input = concat!(
            "{\"id\":1,\"action\":\"get_auto_scan_state\"}\n",
            "\n",
            "{\"action\":\"tab_updated\",\"tabId\":2,\"url\":\"https://e.com\",\"active\":true}\n",
            "{\"id\":5,\"action\":\"nope\"}\n",
        );

        read_lines(Cursor::new(input), &host_tx, &tabs, &out_tx);

        let routed: Vec<_> = host_rx.try_iter().collect();
        assert_eq!(routed.len(), 2);
        assert!(matches!(
            routed[0],
            HostEvent::Msg(Msg::GetAutoScanState {
                request_id: Some(1)
            })
        ));
        assert!(matches!(
            &routed[1],
            HostEvent::Msg(Msg::TabNavigated { tab_id: 2, url }) if url == "https://e.com"
        ));
        match out_rx.try_recv().unwrap() {
            Outbound::Response {
                id, success, error, ..
            } => {
                assert_eq!(id, Some(5));
                assert!(!success);
                assert!(error.unwrap().starts_with("Invalid message"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn repeated_tab_reports_navigate_only_on_new_documents() {
        let (host_tx, host_rx) = mpsc::channel();
        let (tabs, _tab_rx) = tab_host();
        let (out_tx, _out_rx) = mpsc::channel();
        let input = concat!(
            "{\"action\":\"tab_updated\",\"tabId\":3,\"url\":\"https://e.com/a\"}\n",
            "{\"action\":\"tab_updated\",\"tabId\":3,\"url\":\"https://e.com/a\",\"active\":true}\n",
            "{\"action\":\"tab_updated\",\"tabId\":3,\"url\":\"https://e.com/b\"}\n",
            "{\"action\":\"tab_removed\",\"tabId\":3}\n",
        );

        read_lines(Cursor::new(input), &host_tx, &tabs, &out_tx);

        let urls: Vec<_> = host_rx
            .try_iter()
            .map(|event| match event {
                HostEvent::Msg(Msg::TabNavigated { tab_id: 3, url }) => url,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(urls, vec!["https://e.com/a", "https://e.com/b"]);
    }

    #[test]
    fn writer_emits_one_json_object_per_line() {
        let (tx, rx) = mpsc::channel();
        tx.send(Outbound::InjectExtractor {
            tab_id: 1,
            inject_id: 4,
        })
        .unwrap();
        tx.send(Outbound::from_reply(Some(3), Reply::Ack)).unwrap();
        drop(tx);

        let mut buffer = Vec::new();
        write_lines(rx, &mut buffer);
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"action":"inject_extractor","tabId":1,"injectId":4}"#,
                r#"{"action":"response","id":3,"success":true}"#,
            ]
        );
    }
}
