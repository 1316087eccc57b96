use std::sync::Once;

use pretty_assertions::assert_eq;
use surfscan_core::{update, AppState, Effect, Msg, Phase, Reply, SessionState};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(surfscan_logging::initialize_for_tests);
}

fn toggle(state: AppState, enabled: bool) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::ToggleAutoScan {
            enabled,
            request_id: Some(1),
        },
    )
}

#[test]
fn start_auto_scan_moves_idle_to_phase2_and_broadcasts() {
    init_logging();
    let (mut state, effects) = toggle(AppState::new(), true);

    let expected = SessionState {
        auto_scan_enabled: true,
        current_phase: Phase::AutoScan,
    };
    assert_eq!(state.session(), expected);
    assert!(state.consume_dirty());
    assert_eq!(
        effects,
        vec![
            Effect::PersistSession(expected),
            Effect::SetTabsAutoScan { enabled: true },
            Effect::Reply {
                request_id: Some(1),
                reply: Reply::Ack,
            },
        ]
    );
}

#[test]
fn stop_auto_scan_returns_to_phase1_and_tells_tabs() {
    init_logging();
    let (state, _) = toggle(AppState::new(), true);
    let (state, effects) = toggle(state, false);

    assert_eq!(state.session(), SessionState::default());
    assert_eq!(
        effects,
        vec![
            Effect::PersistSession(SessionState::default()),
            Effect::SetTabsAutoScan { enabled: false },
            Effect::Reply {
                request_id: Some(1),
                reply: Reply::Ack,
            },
        ]
    );
}

#[test]
fn toggle_on_then_off_leaves_log_unchanged() {
    init_logging();
    let before = AppState::new();
    let (state, _) = toggle(before.clone(), true);
    let (state, _) = toggle(state, false);

    assert_eq!(state.session().current_phase, Phase::Idle);
    assert!(!state.session().auto_scan_enabled);
    assert_eq!(state.results_snapshot(), before.results_snapshot());
}

#[test]
fn enabling_twice_rebroadcasts_without_persisting_again() {
    init_logging();
    let (state, _) = toggle(AppState::new(), true);
    let (_state, effects) = toggle(state, true);

    assert_eq!(
        effects,
        vec![
            Effect::SetTabsAutoScan { enabled: true },
            Effect::Reply {
                request_id: Some(1),
                reply: Reply::Ack,
            },
        ]
    );
}

#[test]
fn disabling_when_idle_only_acknowledges() {
    init_logging();
    let (mut state, effects) = toggle(AppState::new(), false);

    assert!(!state.consume_dirty());
    assert_eq!(
        effects,
        vec![Effect::Reply {
            request_id: Some(1),
            reply: Reply::Ack,
        }]
    );
}

#[test]
fn manual_scan_enters_phase3_and_back_returns_to_phase1() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::ManualScanClicked { request_id: None });
    assert_eq!(state.session().current_phase, Phase::Manual);
    assert!(matches!(effects[0], Effect::PersistSession(s) if s.current_phase == Phase::Manual));

    let (state, effects) = update(state, Msg::BackClicked { request_id: None });
    assert_eq!(state.session().current_phase, Phase::Idle);
    assert!(matches!(effects[0], Effect::PersistSession(s) if s.current_phase == Phase::Idle));
}

#[test]
fn auto_scan_cannot_start_from_manual_mode() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::ManualScanClicked { request_id: None });
    let (state, effects) = toggle(state, true);

    assert_eq!(state.session().current_phase, Phase::Manual);
    assert!(!state.session().auto_scan_enabled);
    assert!(matches!(
        effects.as_slice(),
        [Effect::Reply {
            reply: Reply::Failed { .. },
            ..
        }]
    ));
}

#[test]
fn manual_scan_refused_while_auto_scanning() {
    init_logging();
    let (state, _) = toggle(AppState::new(), true);
    let (state, effects) = update(state, Msg::ManualScanClicked { request_id: Some(4) });

    assert_eq!(state.session().current_phase, Phase::AutoScan);
    assert_eq!(
        effects,
        vec![Effect::Reply {
            request_id: Some(4),
            reply: Reply::failed("Stop auto-scan before starting a manual scan"),
        }]
    );
}

#[test]
fn state_query_reports_enabled_flag() {
    init_logging();
    let (state, _) = toggle(AppState::new(), true);
    let (_state, effects) = update(state, Msg::GetAutoScanState { request_id: Some(9) });

    assert_eq!(
        effects,
        vec![Effect::Reply {
            request_id: Some(9),
            reply: Reply::AutoScanState {
                enabled: true,
                phase: Phase::AutoScan,
            },
        }]
    );
}
