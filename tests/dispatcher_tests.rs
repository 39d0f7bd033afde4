//! Tests for the dispatcher receive loop driven directly, without a bridge.

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use common::{RecordingUi, ScriptedSession, SharedBuffer, notification, redraw, request};
use nvim_bridge::dispatcher::{ATTACHED_MARKER, methods};
use nvim_bridge::{
    BridgeError, DispatchOptions, Dispatcher, ErrorCapture, GateOutcome, OperatorOutput,
    Profiler, ProfileSort, SessionEvent, StartupGate, StepOutcome,
};
use serde_json::json;

struct Harness {
    session: Arc<ScriptedSession>,
    ui: Arc<RecordingUi>,
    gate: Arc<StartupGate>,
    errors: Arc<ErrorCapture>,
    dispatcher: Dispatcher,
}

fn harness(session: ScriptedSession, ui: RecordingUi, options: DispatchOptions) -> Harness {
    let session = Arc::new(session);
    let ui = Arc::new(ui);
    let gate = Arc::new(StartupGate::new());
    let errors = Arc::new(ErrorCapture::new());
    let dispatcher = Dispatcher::new(
        session.clone(),
        ui.clone(),
        Arc::clone(&gate),
        Arc::clone(&errors),
        options,
    );
    Harness {
        session,
        ui,
        gate,
        errors,
        dispatcher,
    }
}

fn scripted(events: Vec<SessionEvent>) -> Harness {
    harness(
        ScriptedSession::new(events),
        RecordingUi::new(),
        DispatchOptions::default(),
    )
}

#[test]
fn test_step_outcomes() {
    let h = scripted(vec![SessionEvent::Setup, request("nvim_input")]);

    assert!(matches!(h.dispatcher.step(), StepOutcome::Continue));
    assert!(h.gate.is_signaled());

    match h.dispatcher.step() {
        StepOutcome::Fatal(BridgeError::ProtocolViolation { method }) => {
            assert_eq!(method, "nvim_input")
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert!(matches!(h.dispatcher.step(), StepOutcome::Closed));
}

#[test]
fn test_duplicate_setup_keeps_gate_ready() {
    let h = scripted(vec![SessionEvent::Setup, SessionEvent::Setup]);

    h.dispatcher.step();
    h.dispatcher.step();

    assert_eq!(h.gate.wait(), GateOutcome::Ready);
}

#[test]
fn test_redraw_is_deferred_to_ui_thread() {
    let h = scripted(vec![redraw(json!([[["put", ["z"]]]]))]);

    assert!(matches!(h.dispatcher.step(), StepOutcome::Continue));
    assert!(h.ui.redraws().is_empty());

    assert_eq!(h.ui.run_pending(), 1);
    assert_eq!(h.ui.redraws(), vec![("put".to_string(), vec![json!("z")])]);
}

#[test]
fn test_run_quits_ui_once_and_abandons_gate() {
    let h = scripted(vec![notification("unrelated", vec![])]);

    h.dispatcher.run().unwrap();

    assert_eq!(h.ui.quit_count(), 1);
    assert_eq!(h.gate.wait(), GateOutcome::Abandoned);
}

#[test]
fn test_run_returns_protocol_violation_after_quitting_ui() {
    let h = scripted(vec![SessionEvent::Setup, request("nvim_eval")]);

    let err = h.dispatcher.run().unwrap_err();

    assert!(matches!(err, BridgeError::ProtocolViolation { .. }));
    assert_eq!(h.ui.quit_count(), 1);
    assert_eq!(h.gate.wait(), GateOutcome::Ready);
}

#[test]
fn test_ui_quit_even_when_loop_panics() {
    let h = harness(
        ScriptedSession::new(vec![notification(methods::TOGGLE_PREVIEW, vec![])]),
        RecordingUi::new().panicking_on_toggle(),
        DispatchOptions::default(),
    );

    let result = panic::catch_unwind(AssertUnwindSafe(|| h.dispatcher.run()));

    assert!(result.is_err());
    assert_eq!(h.ui.quit_count(), 1);
    assert_eq!(h.gate.wait(), GateOutcome::Abandoned);
}

#[test]
fn test_attached_marker_once_across_notifications() {
    let out = SharedBuffer::default();
    let h = harness(
        ScriptedSession::new(vec![
            redraw(json!([[["put", ["1"]]]])),
            redraw(json!([[["put", ["2"]]]])),
        ]),
        RecordingUi::new(),
        DispatchOptions {
            notify_on_attach: true,
            output: OperatorOutput::new(out.clone()),
            ..DispatchOptions::default()
        },
    );

    h.dispatcher.run().unwrap();
    assert_eq!(h.ui.run_pending(), 2);

    assert_eq!(out.contents(), format!("{ATTACHED_MARKER}\n"));
    assert_eq!(h.ui.redraws().len(), 2);
}

#[test]
fn test_failure_captured_once_across_notifications() {
    let h = scripted(vec![
        redraw(json!([[["fail", []]]])),
        redraw(json!([[["fail", []]]])),
        redraw(json!([[["put", ["after"]]]])),
    ]);

    h.dispatcher.run().unwrap();
    h.ui.run_pending();

    assert_eq!(h.session.quit_count(), 1);
    assert!(h.ui.redraws().is_empty());
    let text = h.errors.take().unwrap();
    assert!(text.contains("handler exploded"), "{text}");
}

#[test]
fn test_profiler_records_handler_calls() {
    let profiler = Arc::new(Profiler::new(ProfileSort::Cumulative));
    let h = harness(
        ScriptedSession::new(vec![redraw(json!([[
            ["put", ["a"], ["b"]],
            ["cursor_goto", [1, 2]]
        ]]))]),
        RecordingUi::new(),
        DispatchOptions {
            profiler: Some(Arc::clone(&profiler)),
            ..DispatchOptions::default()
        },
    );

    h.dispatcher.run().unwrap();
    h.ui.run_pending();

    let report = profiler.finish(std::time::Duration::ZERO);
    assert_eq!(report.notifications, 1);
    assert_eq!(report.get("put").unwrap().calls, 2);
    assert_eq!(report.get("cursor_goto").unwrap().calls, 1);
}
