//! Shared integration test helpers for nvim-bridge.
//!
//! Provides a scripted [`Session`], a recording [`Ui`] and an in-memory
//! operator output buffer.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{RecordingUi, ScriptedSession, SharedBuffer};
//! ```
//!
//! The `#[allow(dead_code)]` attribute suppresses warnings when only a subset
//! of helpers are used per test file.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use nvim_bridge::{
    Bridge, Notification, RedrawHandlers, ScreenUpdate, Session, SessionCall, SessionError,
    SessionEvent, Ui,
};
use parking_lot::{Condvar, Mutex};
use serde_json::Value;

/// Ordered record of cross-thread milestones ("setup", "start").
pub type Timeline = Arc<Mutex<Vec<&'static str>>>;

pub fn timeline() -> Timeline {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn redraw(payload: Value) -> SessionEvent {
    let Value::Array(batches) = payload else {
        panic!("redraw payload must be an array of batches");
    };
    SessionEvent::Notification(Notification::new("redraw", batches))
}

pub fn notification(method: &str, payload: Vec<Value>) -> SessionEvent {
    SessionEvent::Notification(Notification::new(method, payload))
}

pub fn request(method: &str) -> SessionEvent {
    SessionEvent::Request {
        method: method.to_string(),
        args: Vec::new(),
    }
}

// ─── Scripted session ───

struct SessionState {
    events: VecDeque<SessionEvent>,
    calls: Vec<SessionCall>,
    commands: Vec<String>,
    closed: bool,
}

/// Replays a fixed event script.
///
/// By default the session closes once the script is drained. A held-open
/// session instead blocks in `recv` until a `Quit` call or [`close`](Self::close).
pub struct ScriptedSession {
    state: Mutex<SessionState>,
    changed: Condvar,
    hold_open: bool,
    fail_commands: bool,
    setup_delay: Duration,
    timeline: Option<Timeline>,
}

impl ScriptedSession {
    pub fn new(events: Vec<SessionEvent>) -> Self {
        Self {
            state: Mutex::new(SessionState {
                events: events.into(),
                calls: Vec::new(),
                commands: Vec::new(),
                closed: false,
            }),
            changed: Condvar::new(),
            hold_open: false,
            fail_commands: false,
            setup_delay: Duration::ZERO,
            timeline: None,
        }
    }

    pub fn held_open(events: Vec<SessionEvent>) -> Self {
        Self {
            hold_open: true,
            ..Self::new(events)
        }
    }

    pub fn failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    pub fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = delay;
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().calls.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn quit_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| **call == SessionCall::Quit)
            .count()
    }
}

impl Session for ScriptedSession {
    fn recv(&self) -> Option<SessionEvent> {
        let mut state = self.state.lock();
        loop {
            if let Some(event) = state.events.pop_front() {
                if event == SessionEvent::Setup {
                    drop(state);
                    thread::sleep(self.setup_delay);
                    if let Some(timeline) = &self.timeline {
                        timeline.lock().push("setup");
                    }
                }
                return Some(event);
            }
            if state.closed || !self.hold_open {
                return None;
            }
            self.changed.wait(&mut state);
        }
    }

    fn threadsafe_call(&self, call: SessionCall) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if call == SessionCall::Quit {
            state.closed = true;
            self.changed.notify_all();
        }
        state.calls.push(call);
        Ok(())
    }

    fn channel_id(&self) -> u64 {
        3
    }

    fn command(&self, command: &str) -> Result<(), SessionError> {
        self.state.lock().commands.push(command.to_string());
        if self.fail_commands {
            return Err(SessionError::Command(format!("E492: {command}")));
        }
        Ok(())
    }
}

// ─── Recording UI ───

#[derive(Debug, Clone, PartialEq)]
pub enum UiCall {
    Redraw { op: String, args: Vec<Value> },
    TogglePreview { thread: Option<String> },
    FontSize(u32),
    Font(String),
}

enum UiMsg {
    Update(ScreenUpdate),
    Quit,
}

type StartHook = Box<dyn Fn(&Bridge) + Send + Sync>;

/// UI whose loop applies scheduled updates until `quit`.
///
/// Redraw handlers: `put`, `cursor_goto` and `clear` record their arguments,
/// `fail` returns an error, `panic` panics.
pub struct RecordingUi {
    tx: Mutex<Sender<UiMsg>>,
    rx: Mutex<Receiver<UiMsg>>,
    handlers: RedrawHandlers,
    calls: Arc<Mutex<Vec<UiCall>>>,
    starts: AtomicUsize,
    quits: AtomicUsize,
    on_start: Option<StartHook>,
    run_until_quit: bool,
    panic_on_toggle: bool,
    timeline: Option<Timeline>,
}

impl Default for RecordingUi {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingUi {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let calls: Arc<Mutex<Vec<UiCall>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handlers = RedrawHandlers::new();
        for op in ["put", "cursor_goto", "clear"] {
            let calls = Arc::clone(&calls);
            handlers.register(op, move |args: &[Value]| {
                calls.lock().push(UiCall::Redraw {
                    op: op.to_string(),
                    args: args.to_vec(),
                });
                Ok(())
            });
        }
        handlers.register("fail", |_args: &[Value]| Err(anyhow!("handler exploded")));
        handlers.register("panic", |_args: &[Value]| -> anyhow::Result<()> {
            panic!("handler panicked")
        });

        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
            handlers,
            calls,
            starts: AtomicUsize::new(0),
            quits: AtomicUsize::new(0),
            on_start: None,
            run_until_quit: true,
            panic_on_toggle: false,
            timeline: None,
        }
    }

    /// Run `hook` on the UI thread as soon as `start` is entered.
    pub fn on_start(mut self, hook: impl Fn(&Bridge) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Return from `start` without waiting for `quit`.
    pub fn returning_immediately(mut self) -> Self {
        self.run_until_quit = false;
        self
    }

    pub fn panicking_on_toggle(mut self) -> Self {
        self.panic_on_toggle = true;
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().clone()
    }

    /// Recorded redraw calls as `(op, args)` pairs.
    pub fn redraws(&self) -> Vec<(String, Vec<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                UiCall::Redraw { op, args } => Some((op, args)),
                _ => None,
            })
            .collect()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    /// Run every scheduled update queued so far on the calling thread.
    ///
    /// Returns the number of updates run.
    pub fn run_pending(&self) -> usize {
        let rx = self.rx.lock();
        let mut ran = 0;
        loop {
            match rx.try_recv() {
                Ok(UiMsg::Update(update)) => {
                    update();
                    ran += 1;
                }
                Ok(UiMsg::Quit) => {}
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return ran,
            }
        }
    }

    fn send(&self, msg: UiMsg) {
        // The receiver lives as long as `self`.
        let _ = self.tx.lock().send(msg);
    }
}

impl Ui for RecordingUi {
    fn start(&self, bridge: &Bridge) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(timeline) = &self.timeline {
            timeline.lock().push("start");
        }
        if let Some(hook) = &self.on_start {
            hook(bridge);
        }
        if !self.run_until_quit {
            return;
        }
        let rx = self.rx.lock();
        while let Ok(msg) = rx.recv() {
            match msg {
                UiMsg::Update(update) => update(),
                UiMsg::Quit => break,
            }
        }
    }

    fn quit(&self) {
        self.quits.fetch_add(1, Ordering::SeqCst);
        self.send(UiMsg::Quit);
    }

    fn schedule_screen_update(&self, update: ScreenUpdate) {
        self.send(UiMsg::Update(update));
    }

    fn toggle_preview(&self) {
        if self.panic_on_toggle {
            panic!("toggle handler panicked");
        }
        self.calls.lock().push(UiCall::TogglePreview {
            thread: thread::current().name().map(str::to_string),
        });
    }

    fn change_font_size(&self, size: u32) {
        self.calls.lock().push(UiCall::FontSize(size));
    }

    fn change_font(&self, name: &str) {
        self.calls.lock().push(UiCall::Font(name.to_string()));
    }

    fn redraw_handlers(&self) -> &RedrawHandlers {
        &self.handlers
    }
}

// ─── Operator output buffer ───

#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
