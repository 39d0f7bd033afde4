//! Event dispatcher: owns the session receive loop on a dedicated thread.
//!
//! The dispatcher classifies every inbound event and routes it:
//!
//! - `Setup` releases the [`StartupGate`]
//! - requests are a protocol violation and end the loop with an error
//! - `redraw` notifications are wrapped in a [`RedrawApplier`] and scheduled
//!   onto the UI thread, never applied here
//! - `toggle-preview` and the font notifications call the UI directly
//! - anything else is dropped
//!
//! Whatever ends the loop, [`Ui::quit`] is called exactly once afterwards.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{BridgeError, panic_message};
use crate::error_capture::ErrorCapture;
use crate::gate::StartupGate;
use crate::operator::OperatorOutput;
use crate::profile::Profiler;
use crate::redraw::{Update, batch_updates};
use crate::session::{Notification, Session, SessionCall, SessionEvent};
use crate::ui::{RedrawHandler, Ui};
use nvim_bridge_config::UnknownOpPolicy;

/// Notification method names understood by the dispatcher.
pub mod methods {
    pub const REDRAW: &str = "redraw";
    pub const TOGGLE_PREVIEW: &str = "toggle-preview";
    pub const FONT_SIZE: &str = "font-settings-change-size";
    pub const FONT: &str = "font-settings-change-font";
}

/// Name given to the dispatcher thread.
pub const DISPATCHER_THREAD_NAME: &str = "nvim-bridge-dispatcher";

/// Line written to the operator output when the first redraw is applied.
pub const ATTACHED_MARKER: &str = "attached";

/// Result of one receive-loop step.
#[derive(Debug)]
pub enum StepOutcome {
    Continue,
    /// The session ended normally.
    Closed,
    /// The loop must stop and report this error.
    Fatal(BridgeError),
}

/// Result of applying one redraw notification on the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every update was applied.
    Applied { updates: usize },
    /// The connection had already failed; nothing was applied.
    Skipped,
    /// A handler failed. Later updates of the notification were not applied.
    Failed(String),
}

/// Connection-level dispatcher settings.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Emit [`ATTACHED_MARKER`] once, when the first redraw is applied.
    pub notify_on_attach: bool,
    pub unknown_op: UnknownOpPolicy,
    pub profiler: Option<Arc<Profiler>>,
    pub output: OperatorOutput,
}

/// Per-connection state shared by the dispatcher and its appliers.
struct Shared {
    session: Arc<dyn Session>,
    ui: Arc<dyn Ui>,
    gate: Arc<StartupGate>,
    errors: Arc<ErrorCapture>,
    notify_on_attach: AtomicBool,
    /// Set by whichever comes first: the loop's exit quitting the UI, or the
    /// controller giving up on the join and detaching the thread.
    ui_released: AtomicBool,
    unknown_op: UnknownOpPolicy,
    profiler: Option<Arc<Profiler>>,
    output: OperatorOutput,
}

impl Shared {
    fn request_quit(&self) {
        log::info!("dispatcher: requesting editor quit");
        if let Err(e) = self.session.threadsafe_call(SessionCall::Quit) {
            log::warn!("dispatcher: quit request failed: {e}");
        }
    }
}

/// Routes session events for one connection.
pub struct Dispatcher {
    shared: Arc<Shared>,
    /// Completion signal for a bounded join, sent before the UI is released.
    done: Mutex<Option<SyncSender<()>>>,
}

impl Dispatcher {
    pub fn new(
        session: Arc<dyn Session>,
        ui: Arc<dyn Ui>,
        gate: Arc<StartupGate>,
        errors: Arc<ErrorCapture>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                session,
                ui,
                gate,
                errors,
                notify_on_attach: AtomicBool::new(options.notify_on_attach),
                ui_released: AtomicBool::new(false),
                unknown_op: options.unknown_op,
                profiler: options.profiler,
                output: options.output,
            }),
            done: Mutex::new(None),
        }
    }

    /// Drive the receive loop until the session ends or a fatal event arrives.
    ///
    /// # Errors
    /// Returns [`BridgeError::ProtocolViolation`] if the editor sends a request.
    pub fn run(&self) -> Result<(), BridgeError> {
        let _quit = QuitOnExit {
            shared: &self.shared,
            done: self.done.lock().take(),
        };
        log::info!("dispatcher: receive loop started");
        loop {
            match self.step() {
                StepOutcome::Continue => {}
                StepOutcome::Closed => {
                    log::info!("dispatcher: session closed");
                    return Ok(());
                }
                StepOutcome::Fatal(err) => {
                    log::error!("dispatcher: {err}");
                    return Err(err);
                }
            }
        }
    }

    /// Receive and route a single event.
    pub fn step(&self) -> StepOutcome {
        match self.shared.session.recv() {
            None => StepOutcome::Closed,
            Some(SessionEvent::Setup) => {
                if self.shared.gate.signal() {
                    log::info!("dispatcher: session ready");
                } else {
                    log::warn!("dispatcher: duplicate setup event ignored");
                }
                StepOutcome::Continue
            }
            Some(SessionEvent::Request { method, .. }) => {
                StepOutcome::Fatal(BridgeError::ProtocolViolation { method })
            }
            Some(SessionEvent::Notification(notification)) => {
                self.route(notification);
                StepOutcome::Continue
            }
        }
    }

    /// Route one notification by method name.
    pub fn route(&self, notification: Notification) {
        let Notification { method, payload } = notification;
        let ui = &self.shared.ui;
        match method.as_str() {
            methods::REDRAW => {
                let applier = RedrawApplier {
                    shared: Arc::clone(&self.shared),
                    payload,
                };
                ui.schedule_screen_update(Box::new(move || {
                    let outcome = applier.apply();
                    log::trace!("redraw: {outcome:?}");
                }));
            }
            methods::TOGGLE_PREVIEW => ui.toggle_preview(),
            methods::FONT_SIZE => match payload.first().and_then(font_size) {
                Some(size) => ui.change_font_size(size),
                None => log::warn!("dispatcher: {method} without a usable size: {payload:?}"),
            },
            methods::FONT => match payload.first().and_then(Value::as_str) {
                Some(name) => ui.change_font(name),
                None => log::warn!("dispatcher: {method} without a font name: {payload:?}"),
            },
            _ => log::debug!("dispatcher: ignoring notification '{method}'"),
        }
    }
}

/// Calls `Ui::quit` when the receive loop unwinds or returns.
///
/// The completion signal goes out first: once the UI thread is released it
/// may start the bounded join straight away.
struct QuitOnExit<'a> {
    shared: &'a Shared,
    done: Option<SyncSender<()>>,
}

impl Drop for QuitOnExit<'_> {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            // The receiver is gone only if the join already timed out.
            let _ = done.send(());
        }
        if self.shared.gate.abandon() {
            log::warn!("dispatcher: session ended before it became ready");
        }
        if self.shared.ui_released.swap(true, Ordering::AcqRel) {
            log::warn!("dispatcher: connection was detached, leaving the UI alone");
            return;
        }
        self.shared.ui.quit();
    }
}

fn font_size(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Applies one redraw notification on the UI thread.
pub struct RedrawApplier {
    shared: Arc<Shared>,
    payload: Vec<Value>,
}

impl RedrawApplier {
    /// Apply every batch in order, stopping at the first failure.
    ///
    /// The first failure of a connection is captured and followed by a single
    /// quit request. Once a failure is captured, later notifications are
    /// skipped.
    pub fn apply(self) -> ApplyOutcome {
        let shared = &self.shared;
        if shared.notify_on_attach.swap(false, Ordering::AcqRel) {
            shared.output.line(ATTACHED_MARKER);
        }
        if shared.errors.is_set() {
            log::trace!("redraw: connection already failed, skipping notification");
            return ApplyOutcome::Skipped;
        }
        if let Some(profiler) = &shared.profiler {
            profiler.record_notification();
        }

        match self.apply_batches() {
            Ok(updates) => ApplyOutcome::Applied { updates },
            Err(text) => {
                log::error!("redraw: {text}");
                if shared.errors.capture(text.clone()) {
                    shared.request_quit();
                }
                ApplyOutcome::Failed(text)
            }
        }
    }

    fn apply_batches(&self) -> Result<usize, String> {
        let handlers = self.shared.ui.redraw_handlers();
        let mut applied = 0;
        for (b, batch) in self.payload.iter().enumerate() {
            let updates = batch_updates(batch).map_err(|e| format!("batch {b}: {e}"))?;
            for (u, value) in updates.iter().enumerate() {
                let update =
                    Update::from_value(value).map_err(|e| format!("batch {b}, update {u}: {e}"))?;
                let Some(handler) = handlers.get(update.op) else {
                    match self.shared.unknown_op {
                        UnknownOpPolicy::Fail => {
                            return Err(format!(
                                "batch {b}, update {u}: no redraw handler registered for '{}'",
                                update.op
                            ));
                        }
                        UnknownOpPolicy::Skip => {
                            log::warn!("redraw: no handler for '{}', skipped", update.op);
                            continue;
                        }
                    }
                };
                for args in &update.calls {
                    self.invoke(update.op, handler, args).map_err(|e| {
                        format!("batch {b}, update {u}: redraw handler '{}' failed: {e}", update.op)
                    })?;
                }
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn invoke(&self, op: &str, handler: &RedrawHandler, args: &[Value]) -> Result<(), String> {
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(args)));
        if let Some(profiler) = &self.shared.profiler {
            profiler.record_op(op, started.elapsed());
        }
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
        }
    }
}

/// A spawned dispatcher thread, joined with a bounded wait.
pub(crate) struct DispatcherHandle {
    thread: JoinHandle<Result<(), BridgeError>>,
    done: Receiver<()>,
    shared: Arc<Shared>,
}

impl DispatcherHandle {
    pub(crate) fn spawn(dispatcher: Dispatcher) -> Result<Self, BridgeError> {
        let (done_tx, done) = mpsc::sync_channel(1);
        *dispatcher.done.lock() = Some(done_tx);
        let shared = Arc::clone(&dispatcher.shared);
        let thread = thread::Builder::new()
            .name(DISPATCHER_THREAD_NAME.to_string())
            .spawn(move || dispatcher.run())
            .map_err(BridgeError::Spawn)?;
        Ok(Self {
            thread,
            done,
            shared,
        })
    }

    /// Wait up to `timeout` for the thread to finish, then join it.
    pub(crate) fn join(self, timeout: Duration) -> Result<(), BridgeError> {
        match self.done.recv_timeout(timeout) {
            // Disconnected: the sender was dropped without signalling.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                log::error!("dispatcher: thread still running after {timeout:?}, detaching");
                // A detached loop must not quit whatever UI loop runs next.
                self.shared.ui_released.store(true, Ordering::Release);
                return Err(BridgeError::DispatcherTimeout(timeout));
            }
        }
        match self.thread.join() {
            Ok(result) => result,
            Err(payload) => Err(BridgeError::DispatcherPanicked(panic_message(&*payload))),
        }
    }
}
