//! The editor RPC session as seen by the bridge.
//!
//! The transport itself (msgpack-rpc over a pipe, socket or embedded child)
//! belongs to the embedder. The bridge only needs a blocking receive, a way to
//! marshal calls onto the session's owning thread, and the channel id used by
//! the injected helper scripts.

use serde_json::Value;
use thiserror::Error;

/// An inbound, unsolicited message from the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Method name, e.g. `redraw` or `toggle-preview`.
    pub method: String,
    /// Ordered payload values.
    pub payload: Vec<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, payload: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }
}

/// One item yielded by the session's receive loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session finished its handshake and is ready for UI traffic.
    Setup,
    /// The editor expects a response. The bridge serves no requests.
    Request { method: String, args: Vec<Value> },
    /// A notification to route.
    Notification(Notification),
}

/// Color mode requested when attaching the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 24-bit colors (`rgb = true` in `nvim_ui_attach`).
    Rgb,
    /// Terminal palette indices.
    Indexed,
}

impl ColorMode {
    pub fn is_rgb(self) -> bool {
        matches!(self, ColorMode::Rgb)
    }
}

/// A call the bridge asks the session to perform on its owning thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    /// Queue raw input keys (`nvim_input`).
    Input(String),
    /// Request a new grid size (`nvim_ui_try_resize`).
    TryResize { columns: u16, rows: u16 },
    /// Attach this UI (`nvim_ui_attach`).
    Attach {
        columns: u16,
        rows: u16,
        color: ColorMode,
    },
    /// Detach this UI (`nvim_ui_detach`).
    Detach,
    /// Quit the editor, ending the session.
    Quit,
}

impl SessionCall {
    /// RPC-style name, used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SessionCall::Input(_) => "input",
            SessionCall::TryResize { .. } => "ui_try_resize",
            SessionCall::Attach { .. } => "ui_attach",
            SessionCall::Detach => "ui_detach",
            SessionCall::Quit => "quit",
        }
    }
}

/// Failures reported by a [`Session`] implementation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is no longer running.
    #[error("session is closed")]
    Closed,

    /// The editor rejected an Ex command.
    #[error("editor command failed: {0}")]
    Command(String),

    /// Transport-level failure.
    #[error("session transport error: {0}")]
    Transport(String),
}

/// An externally owned RPC connection to the editor.
///
/// Implementations must be usable from several threads: the dispatcher thread
/// blocks in [`Session::recv`] while the UI thread issues
/// [`Session::threadsafe_call`]s.
pub trait Session: Send + Sync {
    /// Block until the next event arrives. `None` means the session ended.
    fn recv(&self) -> Option<SessionEvent>;

    /// Run `call` on the session's owning thread.
    ///
    /// Calls issued by one thread must reach the editor in issue order.
    ///
    /// # Errors
    /// Returns [`SessionError`] if the call could not be queued.
    fn threadsafe_call(&self, call: SessionCall) -> Result<(), SessionError>;

    /// Channel id the editor knows this client by (for `rpcnotify`).
    fn channel_id(&self) -> u64;

    /// Execute an Ex command synchronously.
    ///
    /// Only used while connecting, before the dispatcher thread exists.
    ///
    /// # Errors
    /// Returns [`SessionError`] if the editor reports a failure.
    fn command(&self, command: &str) -> Result<(), SessionError>;
}
