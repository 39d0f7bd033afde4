//! Typed error types for nvim-bridge.
//!
//! Redraw handler failures are not errors at this level: they are recovered
//! by the applier and surface as text in the connection report. Everything
//! here ends or prevents a connection.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use crate::bridge::BridgeState;
use crate::plugin::PluginError;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// `connect` was called while a connection is active.
    #[error("bridge is already {0}")]
    AlreadyConnected(BridgeState),

    /// The editor sent a request; the bridge serves none.
    #[error("protocol violation: unexpected request '{method}' from the editor")]
    ProtocolViolation { method: String },

    /// The editor-side helper commands could not be installed.
    #[error("failed to install editor helpers: {0}")]
    Plugin(#[from] PluginError),

    /// The dispatcher thread could not be started.
    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The dispatcher thread did not finish within the join timeout.
    ///
    /// The thread is detached. It keeps its session and UI handles until the
    /// session ends, but it no longer calls [`crate::Ui::quit`].
    #[error("dispatcher thread did not finish within {0:?}")]
    DispatcherTimeout(Duration),

    /// The dispatcher thread unwound instead of returning.
    #[error("dispatcher thread panicked: {0}")]
    DispatcherPanicked(String),

    /// [`crate::Ui::start`] unwound. The session was asked to quit and the
    /// dispatcher joined before this was returned.
    #[error("UI loop panicked: {0}")]
    UiPanicked(String),
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
