//! nvim-bridge: connects a UI front-end to an embedded Neovim RPC session.
//!
//! # Architecture
//!
//! - [`gate`] - one-shot startup rendezvous between dispatcher and UI thread
//! - [`dispatcher`] - receive loop on a dedicated thread, notification routing,
//!   redraw application on the UI thread
//! - [`error_capture`] - single slot for the failure that ended a connection
//! - [`bridge`] - the controller: lifecycle and forwarding operations
//! - [`session`] / [`ui`] - the two collaborator traits the embedder implements
//! - [`plugin`] - editor-side helper scripts installed on connect
//! - [`profile`] - optional UI loop and redraw handler profiling
//! - [`debug`] - debug log file behind the `log` facade
//!
//! # Mutex Usage Policy
//!
//! All shared state uses `parking_lot::Mutex`; locks are never held across a
//! call into the session or the UI.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nvim_bridge::{Bridge, BridgeConfig};
//!
//! let bridge = Bridge::new(BridgeConfig::default())?;
//! let report = bridge.connect(session, ui, None, true)?;
//! if let Some(error) = report.error {
//!     eprintln!("editor connection ended: {error}");
//! }
//! ```

/// Crate version, written to the debug log header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bridge;
pub mod debug;
pub mod dispatcher;
pub mod error;
pub mod error_capture;
pub mod gate;
pub mod operator;
pub mod plugin;
pub mod profile;
pub mod redraw;
pub mod session;
pub mod ui;

pub use bridge::{Bridge, BridgeState, ConnectionReport};
pub use dispatcher::{ApplyOutcome, DispatchOptions, Dispatcher, StepOutcome};
pub use error::BridgeError;
pub use error_capture::ErrorCapture;
pub use gate::{GateOutcome, StartupGate};
pub use nvim_bridge_config::{BridgeConfig, ConfigError, LogLevel, UnknownOpPolicy};
pub use operator::OperatorOutput;
pub use plugin::PluginError;
pub use profile::{ProfileReport, ProfileSort, Profiler};
pub use redraw::Update;
pub use session::{ColorMode, Notification, Session, SessionCall, SessionError, SessionEvent};
pub use ui::{RedrawHandler, RedrawHandlers, ScreenUpdate, Ui};
