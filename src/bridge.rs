//! Bridge controller: connects a [`Session`] to a [`Ui`].
//!
//! `connect` turns the calling thread into the UI thread. It installs the
//! editor-side helpers, spawns the dispatcher thread, waits for the session
//! handshake, then runs [`Ui::start`] until the dispatcher asks the UI to
//! quit. Forwarding operations (`input`, `resize`, `attach`, `detach`, `exit`)
//! are always marshalled through [`Session::threadsafe_call`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::dispatcher::{DispatchOptions, Dispatcher, DispatcherHandle};
use crate::error::{BridgeError, panic_message};
use crate::error_capture::ErrorCapture;
use crate::gate::{GateOutcome, StartupGate};
use crate::operator::OperatorOutput;
use crate::plugin;
use crate::profile::{ProfileReport, ProfileSort, Profiler};
use crate::session::{ColorMode, Session, SessionCall};
use crate::ui::Ui;
use nvim_bridge_config::{BridgeConfig, ConfigError};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    /// Dispatcher running, waiting for the session handshake.
    Connecting,
    /// UI loop running.
    Running,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BridgeState::Disconnected => "disconnected",
            BridgeState::Connecting => "connecting",
            BridgeState::Running => "running",
        })
    }
}

/// What a finished connection left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionReport {
    /// Text of the redraw failure that ended the connection, if any.
    pub error: Option<String>,
    /// Present when profiling was requested and the UI ran.
    pub profile: Option<ProfileReport>,
}

pub struct Bridge {
    config: BridgeConfig,
    output: OperatorOutput,
    state: Mutex<BridgeState>,
    session: Mutex<Option<Arc<dyn Session>>>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::from_valid(BridgeConfig::default())
    }
}

/// Returns the controller to `Disconnected` however `connect` ends,
/// including an unwind out of it.
struct Teardown<'a> {
    bridge: &'a Bridge,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        *self.bridge.session.lock() = None;
        self.bridge.set_state(BridgeState::Disconnected);
    }
}

impl Bridge {
    /// # Errors
    /// Returns [`ConfigError::Validation`] if `config` fails
    /// [`BridgeConfig::validate`].
    pub fn new(config: BridgeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: BridgeConfig) -> Self {
        Self {
            config,
            output: OperatorOutput::default(),
            state: Mutex::new(BridgeState::Disconnected),
            session: Mutex::new(None),
        }
    }

    /// Load the user configuration and install the debug log bridge.
    pub fn from_user_config() -> anyhow::Result<Self> {
        let config = BridgeConfig::load()?;
        crate::debug::init_log_bridge(Some(config.log_level.to_level_filter()));
        Ok(Self::new(config)?)
    }

    /// Send operator output (the `attached` marker, captured errors, profile
    /// reports) to `output` instead of stdout.
    #[must_use]
    pub fn with_output(mut self, output: OperatorOutput) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    /// Connect using the profile and attach-notification settings from the
    /// configuration.
    ///
    /// # Errors
    /// See [`Bridge::connect`].
    pub fn connect_configured(
        &self,
        session: Arc<dyn Session>,
        ui: Arc<dyn Ui>,
    ) -> Result<ConnectionReport, BridgeError> {
        self.connect(
            session,
            ui,
            self.config.profile,
            self.config.notify_on_attach,
        )
    }

    /// Run one connection on the calling thread.
    ///
    /// Blocks until the UI loop returns and the dispatcher thread has been
    /// joined. A captured redraw failure and the profile report are written to
    /// the operator output and returned in the [`ConnectionReport`].
    ///
    /// # Errors
    /// - [`BridgeError::AlreadyConnected`] if a connection is active
    /// - [`BridgeError::Plugin`] if the editor helpers cannot be installed
    /// - [`BridgeError::Spawn`] if the dispatcher thread cannot be started
    /// - [`BridgeError::ProtocolViolation`] if the editor sent a request
    /// - [`BridgeError::UiPanicked`] if [`Ui::start`] panicked
    /// - [`BridgeError::DispatcherTimeout`] / [`BridgeError::DispatcherPanicked`]
    ///   if the dispatcher thread does not finish cleanly
    pub fn connect(
        &self,
        session: Arc<dyn Session>,
        ui: Arc<dyn Ui>,
        profile: Option<ProfileSort>,
        notify_on_attach: bool,
    ) -> Result<ConnectionReport, BridgeError> {
        {
            let mut state = self.state.lock();
            if *state != BridgeState::Disconnected {
                return Err(BridgeError::AlreadyConnected(*state));
            }
            *state = BridgeState::Connecting;
        }
        let teardown = Teardown { bridge: self };
        log::info!(
            "bridge: connecting (channel {}, profile={profile:?}, notify_on_attach={notify_on_attach})",
            session.channel_id()
        );

        let result = self.run_connection(session, ui, profile, notify_on_attach);

        drop(teardown);
        match &result {
            Ok(report) if report.error.is_some() => log::warn!("bridge: disconnected after error"),
            Ok(_) => log::info!("bridge: disconnected"),
            Err(e) => log::error!("bridge: connection failed: {e}"),
        }
        result
    }

    fn run_connection(
        &self,
        session: Arc<dyn Session>,
        ui: Arc<dyn Ui>,
        profile: Option<ProfileSort>,
        notify_on_attach: bool,
    ) -> Result<ConnectionReport, BridgeError> {
        if self.config.install_helpers {
            plugin::install_helpers(session.as_ref(), &self.config.preview_toggle_mapping)?;
        }

        let gate = Arc::new(StartupGate::new());
        let errors = Arc::new(ErrorCapture::new());
        let profiler = profile.map(|sort| Arc::new(Profiler::new(sort)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&session),
            Arc::clone(&ui),
            Arc::clone(&gate),
            Arc::clone(&errors),
            DispatchOptions {
                notify_on_attach,
                unknown_op: self.config.unknown_redraw_op,
                profiler: profiler.clone(),
                output: self.output.clone(),
            },
        );

        *self.session.lock() = Some(Arc::clone(&session));
        let handle = DispatcherHandle::spawn(dispatcher)?;

        let mut ui_time = Duration::ZERO;
        let mut ui_panic = None;
        match gate.wait() {
            GateOutcome::Ready => {
                self.set_state(BridgeState::Running);
                log::info!("bridge: session ready, starting UI");
                let started = Instant::now();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| ui.start(self)));
                ui_time = started.elapsed();
                match outcome {
                    Ok(()) => log::info!("bridge: UI loop returned after {ui_time:?}"),
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        log::error!("bridge: UI loop panicked: {message}");
                        // End the receive loop so the dispatcher can be joined.
                        if let Err(e) = session.threadsafe_call(SessionCall::Quit) {
                            log::warn!("bridge: quit after UI panic failed: {e}");
                        }
                        ui_panic = Some(message);
                    }
                }
            }
            GateOutcome::Abandoned => {
                log::warn!("bridge: session ended before the handshake, UI not started");
            }
        }

        let joined = handle.join(self.config.join_timeout());

        let error = errors.take();
        if let Some(text) = &error {
            self.output.line(text);
        }
        let profile = profiler.map(|profiler| profiler.finish(ui_time));
        if let Some(report) = &profile {
            self.output.line(&report.to_string());
        }

        if let Some(message) = ui_panic {
            if let Err(e) = joined {
                log::warn!("bridge: {e}");
            }
            return Err(BridgeError::UiPanicked(message));
        }
        joined?;
        Ok(ConnectionReport { error, profile })
    }

    fn set_state(&self, state: BridgeState) {
        *self.state.lock() = state;
    }

    /// Detach the UI and ask the editor to quit. Never fails.
    pub fn exit(&self) {
        self.detach();
        self.call(SessionCall::Quit);
    }

    /// Send raw input keys.
    pub fn input(&self, text: &str) {
        self.call(SessionCall::Input(text.to_string()));
    }

    pub fn resize(&self, columns: u16, rows: u16) {
        self.call(SessionCall::TryResize { columns, rows });
    }

    pub fn attach(&self, columns: u16, rows: u16, color: ColorMode) {
        self.call(SessionCall::Attach {
            columns,
            rows,
            color,
        });
    }

    pub fn detach(&self) {
        self.call(SessionCall::Detach);
    }

    fn call(&self, call: SessionCall) {
        // Clone out of the lock so a slow session never blocks `connect`.
        let session = self.session.lock().clone();
        let Some(session) = session else {
            log::warn!("bridge: dropping {} call, no live session", call.name());
            return;
        };
        let name = call.name();
        if let Err(e) = session.threadsafe_call(call) {
            log::warn!("bridge: {name} call failed: {e}");
        }
    }
}
