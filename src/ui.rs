//! The UI capability the bridge drives.
//!
//! A UI implementation runs its own event loop inside [`Ui::start`], applies
//! scheduled screen updates on that loop, and returns once [`Ui::quit`] has
//! been called. Redraw operations are resolved through an explicit
//! [`RedrawHandlers`] table built when the UI is constructed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::bridge::Bridge;

/// Work to run on the UI thread.
pub type ScreenUpdate = Box<dyn FnOnce() + Send + 'static>;

/// Handler for one redraw operation, invoked once per argument list.
pub type RedrawHandler = Arc<dyn Fn(&[Value]) -> anyhow::Result<()> + Send + Sync>;

/// Mapping from redraw operation name to handler.
#[derive(Clone, Default)]
pub struct RedrawHandlers {
    handlers: HashMap<String, RedrawHandler>,
}

impl RedrawHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RedrawHandlers::register`].
    #[must_use]
    pub fn with<F>(mut self, op: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(op, handler);
        self
    }

    /// Register `handler` for `op`, replacing any previous handler.
    pub fn register<F>(&mut self, op: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let op = op.into();
        if self.handlers.insert(op.clone(), Arc::new(handler)).is_some() {
            log::debug!("redraw handler for '{op}' replaced");
        }
    }

    pub fn get(&self, op: &str) -> Option<&RedrawHandler> {
        self.handlers.get(op)
    }

    pub fn contains(&self, op: &str) -> bool {
        self.handlers.contains_key(op)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered operation names, sorted.
    pub fn ops(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }
}

impl fmt::Debug for RedrawHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedrawHandlers")
            .field("ops", &self.ops())
            .finish()
    }
}

/// A UI front-end connected through a [`Bridge`].
///
/// `start` runs on the UI thread. `toggle_preview`, `change_font_size`,
/// `change_font`, `schedule_screen_update` and `quit` are called from the
/// dispatcher thread.
pub trait Ui: Send + Sync {
    /// Run the UI loop. Returns only after [`Ui::quit`] has been called.
    fn start(&self, bridge: &Bridge);

    /// Ask the UI loop to return from [`Ui::start`].
    ///
    /// May arrive before `start` is entered; implementations must latch it.
    fn quit(&self);

    /// Run `update` on the UI thread, after any previously scheduled update.
    fn schedule_screen_update(&self, update: ScreenUpdate);

    fn toggle_preview(&self);

    fn change_font_size(&self, size: u32);

    fn change_font(&self, name: &str);

    /// Handlers for redraw operations.
    fn redraw_handlers(&self) -> &RedrawHandlers;
}
