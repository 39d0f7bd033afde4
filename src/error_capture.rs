//! Single-slot store for the failure that ended a connection.
//!
//! Written by the redraw applier on the UI thread, read by the controller
//! after the UI loop returns. The slot is mutex-guarded; the happens-before
//! chain (capture, quit request, loop exit, read) is not relied upon.

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct ErrorCapture {
    slot: Mutex<Option<String>>,
}

impl ErrorCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` if the slot is empty. Returns `true` if it was stored.
    pub fn capture(&self, text: impl Into<String>) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(text.into());
        true
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Remove and return the captured text.
    pub fn take(&self) -> Option<String> {
        self.slot.lock().take()
    }
}
