//! Operator-facing output: the `attached` marker, captured errors and the
//! profile report.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Shared line writer. Clones write to the same sink.
#[derive(Clone)]
pub struct OperatorOutput {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Default for OperatorOutput {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for OperatorOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorOutput").finish_non_exhaustive()
    }
}

impl OperatorOutput {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write `text` followed by a newline and flush.
    ///
    /// Write failures are logged, never returned: operator output is
    /// informational and must not abort teardown.
    pub fn line(&self, text: &str) {
        let mut sink = self.sink.lock();
        let result = writeln!(sink, "{text}").and_then(|()| sink.flush());
        if let Err(e) = result {
            log::warn!("operator output write failed: {e}");
        }
    }
}
