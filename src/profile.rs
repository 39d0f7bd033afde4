//! Optional profiling of the UI loop and redraw handlers.
//!
//! When a sort key is requested at connect time the controller times the
//! whole [`crate::Ui::start`] call and the redraw applier times every handler
//! invocation. The resulting [`ProfileReport`] is printed after teardown.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

pub use nvim_bridge_config::ProfileSort;

/// Entries shown in a printed report.
pub const REPORT_LIMIT: usize = 30;

/// Accumulated statistics for one redraw operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    pub calls: u64,
    pub total: Duration,
}

impl OpStats {
    pub fn per_call(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total / calls,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.calls as f64),
        }
    }
}

#[derive(Debug)]
pub struct Profiler {
    sort: ProfileSort,
    ops: Mutex<HashMap<String, OpStats>>,
    notifications: AtomicU64,
}

impl Profiler {
    pub fn new(sort: ProfileSort) -> Self {
        Self {
            sort,
            ops: Mutex::new(HashMap::new()),
            notifications: AtomicU64::new(0),
        }
    }

    /// Count one applied redraw notification.
    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one handler invocation for `op`.
    pub fn record_op(&self, op: &str, elapsed: Duration) {
        let mut ops = self.ops.lock();
        let stats = ops.entry(op.to_string()).or_default();
        stats.calls += 1;
        stats.total += elapsed;
    }

    /// Build the report; `ui_time` is the wall time spent in the UI loop.
    pub fn finish(&self, ui_time: Duration) -> ProfileReport {
        let mut entries: Vec<(String, OpStats)> = self
            .ops
            .lock()
            .iter()
            .map(|(op, stats)| (op.clone(), *stats))
            .collect();

        match self.sort {
            ProfileSort::Calls => {
                entries.sort_by(|a, b| b.1.calls.cmp(&a.1.calls).then_with(|| a.0.cmp(&b.0)));
            }
            ProfileSort::Cumulative => {
                entries.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(&b.0)));
            }
            ProfileSort::Name => entries.sort_by(|a, b| a.0.cmp(&b.0)),
        }
        let total_ops = entries.len();
        entries.truncate(REPORT_LIMIT);

        ProfileReport {
            sort: self.sort,
            ui_time,
            notifications: self.notifications.load(Ordering::Relaxed),
            total_ops,
            entries,
        }
    }
}

/// Profile of one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub sort: ProfileSort,
    pub ui_time: Duration,
    /// Redraw notifications applied.
    pub notifications: u64,
    /// Distinct operations seen, including ones cut from `entries`.
    pub total_ops: usize,
    /// At most [`REPORT_LIMIT`] entries, in `sort` order.
    pub entries: Vec<(String, OpStats)>,
}

impl ProfileReport {
    pub fn get(&self, op: &str) -> Option<&OpStats> {
        self.entries
            .iter()
            .find_map(|(name, stats)| (name == op).then_some(stats))
    }
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "UI loop ran {:.3}s, {} redraw notifications, {} operations (sorted by {})",
            self.ui_time.as_secs_f64(),
            self.notifications,
            self.total_ops,
            self.sort
        )?;
        writeln!(
            f,
            "{:>10} {:>12} {:>12}  operation",
            "calls", "cumtime", "percall"
        )?;
        for (op, stats) in &self.entries {
            writeln!(
                f,
                "{:>10} {:>12.6} {:>12.6}  {op}",
                stats.calls,
                stats.total.as_secs_f64(),
                stats.per_call().as_secs_f64()
            )?;
        }
        Ok(())
    }
}
