//! One-shot startup rendezvous between the dispatcher and the UI thread.

use parking_lot::{Condvar, Mutex};

/// How a [`StartupGate::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The session signalled readiness.
    Ready,
    /// The receive loop ended before readiness; the UI must not start.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Pending,
    Settled(GateOutcome),
}

/// Binary one-shot gate, created unsignalled.
///
/// The first of [`signal`](Self::signal) or [`abandon`](Self::abandon) settles
/// it; every later call is a no-op. [`wait`](Self::wait) blocks until settled
/// and then returns the same outcome on every call.
#[derive(Debug)]
pub struct StartupGate {
    state: Mutex<GateState>,
    settled: Condvar,
}

impl Default for StartupGate {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
            settled: Condvar::new(),
        }
    }

    /// Mark the session ready. Returns `true` if this call released the gate.
    pub fn signal(&self) -> bool {
        self.settle(GateOutcome::Ready)
    }

    /// Release waiters without readiness. Returns `true` if this call settled
    /// the gate.
    pub fn abandon(&self) -> bool {
        self.settle(GateOutcome::Abandoned)
    }

    /// Block until the gate is settled.
    pub fn wait(&self) -> GateOutcome {
        let mut state = self.state.lock();
        loop {
            match *state {
                GateState::Settled(outcome) => return outcome,
                GateState::Pending => self.settled.wait(&mut state),
            }
        }
    }

    pub fn is_signaled(&self) -> bool {
        *self.state.lock() == GateState::Settled(GateOutcome::Ready)
    }

    fn settle(&self, outcome: GateOutcome) -> bool {
        let mut state = self.state.lock();
        if *state != GateState::Pending {
            log::trace!("startup gate already settled, ignoring {outcome:?}");
            return false;
        }
        *state = GateState::Settled(outcome);
        drop(state);
        self.settled.notify_all();
        true
    }
}
