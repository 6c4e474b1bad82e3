use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// One-shot stop flag that also wakes sleepers.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    triggered: Mutex<bool>,
    cvar: Condvar,
}

impl ShutdownSignal {
    pub fn trigger(&self) {
        let mut triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        *triggered = true;
        self.cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `timeout`. Returns `true` if shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        let (triggered, _) = self
            .cvar
            .wait_timeout_while(triggered, timeout, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
        *triggered
    }
}
