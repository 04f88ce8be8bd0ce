use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Process-wide "running" flag shared by every loop of a run.
///
/// Loops suspend through [`RunSignal::sleep`], which wakes early when the
/// run is stopped, so shutdown never waits out a full light phase.
#[derive(Clone, Debug)]
pub struct RunSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl RunSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_running(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn stop(&self) {
        self.tx.send_replace(false);
    }

    /// Resolves once the run has been stopped.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let running = *rx.borrow_and_update();
            if !running {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleeps for `duration` unless stopped first. Returns whether the run is still live.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        tokio::select! {
            _ = sleep(duration) => self.is_running(),
            _ = self.stopped() => false,
        }
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}
