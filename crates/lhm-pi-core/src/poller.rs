use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::debug;

use crate::appearance::{signature_of, Signature};
use crate::normalize::read_current_appearance;
use crate::panel::Panel;
use crate::session::SessionEvent;

pub const RECONCILE_CADENCE: Duration = Duration::from_millis(300);

/// True when the form holds something other than the last saved appearance.
pub fn needs_reconcile<P: Panel + ?Sized>(panel: &P, last_saved: Option<&Signature>) -> bool {
    let current = signature_of(&read_current_appearance(panel));
    last_saved != Some(&current)
}

/// Repeating tick task feeding `SessionEvent::PollTick` into the session queue.
#[derive(Debug)]
pub struct ReconciliationPoller {
    cadence: Duration,
    task: Option<JoinHandle<()>>,
}

impl ReconciliationPoller {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            task: None,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Starts ticking, cancelling any previous task first. The first tick lands one full
    /// cadence after the call. Must run inside a tokio runtime.
    pub fn restart(&mut self, events: mpsc::UnboundedSender<SessionEvent>) {
        self.cancel();
        let cadence = self.cadence;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(SessionEvent::PollTick).is_err() {
                    break;
                }
            }
        }));
        debug!(cadence_ms = cadence.as_millis() as u64, "reconcile_poller_started");
    }

    /// Returns whether a running task was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                debug!("reconcile_poller_cancelled");
                true
            }
            None => false,
        }
    }
}

impl Default for ReconciliationPoller {
    fn default() -> Self {
        Self::new(RECONCILE_CADENCE)
    }
}

impl Drop for ReconciliationPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
