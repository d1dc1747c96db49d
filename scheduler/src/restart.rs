//! Auto-restart countdown.
//!
//! After any terminal outcome the kiosk shows a visible countdown back to
//! the next scanning window. Exactly one countdown runs at a time; starting
//! a new one cancels any prior one.

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One scheduled restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartPlan {
    pub seconds: u64,
    /// When true the UI returns to scanning immediately and the countdown
    /// runs in the background (identity failures — the kiosk keeps scanning
    /// during the grace period). When false the scanning restart is deferred
    /// until the countdown reaches zero (credential failures, successful
    /// unlocks — resources are already quiescent).
    pub immediate_switch: bool,
}

/// Emitted once per second while a countdown runs, then once at zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick {
        remaining_secs: u64,
        immediate_switch: bool,
    },
    Finished {
        immediate_switch: bool,
    },
}

/// Drives the post-terminal auto-restart countdown.
pub struct RestartScheduler {
    events: mpsc::UnboundedSender<CountdownEvent>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl RestartScheduler {
    /// Countdown events are delivered on the returned receiver; the consumer
    /// forwards ticks to the UI and performs the scanning reset on
    /// `Finished` when the switch was deferred.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CountdownEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                current: Mutex::new(None),
            },
            rx,
        )
    }

    /// Start a countdown, cancelling any countdown already running.
    pub fn schedule(&self, plan: RestartPlan) {
        self.cancel();

        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let mut remaining = plan.seconds;
            while remaining > 0 {
                let _ = events.send(CountdownEvent::Tick {
                    remaining_secs: remaining,
                    immediate_switch: plan.immediate_switch,
                });
                tokio::time::sleep(Duration::from_secs(1)).await;
                remaining -= 1;
            }
            let _ = events.send(CountdownEvent::Finished {
                immediate_switch: plan.immediate_switch,
            });
        });

        *self.current.lock().unwrap() = Some(handle);
    }

    /// Cancel the running countdown, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(handle) = self.current.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Whether a countdown is currently running.
    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
