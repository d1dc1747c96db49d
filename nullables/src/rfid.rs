//! Nullable RFID bridge — scripted taps instead of a reader.

use async_trait::async_trait;
use reclaim_identity::{RfidBridge, RfidError, TapEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct Inner {
    taps: Mutex<Vec<TapEvent>>,
    push_available: bool,
    poll_answer: Mutex<Option<String>>,
    /// Held so the push channel stays open after the script is delivered —
    /// a closed channel means "push lost, fall back to polling".
    live_sender: Mutex<Option<mpsc::Sender<TapEvent>>>,
    subscribes: AtomicU32,
    polls: AtomicU32,
    stops: AtomicU32,
}

/// An RFID bridge that answers from a script.
#[derive(Clone)]
pub struct NullRfidBridge {
    inner: Arc<Inner>,
}

impl NullRfidBridge {
    fn build(taps: Vec<TapEvent>, push_available: bool, poll_answer: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                taps: Mutex::new(taps),
                push_available,
                poll_answer: Mutex::new(poll_answer),
                live_sender: Mutex::new(None),
                subscribes: AtomicU32::new(0),
                polls: AtomicU32::new(0),
                stops: AtomicU32::new(0),
            }),
        }
    }

    /// Push channel works and delivers these taps in order.
    pub fn with_taps(taps: Vec<TapEvent>) -> Self {
        Self::build(taps, true, None)
    }

    /// Push channel cannot be established; polling answers with this UID
    /// (`None` = the poll window elapses without a card).
    pub fn push_unavailable_with_poll(poll_answer: Option<String>) -> Self {
        Self::build(Vec::new(), false, poll_answer)
    }

    pub fn subscribe_count(&self) -> u32 {
        self.inner.subscribes.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> u32 {
        self.inner.polls.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.inner.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RfidBridge for NullRfidBridge {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TapEvent>, RfidError> {
        self.inner.subscribes.fetch_add(1, Ordering::SeqCst);
        if !self.inner.push_available {
            return Err(RfidError::ChannelUnavailable("scripted refusal".into()));
        }

        let (tx, rx) = mpsc::channel(16);
        for tap in self.inner.taps.lock().unwrap().drain(..) {
            let _ = tx.try_send(tap);
        }
        *self.inner.live_sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn poll(&self, _timeout_secs: u64) -> Result<Option<String>, RfidError> {
        self.inner.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.poll_answer.lock().unwrap().clone())
    }

    fn stop(&self) {
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
        // Dropping the sender closes any live push channel.
        self.inner.live_sender.lock().unwrap().take();
    }
}
