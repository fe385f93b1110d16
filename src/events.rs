//! Typed publish/subscribe channels.
//!
//! A [`Broadcaster`] fans every published value out to all live subscribers over
//! unbounded mpsc channels, so delivery is lossless and in publish order. Dropping a
//! [`Subscription`] unsubscribes it; closed senders are pruned on the next publish.
//!
//! A *stateful* broadcaster remembers the last value and replays it to each new
//! subscriber before anything else (used for connection status).
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

struct Inner<T> {
    last: Option<T>,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

pub struct Broadcaster<T: Clone> {
    stateful: bool,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> Broadcaster<T> {
    /// Broadcaster without replay.
    pub fn new() -> Self {
        Self {
            stateful: false,
            inner: Mutex::new(Inner {
                last: None,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Broadcaster that replays the latest value (starting at `initial`) on subscribe.
    pub fn stateful(initial: T) -> Self {
        Self {
            stateful: true,
            inner: Mutex::new(Inner {
                last: Some(initial),
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn publish(&self, value: T) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        if self.stateful {
            inner.last = Some(value);
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = &inner.last {
            // Cannot fail: rx is alive.
            let _ = tx.send(last.clone());
        }
        inner.subscribers.push(tx);
        Subscription { rx }
    }

    /// Latest published value (stateful broadcasters only).
    pub fn latest(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .clone()
    }

    /// Subscribers still registered (dropped ones are counted until the next publish).
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }
}

impl<T: Clone> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a [`Broadcaster`]. Drop (or [`Subscription::unsubscribe`]) to stop.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Next value; `None` once the broadcaster is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next already-queued value, if any.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(v) = self.rx.try_recv() {
            out.push(v);
        }
        out
    }

    pub fn unsubscribe(self) {}
}
