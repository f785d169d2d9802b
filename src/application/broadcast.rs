//! Recorder notification channel
//!
//! One-way, lossy broadcast from the resource owner to whichever
//! controllers happen to be listening. Events published while nobody is
//! subscribed are lost; controllers recover by reconciling against the
//! owner's status.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::error::ErrorCode;

/// Events queued per subscriber before further events are dropped
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 16;

/// Recorder notification payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderEvent {
    StateChanged { is_recording: bool },
    Error(ErrorCode),
}

#[derive(Default)]
struct Registry {
    subscribers: Mutex<Vec<(u64, mpsc::Sender<RecorderEvent>)>>,
    next_id: AtomicU64,
}

/// Broadcast channel for [`RecorderEvent`]s.
/// Cloning yields another handle to the same channel.
#[derive(Clone, Default)]
pub struct NotificationChannel {
    registry: Arc<Registry>,
}

impl NotificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It receives events published from now on
    /// until the returned [`Subscription`] is dropped.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, tx));
        Subscription {
            id,
            rx,
            channel: self.clone(),
        }
    }

    /// Deliver `event` to every current subscriber without waiting.
    /// Returns how many subscribers received it.
    pub fn publish(&self, event: RecorderEvent) -> usize {
        let mut subscribers = self.lock();
        let mut delivered = 0;
        subscribers.retain(|(id, tx)| match tx.try_send(event) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!("subscriber {} is not keeping up, dropped {:?}", id, event);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        if delivered == 0 {
            debug!("no listener for {:?}", event);
        }
        delivered
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().retain(|(sub_id, _)| *sub_id != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, mpsc::Sender<RecorderEvent>)>> {
        self.registry
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// A registered listener. Dropping it unregisters.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<RecorderEvent>,
    channel: NotificationChannel,
}

impl Subscription {
    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<RecorderEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event, if any
    pub fn try_recv(&mut self) -> Option<RecorderEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.unsubscribe(self.id);
    }
}
