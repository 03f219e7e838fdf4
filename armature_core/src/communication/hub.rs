use crate::core::node::LogSummary;
use crate::error::{ArmatureError, ArmatureResult};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-subscriber queue depth used when a node does not override it
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Lock-free atomic metrics for Hub monitoring
#[derive(Debug, Default)]
pub struct AtomicHubMetrics {
    pub messages_sent: AtomicU64,
    pub messages_delivered: AtomicU64,
    pub send_failures: AtomicU64,
}

impl AtomicHubMetrics {
    /// Get current metrics snapshot (for monitoring/debugging)
    pub fn snapshot(&self) -> HubMetrics {
        HubMetrics {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of a hub's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubMetrics {
    pub messages_sent: u64,
    /// Sum over subscribers of successfully queued copies
    pub messages_delivered: u64,
    /// Copies dropped because a subscriber queue was full
    pub send_failures: u64,
}

/// Shared state of one named topic. Owned by the node registry and by every
/// hub or subscription created for it.
pub(crate) struct Topic<T> {
    name: String,
    capacity: usize,
    subscribers: Mutex<Vec<Sender<T>>>,
    closed: AtomicBool,
}

impl<T: Clone + Send + 'static> Topic<T> {
    pub(crate) fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            subscribers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = channel::bounded(self.capacity);
        if !self.closed.load(Ordering::Acquire) {
            self.subscribers.lock().push(tx);
        }
        Subscription {
            topic_name: self.name.clone(),
            receiver: rx,
        }
    }

    /// Drop every sender so subscribers observe disconnection.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.subscribers.lock().clear();
    }
}

/// Publisher handle for an in-process topic.
///
/// Every subscriber gets its own bounded queue; a full queue drops that
/// subscriber's copy and counts a send failure instead of blocking.
pub struct Hub<T> {
    topic: Arc<Topic<T>>,
    metrics: Arc<AtomicHubMetrics>,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Hub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("topic_name", &self.topic.name)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Hub<T> {
    pub(crate) fn from_topic(topic: Arc<Topic<T>>) -> Self {
        Self {
            topic,
            metrics: Arc::new(AtomicHubMetrics::default()),
        }
    }

    /// Publish `msg` to every current subscriber.
    ///
    /// Returns the number of subscribers the message was queued for.
    pub fn send(&self, msg: T) -> ArmatureResult<usize>
    where
        T: LogSummary,
    {
        if self.topic.closed.load(Ordering::Acquire) {
            return Err(ArmatureError::Communication(format!(
                "topic '{}' is closed",
                self.topic.name
            )));
        }

        tracing::trace!(topic = %self.topic.name, msg = %msg.log_summary(), "pub");

        let mut delivered = 0usize;
        let mut dropped = 0u64;
        {
            let mut subscribers = self.topic.subscribers.lock();
            subscribers.retain(|tx| match tx.try_send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        }

        self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .messages_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.metrics
                .send_failures
                .fetch_add(dropped, Ordering::Relaxed);
            tracing::warn!(topic = %self.topic.name, dropped, "subscriber queue full, message dropped");
        }
        Ok(delivered)
    }

    pub fn subscriber_count(&self) -> usize {
        self.topic.subscribers.lock().len()
    }

    pub fn get_metrics(&self) -> HubMetrics {
        self.metrics.snapshot()
    }

    pub fn get_topic_name(&self) -> &str {
        &self.topic.name
    }
}

/// Receiving end of a topic
pub struct Subscription<T> {
    topic_name: String,
    receiver: Receiver<T>,
}

impl<T> Subscription<T> {
    /// Non-blocking receive
    pub fn recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Block up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take every queued message.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }
}
