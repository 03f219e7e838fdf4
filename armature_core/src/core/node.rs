use crate::communication::hub::{Hub, Subscription, Topic, DEFAULT_TOPIC_CAPACITY};
use crate::error::{ArmatureError, ArmatureResult};
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Trait for providing lightweight logging summaries of message types
///
/// Large messages (scene loads, marker arrays) should only report metadata so
/// that trace-level publish logging never formats the whole payload.
pub trait LogSummary {
    /// Return a compact string representation suitable for logging
    fn log_summary(&self) -> String;
}

impl LogSummary for String {
    fn log_summary(&self) -> String {
        self.clone()
    }
}

impl LogSummary for f64 {
    fn log_summary(&self) -> String {
        format!("{}", self)
    }
}

/// Lifecycle of a node context
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Initializing,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Initializing => write!(f, "Initializing"),
            NodeState::Running => write!(f, "Running"),
            NodeState::Stopping => write!(f, "Stopping"),
            NodeState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Options for [`NodeContext::init`]
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub name: String,
    /// When false, a Ctrl+C handler is installed that requests shutdown
    pub disable_signals: bool,
    /// Queue depth for every topic created by this node
    pub topic_capacity: usize,
}

impl NodeOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disable_signals: false,
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
        }
    }

    pub fn disable_signals(mut self, disable: bool) -> Self {
        self.disable_signals = disable;
        self
    }

    pub fn topic_capacity(mut self, capacity: usize) -> Self {
        self.topic_capacity = capacity.max(1);
        self
    }
}

struct TopicEntry {
    type_name: &'static str,
    topic: Box<dyn Any + Send + Sync>,
    close: Box<dyn Fn() + Send + Sync>,
}

/// Process-level middleware state for one named node.
///
/// Owns the in-process topic registry and the shutdown flag. Bridges receive a
/// reference to the context instead of touching global state; dropping the
/// context shuts it down.
pub struct NodeContext {
    name: String,
    instance_id: Uuid,
    options: NodeOptions,
    state: Mutex<NodeState>,
    shutdown_requested: Arc<AtomicBool>,
    topics: Mutex<HashMap<String, TopicEntry>>,
    started_at: Instant,
}

impl NodeContext {
    /// Initialize the node. Must succeed before any hub is created.
    pub fn init(options: NodeOptions) -> ArmatureResult<Self> {
        validate_name(&options.name)?;

        let shutdown_requested = Arc::new(AtomicBool::new(false));
        if !options.disable_signals {
            let flag = shutdown_requested.clone();
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::SeqCst);
            })
            .map_err(|e| ArmatureError::SignalHandler(e.to_string()))?;
        }

        let node = Self {
            name: options.name.clone(),
            instance_id: Uuid::new_v4(),
            options,
            state: Mutex::new(NodeState::Initializing),
            shutdown_requested,
            topics: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
        };
        *node.state.lock() = NodeState::Running;

        tracing::info!(
            node = %node.name,
            instance = %node.instance_id,
            signals = !node.options.disable_signals,
            "node initialized"
        );
        Ok(node)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn state(&self) -> NodeState {
        self.state.lock().clone()
    }

    pub fn signals_enabled(&self) -> bool {
        !self.options.disable_signals
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// True while the node is running and no shutdown has been requested
    pub fn ok(&self) -> bool {
        *self.state.lock() == NodeState::Running && !self.shutdown_requested()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Ask the owner loop to stop at its next check.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Shared flag set by the signal handler or [`request_shutdown`](Self::request_shutdown)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown_requested.clone()
    }

    /// Create a publisher for `topic`, registering the topic if needed.
    pub fn advertise<T>(&self, topic: &str) -> ArmatureResult<Hub<T>>
    where
        T: Clone + Send + 'static,
    {
        let topic = self.topic::<T>(topic)?;
        Ok(Hub::from_topic(topic))
    }

    /// Subscribe to `topic`, registering it if nobody advertised it yet.
    pub fn subscribe<T>(&self, topic: &str) -> ArmatureResult<Subscription<T>>
    where
        T: Clone + Send + 'static,
    {
        let topic = self.topic::<T>(topic)?;
        Ok(topic.subscribe())
    }

    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop the node and disconnect every subscriber. Idempotent.
    pub fn shutdown(&self) -> ArmatureResult<()> {
        {
            let mut state = self.state.lock();
            if *state == NodeState::Stopped {
                return Ok(());
            }
            *state = NodeState::Stopping;
        }

        let topic_count = {
            let mut topics = self.topics.lock();
            let count = topics.len();
            for entry in topics.values() {
                (entry.close)();
            }
            topics.clear();
            count
        };

        *self.state.lock() = NodeState::Stopped;
        tracing::info!(
            node = %self.name,
            topics = topic_count,
            uptime_s = self.uptime().as_secs_f64(),
            "node shut down"
        );
        Ok(())
    }

    fn topic<T>(&self, name: &str) -> ArmatureResult<Arc<Topic<T>>>
    where
        T: Clone + Send + 'static,
    {
        if *self.state.lock() != NodeState::Running {
            return Err(ArmatureError::NodeShutdown(self.name.clone()));
        }
        validate_name(name)?;

        let mut topics = self.topics.lock();
        if let Some(entry) = topics.get(name) {
            return entry
                .topic
                .downcast_ref::<Arc<Topic<T>>>()
                .cloned()
                .ok_or_else(|| ArmatureError::TopicTypeMismatch {
                    topic: name.to_string(),
                    existing: entry.type_name.to_string(),
                });
        }

        let topic = Arc::new(Topic::new(name, self.options.topic_capacity));
        let closer = topic.clone();
        topics.insert(
            name.to_string(),
            TopicEntry {
                type_name: type_name::<T>(),
                topic: Box::new(topic.clone()),
                close: Box::new(move || closer.close()),
            },
        );
        tracing::debug!(node = %self.name, topic = name, msg_type = type_name::<T>(), "topic registered");
        Ok(topic)
    }
}

impl Drop for NodeContext {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(node = %self.name, "shutdown on drop failed: {}", e);
        }
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> ArmatureResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('/')
        && !name.ends_with('/')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/');
    if valid {
        Ok(())
    } else {
        Err(ArmatureError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_node(name: &str) -> NodeContext {
        NodeContext::init(NodeOptions::new(name).disable_signals(true)).unwrap()
    }

    #[test]
    fn test_init_and_shutdown() {
        let node = quiet_node("demo");
        assert_eq!(node.name(), "demo");
        assert_eq!(node.state(), NodeState::Running);
        assert!(node.ok());
        assert!(!node.signals_enabled());

        node.shutdown().unwrap();
        assert_eq!(node.state(), NodeState::Stopped);
        assert!(!node.ok());

        // second shutdown is a no-op
        node.shutdown().unwrap();
    }

    #[test]
    fn test_invalid_names_rejected() {
        for bad in ["", "has space", "/leading", "trailing/", "dash-name"] {
            let result = NodeContext::init(NodeOptions::new(bad).disable_signals(true));
            assert!(
                matches!(result, Err(ArmatureError::InvalidName(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_topic_type_mismatch() {
        let node = quiet_node("typed");
        let _hub = node.advertise::<String>("scene/draw").unwrap();
        let err = node.advertise::<f64>("scene/draw").unwrap_err();
        assert!(matches!(err, ArmatureError::TopicTypeMismatch { .. }));
    }

    #[test]
    fn test_advertise_after_shutdown_fails() {
        let node = quiet_node("late");
        node.shutdown().unwrap();
        let err = node.advertise::<String>("chatter").unwrap_err();
        assert!(matches!(err, ArmatureError::NodeShutdown(_)));
    }

    #[test]
    fn test_request_shutdown_clears_ok() {
        let node = quiet_node("flagged");
        node.request_shutdown();
        assert!(node.shutdown_requested());
        assert!(!node.ok());
        assert_eq!(node.state(), NodeState::Running);
    }

    #[test]
    fn test_topic_names_sorted() {
        let node = quiet_node("names");
        node.advertise::<String>("scene/load").unwrap();
        node.subscribe::<String>("scene/draw").unwrap();
        assert_eq!(node.topic_names(), vec!["scene/draw", "scene/load"]);
    }
}
