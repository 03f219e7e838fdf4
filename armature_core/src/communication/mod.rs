//! In-process topics and the datagram link to out-of-process listeners
pub mod hub;
pub mod reconnect;
pub mod udp;

pub use hub::{AtomicHubMetrics, Hub, HubMetrics, Subscription, DEFAULT_TOPIC_CAPACITY};
pub use reconnect::ReconnectStrategy;
pub use udp::{UdpLink, MAX_DATAGRAM_SIZE};
