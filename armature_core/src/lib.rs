//! # Armature Core
//!
//! Runtime building blocks shared by every Armature crate:
//!
//! - **Node context**: explicit process-level middleware state (node identity,
//!   signal handling, topic registry) with an `init`/`shutdown` lifecycle
//! - **Communication**: in-process [`Hub`] topics and the datagram [`UdpLink`]
//!   used to reach out-of-process listeners
//! - **Logging**: one-shot `tracing` subscriber setup for binaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use armature_core::{NodeContext, NodeOptions};
//!
//! let node = NodeContext::init(NodeOptions::new("demo").disable_signals(true)).unwrap();
//! let hub = node.advertise::<String>("chatter").unwrap();
//! let sub = node.subscribe::<String>("chatter").unwrap();
//!
//! hub.send("hello".to_string()).unwrap();
//! assert_eq!(sub.recv().as_deref(), Some("hello"));
//! node.shutdown().unwrap();
//! ```

pub mod communication;
pub mod core;
pub mod error;
pub mod logging;

pub use communication::{Hub, HubMetrics, ReconnectStrategy, Subscription, UdpLink};
pub use core::{LogSummary, NodeContext, NodeOptions, NodeState};
pub use error::{ArmatureError, ArmatureResult};
