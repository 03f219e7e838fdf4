pub mod node;

pub use node::{LogSummary, NodeContext, NodeOptions, NodeState};
