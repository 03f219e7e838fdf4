//! Diagram wiring: builder, immutable diagram and its mutable context.

mod builder;
mod context;
mod diagram;
mod sources;

pub use builder::DiagramBuilder;
pub use context::Context;
pub use diagram::{Diagram, ListenerStatus};
pub use sources::{ConstantVectorSource, VectorSource};

#[cfg(test)]
pub(crate) use diagram::test_support;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a system added with [`DiagramBuilder::add_system`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SystemId(pub usize);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({})", self.0)
    }
}
