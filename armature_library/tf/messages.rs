//! TF messages for sending frame transforms between processes

use super::transform::Transform;
use crate::LogSummary;
use serde::{Deserialize, Serialize};

/// One parent→child transform at a point in (simulated) time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub stamp_nanos: u64,
    pub parent_frame: String,
    pub child_frame: String,
    pub transform: Transform,
}

impl TransformStamped {
    pub fn new(
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
        transform: Transform,
        stamp_nanos: u64,
    ) -> Self {
        Self {
            stamp_nanos,
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
            transform,
        }
    }
}

/// Batch of transforms published together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TFMessage {
    pub transforms: Vec<TransformStamped>,
}

impl TFMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tf: TransformStamped) {
        self.transforms.push(tf);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl LogSummary for TFMessage {
    fn log_summary(&self) -> String {
        match self.transforms.first() {
            Some(first) => format!(
                "TFMessage({} transforms @ {}ns)",
                self.transforms.len(),
                first.stamp_nanos
            ),
            None => "TFMessage(empty)".to_string(),
        }
    }
}

/// Seconds of simulated time to a TF stamp
pub fn stamp_from_seconds(seconds: f64) -> u64 {
    if seconds <= 0.0 {
        0
    } else {
        (seconds * 1e9).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_from_seconds() {
        assert_eq!(stamp_from_seconds(0.0), 0);
        assert_eq!(stamp_from_seconds(-1.0), 0);
        assert_eq!(stamp_from_seconds(0.1), 100_000_000);
        assert_eq!(stamp_from_seconds(100.0), 100_000_000_000);
    }

    #[test]
    fn test_log_summary() {
        let mut msg = TFMessage::new();
        assert_eq!(msg.log_summary(), "TFMessage(empty)");
        msg.push(TransformStamped::new("world", "iiwa_link_1", Transform::identity(), 42));
        assert_eq!(msg.log_summary(), "TFMessage(1 transforms @ 42ns)");
    }
}
