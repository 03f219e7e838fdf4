//! Frame tree kept by TF listeners.
//!
//! Every frame stores its pose in its parent, either fixed or as a bounded
//! history of stamped samples. Lookups go through the root.

use super::messages::TFMessage;
use super::transform::Transform;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Samples kept per dynamic frame
const HISTORY_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum TFError {
    #[error("Frame '{0}' not found")]
    FrameNotFound(String),

    #[error("Parent frame '{0}' does not exist")]
    ParentNotFound(String),

    #[error("Adding '{child}' under '{parent}' would create a cycle")]
    CycleDetected { parent: String, child: String },

    #[error("Transform for '{frame}' not available at time {stamp_nanos}")]
    TransformNotAvailable { frame: String, stamp_nanos: u64 },
}

pub type TFResult<T> = Result<T, TFError>;

#[derive(Debug, Clone)]
pub struct FrameNode {
    /// `None` only for the root
    pub parent: Option<String>,
    pub fixed: Option<Transform>,
    /// Oldest first
    pub history: VecDeque<(u64, Transform)>,
}

impl FrameNode {
    /// Pose in the parent at `stamp_nanos`, interpolated between samples.
    /// Stamps after the newest sample use the newest.
    pub fn transform_at(&self, stamp_nanos: u64) -> Option<Transform> {
        if let Some(fixed) = self.fixed {
            return Some(fixed);
        }
        let after = self.history.iter().position(|(t, _)| *t >= stamp_nanos);
        match after {
            None => self.history.back().map(|(_, tf)| *tf),
            Some(i) => {
                let (t1, tf1) = self.history[i];
                if t1 == stamp_nanos {
                    return Some(tf1);
                }
                let (t0, tf0) = *self.history.get(i.checked_sub(1)?)?;
                let ratio = (stamp_nanos - t0) as f64 / (t1 - t0) as f64;
                Some(tf0.interpolate(&tf1, ratio))
            }
        }
    }
}

#[derive(Debug)]
pub struct TFTree {
    root: String,
    frames: HashMap<String, FrameNode>,
}

impl Default for TFTree {
    fn default() -> Self {
        Self::new("world")
    }
}

impl TFTree {
    pub fn new(root: impl Into<String>) -> Self {
        let mut tree = Self {
            root: root.into(),
            frames: HashMap::new(),
        };
        tree.clear();
        tree
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn has_frame(&self, name: &str) -> bool {
        self.frames.contains_key(name)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Drop every frame but the root.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.frames.insert(
            self.root.clone(),
            FrameNode {
                parent: None,
                fixed: Some(Transform::identity()),
                history: VecDeque::new(),
            },
        );
    }

    pub fn add_static_transform(&mut self, parent: &str, child: &str, transform: Transform) -> TFResult<()> {
        let frame = self.attach(parent, child)?;
        frame.fixed = Some(transform);
        frame.history.clear();
        Ok(())
    }

    /// Record a stamped sample; samples older than the newest are ignored.
    pub fn add_transform(
        &mut self,
        parent: &str,
        child: &str,
        transform: Transform,
        stamp_nanos: u64,
    ) -> TFResult<()> {
        let frame = self.attach(parent, child)?;
        frame.fixed = None;
        match frame.history.back() {
            Some((newest, _)) if *newest > stamp_nanos => return Ok(()),
            Some((newest, _)) if *newest == stamp_nanos => {
                frame.history.pop_back();
            }
            _ => {}
        }
        frame.history.push_back((stamp_nanos, transform));
        if frame.history.len() > HISTORY_CAPACITY {
            frame.history.pop_front();
        }
        Ok(())
    }

    /// Returns how many transforms of the message attached to the tree.
    pub fn apply_message(&mut self, msg: &TFMessage) -> usize {
        msg.transforms
            .iter()
            .filter(|tf| {
                self.add_transform(&tf.parent_frame, &tf.child_frame, tf.transform, tf.stamp_nanos)
                    .map_err(|e| tracing::debug!("dropping {} -> {}: {}", tf.parent_frame, tf.child_frame, e))
                    .is_ok()
            })
            .count()
    }

    /// Pose of `target` expressed in `source`
    pub fn lookup_transform(&self, source: &str, target: &str, stamp_nanos: u64) -> TFResult<Transform> {
        let root_source = self.pose_in_root(source, stamp_nanos)?;
        let root_target = self.pose_in_root(target, stamp_nanos)?;
        Ok(root_source.inverse().compose(&root_target))
    }

    pub fn lookup_latest_transform(&self, source: &str, target: &str) -> TFResult<Transform> {
        self.lookup_transform(source, target, u64::MAX)
    }

    fn pose_in_root(&self, name: &str, stamp_nanos: u64) -> TFResult<Transform> {
        let mut pose = Transform::identity();
        let mut current = name;
        loop {
            let frame = self
                .frames
                .get(current)
                .ok_or_else(|| TFError::FrameNotFound(current.to_string()))?;
            let local = frame
                .transform_at(stamp_nanos)
                .ok_or_else(|| TFError::TransformNotAvailable {
                    frame: current.to_string(),
                    stamp_nanos,
                })?;
            pose = local.compose(&pose);
            match frame.parent.as_deref() {
                Some(parent) => current = parent,
                None => return Ok(pose),
            }
        }
    }

    fn attach(&mut self, parent: &str, child: &str) -> TFResult<&mut FrameNode> {
        if !self.frames.contains_key(parent) {
            return Err(TFError::ParentNotFound(parent.to_string()));
        }
        let mut ancestor = Some(parent);
        while let Some(name) = ancestor {
            if name == child {
                return Err(TFError::CycleDetected {
                    parent: parent.to_string(),
                    child: child.to_string(),
                });
            }
            ancestor = self.frames.get(name).and_then(|f| f.parent.as_deref());
        }

        let frame = self.frames.entry(child.to_string()).or_insert_with(|| FrameNode {
            parent: None,
            fixed: None,
            history: VecDeque::new(),
        });
        frame.parent = Some(parent.to_string());
        Ok(frame)
    }
}
