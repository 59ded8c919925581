//! Directed, labeled edges.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A directed arc to a destination node.
///
/// The destination is held by index plus its (shared) name, so edges can be
/// ordered deterministically without consulting the graph. Ordering is by
/// destination name, then label; this is the child-visitation order used by
/// breadth-first seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    target: NodeId,
    target_name: Arc<str>,
    label: Arc<str>,
}

impl Edge {
    /// Creates an edge to `target` named `target_name`.
    pub fn new(target: NodeId, target_name: Arc<str>, label: impl Into<Arc<str>>) -> Self {
        Self {
            target,
            target_name,
            label: label.into(),
        }
    }

    /// Index of the destination node.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Name of the destination node.
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Edge label (may be empty).
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.target_name == other.target_name && self.label == other.label
    }
}

impl Eq for Edge {}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.target_name.hash(state);
        self.label.hash(state);
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.target_name
            .cmp(&other.target_name)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.target_name, self.label)
    }
}
