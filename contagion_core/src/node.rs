//! Node identity and epidemiological status.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Dense index of a node inside a [`Graph`](crate::Graph).
///
/// Assigned in insertion order and never reused, since nodes are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Returns the raw index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Epidemiological status of a node.
///
/// Legal transitions: `Susceptible -> Infected -> {Recovered | Dead}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Susceptible,
    Infected,
    Recovered,
    Dead,
}

impl NodeStatus {
    /// Returns true if `self -> next` is a legal status change.
    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (NodeStatus::Susceptible, NodeStatus::Infected)
                | (NodeStatus::Infected, NodeStatus::Recovered)
                | (NodeStatus::Infected, NodeStatus::Dead)
        )
    }

    /// Single-letter code used in listings.
    pub fn code(self) -> char {
        match self {
            NodeStatus::Susceptible => 's',
            NodeStatus::Infected => 'i',
            NodeStatus::Recovered => 'r',
            NodeStatus::Dead => 'd',
        }
    }

    /// Returns true for `Recovered` and `Dead`.
    pub fn is_resolved(self) -> bool {
        matches!(self, NodeStatus::Recovered | NodeStatus::Dead)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Susceptible => "susceptible",
            NodeStatus::Infected => "infected",
            NodeStatus::Recovered => "recovered",
            NodeStatus::Dead => "dead",
        };
        f.write_str(name)
    }
}

/// Owned snapshot of a node: its name plus current status and infection age.
///
/// Equality and hashing use the name only; ordering is by name, then status,
/// then age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: Arc<str>,
    pub status: NodeStatus,
    pub infection_age: u32,
}

impl Node {
    /// Creates a susceptible node with age 0.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            status: NodeStatus::Susceptible,
            infection_age: 0,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.status.cmp(&other.status))
            .then(self.infection_age.cmp(&other.infection_age))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.status.code())
    }
}
