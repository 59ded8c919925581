//! Initial infection strategies.
//!
//! Each strategy runs once, before the first tick. The "only seed an empty
//! epidemic" guard lives in [`Simulation`](crate::Simulation); the functions
//! here only refuse requests that could never be satisfied.

use crate::error::{Result, SimError};
use crate::graph::Graph;
use crate::node::{NodeId, NodeStatus};

use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Seeding strategy identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStrategy {
    /// Infect `n` distinct random nodes
    Random,

    /// Infect every node whose out-degree exceeds `s`
    Degree,

    /// Infect `k` nodes breadth-first from a random root
    Bfs,
}

impl SeedStrategy {
    /// Returns all strategies.
    pub fn all() -> Vec<SeedStrategy> {
        vec![SeedStrategy::Random, SeedStrategy::Degree, SeedStrategy::Bfs]
    }

    /// Returns the strategy name.
    pub fn name(&self) -> &'static str {
        match self {
            SeedStrategy::Random => "random",
            SeedStrategy::Degree => "degree",
            SeedStrategy::Bfs => "bfs",
        }
    }

    /// Returns a description of the strategy.
    pub fn description(&self) -> &'static str {
        match self {
            SeedStrategy::Random => "infect n uniformly random distinct nodes",
            SeedStrategy::Degree => "infect every node with out-degree greater than s",
            SeedStrategy::Bfs => "infect k nodes breadth-first from a random root",
        }
    }

    /// Runs the strategy using the graph's current parameters.
    pub fn apply<R: Rng + ?Sized>(&self, graph: &mut Graph, rng: &mut R) -> Result<Vec<NodeId>> {
        let params = graph.params().clone();
        match self {
            SeedStrategy::Random => seed_random(graph, params.random_count, rng),
            SeedStrategy::Degree => Ok(seed_degree(graph, params.degree_threshold)),
            SeedStrategy::Bfs => seed_bfs(graph, params.bfs_count, rng),
        }
    }
}

impl std::fmt::Display for SeedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SeedStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" | "n" => Ok(SeedStrategy::Random),
            "degree" | "s" => Ok(SeedStrategy::Degree),
            "bfs" | "k" => Ok(SeedStrategy::Bfs),
            _ => Err(format!("Unknown seeding strategy: {}", s)),
        }
    }
}

/// Infects exactly `n` distinct susceptible nodes drawn uniformly from all
/// nodes. Draws that land on a non-susceptible node are rejected.
pub fn seed_random<R: Rng + ?Sized>(graph: &mut Graph, n: usize, rng: &mut R) -> Result<Vec<NodeId>> {
    let available = graph.counts().susceptible;
    if n > available {
        return Err(SimError::SeedCountExceedsPopulation {
            requested: n,
            available,
        });
    }

    let node_count = graph.node_count();
    let mut seeded = Vec::with_capacity(n);
    while seeded.len() < n {
        let id = NodeId(rng.gen_range(0..node_count));
        if graph.infect(id) {
            seeded.push(id);
        }
    }

    info!("Random seeding infected {} nodes", seeded.len());
    Ok(seeded)
}

/// Infects every susceptible node whose out-degree is strictly greater than `s`.
pub fn seed_degree(graph: &mut Graph, s: usize) -> Vec<NodeId> {
    let candidates: Vec<NodeId> = graph
        .node_ids()
        .filter(|&id| graph.degree(id) > s)
        .collect();

    let seeded: Vec<NodeId> = candidates
        .into_iter()
        .filter(|&id| graph.infect(id))
        .collect();

    info!("Degree seeding (s={}) infected {} nodes", s, seeded.len());
    seeded
}

/// Picks a uniformly random root and infects up to `k` nodes breadth-first.
pub fn seed_bfs<R: Rng + ?Sized>(graph: &mut Graph, k: usize, rng: &mut R) -> Result<Vec<NodeId>> {
    let node_count = graph.node_count();
    if k > node_count || node_count == 0 {
        return Err(SimError::SeedCountExceedsPopulation {
            requested: k,
            available: node_count,
        });
    }

    let root = NodeId(rng.gen_range(0..node_count));
    Ok(bfs_from(graph, root, k))
}

/// Breadth-first traversal from `root`, infecting each dequeued node until
/// `k` nodes have been dequeued or the reachable set is exhausted.
///
/// Children are visited in edge order, so the result is a function of
/// `root` and `k` alone.
pub fn bfs_from(graph: &mut Graph, root: NodeId, k: usize) -> Vec<NodeId> {
    let mut visited = vec![false; graph.node_count()];
    let mut queue = VecDeque::new();
    let mut seeded = Vec::with_capacity(k);
    let mut dequeued = 0;

    visited[root.index()] = true;
    queue.push_back(root);

    while dequeued < k {
        let Some(next) = queue.pop_front() else {
            break;
        };
        dequeued += 1;

        if graph.infect(next) {
            seeded.push(next);
        } else {
            debug!("BFS visited {} but it was already {}", next, graph.status(next));
        }

        for edge in graph.sorted_children(next) {
            let target = edge.target();
            if !visited[target.index()] {
                visited[target.index()] = true;
                queue.push_back(target);
            }
        }
    }

    if dequeued < k {
        warn!(
            "BFS from {} reached only {} of {} requested nodes",
            graph.name_of(root).unwrap_or("?"),
            dequeued,
            k
        );
    }

    info!("BFS seeding infected {} nodes", seeded.len());
    debug_assert!(seeded.iter().all(|&id| graph.status(id) == NodeStatus::Infected));
    seeded
}
