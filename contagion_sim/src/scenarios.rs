//! Built-in synthetic topologies.
//!
//! Every generator names its nodes `n0 .. n{N-1}` and adds all of them up
//! front, so isolated nodes still count toward the population.

use contagion_core::Graph;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Mean out-degree targeted by the random topology.
const RANDOM_MEAN_DEGREE: f64 = 4.0;

/// Topology identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Each node linked both ways to its successor, closing a cycle
    Ring,

    /// One hub linked both ways to every other node
    Star,

    /// Square lattice with 4-neighbour links
    Grid,

    /// Every ordered pair of distinct nodes
    Complete,

    /// Each ordered pair linked independently (Erdős–Rényi)
    Random,
}

impl Topology {
    /// Returns a list of all topologies.
    pub fn all() -> Vec<Topology> {
        vec![
            Topology::Ring,
            Topology::Star,
            Topology::Grid,
            Topology::Complete,
            Topology::Random,
        ]
    }

    /// Returns the topology name.
    pub fn name(&self) -> &'static str {
        match self {
            Topology::Ring => "ring",
            Topology::Star => "star",
            Topology::Grid => "grid",
            Topology::Complete => "complete",
            Topology::Random => "random",
        }
    }

    /// Returns a description of the topology.
    pub fn description(&self) -> &'static str {
        match self {
            Topology::Ring => "bidirectional cycle, degree 2 everywhere",
            Topology::Star => "one hub connected to every leaf",
            Topology::Grid => "square lattice, up to 4 neighbours per node",
            Topology::Complete => "every node points at every other node",
            Topology::Random => "independent edges with mean out-degree 4",
        }
    }

    /// Builds a graph of `nodes` nodes. Only [`Topology::Random`] uses `seed`.
    pub fn build(&self, nodes: usize, seed: u64) -> Graph {
        let mut graph = Graph::new();
        let names: Vec<String> = (0..nodes).map(|i| format!("n{}", i)).collect();
        for name in &names {
            graph.add_node(name);
        }

        let mut link = |a: usize, b: usize| graph.add_edge(&names[a], &names[b], "");

        match self {
            Topology::Ring => {
                if nodes > 1 {
                    for i in 0..nodes {
                        let next = (i + 1) % nodes;
                        link(i, next);
                        if nodes > 2 {
                            link(next, i);
                        }
                    }
                }
            }
            Topology::Star => {
                for leaf in 1..nodes {
                    link(0, leaf);
                    link(leaf, 0);
                }
            }
            Topology::Grid => {
                let side = grid_side(nodes);
                for i in 0..nodes {
                    let right = i + 1;
                    if (i % side) + 1 < side && right < nodes {
                        link(i, right);
                        link(right, i);
                    }
                    let down = i + side;
                    if down < nodes {
                        link(i, down);
                        link(down, i);
                    }
                }
            }
            Topology::Complete => {
                for a in 0..nodes {
                    for b in (0..nodes).filter(|&b| b != a) {
                        link(a, b);
                    }
                }
            }
            Topology::Random => {
                let p = if nodes > 1 {
                    (RANDOM_MEAN_DEGREE / (nodes - 1) as f64).min(1.0)
                } else {
                    0.0
                };
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_mul(0x9e3779b97f4a7c15));
                for a in 0..nodes {
                    for b in (0..nodes).filter(|&b| b != a) {
                        if rng.gen::<f64>() < p {
                            link(a, b);
                        }
                    }
                }
            }
        }

        graph
    }
}

/// Smallest side length whose square holds `nodes`.
fn grid_side(nodes: usize) -> usize {
    let mut side = (nodes as f64).sqrt() as usize;
    while side * side < nodes {
        side += 1;
    }
    side.max(1)
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ring" | "cycle" => Ok(Topology::Ring),
            "star" | "hub" => Ok(Topology::Star),
            "grid" | "lattice" => Ok(Topology::Grid),
            "complete" | "clique" => Ok(Topology::Complete),
            "random" | "erdos_renyi" | "er" => Ok(Topology::Random),
            _ => Err(format!("Unknown topology: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_topology_has_requested_population() {
        for topology in Topology::all() {
            for nodes in [1, 2, 7, 16] {
                let g = topology.build(nodes, 3);
                assert_eq!(g.node_count(), nodes, "{} with {} nodes", topology, nodes);
                assert!(g.verify_invariants().is_ok());
            }
        }
    }

    #[test]
    fn test_ring_edges() {
        let g = Topology::Ring.build(5, 0);
        assert_eq!(g.edge_count(), 10);
        assert!(g.node_ids().all(|id| g.degree(id) == 2));

        // Two nodes would otherwise get duplicate edges.
        assert_eq!(Topology::Ring.build(2, 0).edge_count(), 2);
    }

    #[test]
    fn test_star_hub_degree() {
        let g = Topology::Star.build(6, 0);
        assert_eq!(g.degree_of("n0"), 5);
        assert_eq!(g.degree_of("n3"), 1);
    }

    #[test]
    fn test_grid_edges() {
        let g = Topology::Grid.build(9, 0);
        // 3x3 lattice: 12 undirected links
        assert_eq!(g.edge_count(), 24);
        assert_eq!(g.degree_of("n4"), 4);
        assert_eq!(g.degree_of("n0"), 2);
        assert_eq!(grid_side(10), 4);
    }

    #[test]
    fn test_complete_edges() {
        let g = Topology::Complete.build(5, 0);
        assert_eq!(g.edge_count(), 20);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Topology::Random.build(50, 11);
        let b = Topology::Random.build(50, 11);
        assert_eq!(a.adjacency_listing(), b.adjacency_listing());
        assert!(a.edge_count() > 0);
        assert!(a.node_ids().all(|id| a.neighbors(id).iter().all(|e| e.target() != id)));
    }

    proptest::proptest! {
        #[test]
        fn prop_topologies_have_no_self_loops(nodes in 0usize..40, seed in proptest::prelude::any::<u64>()) {
            for topology in Topology::all() {
                let g = topology.build(nodes, seed);
                proptest::prop_assert_eq!(g.node_count(), nodes);
                for id in g.node_ids() {
                    proptest::prop_assert!(g.neighbors(id).iter().all(|e| e.target() != id));
                }
            }
        }
    }

    #[test]
    fn test_topology_parse() {
        assert_eq!("Grid".parse::<Topology>().unwrap(), Topology::Grid);
        assert_eq!("er".parse::<Topology>().unwrap(), Topology::Random);
        assert!("torus".parse::<Topology>().is_err());
        for t in Topology::all() {
            assert_eq!(t.name().parse::<Topology>().unwrap(), t);
        }
    }
}
