//! Adjacency container, aggregate counters and simulation parameters.
//!
//! The graph is split into two halves:
//! - **Topology** (names, name index, adjacency lists): grows while the graph
//!   is built and is read-only while a tick runs.
//! - **Epidemic state** (per-node status and age, infected list, counters):
//!   the only part the Tick Engine mutates, and only through
//!   [`EpidemicState`]'s transition methods.

use crate::edge::Edge;
use crate::error::{Result, SimError};
use crate::node::{Node, NodeId, NodeStatus};
use crate::params::{Param, SimParams};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Aggregate status counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,
}

impl Counts {
    /// Sum of all four counters; equals the node count at every tick boundary.
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered + self.dead
    }
}

/// Counters observed at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsSnapshot {
    pub tick: u64,
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,
}

impl CountsSnapshot {
    pub fn new(tick: u64, counts: Counts) -> Self {
        Self {
            tick,
            susceptible: counts.susceptible,
            infected: counts.infected,
            recovered: counts.recovered,
            dead: counts.dead,
        }
    }
}

/// Mutable epidemiological state, indexed by [`NodeId`].
#[derive(Debug, Clone, Default)]
pub(crate) struct EpidemicState {
    pub(crate) status: Vec<NodeStatus>,
    pub(crate) age: Vec<u32>,
    pub(crate) infected: Vec<NodeId>,
    pub(crate) counts: Counts,
}

impl EpidemicState {
    fn push_node(&mut self) {
        self.status.push(NodeStatus::Susceptible);
        self.age.push(0);
        self.counts.susceptible += 1;
    }

    /// Susceptible -> Infected. Returns false (and changes nothing) if the
    /// node is not currently susceptible.
    pub(crate) fn infect(&mut self, id: NodeId, age: u32) -> bool {
        let i = id.index();
        if self.status[i] != NodeStatus::Susceptible {
            return false;
        }
        self.status[i] = NodeStatus::Infected;
        self.age[i] = age;
        self.infected.push(id);
        self.counts.susceptible -= 1;
        self.counts.infected += 1;
        true
    }

    /// Infected -> Recovered or Dead. Returns false if the node is not
    /// currently infected.
    pub(crate) fn resolve(&mut self, id: NodeId, recovered: bool) -> bool {
        let i = id.index();
        if self.status[i] != NodeStatus::Infected {
            return false;
        }
        self.counts.infected -= 1;
        if recovered {
            self.status[i] = NodeStatus::Recovered;
            self.counts.recovered += 1;
        } else {
            self.status[i] = NodeStatus::Dead;
            self.counts.dead += 1;
        }
        true
    }

    /// Drops infected-list entries whose status is no longer `Infected`.
    pub(crate) fn retain_infected(&mut self) {
        let status = &self.status;
        self.infected
            .retain(|id| status[id.index()] == NodeStatus::Infected);
    }
}

/// Directed graph of named nodes carrying an epidemic.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    names: Vec<Arc<str>>,
    index: HashMap<Arc<str>, NodeId>,
    pub(crate) adjacency: Vec<Vec<Edge>>,
    pub(crate) state: EpidemicState,
    params: SimParams,
    pub(crate) tick: u64,
}

impl Graph {
    /// Creates an empty graph with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph with the given parameters.
    pub fn with_params(params: SimParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    // -------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------

    /// Adds a node if absent. Idempotent; only a new node increments the
    /// susceptible counter.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = NodeId(self.names.len());
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.index.insert(name, id);
        self.adjacency.push(Vec::new());
        self.state.push_node();
        id
    }

    /// Appends a directed edge `parent -> child`, creating either endpoint
    /// if needed. Parallel edges are kept.
    pub fn add_edge(&mut self, parent: &str, child: &str, label: &str) {
        let from = self.add_node(parent);
        let to = self.add_node(child);
        let edge = Edge::new(to, Arc::clone(&self.names[to.index()]), label);
        self.adjacency[from.index()].push(edge);
    }

    /// Builds adjacency from a line-oriented text file.
    ///
    /// On failure the graph keeps whatever was added before the error.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SimError::io(path, e))?;
        self.load_from_reader(BufReader::new(file))
            .map_err(|e| SimError::io(path, e))?;
        info!(
            "Loaded {} nodes from {}",
            self.node_count(),
            path.display()
        );
        Ok(())
    }

    /// Builds adjacency from any buffered reader.
    ///
    /// Each line is split on runs of `' '`, `','`, `';'` and `'|'`. The first
    /// token is the source node, every following token a destination.
    pub fn load_from_reader<R: BufRead>(&mut self, reader: R) -> std::io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            let mut tokens = tokenize(&line);
            let Some(source) = tokens.next() else {
                continue;
            };
            self.add_node(source);
            for dest in tokens {
                self.add_edge(source, dest, "");
            }
        }
        debug!(
            "Adjacency built: {} nodes, {} edges",
            self.node_count(),
            self.edge_count()
        );
        Ok(())
    }

    // -------------------------------------------------------------------
    // Topology queries
    // -------------------------------------------------------------------

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Looks up a node by name.
    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    /// Name of a node.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.names.get(id.index()).map(|n| &**n)
    }

    /// All node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.names.len()).map(NodeId)
    }

    /// Outgoing edges of `id` in insertion order, borrowed.
    pub fn neighbors(&self, id: NodeId) -> &[Edge] {
        self.adjacency
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sorted copy of the outgoing edges of `name`; empty for unknown nodes.
    pub fn children_of(&self, name: &str) -> Vec<Edge> {
        self.id_of(name)
            .map(|id| self.sorted_children(id))
            .unwrap_or_default()
    }

    /// Sorted copy of the outgoing edges of `id`.
    pub fn sorted_children(&self, id: NodeId) -> Vec<Edge> {
        let mut children = self.neighbors(id).to_vec();
        children.sort();
        children
    }

    /// Out-degree of `name`; 0 for unknown nodes.
    pub fn degree_of(&self, name: &str) -> usize {
        self.id_of(name).map(|id| self.degree(id)).unwrap_or(0)
    }

    /// Out-degree of `id`.
    pub fn degree(&self, id: NodeId) -> usize {
        self.neighbors(id).len()
    }

    // -------------------------------------------------------------------
    // Epidemic state queries
    // -------------------------------------------------------------------

    /// Status of a node.
    pub fn status(&self, id: NodeId) -> NodeStatus {
        self.state.status[id.index()]
    }

    /// Ticks the node has spent infected.
    pub fn infection_age(&self, id: NodeId) -> u32 {
        self.state.age[id.index()]
    }

    /// Owned snapshot of a node.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        let name = self.names.get(id.index())?;
        Some(Node {
            name: Arc::clone(name),
            status: self.status(id),
            infection_age: self.infection_age(id),
        })
    }

    /// Snapshots of all nodes in insertion order.
    pub fn nodes(&self) -> Vec<Node> {
        self.node_ids().filter_map(|id| self.node(id)).collect()
    }

    /// Currently infected nodes, in infection order.
    pub fn infected_nodes(&self) -> &[NodeId] {
        &self.state.infected
    }

    /// Current aggregate counters.
    pub fn counts(&self) -> Counts {
        self.state.counts
    }

    /// Counters tagged with the current tick.
    pub fn snapshot(&self) -> CountsSnapshot {
        CountsSnapshot::new(self.tick, self.state.counts)
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns true once the first tick has run.
    pub fn has_started(&self) -> bool {
        self.tick > 0
    }

    // -------------------------------------------------------------------
    // Parameters
    // -------------------------------------------------------------------

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Validates and stores one parameter.
    ///
    /// Only legal before the first tick, except for the thread count.
    pub fn set_param(&mut self, param: Param, value: &str) -> Result<()> {
        if self.has_started() && !param.mutable_after_start() {
            return Err(SimError::SimulationStarted { name: param.name() });
        }
        let node_count = self.node_count();
        param.apply(&mut self.params, value, node_count)?;
        debug!("Parameter {} set to {}", param, value.trim());
        Ok(())
    }

    /// Replaces all parameters at once after validating them.
    pub fn set_params(&mut self, params: SimParams) -> Result<()> {
        if self.has_started() {
            return Err(SimError::SimulationStarted { name: "params" });
        }
        params.validate(self.node_count())?;
        self.params = params;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Infection
    // -------------------------------------------------------------------

    /// Marks a susceptible node infected with age 0. Returns false if the node
    /// was not susceptible.
    pub fn infect(&mut self, id: NodeId) -> bool {
        self.state.infect(id, 0)
    }

    /// Infects a node by name.
    pub fn infect_by_name(&mut self, name: &str) -> Result<bool> {
        let id = self
            .id_of(name)
            .ok_or_else(|| SimError::UnknownNode(name.to_string()))?;
        Ok(self.infect(id))
    }

    /// Checks the tick-boundary invariants: counters sum to the node count,
    /// every counter matches the statuses, and the infected list equals the
    /// set of infected nodes with no duplicates.
    pub fn verify_invariants(&self) -> std::result::Result<(), String> {
        let counts = self.state.counts;
        if counts.total() != self.node_count() {
            return Err(format!(
                "counters sum to {} but graph has {} nodes",
                counts.total(),
                self.node_count()
            ));
        }

        let mut actual = Counts::default();
        for status in &self.state.status {
            match status {
                NodeStatus::Susceptible => actual.susceptible += 1,
                NodeStatus::Infected => actual.infected += 1,
                NodeStatus::Recovered => actual.recovered += 1,
                NodeStatus::Dead => actual.dead += 1,
            }
        }
        if actual != counts {
            return Err(format!("counters {:?} disagree with statuses {:?}", counts, actual));
        }

        let mut seen = vec![false; self.node_count()];
        for id in &self.state.infected {
            if self.status(*id) != NodeStatus::Infected {
                return Err(format!("{} in infected list with status {}", id, self.status(*id)));
            }
            if std::mem::replace(&mut seen[id.index()], true) {
                return Err(format!("{} listed twice as infected", id));
            }
        }
        if self.state.infected.len() != counts.infected {
            return Err(format!(
                "infected list has {} entries, counter says {}",
                self.state.infected.len(),
                counts.infected
            ));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Listings
    // -------------------------------------------------------------------

    /// One line per node: `name=[(dest, label)...]`.
    pub fn adjacency_listing(&self) -> String {
        let mut out = String::new();
        for id in self.node_ids() {
            let _ = write!(out, "{}=[", self.names[id.index()]);
            for edge in self.neighbors(id) {
                let _ = write!(out, "{}", edge);
            }
            out.push_str("]\n");
        }
        out
    }

    /// All nodes as `name-status` separated by spaces.
    pub fn node_listing(&self) -> String {
        join_nodes(self.nodes().iter())
    }

    /// Infected nodes as `name-status` separated by spaces.
    pub fn infected_listing(&self) -> String {
        let nodes: Vec<Node> = self
            .state
            .infected
            .iter()
            .filter_map(|id| self.node(*id))
            .collect();
        join_nodes(nodes.iter())
    }
}

fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split([' ', ',', ';', '|'])
        .filter(|token| !token.is_empty())
}

fn join_nodes<'a>(nodes: impl Iterator<Item = &'a Node>) -> String {
    nodes
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Graph {
        let mut g = Graph::new();
        g.add_edge("A", "B", "");
        g.add_edge("A", "C", "");
        g.add_edge("A", "D", "");
        g.add_edge("B", "C", "");
        g
    }

    #[test]
    fn test_add_node_idempotent() {
        let mut g = Graph::new();
        let a = g.add_node("A");
        let a2 = g.add_node("A");
        assert_eq!(a, a2);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.counts().susceptible, 1);
    }

    #[test]
    fn test_add_edge_creates_endpoints() {
        let mut g = Graph::new();
        g.add_edge("A", "B", "x");
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.counts().susceptible, 2);
        assert_eq!(g.degree_of("A"), 1);
        assert_eq!(g.degree_of("B"), 0);

        let children = g.children_of("A");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].target_name(), "B");
        assert_eq!(children[0].label(), "x");
    }

    #[test]
    fn test_parallel_edges_kept() {
        let mut g = Graph::new();
        g.add_edge("A", "B", "");
        g.add_edge("A", "B", "");
        assert_eq!(g.degree_of("A"), 2);
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn test_unknown_node_queries() {
        let g = sample();
        assert!(g.children_of("Z").is_empty());
        assert_eq!(g.degree_of("Z"), 0);
        assert!(g.id_of("Z").is_none());
    }

    #[test]
    fn test_children_sorted_copy() {
        let mut g = Graph::new();
        g.add_edge("A", "D", "");
        g.add_edge("A", "B", "");
        g.add_edge("A", "C", "");

        let names: Vec<&str> = g.neighbors(g.id_of("A").unwrap())
            .iter()
            .map(|e| e.target_name())
            .collect();
        assert_eq!(names, vec!["D", "B", "C"]);

        let sorted: Vec<String> = g
            .children_of("A")
            .iter()
            .map(|e| e.target_name().to_string())
            .collect();
        assert_eq!(sorted, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_load_from_reader_round_trip() {
        let mut g = Graph::new();
        g.load_from_reader(Cursor::new("A B,C\nB D\n")).unwrap();

        assert_eq!(g.node_count(), 4);
        assert_eq!(g.counts().susceptible, 4);
        assert_eq!(g.edge_count(), 3);

        let a: Vec<String> = g.children_of("A").iter().map(|e| e.target_name().into()).collect();
        assert_eq!(a, vec!["B", "C"]);
        let b: Vec<String> = g.children_of("B").iter().map(|e| e.target_name().into()).collect();
        assert_eq!(b, vec!["D"]);

        assert!(g.nodes().iter().all(|n| n.status == NodeStatus::Susceptible));
    }

    #[test]
    fn test_load_mixed_separators() {
        let mut g = Graph::new();
        g.load_from_reader(Cursor::new("1 ,; 2|3;;4\n\n5\n")).unwrap();
        assert_eq!(g.degree_of("1"), 3);
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.degree_of("5"), 0);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let mut g = Graph::new();
        let err = g.load("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
        assert!(g.is_empty());
    }

    #[test]
    fn test_load_invalid_utf8_keeps_partial_graph() {
        let mut g = Graph::new();
        let mut bytes = b"A B\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"C D\n");

        assert!(g.load_from_reader(Cursor::new(bytes)).is_err());
        assert_eq!(g.node_count(), 2);
        assert!(g.id_of("C").is_none());
    }

    #[test]
    fn test_infect_updates_counters() {
        let mut g = sample();
        let a = g.id_of("A").unwrap();
        assert!(g.infect(a));
        assert!(!g.infect(a));

        assert_eq!(g.counts().infected, 1);
        assert_eq!(g.counts().susceptible, 3);
        assert_eq!(g.infected_nodes(), &[a]);
        g.verify_invariants().unwrap();
    }

    #[test]
    fn test_infect_by_name_unknown() {
        let mut g = sample();
        assert!(matches!(g.infect_by_name("Q"), Err(SimError::UnknownNode(_))));
    }

    #[test]
    fn test_state_resolve_only_from_infected() {
        let mut g = sample();
        let b = g.id_of("B").unwrap();
        assert!(!g.state.resolve(b, true));
        g.infect(b);
        assert!(g.state.resolve(b, false));
        assert_eq!(g.status(b), NodeStatus::Dead);
        assert!(!g.state.resolve(b, true));
        assert!(!g.infect(b));

        g.state.retain_infected();
        assert!(g.infected_nodes().is_empty());
        g.verify_invariants().unwrap();
    }

    #[test]
    fn test_set_param_locked_after_start() {
        let mut g = sample();
        g.set_param(Param::Lambda, "2.0").unwrap();
        g.tick = 1;

        assert!(matches!(
            g.set_param(Param::Lambda, "3.0"),
            Err(SimError::SimulationStarted { .. })
        ));
        assert_eq!(g.params().lambda, 2.0);

        g.set_param(Param::ThreadCount, "3").unwrap();
        assert_eq!(g.params().thread_count, 3);
    }

    #[test]
    fn test_set_param_checks_counts_against_node_count() {
        let mut g = sample();
        let nodes = g.node_count();

        g.set_param(Param::RandomCount, &nodes.to_string()).unwrap();
        assert_eq!(g.params().random_count, nodes);

        assert!(matches!(
            g.set_param(Param::BfsCount, &(nodes + 1).to_string()),
            Err(SimError::InvalidParameter { name: "k", .. })
        ));
        assert_eq!(g.params().bfs_count, SimParams::default().bfs_count);
    }

    #[test]
    fn test_listings() {
        let mut g = Graph::new();
        g.add_edge("A", "B", "");
        g.infect_by_name("B").unwrap();

        assert_eq!(g.adjacency_listing(), "A=[(B, )]\nB=[]\n");
        assert_eq!(g.node_listing(), "A-s B-i");
        assert_eq!(g.infected_listing(), "B-i");
    }
}
