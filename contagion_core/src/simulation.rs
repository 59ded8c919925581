//! Command surface over a [`Graph`].
//!
//! A presentation layer drives the engine only through these commands, each
//! of which checks its precondition before touching the graph:
//!
//! | Command          | Precondition                              |
//! |------------------|-------------------------------------------|
//! | `load`           | graph empty, tick == 0                    |
//! | `seed`           | tick == 0, infected == 0, graph non-empty |
//! | `advance_tick`   | graph non-empty, infected > 0             |
//! | `set_param`      | tick == 0 (thread count exempt)           |
//! | `read_counts`    | always                                    |

use crate::engine::TickReport;
use crate::error::{Result, SimError};
use crate::graph::{CountsSnapshot, Graph};
use crate::node::NodeId;
use crate::params::{Param, SimParams};
use crate::seeding::SeedStrategy;
use crate::streams::StreamSeeds;

use std::io::BufRead;
use std::path::Path;
use tracing::info;

/// A single epidemic run: the graph plus its recorded count history.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    graph: Graph,
    history: Vec<CountsSnapshot>,
    seeded_with: Option<SeedStrategy>,
}

impl Simulation {
    /// Creates an empty simulation with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty simulation with the given parameters.
    pub fn with_params(params: SimParams) -> Self {
        Self {
            graph: Graph::with_params(params),
            ..Default::default()
        }
    }

    /// Wraps an already built graph.
    pub fn from_graph(graph: Graph) -> Self {
        Self {
            graph,
            ..Default::default()
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Counts recorded after seeding and after every tick.
    pub fn history(&self) -> &[CountsSnapshot] {
        &self.history
    }

    /// Strategy used to seed this run, if any.
    pub fn seeded_with(&self) -> Option<SeedStrategy> {
        self.seeded_with
    }

    // -------------------------------------------------------------------
    // Building
    // -------------------------------------------------------------------

    fn require_unbuilt(&self) -> Result<()> {
        if !self.graph.is_empty() || self.graph.has_started() {
            return Err(SimError::precondition(
                "a graph can only be loaded into an empty, unstarted simulation",
            ));
        }
        Ok(())
    }

    /// Builds the graph from an adjacency file.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.require_unbuilt()?;
        self.graph.load(path)
    }

    /// Builds the graph from adjacency text.
    pub fn load_from_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        self.require_unbuilt()?;
        self.graph
            .load_from_reader(reader)
            .map_err(|e| SimError::io("<reader>", e))
    }

    /// Adds a node before the simulation starts.
    pub fn add_node(&mut self, name: &str) -> Result<NodeId> {
        self.require_not_started("add_node")?;
        Ok(self.graph.add_node(name))
    }

    /// Adds an edge before the simulation starts.
    pub fn add_edge(&mut self, parent: &str, child: &str, label: &str) -> Result<()> {
        self.require_not_started("add_edge")?;
        self.graph.add_edge(parent, child, label);
        Ok(())
    }

    fn require_not_started(&self, what: &str) -> Result<()> {
        if self.graph.has_started() {
            return Err(SimError::precondition(format!(
                "{} is not allowed after tick {}",
                what,
                self.graph.tick()
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------

    /// Sets a parameter by name (`n`, `s`, `k`, `d`, `t`, `lambda`,
    /// `threads`, `seed`).
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        let param: Param = name.parse()?;
        self.graph.set_param(param, value)
    }

    /// Replaces every parameter at once.
    pub fn set_params(&mut self, params: SimParams) -> Result<()> {
        self.graph.set_params(params)
    }

    pub fn params(&self) -> &SimParams {
        self.graph.params()
    }

    // -------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------

    /// Applies a seeding strategy once.
    pub fn seed(&mut self, strategy: SeedStrategy) -> Result<Vec<NodeId>> {
        if self.graph.has_started() {
            return Err(SimError::precondition("cannot seed after the first tick"));
        }
        if self.graph.is_empty() {
            return Err(SimError::precondition("cannot seed an empty graph"));
        }
        if self.graph.counts().infected != 0 {
            return Err(SimError::precondition("graph already has infected nodes"));
        }

        let mut rng = StreamSeeds::new(self.graph.params().seed).seeding_rng();
        let seeded = strategy.apply(&mut self.graph, &mut rng)?;
        self.seeded_with = Some(strategy);
        self.history.push(self.graph.snapshot());

        info!("Seeded {} nodes with {} strategy", seeded.len(), strategy);
        Ok(seeded)
    }

    pub fn seed_random(&mut self) -> Result<Vec<NodeId>> {
        self.seed(SeedStrategy::Random)
    }

    pub fn seed_degree(&mut self) -> Result<Vec<NodeId>> {
        self.seed(SeedStrategy::Degree)
    }

    pub fn seed_bfs(&mut self) -> Result<Vec<NodeId>> {
        self.seed(SeedStrategy::Bfs)
    }

    // -------------------------------------------------------------------
    // Running
    // -------------------------------------------------------------------

    /// Runs one tick.
    pub fn advance_tick(&mut self) -> Result<TickReport> {
        if self.graph.is_empty() {
            return Err(SimError::precondition("cannot tick an empty graph"));
        }
        if self.graph.counts().infected == 0 {
            return Err(SimError::precondition("no infected nodes left to advance"));
        }

        let report = self.graph.next_tick();
        self.history.push(self.graph.snapshot());
        Ok(report)
    }

    /// Current counters and tick.
    pub fn read_counts(&self) -> CountsSnapshot {
        self.graph.snapshot()
    }

    /// Returns true once no infection remains after the run has started.
    pub fn is_extinct(&self) -> bool {
        self.graph.counts().infected == 0 && !self.history.is_empty()
    }
}
