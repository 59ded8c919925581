//! Run driver - seeds a graph and advances it to extinction or a tick limit.

use crate::scenarios::Topology;

use contagion_core::{CountsSnapshot, SeedStrategy, SimError, SimParams, Simulation};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Where the graph of a run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphSource {
    /// Adjacency file on disk
    File(PathBuf),

    /// Generated topology
    Topology { topology: Topology, nodes: usize },
}

impl GraphSource {
    /// Short human-readable label, used in logs and exports.
    pub fn label(&self) -> String {
        match self {
            GraphSource::File(path) => path.display().to_string(),
            GraphSource::Topology { topology, nodes } => format!("{}:{}", topology.name(), nodes),
        }
    }
}

/// Errors from a scripted run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The engine rejected a command.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// Seeding left the graph without a single infection.
    #[error("{strategy} seeding infected no nodes; nothing to simulate")]
    NothingSeeded { strategy: SeedStrategy },
}

/// Results from running an epidemic.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Graph the run used
    pub source: String,

    /// Seeding strategy
    pub strategy: SeedStrategy,

    /// Master seed
    pub seed: u64,

    /// Nodes in the graph
    pub node_count: usize,

    /// Nodes infected by seeding
    pub seeded: usize,

    /// Ticks executed
    pub ticks: u64,

    /// Whether the infection died out before the tick limit
    pub extinct: bool,

    /// Largest infected count seen
    pub peak_infected: usize,

    /// Tick at which the peak was first reached
    pub peak_tick: u64,

    /// Workers that failed across the whole run
    pub interrupted_workers: usize,

    /// Counters after the last tick
    pub final_counts: CountsSnapshot,

    /// Counters after seeding and after every tick
    pub history: Vec<CountsSnapshot>,
}

impl RunResult {
    /// Fraction of the population ever infected.
    pub fn attack_rate(&self) -> f64 {
        if self.node_count == 0 {
            return 0.0;
        }
        let touched = self.final_counts.infected + self.final_counts.recovered + self.final_counts.dead;
        touched as f64 / self.node_count as f64
    }
}

/// Runs whole epidemics with fixed parameters.
#[derive(Debug, Clone)]
pub struct SimRunner {
    params: SimParams,
    strategy: SeedStrategy,
    max_ticks: u64,
}

impl SimRunner {
    /// Creates a runner with random seeding and a 1000-tick limit.
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            strategy: SeedStrategy::Random,
            max_ticks: 1000,
        }
    }

    /// Sets the seeding strategy.
    pub fn with_strategy(mut self, strategy: SeedStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the tick limit.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Builds a configured, unseeded simulation for `source`.
    pub fn prepare(&self, source: &GraphSource) -> Result<Simulation, RunError> {
        let mut sim = match source {
            GraphSource::File(path) => {
                let mut sim = Simulation::new();
                sim.load(path)?;
                sim
            }
            GraphSource::Topology { topology, nodes } => {
                Simulation::from_graph(topology.build(*nodes, self.params.seed))
            }
        };
        sim.set_params(self.params.clone())?;
        Ok(sim)
    }

    /// Prepares, seeds and runs `source` to completion.
    pub fn run(&self, source: &GraphSource) -> Result<RunResult, RunError> {
        let mut sim = self.prepare(source)?;
        self.run_simulation(&mut sim, source.label())
    }

    /// Seeds `sim` and advances it until no infection remains or the tick
    /// limit is hit. The simulation is left in its final state.
    pub fn run_simulation(&self, sim: &mut Simulation, source: String) -> Result<RunResult, RunError> {
        info!(
            "Starting run on {} ({} nodes, strategy={}, seed={})",
            source,
            sim.graph().node_count(),
            self.strategy,
            sim.params().seed
        );

        let seeded = sim.seed(self.strategy)?.len();
        if seeded == 0 {
            return Err(RunError::NothingSeeded {
                strategy: self.strategy,
            });
        }

        let mut interrupted_workers = 0;
        while sim.read_counts().infected > 0 && sim.read_counts().tick < self.max_ticks {
            let report = sim.advance_tick()?;
            interrupted_workers += report.interrupted_workers;
            debug!(
                "  tick={} | S={} I={} R={} D={} | new={}",
                report.tick,
                report.counts.susceptible,
                report.counts.infected,
                report.counts.recovered,
                report.counts.dead,
                report.new_infections
            );
        }

        let final_counts = sim.read_counts();
        let extinct = final_counts.infected == 0;
        if !extinct {
            warn!(
                "Tick limit {} reached with {} nodes still infected",
                self.max_ticks, final_counts.infected
            );
        }

        let (peak_tick, peak_infected) = sim
            .history()
            .iter()
            .fold((0, 0), |(tick, peak), snap| {
                if snap.infected > peak {
                    (snap.tick, snap.infected)
                } else {
                    (tick, peak)
                }
            });

        Ok(RunResult {
            source,
            strategy: self.strategy,
            seed: sim.params().seed,
            node_count: sim.graph().node_count(),
            seeded,
            ticks: final_counts.tick,
            extinct,
            peak_infected,
            peak_tick,
            interrupted_workers,
            final_counts,
            history: sim.history().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(nodes: usize) -> GraphSource {
        GraphSource::Topology {
            topology: Topology::Ring,
            nodes,
        }
    }

    #[test]
    fn test_ring_runs_to_extinction() {
        let params = SimParams {
            random_count: 1,
            infection_duration: 2,
            ..Default::default()
        };
        let result = SimRunner::new(params).run(&ring(30)).unwrap();

        assert!(result.extinct);
        assert_eq!(result.seeded, 1);
        assert_eq!(result.final_counts.infected, 0);
        assert_eq!(
            result.final_counts.recovered + result.final_counts.dead + result.final_counts.susceptible,
            30
        );
        assert_eq!(result.history.len() as u64, result.ticks + 1);
        assert!(result.peak_infected >= 1);
        assert!(result.attack_rate() > 0.0 && result.attack_rate() <= 1.0);
    }

    #[test]
    fn test_tick_limit_stops_run() {
        let params = SimParams {
            infection_duration: 50,
            ..Default::default()
        };
        let result = SimRunner::new(params)
            .with_max_ticks(3)
            .run(&ring(40))
            .unwrap();

        assert_eq!(result.ticks, 3);
        assert!(!result.extinct);
        assert!(result.final_counts.infected > 0);
    }

    #[test]
    fn test_degree_strategy_with_no_candidates() {
        let params = SimParams {
            degree_threshold: 10,
            ..Default::default()
        };
        let err = SimRunner::new(params)
            .with_strategy(SeedStrategy::Degree)
            .run(&ring(10))
            .unwrap_err();
        assert!(matches!(err, RunError::NothingSeeded { .. }));
    }

    #[test]
    fn test_invalid_params_for_graph() {
        let params = SimParams {
            random_count: 50,
            ..Default::default()
        };
        let err = SimRunner::new(params).run(&ring(10)).unwrap_err();
        assert!(matches!(err, RunError::Sim(SimError::InvalidParameter { name: "n", .. })));
    }

    #[test]
    fn test_file_source() {
        let path = std::env::temp_dir().join(format!("contagion_runner_{}.txt", std::process::id()));
        std::fs::write(&path, "A B C D\nB A C\nC D\nD A\n").unwrap();

        let params = SimParams {
            bfs_count: 2,
            ..Default::default()
        };
        let result = SimRunner::new(params)
            .with_strategy(SeedStrategy::Bfs)
            .run(&GraphSource::File(path.clone()));
        std::fs::remove_file(&path).ok();

        let result = result.unwrap();
        assert_eq!(result.node_count, 4);
        assert_eq!(result.seeded, 2);
        assert_eq!(result.history[0].infected, 2);
    }

    #[test]
    fn test_same_seed_same_result() {
        let params = SimParams {
            thread_count: 3,
            random_count: 2,
            seed: 77,
            ..Default::default()
        };
        let source = GraphSource::Topology {
            topology: Topology::Random,
            nodes: 200,
        };
        let runner = SimRunner::new(params);
        let a = runner.run(&source).unwrap();
        let b = runner.run(&source).unwrap();
        assert_eq!(a.history, b.history);
        assert_eq!(a.peak_tick, b.peak_tick);
    }
}
