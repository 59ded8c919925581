//! The Tick Engine - one concurrent simulation step.
//!
//! # Phases
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────────────────┐   ┌────────┐   ┌─────────┐
//! │ Partition │──►│ worker 0: Quota → Spread → Age/Resolve│──►│ Merge  │──►│ Cleanup │
//! │ (infected │   │ worker 1: Quota → Spread → Age/Resolve│   │ (lock, │   │ tick+=1 │
//! │ snapshot) │   │ ...                        (lock)     │   │ order) │   │         │
//! └───────────┘   └──────────────────────────────────────┘   └────────┘   └─────────┘
//!                              join barrier ▲
//! ```
//!
//! # Shared state
//!
//! The adjacency lists are read-only for the whole tick. Per-node status,
//! ages, the infected list and the counters sit behind a single mutex that
//! every worker shares; each status or counter change is one short critical
//! section.
//!
//! Quota and Spread read neighbor statuses from a snapshot taken when the
//! tick starts, never from the live table. A neighbor resolved or infected by
//! another worker during this tick is therefore still seen as it was at tick
//! start; Merge re-checks the live status, so such a node can never be
//! infected twice. Pending infections are merged after the join barrier, one
//! worker at a time in worker order, which keeps a run reproducible for a
//! fixed seed and thread count.

use crate::edge::Edge;
use crate::graph::{Counts, EpidemicState, Graph};
use crate::node::{NodeId, NodeStatus};
use crate::params::SimParams;
use crate::streams::StreamSeeds;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

/// Consecutive failed neighbor picks after which a node stops spreading.
pub const MAX_FAILED_PICKS: u32 = 5;

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number after this step completed
    pub tick: u64,

    /// Workers spawned
    pub workers: usize,

    /// Infected nodes processed (snapshot size)
    pub processed: usize,

    /// Nodes newly infected by merge
    pub new_infections: usize,

    /// Pending infections dropped at merge because the node was no longer
    /// susceptible
    pub merge_conflicts: usize,

    /// Infections resolved to Recovered
    pub recovered: usize,

    /// Infections resolved to Dead
    pub died: usize,

    /// Nodes that stopped spreading after repeated failed picks
    pub early_stops: usize,

    /// Workers that did not complete
    pub interrupted_workers: usize,

    /// Counters at the end of the tick
    pub counts: Counts,
}

/// Greedy force-of-infection ratchet, carried across one worker's range.
///
/// For each node it raises the running infection total one at a time while
/// `|total / processed - lambda|` does not increase, then caps the node's
/// share at its susceptible-neighbor count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaRatchet {
    total: u64,
    processed: u64,
}

impl QuotaRatchet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Infections granted so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Nodes processed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Computes the quota for the next node in range order.
    pub fn next_quota(&mut self, lambda: f64, susceptible_neighbors: usize) -> usize {
        self.processed += 1;
        if !lambda.is_finite() || lambda <= 0.0 {
            return 0;
        }
        let processed = self.processed as f64;
        let distance = |total: u64| (total as f64 / processed - lambda).abs();

        // Stopping at the cap yields the same total as ratcheting past it
        // and trimming back.
        let cap = susceptible_neighbors as u64;
        let mut quota: u64 = 0;
        let mut best = distance(self.total);
        while quota < cap {
            let candidate = distance(self.total + 1);
            if candidate > best {
                break;
            }
            best = candidate;
            self.total += 1;
            quota += 1;
        }
        quota as usize
    }
}

/// Computes per-node quotas for a sequence of susceptible-neighbor counts.
pub fn quotas(lambda: f64, susceptible_neighbors: impl IntoIterator<Item = usize>) -> Vec<usize> {
    susceptible_neighbors
        .into_iter()
        .scan(QuotaRatchet::new(), |ratchet, cap| {
            Some(ratchet.next_quota(lambda, cap))
        })
        .collect()
}

/// Splits `len` items into `workers` contiguous ranges; the last range takes
/// the remainder.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = len / workers;
    (0..workers)
        .map(|i| {
            let start = chunk * i;
            let end = if i + 1 == workers { len } else { chunk * (i + 1) };
            start..end
        })
        .collect()
}

/// Read-only inputs shared by all workers, plus the shared lock.
struct WorkerContext<'a, 's> {
    adjacency: &'a [Vec<Edge>],
    snapshot: &'a [NodeStatus],
    infected: &'a [NodeId],
    params: &'a SimParams,
    shared: &'a Mutex<&'s mut EpidemicState>,
}

/// What a worker hands back at the join barrier.
#[derive(Debug, Default)]
struct WorkerOutcome {
    pending: Vec<NodeId>,
    recovered: usize,
    died: usize,
    early_stops: usize,
}

fn lock_state<'m, 'a>(
    shared: &'m Mutex<&'a mut EpidemicState>,
) -> MutexGuard<'m, &'a mut EpidemicState> {
    // A worker that panicked mid-tick leaves its range partly updated but
    // every critical section is a complete transition, so the data is sound.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WorkerContext<'_, '_> {
    fn susceptible_neighbors(&self, node: NodeId) -> usize {
        self.adjacency[node.index()]
            .iter()
            .filter(|e| self.snapshot[e.target().index()] == NodeStatus::Susceptible)
            .count()
    }

    fn run(&self, worker: usize, range: Range<usize>, rng: &mut ChaCha8Rng) -> WorkerOutcome {
        let nodes = &self.infected[range.clone()];
        let mut outcome = WorkerOutcome::default();

        // Quota: strictly in range order.
        let shares = quotas(
            self.params.lambda,
            nodes.iter().map(|&n| self.susceptible_neighbors(n)),
        );

        // Spread into the worker-local pending set.
        let mut pending_set = HashSet::new();
        for (&node, &quota) in nodes.iter().zip(&shares) {
            let neighbors = &self.adjacency[node.index()];
            let mut picked = 0;
            let mut failures = 0;
            while picked < quota {
                let target = neighbors[rng.gen_range(0..neighbors.len())].target();
                if self.snapshot[target.index()] == NodeStatus::Susceptible
                    && pending_set.insert(target)
                {
                    outcome.pending.push(target);
                    picked += 1;
                    failures = 0;
                } else {
                    failures += 1;
                    if failures >= MAX_FAILED_PICKS {
                        warn!(
                            "worker {}: {} gave up after {} failed picks ({} of {} placed)",
                            worker, node, MAX_FAILED_PICKS, picked, quota
                        );
                        outcome.early_stops += 1;
                        break;
                    }
                }
            }
        }

        // Age/Resolve the nodes that were infected when the tick started.
        let duration = self.params.infection_duration;
        for &node in nodes {
            let recovers = rng.gen::<f64>() < self.params.recovery_prob;
            let mut state = lock_state(self.shared);
            let next_age = state.age[node.index()] + 1;
            state.age[node.index()] = next_age;
            if next_age >= duration && state.resolve(node, recovers) {
                if recovers {
                    outcome.recovered += 1;
                } else {
                    outcome.died += 1;
                }
            }
        }

        debug!(
            "worker {} range {:?}: {} pending, {} recovered, {} died",
            worker,
            range,
            outcome.pending.len(),
            outcome.recovered,
            outcome.died
        );
        outcome
    }
}

/// Advances `graph` by one tick.
pub fn run_tick(graph: &mut Graph) -> TickReport {
    run_tick_with(graph, |_| {})
}

/// Advances one tick, calling `on_worker_start(worker)` at the top of every
/// worker. Used to inject faults.
pub(crate) fn run_tick_with<F>(graph: &mut Graph, on_worker_start: F) -> TickReport
where
    F: Fn(usize) + Sync,
{
    let params = graph.params().clone();
    let tick = graph.tick;
    let streams = StreamSeeds::new(params.seed);
    let workers = params.thread_count.max(1);

    // Partition over a snapshot of the infected list and statuses.
    let infected = graph.state.infected.clone();
    let snapshot = graph.state.status.clone();
    let ranges = partition(infected.len(), workers);

    let adjacency = &graph.adjacency;
    let shared = Mutex::new(&mut graph.state);

    let mut report = TickReport {
        workers,
        processed: infected.len(),
        ..Default::default()
    };

    let ctx = WorkerContext {
        adjacency,
        snapshot: &snapshot,
        infected: &infected,
        params: &params,
        shared: &shared,
    };

    let outcomes: Vec<Option<WorkerOutcome>> = thread::scope(|scope| {
        let handles: Vec<_> = ranges
            .into_iter()
            .enumerate()
            .map(|(worker, range)| {
                let ctx = &ctx;
                let on_worker_start = &on_worker_start;
                let mut rng = streams.worker_rng(tick, worker);
                thread::Builder::new()
                    .name(format!("tick-{}-worker-{}", tick, worker))
                    .spawn_scoped(scope, move || {
                        on_worker_start(worker);
                        ctx.run(worker, range, &mut rng)
                    })
            })
            .collect();

        // Join barrier: wait for every worker regardless of failures.
        handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| match handle {
                Ok(handle) => match handle.join() {
                    Ok(outcome) => Some(outcome),
                    Err(_) => {
                        error!("Tick {}: worker {} interrupted", tick, worker);
                        None
                    }
                },
                Err(e) => {
                    error!("Tick {}: worker {} failed to start: {}", tick, worker, e);
                    None
                }
            })
            .collect()
    });

    // Merge in worker order, one worker per critical section.
    for outcome in &outcomes {
        let Some(outcome) = outcome else {
            report.interrupted_workers += 1;
            continue;
        };
        report.recovered += outcome.recovered;
        report.died += outcome.died;
        report.early_stops += outcome.early_stops;

        let mut state = lock_state(&shared);
        for &node in &outcome.pending {
            if state.infect(node, 0) {
                report.new_infections += 1;
            } else {
                report.merge_conflicts += 1;
            }
        }
    }
    drop(shared);

    // Cleanup.
    graph.state.retain_infected();
    graph.tick += 1;

    report.tick = graph.tick;
    report.counts = graph.counts();

    debug_assert_eq!(graph.verify_invariants(), Ok(()));
    info!(
        "Tick {} complete: S={} I={} R={} D={} (+{} infected, {} workers)",
        report.tick,
        report.counts.susceptible,
        report.counts.infected,
        report.counts.recovered,
        report.counts.dead,
        report.new_infections,
        workers
    );
    report
}

impl Graph {
    /// Runs one Tick Engine pass; see [`run_tick`].
    pub fn next_tick(&mut self) -> TickReport {
        run_tick(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Param;
    use approx::assert_abs_diff_eq;

    fn star(leaves: usize) -> Graph {
        let mut g = Graph::new();
        for i in 0..leaves {
            g.add_edge("hub", &format!("leaf{}", i), "");
        }
        g
    }

    fn ring(len: usize) -> Graph {
        let mut g = Graph::new();
        for i in 0..len {
            g.add_edge(&i.to_string(), &((i + 1) % len).to_string(), "");
        }
        g
    }

    #[test]
    fn test_partition_remainder_to_last() {
        assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition(2, 4), vec![0..0, 0..0, 0..0, 0..2]);
        assert_eq!(partition(0, 2), vec![0..0, 0..0]);
        assert_eq!(partition(5, 1), vec![0..5]);
    }

    #[test]
    fn test_quota_ratchet_tracks_lambda() {
        assert_eq!(quotas(1.25, [10, 10, 10, 10]), vec![1, 2, 1, 1]);
    }

    #[test]
    fn test_quota_ratchet_carries_capped_remainder() {
        // First node has no susceptible neighbors; the second catches up.
        assert_eq!(quotas(1.25, [0, 10]), vec![0, 3]);
    }

    #[test]
    fn test_quota_ratchet_state() {
        let mut r = QuotaRatchet::new();
        assert_eq!(r.next_quota(2.0, 1), 1);
        assert_eq!(r.total(), 1);
        assert_eq!(r.processed(), 1);
        assert_eq!(r.next_quota(2.0, 100), 3);
        assert_eq!(r.total(), 4);
    }

    #[test]
    fn test_quota_ratchet_converges_to_lambda() {
        let mut r = QuotaRatchet::new();
        for _ in 0..1000 {
            r.next_quota(1.37, usize::MAX);
        }
        let mean = r.total() as f64 / r.processed() as f64;
        assert_abs_diff_eq!(mean, 1.37, epsilon = 1e-3);
    }

    #[test]
    fn test_quota_huge_lambda_stops_at_cap() {
        let mut r = QuotaRatchet::new();
        assert_eq!(r.next_quota(1e300, 2), 2);
        assert_eq!(r.total(), 2);
        assert_eq!(quotas(1e12, [3, 0, 1]), vec![3, 0, 1]);
    }

    #[test]
    fn test_tick_with_huge_lambda_completes() {
        let mut g = star(3);
        g.set_param(Param::Lambda, "1e12").unwrap();
        g.infect_by_name("hub").unwrap();

        let report = g.next_tick();
        assert_eq!(report.tick, 1);
        assert!((1..=3).contains(&report.new_infections));
        g.verify_invariants().unwrap();
    }

    #[test]
    fn test_shared_target_counts_early_stop() {
        // Both infected nodes point only at C; the second pick of C within
        // the same worker fails until the node gives up.
        let mut g = Graph::new();
        g.add_edge("A", "C", "");
        g.add_edge("B", "C", "");
        g.infect_by_name("A").unwrap();
        g.infect_by_name("B").unwrap();

        let report = g.next_tick();
        assert_eq!(report.new_infections, 1);
        assert_eq!(report.early_stops, 1);
        g.verify_invariants().unwrap();
    }

    #[test]
    fn test_quota_small_lambda() {
        assert_eq!(quotas(0.1, [5, 5, 5]), vec![0, 0, 0]);
        assert_eq!(quotas(0.5, [5, 5]), vec![1, 0]);
    }

    #[test]
    fn test_tick_spreads_from_hub() {
        let mut g = star(10);
        g.set_param(Param::Lambda, "3").unwrap();
        g.infect_by_name("hub").unwrap();

        let report = g.next_tick();

        assert_eq!(report.tick, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.new_infections, 3);
        assert_eq!(g.counts().infected, 4);
        assert_eq!(g.infection_age(g.id_of("hub").unwrap()), 1);
        g.verify_invariants().unwrap();
    }

    #[test]
    fn test_tick_resolves_at_duration() {
        let mut g = ring(4);
        g.set_param(Param::InfectionDuration, "1").unwrap();
        g.set_param(Param::RecoveryProb, "1").unwrap();
        let zero = g.id_of("0").unwrap();
        g.infect(zero);

        let report = g.next_tick();

        assert_eq!(g.status(zero), NodeStatus::Recovered);
        assert_eq!(report.recovered, 1);
        assert!(!g.infected_nodes().contains(&zero));
        g.verify_invariants().unwrap();
    }

    #[test]
    fn test_tick_death_when_recovery_zero() {
        let mut g = ring(3);
        g.set_param(Param::InfectionDuration, "1").unwrap();
        g.set_param(Param::RecoveryProb, "0").unwrap();
        g.infect_by_name("1").unwrap();

        let report = g.next_tick();
        assert_eq!(report.died, 1);
        assert_eq!(g.counts().dead, 1);
    }

    #[test]
    fn test_tick_with_more_workers_than_infected() {
        let mut g = ring(8);
        g.set_param(Param::ThreadCount, "6").unwrap();
        g.infect_by_name("0").unwrap();

        let report = g.next_tick();
        assert_eq!(report.workers, 6);
        assert_eq!(report.interrupted_workers, 0);
        g.verify_invariants().unwrap();
    }

    #[test]
    fn test_interrupted_worker_tick_still_completes() {
        let mut g = ring(30);
        g.set_param(Param::ThreadCount, "3").unwrap();
        for i in 0..9 {
            g.infect_by_name(&i.to_string()).unwrap();
        }

        let report = run_tick_with(&mut g, |worker| {
            if worker == 1 {
                panic!("injected fault");
            }
        });

        assert_eq!(report.interrupted_workers, 1);
        assert_eq!(g.tick(), 1);
        g.verify_invariants().unwrap();

        // Nodes in the interrupted range were never aged.
        for i in 3..6 {
            assert_eq!(g.infection_age(g.id_of(&i.to_string()).unwrap()), 0);
        }
    }

    #[test]
    fn test_tick_reproducible_for_fixed_seed() {
        let run = || {
            let mut g = star(50);
            g.set_param(Param::ThreadCount, "2").unwrap();
            g.set_param(Param::Lambda, "5").unwrap();
            g.infect_by_name("hub").unwrap();
            g.next_tick();
            g.node_listing()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_no_susceptible_neighbors_no_spread() {
        let mut g = Graph::new();
        g.add_edge("A", "B", "");
        g.infect_by_name("A").unwrap();
        g.infect_by_name("B").unwrap();

        let report = g.next_tick();
        assert_eq!(report.new_infections, 0);
        assert_eq!(report.early_stops, 0);
    }
}
