//! Simulation parameters and their validation.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on worker threads per tick.
pub const MAX_THREADS: usize = 1024;

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Number of nodes infected by random seeding (`n`)
    pub random_count: usize,

    /// Degree seeding infects nodes with out-degree strictly above this (`s`)
    pub degree_threshold: usize,

    /// Number of nodes infected by breadth-first seeding (`k`)
    pub bfs_count: usize,

    /// Probability that a resolving infection recovers rather than dies (`d`)
    pub recovery_prob: f64,

    /// Ticks an infection lasts before it resolves (`t`)
    pub infection_duration: u32,

    /// Target force of infection (`lambda`)
    pub lambda: f64,

    /// Number of workers per tick
    pub thread_count: usize,

    /// Master seed for every random stream
    pub seed: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            random_count: 3,
            degree_threshold: 5,
            bfs_count: 3,
            recovery_prob: 0.5,
            infection_duration: 5,
            lambda: 1.25,
            thread_count: 1,
            seed: 42,
        }
    }
}

impl SimParams {
    /// Reads parameters from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Checks every parameter against its allowed range for a graph of
    /// `node_count` nodes.
    pub fn validate(&self, node_count: usize) -> Result<()> {
        check_count("n", self.random_count, node_count)?;
        check_count("k", self.bfs_count, node_count)?;
        check_probability(self.recovery_prob)?;
        check_duration(self.infection_duration)?;
        check_lambda(self.lambda)?;
        check_threads(self.thread_count)?;
        Ok(())
    }
}

/// A named, individually settable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    RandomCount,
    DegreeThreshold,
    BfsCount,
    RecoveryProb,
    InfectionDuration,
    Lambda,
    ThreadCount,
    Seed,
}

impl Param {
    /// Returns every parameter.
    pub fn all() -> Vec<Param> {
        vec![
            Param::RandomCount,
            Param::DegreeThreshold,
            Param::BfsCount,
            Param::RecoveryProb,
            Param::InfectionDuration,
            Param::Lambda,
            Param::ThreadCount,
            Param::Seed,
        ]
    }

    /// Short name of the parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Param::RandomCount => "n",
            Param::DegreeThreshold => "s",
            Param::BfsCount => "k",
            Param::RecoveryProb => "d",
            Param::InfectionDuration => "t",
            Param::Lambda => "lambda",
            Param::ThreadCount => "threads",
            Param::Seed => "seed",
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Param::RandomCount => "number of random nodes to infect at start",
            Param::DegreeThreshold => "nodes with out-degree above this are infected at start",
            Param::BfsCount => "number of nodes infected by BFS from a random root",
            Param::RecoveryProb => "probability a resolving infection recovers",
            Param::InfectionDuration => "ticks an infected node stays infected",
            Param::Lambda => "target force of infection",
            Param::ThreadCount => "number of workers to run each tick on",
            Param::Seed => "master random seed",
        }
    }

    /// Returns true if the parameter may still change after the first tick.
    pub fn mutable_after_start(&self) -> bool {
        matches!(self, Param::ThreadCount)
    }

    /// Parses `value`, validates it and stores it into `params`.
    ///
    /// On any failure `params` is left unchanged.
    pub fn apply(&self, params: &mut SimParams, value: &str, node_count: usize) -> Result<()> {
        let name = self.name();
        let value = value.trim();
        match self {
            Param::RandomCount => {
                let n = parse_int(name, value)?;
                check_count(name, n, node_count)?;
                params.random_count = n;
            }
            Param::DegreeThreshold => {
                params.degree_threshold = parse_int(name, value)?;
            }
            Param::BfsCount => {
                let k = parse_int(name, value)?;
                check_count(name, k, node_count)?;
                params.bfs_count = k;
            }
            Param::RecoveryProb => {
                let d = parse_float(name, value)?;
                check_probability(d)?;
                params.recovery_prob = d;
            }
            Param::InfectionDuration => {
                let t = value
                    .parse::<u32>()
                    .map_err(|_| SimError::invalid(name, format!("'{}' is not an integer", value)))?;
                check_duration(t)?;
                params.infection_duration = t;
            }
            Param::Lambda => {
                let lambda = parse_float(name, value)?;
                check_lambda(lambda)?;
                params.lambda = lambda;
            }
            Param::ThreadCount => {
                let threads = parse_int(name, value)?;
                check_threads(threads)?;
                params.thread_count = threads;
            }
            Param::Seed => {
                params.seed = value
                    .parse::<u64>()
                    .map_err(|_| SimError::invalid(name, format!("'{}' is not an integer", value)))?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Param {
    type Err = SimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "n" | "random_count" => Ok(Param::RandomCount),
            "s" | "degree_threshold" => Ok(Param::DegreeThreshold),
            "k" | "bfs_count" => Ok(Param::BfsCount),
            "d" | "recovery_prob" => Ok(Param::RecoveryProb),
            "t" | "infection_duration" => Ok(Param::InfectionDuration),
            "lambda" | "foi" => Ok(Param::Lambda),
            "threads" | "thread_count" => Ok(Param::ThreadCount),
            "seed" => Ok(Param::Seed),
            _ => Err(SimError::UnknownParameter(s.to_string())),
        }
    }
}

fn parse_int(name: &'static str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| SimError::invalid(name, format!("'{}' is not a non-negative integer", value)))
}

fn parse_float(name: &'static str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| SimError::invalid(name, format!("'{}' is not a decimal value", value)))
}

fn check_count(name: &'static str, count: usize, node_count: usize) -> Result<()> {
    if count < 1 || count > node_count {
        return Err(SimError::invalid(
            name,
            format!("{} must be in [1, {}]", count, node_count),
        ));
    }
    Ok(())
}

fn check_probability(d: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&d) {
        return Err(SimError::invalid("d", format!("{} must be in [0, 1]", d)));
    }
    Ok(())
}

fn check_duration(t: u32) -> Result<()> {
    if t < 1 {
        return Err(SimError::invalid("t", "duration must be at least 1 tick"));
    }
    Ok(())
}

fn check_lambda(lambda: f64) -> Result<()> {
    if !lambda.is_finite() || lambda <= 0.0 {
        return Err(SimError::invalid("lambda", format!("{} must be > 0", lambda)));
    }
    Ok(())
}

fn check_threads(threads: usize) -> Result<()> {
    if threads < 1 {
        return Err(SimError::invalid("threads", "thread count must be > 0"));
    }
    if threads > MAX_THREADS {
        return Err(SimError::invalid(
            "threads",
            format!("{} exceeds the limit of {}", threads, MAX_THREADS),
        ));
    }
    Ok(())
}
