//! Contagion run harness
//!
//! Drives [`contagion_core`] end to end: builds a graph from a file or a
//! synthetic topology, seeds it, ticks it until the infection dies out and
//! records the epidemic curve.
//!
//! # Usage
//!
//! ```ignore
//! use contagion_sim::{GraphSource, SimRunner, Topology};
//! use contagion_core::{SeedStrategy, SimParams};
//!
//! let source = GraphSource::Topology { topology: Topology::Grid, nodes: 400 };
//! let result = SimRunner::new(SimParams::default())
//!     .with_strategy(SeedStrategy::Bfs)
//!     .run(&source)?;
//! println!("peak {} at tick {}", result.peak_infected, result.peak_tick);
//! ```

mod exporter;
mod runner;
pub mod scenarios;

pub use exporter::{SimExport, SimFrame};
pub use runner::{GraphSource, RunError, RunResult, SimRunner};
pub use scenarios::Topology;
