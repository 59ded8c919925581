//! Contagion Core - epidemic propagation over directed graphs
//!
//! Nodes carry a status (susceptible, infected, recovered, dead). Time
//! advances in discrete ticks; each tick spreads infection along edges
//! toward a target force of infection, ages existing infections and
//! resolves them probabilistically.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Simulation                           │
//! │   load · seed · advance_tick · set_param · read_counts      │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ Graph                                                │   │
//! │  │   topology (names, adjacency)   epidemic state       │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       ▲                         ▲                           │
//! │  ┌────┴──────────┐        ┌─────┴──────────────────────┐    │
//! │  │   Seeding     │        │  Tick Engine               │    │
//! │  │ random/degree │        │  partition → workers →     │    │
//! │  │ /bfs          │        │  merge → cleanup           │    │
//! │  └───────────────┘        └────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use contagion_core::Simulation;
//!
//! let mut sim = Simulation::new();
//! sim.load("graph.txt")?;
//! sim.set_param("lambda", "1.5")?;
//! sim.seed_random()?;
//! while sim.read_counts().infected > 0 {
//!     sim.advance_tick()?;
//! }
//! ```

mod edge;
mod error;
mod graph;
mod node;
mod params;
mod streams;
pub mod engine;
pub mod seeding;
pub mod simulation;

pub use edge::Edge;
pub use engine::{TickReport, QuotaRatchet};
pub use error::{Result, SimError};
pub use graph::{Counts, CountsSnapshot, Graph};
pub use node::{Node, NodeId, NodeStatus};
pub use params::{Param, SimParams, MAX_THREADS};
pub use seeding::SeedStrategy;
pub use simulation::Simulation;
pub use streams::StreamSeeds;
