//! Error types for the contagion engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by graph loading, configuration and the command surface.
#[derive(Debug, Error)]
pub enum SimError {
    /// Adjacency input could not be opened or read.
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parameter value outside its allowed range.
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Parameter mutation attempted after the first tick.
    #[error("Parameter '{name}' cannot be changed once the simulation has started")]
    SimulationStarted { name: &'static str },

    /// A command was issued in a state where it is not allowed.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Seeding asked for more distinct nodes than can be infected.
    #[error("Cannot seed {requested} nodes: only {available} susceptible")]
    SeedCountExceedsPopulation { requested: usize, available: usize },

    /// Parameter name not recognised.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Node name not present in the graph.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Parameter file could not be decoded.
    #[error("Parameter file error: {0}")]
    ParamFile(#[from] serde_json::Error),
}

impl SimError {
    /// Creates an I/O error tagged with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a validation error for `name`.
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Creates a precondition error.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;
