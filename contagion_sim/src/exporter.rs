//! JSON exporter for recorded epidemic curves.
//!
//! One frame per recorded tick, suitable for plotting S/I/R/D over time.

use crate::runner::RunResult;

use contagion_core::{CountsSnapshot, SimParams};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single frame of simulation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimFrame {
    pub tick: u64,
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,

    /// Nodes that became infected since the previous frame
    pub new_infections: usize,
}

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Graph source label
    pub source: String,

    /// Seeding strategy name
    pub strategy: String,

    /// Parameters the run used
    pub params: SimParams,

    /// Nodes in the graph
    pub node_count: usize,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Whether the infection died out
    pub extinct: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_infected: Option<usize>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(source: &str, strategy: &str, params: SimParams, node_count: usize) -> Self {
        Self {
            source: source.to_string(),
            strategy: strategy.to_string(),
            params,
            node_count,
            frames: Vec::new(),
            extinct: false,
            peak_infected: None,
        }
    }

    /// Builds a finalized export from a completed run.
    pub fn from_result(result: &RunResult, params: &SimParams) -> Self {
        let mut export = Self::new(&result.source, result.strategy.name(), params.clone(), result.node_count);
        for snap in &result.history {
            export.add_snapshot(snap);
        }
        export.finalize(result.extinct, Some(result.peak_infected));
        export
    }

    /// Appends a frame, deriving its new-infection count from the previous
    /// one. A node leaves susceptible only by becoming infected, so the drop
    /// in susceptible count is exactly the new infections.
    pub fn add_snapshot(&mut self, snap: &CountsSnapshot) {
        let new_infections = match self.frames.last() {
            Some(prev) => prev.susceptible.saturating_sub(snap.susceptible),
            None => snap.infected,
        };
        self.frames.push(SimFrame {
            tick: snap.tick,
            susceptible: snap.susceptible,
            infected: snap.infected,
            recovered: snap.recovered,
            dead: snap.dead,
            new_infections,
        });
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, extinct: bool, peak_infected: Option<usize>) {
        self.extinct = extinct;
        self.peak_infected = peak_infected;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contagion_core::Counts;

    fn snap(tick: u64, s: usize, i: usize, r: usize, d: usize) -> CountsSnapshot {
        CountsSnapshot::new(
            tick,
            Counts {
                susceptible: s,
                infected: i,
                recovered: r,
                dead: d,
            },
        )
    }

    #[test]
    fn test_new_infections_from_susceptible_drop() {
        let mut export = SimExport::new("ring:10", "random", SimParams::default(), 10);
        export.add_snapshot(&snap(0, 7, 3, 0, 0));
        export.add_snapshot(&snap(1, 4, 5, 1, 0));
        export.add_snapshot(&snap(2, 4, 2, 3, 1));

        let news: Vec<usize> = export.frames.iter().map(|f| f.new_infections).collect();
        assert_eq!(news, vec![3, 3, 0]);
    }

    #[test]
    fn test_write_and_read_back() {
        let mut export = SimExport::new("grid:9", "bfs", SimParams::default(), 9);
        export.add_snapshot(&snap(0, 6, 3, 0, 0));
        export.finalize(true, Some(3));

        let path = std::env::temp_dir().join(format!("contagion_export_{}.json", std::process::id()));
        export.write_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let back: SimExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.frames, export.frames);
        assert_eq!(back.params, SimParams::default());
        assert_eq!(back.peak_infected, Some(3));
        assert!(back.extinct);
    }
}
