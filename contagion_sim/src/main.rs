//! Contagion simulator CLI
//!
//! Run an epidemic over an adjacency file or a built-in topology.

use clap::Parser;
use contagion_core::{SeedStrategy, SimParams};
use contagion_sim::{GraphSource, RunResult, SimExport, SimRunner, Topology};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Epidemic simulation over directed graphs
#[derive(Parser, Debug)]
#[command(name = "contagion-sim")]
#[command(about = "Simulate infection spreading over a directed graph", long_about = None)]
struct Args {
    /// Adjacency file: one line per node, `source dest dest ...`
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Built-in topology used when no graph file is given (ring, star, grid, complete, random)
    #[arg(short = 'S', long, default_value = "random")]
    scenario: String,

    /// Node count for built-in topologies
    #[arg(long, default_value = "1000")]
    nodes: usize,

    /// Seeding strategy (random, degree, bfs)
    #[arg(long, default_value = "random")]
    strategy: String,

    /// JSON parameter file; flags below override its values
    #[arg(long)]
    params: Option<PathBuf>,

    /// Nodes infected by random seeding
    #[arg(short = 'n', long = "random-count")]
    random_count: Option<usize>,

    /// Out-degree threshold for degree seeding
    #[arg(short = 's', long = "degree-threshold")]
    degree_threshold: Option<usize>,

    /// Nodes infected by BFS seeding
    #[arg(short = 'k', long = "bfs-count")]
    bfs_count: Option<usize>,

    /// Probability that a resolving infection recovers
    #[arg(short = 'd', long = "recovery-prob")]
    recovery_prob: Option<f64>,

    /// Ticks an infection lasts
    #[arg(short = 't', long = "duration")]
    infection_duration: Option<u32>,

    /// Target force of infection
    #[arg(short, long)]
    lambda: Option<f64>,

    /// Worker threads per tick
    #[arg(long)]
    threads: Option<usize>,

    /// Master seed for determinism (0 = random from time)
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u64,

    /// Print node statuses after the run
    #[arg(long)]
    dump: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Export the epidemic curve to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

impl Args {
    /// Starts from the parameter file (or defaults) and applies flag overrides.
    fn sim_params(&self) -> Result<SimParams, contagion_core::SimError> {
        let mut params = match &self.params {
            Some(path) => SimParams::from_json_file(path)?,
            None => SimParams::default(),
        };
        if let Some(n) = self.random_count {
            params.random_count = n;
        }
        if let Some(s) = self.degree_threshold {
            params.degree_threshold = s;
        }
        if let Some(k) = self.bfs_count {
            params.bfs_count = k;
        }
        if let Some(d) = self.recovery_prob {
            params.recovery_prob = d;
        }
        if let Some(t) = self.infection_duration {
            params.infection_duration = t;
        }
        if let Some(lambda) = self.lambda {
            params.lambda = lambda;
        }
        if let Some(threads) = self.threads {
            params.thread_count = threads;
        }
        if let Some(seed) = self.seed {
            params.seed = seed;
        }
        if params.seed == 0 {
            params.seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(42);
        }
        Ok(params)
    }

    fn graph_source(&self) -> Result<GraphSource, String> {
        match &self.graph {
            Some(path) => Ok(GraphSource::File(path.clone())),
            None => {
                let topology: Topology = self.scenario.parse()?;
                Ok(GraphSource::Topology {
                    topology,
                    nodes: self.nodes,
                })
            }
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        fail(format!("failed to set tracing subscriber: {}", e));
    }

    if !args.json {
        info!("Contagion Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let strategy: SeedStrategy = args.strategy.parse().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available strategies: random, degree, bfs");
        std::process::exit(1);
    });
    let source = args.graph_source().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available scenarios: ring, star, grid, complete, random");
        std::process::exit(1);
    });
    let params = args.sim_params().unwrap_or_else(|e| fail(e));

    let runner = SimRunner::new(params)
        .with_strategy(strategy)
        .with_max_ticks(args.ticks);

    let mut sim = runner.prepare(&source).unwrap_or_else(|e| fail(e));
    let result = runner
        .run_simulation(&mut sim, source.label())
        .unwrap_or_else(|e| fail(e));

    if let Some(path) = &args.export {
        let export = SimExport::from_result(&result, runner.params());
        if let Err(e) = export.write_to_file(path) {
            error!("Failed to write export: {:?}", e);
        } else {
            info!("Exported {} frames to {}", export.frames.len(), path.display());
        }
    }

    if args.dump {
        print!("{}", sim.graph().node_listing());
    }

    if args.json {
        print_json(&result, runner.params());
    } else {
        print_summary(&result);
    }
}

fn print_json(result: &RunResult, params: &SimParams) {
    let summary = serde_json::json!({
        "source": result.source,
        "strategy": result.strategy.name(),
        "seed": result.seed,
        "params": params,
        "nodes": result.node_count,
        "seeded": result.seeded,
        "ticks": result.ticks,
        "extinct": result.extinct,
        "peak_infected": result.peak_infected,
        "peak_tick": result.peak_tick,
        "attack_rate": result.attack_rate(),
        "interrupted_workers": result.interrupted_workers,
        "final": result.final_counts,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => fail(e),
    }
}

fn print_summary(result: &RunResult) {
    let c = &result.final_counts;
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "{} | {} seeding | seed={} | {} seeded",
        result.source, result.strategy, result.seed, result.seeded
    );
    info!(
        "Ticks: {} | S={} I={} R={} D={}",
        result.ticks, c.susceptible, c.infected, c.recovered, c.dead
    );
    info!(
        "Peak: {} infected at tick {} | attack rate {:.1}%",
        result.peak_infected,
        result.peak_tick,
        result.attack_rate() * 100.0
    );
    if result.extinct {
        info!("✅ Infection died out");
    } else {
        info!("⏱  Tick limit reached with infection still active");
    }
    if result.interrupted_workers > 0 {
        error!("❌ {} workers were interrupted during the run", result.interrupted_workers);
    }
}
