//! Drift Simulator CLI
//!
//! Drive a persisted drift coordinator from the shell, or run the seeded
//! property scenarios.

use clap::{Parser, Subcommand};
use drift_core::{
    spawn_entropy_pulse, DriftConfig, DriftCoordinator, DriftError, JsonFileStore, Outcome,
    SnapshotStore,
};
use drift_env::{DriftContext, SimContext, TokioContext};
use drift_sim::scenarios::ScenarioId;
use drift_sim::{ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Recursive drift simulator
#[derive(Parser, Debug)]
#[command(name = "drift-sim")]
#[command(about = "Fork, collapse and wipe nodes in the recursive drift field", long_about = None)]
struct Args {
    /// Snapshot file (missing = first run)
    #[arg(long, global = true, default_value = "drift_save.json")]
    state: PathBuf,

    /// JSON file overriding the default configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Master seed (0 = OS entropy and wall clock)
    #[arg(short, long, global = true, default_value = "0")]
    seed: u64,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the field, ledger and log counts
    Status,

    /// Fork a node into a new child id
    Fork {
        /// Node to fork (default: the root node)
        #[arg(long)]
        base: Option<String>,
    },

    /// Collapse a node, releasing time-salt and fragments
    Collapse {
        /// Node to collapse (default: the root node)
        #[arg(long)]
        id: Option<String>,
    },

    /// Erase the operation log, leaving fractured echoes
    Wipe,

    /// Print a fresh drift map
    Scan,

    /// Combine 2 to 5 glyphs
    Combine {
        #[arg(required = true, num_args = 1..)]
        glyphs: Vec<String>,
    },

    /// List the most recent anomaly echoes
    Echoes {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Run the entropy pulse against the live field
    Pulse {
        #[arg(long, default_value = "10")]
        seconds: u64,
    },

    /// Run property scenarios
    Scenarios {
        /// Scenario to run (field_bounds, wipe_accounting, discovery_rate, ..., all)
        #[arg(short = 'S', long, default_value = "all")]
        scenario: String,

        /// Number of consecutive seeds to test
        #[arg(long, default_value = "1")]
        seeds: usize,
    },
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let code = match &args.command {
        Command::Scenarios { scenario, seeds } => run_scenarios(&args, scenario, *seeds),
        _ => {
            let result = if args.seed == 0 {
                run_live(TokioContext::shared(), &args)
            } else {
                run_live(SimContext::shared(args.seed), &args)
            };
            match result {
                Ok(()) => 0,
                Err(e) => {
                    error!("{}", e);
                    1
                }
            }
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
}

/// Loads the coordinator, runs one command, saves if anything changed.
fn run_live<Ctx: DriftContext>(ctx: Arc<Ctx>, args: &Args) -> Result<(), DriftError> {
    let config = match &args.config {
        Some(path) => DriftConfig::from_json_file(path)?,
        None => DriftConfig::default(),
    };
    let coord = Arc::new(DriftCoordinator::with_config(ctx, config)?);
    let store = JsonFileStore::new(&args.state);

    match store.load() {
        Ok(Some(snapshot)) => {
            if let Err(e) = coord.import(snapshot) {
                warn!("Snapshot rejected, starting fresh: {}", e);
            }
        }
        Ok(None) => info!("No saved drift at {}, starting fresh", args.state.display()),
        Err(e) => warn!("Could not load {}: {}; starting fresh", args.state.display(), e),
    }

    let mutated = match &args.command {
        Command::Status => {
            let status = coord.status();
            if args.json {
                print_json(&status)?;
            } else {
                let field = &status.entropy_field;
                println!("Node            {}", status.node_id);
                println!("Global flux     {:.3}", field.global_flux);
                println!("Temporal dist.  {:+.3}", field.temporal_distortion);
                println!("Volatility      {:.3}", field.volatility);
                println!("Time-salt       {}", status.ledger.time_salt);
                println!("Fragments       {}", status.ledger.identity_fragments);
                println!(
                    "Logs            {} operations, {} echoes ({} fractured), {} sentient",
                    status.operations, status.echoes, status.fractured_echoes, status.sentient_logs
                );
                println!(
                    "Alchemy         {} known, mastery {:.2} ({:.1}% to next), {} transmutations, {:.1}% discoveries",
                    status.known_combinations,
                    status.mastery.level,
                    status.mastery.next_level_progress,
                    status.mastery.transmutations,
                    status.mastery.discovery_rate
                );
            }
            false
        }
        Command::Fork { base } => {
            let record = coord.fork(base.as_deref());
            print_record(args.json, &record)?;
            true
        }
        Command::Collapse { id } => {
            let record = coord.collapse(id.as_deref())?;
            print_record(args.json, &record)?;
            true
        }
        Command::Wipe => {
            let record = coord.memory_wipe()?;
            print_record(args.json, &record)?;
            true
        }
        Command::Scan => {
            let map = coord.scan();
            if args.json {
                print_json(&map)?;
            } else {
                print!("{}", map);
            }
            false
        }
        Command::Combine { glyphs } => {
            let resolution = coord.resolve(glyphs.as_slice())?;
            if args.json {
                print_json(&resolution)?;
            } else {
                let record = resolution.outcome.record();
                match &resolution.outcome {
                    Outcome::Known { rarity, .. } => {
                        println!("{} {} ({:?})", record.result_symbol, record.name, rarity)
                    }
                    Outcome::Discovery { rarity, .. } => println!(
                        "New discovery! {} {} ({:?})",
                        record.result_symbol, record.name, rarity
                    ),
                    Outcome::Failure { effect, .. } => {
                        println!("{} {} - {:?}", record.result_symbol, record.name, effect)
                    }
                }
                println!("chance {:.2}  key {}", resolution.chance, resolution.key);
            }
            true
        }
        Command::Echoes { limit } => {
            let echoes = coord.echo_log();
            let recent = &echoes[echoes.len().saturating_sub(*limit)..];
            if args.json {
                print_json(&recent)?;
            } else {
                for echo in recent {
                    println!(
                        "{} {:<11} sig={:.3} strength={:.2}{}",
                        echo.id,
                        echo.source_kind.name(),
                        echo.entropy_signature,
                        echo.strength,
                        if echo.fractured() { " [fractured]" } else { "" }
                    );
                }
            }
            false
        }
        Command::Pulse { seconds } => {
            run_pulse(&coord, *seconds)?;
            true
        }
        Command::Scenarios { .. } => false,
    };

    if mutated {
        store.save(&coord.export())?;
    }
    Ok(())
}

/// Runs the entropy pulse until it has covered `seconds` of context time.
fn run_pulse<Ctx: DriftContext>(
    coord: &Arc<DriftCoordinator<Ctx>>,
    seconds: u64,
) -> Result<(), DriftError> {
    let period = coord.config().pulse_period();
    let target = (seconds * 1000 / coord.config().pulse_period_ms).max(1);
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let pulse = spawn_entropy_pulse(Arc::clone(coord), period);
        while pulse.firings() < target {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        pulse.stop();
        info!("Pulse fired {} times, flux now {:.3}", pulse.firings(), coord.field().global_flux);
    });
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), DriftError> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| DriftError::Persistence(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_record(json: bool, record: &drift_core::OperationRecord) -> Result<(), DriftError> {
    if json {
        return print_json(record);
    }
    println!(
        "#{} {} {} (flux {:.3}, salt {:+}, fragments {:+})",
        record.sequence,
        record.kind(),
        record.node_id().unwrap_or("-"),
        record.global_flux,
        record.resources.time_salt,
        record.resources.fragments
    );
    Ok(())
}

fn run_scenarios(args: &Args, scenario: &str, seeds: usize) -> i32 {
    if !args.json {
        info!("Drift Scenario Runner v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if scenario == "all" {
        ScenarioId::all()
    } else {
        match scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!(
                    "Available scenarios: {}, all",
                    ScenarioId::all()
                        .iter()
                        .map(|s| s.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                return 1;
            }
        }
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        TokioContext::new().timestamp_ms()
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "operations": r.metrics.operations,
                    "ticks": r.metrics.ticks,
                    "discoveries": r.metrics.discoveries,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        if let Err(e) = print_json(&summary) {
            error!("{}", e);
            return 1;
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        1
    } else {
        0
    }
}
