#![forbid(unsafe_code)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tack_core::order::{OutOfRangePolicy, UnknownItemPolicy};
use tack_sim::campaign::{CampaignConfig, replay_seed, run_campaign};
use tracing_subscriber::EnvFilter;

/// Seeded position simulation against an in-memory store.
#[derive(Parser, Debug)]
#[command(name = "tack-sim", version)]
struct Args {
    /// Number of seeds to run.
    #[arg(long, default_value_t = 100)]
    seeds: u64,

    /// First seed.
    #[arg(long, default_value_t = 0)]
    start: u64,

    /// Operations per seed.
    #[arg(long, default_value_t = 200)]
    steps: u64,

    /// Percent of deliberately invalid positions and mappings.
    #[arg(long, default_value_t = 10)]
    stray: u8,

    /// Replay one seed and print its trace.
    #[arg(long, value_name = "SEED")]
    replay: Option<u64>,

    /// Clamp out-of-range positions instead of rejecting them.
    #[arg(long)]
    clamp: bool,

    /// Reject reorder mappings that name items from other containers.
    #[arg(long)]
    strict_reorder: bool,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TACK_LOG").unwrap_or_else(|_| EnvFilter::new("tack=warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("tack-sim: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every seed passed.
fn run(args: &Args) -> Result<bool> {
    let config = CampaignConfig {
        seed_range: args.start..args.start.saturating_add(args.seeds),
        steps: args.steps,
        stray_percent: args.stray,
        out_of_range: if args.clamp {
            OutOfRangePolicy::Clamp
        } else {
            OutOfRangePolicy::Reject
        },
        unknown_items: if args.strict_reorder {
            UnknownItemPolicy::Reject
        } else {
            UnknownItemPolicy::Skip
        },
        ..CampaignConfig::default()
    };

    if let Some(seed) = args.replay {
        let trace = replay_seed(seed, &config)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&trace.result)?);
        } else {
            for event in &trace.result.trace {
                println!("{:>4} {:<14} {}  {:?}", event.step, event.kind.to_string(), event.detail, event.result);
            }
            for violation in &trace.violations {
                println!("VIOLATION {violation}");
            }
            println!(
                "seed={seed} steps={} applied={} rejected={} noops={} cross_moves={}",
                trace.result.trace.len(),
                trace.result.stats.applied,
                trace.result.stats.rejected,
                trace.result.stats.noops,
                trace.result.stats.cross_moves
            );
        }
        return Ok(trace.violations.is_empty());
    }

    let report = run_campaign(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for failure in &report.failures {
            println!("seed {} FAILED", failure.seed);
            for violation in &failure.violations {
                println!("  {violation}");
            }
        }
        println!(
            "campaign complete: seeds={} passed={} interesting={} applied={} rejected={}",
            report.seeds_run,
            report.seeds_passed,
            report.interesting_states_reached,
            report.steps_applied,
            report.steps_rejected
        );
        if let Some(seed) = report.first_failure {
            println!("replay with: tack-sim --replay {seed}");
        }
    }
    Ok(report.all_passed())
}
