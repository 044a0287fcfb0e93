use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kreplay_core::swf::{convert, SwfOptions};
use tracing::info;

/// Convert a Standard Workload Format trace into a Batsim workload.
#[derive(Parser)]
#[command(name = "swf2json", version)]
struct Args {
    /// SWF trace to read
    #[arg(long = "in")]
    input: PathBuf,

    /// Workload JSON to write
    #[arg(long = "out")]
    output: PathBuf,

    /// Scale CPU requests so the largest equals this value
    #[arg(long, conflicts_with = "uniform")]
    norm: Option<f64>,

    /// Give every job this CPU request
    #[arg(long)]
    uniform: Option<f64>,

    /// Cap job durations (seconds, or a duration such as 60s or 1h30m)
    #[arg(long, value_parser = kreplay_cli::duration::parse_secs)]
    trim: Option<f64>,

    #[arg(long, default_value = "info")]
    loglevel: String,
}

fn main() {
    let args = Args::parse();
    kreplay_cli::logging::init(&args.loglevel);

    if let Err(e) = run(args) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let swf = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let workload = convert(
        &swf,
        SwfOptions {
            normalize: args.norm,
            uniform: args.uniform,
            trim: args.trim,
        },
    )
    .with_context(|| format!("converting {}", args.input.display()))?;

    let json = serde_json::to_string_pretty(&workload)?;
    std::fs::write(&args.output, json + "\n")
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        jobs = workload.jobs.len(),
        profiles = workload.profiles.len(),
        out = %args.output.display(),
        "workload written"
    );
    Ok(())
}
