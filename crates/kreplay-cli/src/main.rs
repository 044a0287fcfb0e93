use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kreplay_core::unit::verify_submission_order;
use kreplay_core::workload::{translate, TranslateOptions, Workload};
use kreplay_core::{Experiment, OutputPrefix, ReplayConfig};
use kreplay_kube::KubeCluster;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "kreplay",
    about = "Replay a Batsim workload on a Kubernetes cluster and record per-job timelines",
    after_help = "Long options take two dashes: --kubeconfig, --out, --epochs, --loglevel.",
    version
)]
struct Cli {
    /// Workload (Batsim JSON) to replay
    #[arg(short = 'w', long = "workload")]
    workload: PathBuf,

    /// Kubeconfig of the target cluster (default: in-cluster or ~/.kube/config)
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Output prefix; epoch N is written to <dir>/<prefix>N_jobs.csv
    #[arg(short = 'o', long = "out")]
    out: String,

    /// Number of times the workload is replayed
    #[arg(short = 'e', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    epochs: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    loglevel: String,

    /// Replay settings (YAML)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    kreplay_cli::logging::init(&cli.loglevel);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ReplayConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReplayConfig::default(),
    };

    let workload = Workload::load(&cli.workload)
        .with_context(|| format!("reading workload {}", cli.workload.display()))?;
    let units = translate(
        &workload,
        &TranslateOptions {
            image: config.image.clone(),
        },
    )
    .with_context(|| format!("translating workload {}", cli.workload.display()))?;
    verify_submission_order(&units)?;
    info!(
        units = units.len(),
        epochs = cli.epochs,
        namespace = %config.namespace,
        "workload loaded"
    );

    let output = OutputPrefix::parse(&cli.out);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let cluster = KubeCluster::connect(cli.kubeconfig.as_deref(), &config.namespace)
            .await
            .context("connecting to cluster")?;
        let experiment = Experiment::new(Arc::new(cluster), units, config, output, cli.epochs)?;
        for outcome in experiment.run().await? {
            info!(
                epoch = outcome.index,
                path = %outcome.path.display(),
                completed = outcome.summary.completed,
                rejected = outcome.summary.rejected,
                unobserved = outcome.summary.unobserved,
                secs = outcome.elapsed.as_secs_f64(),
                "epoch done"
            );
        }
        Ok::<_, anyhow::Error>(())
    })
}
