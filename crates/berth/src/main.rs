mod snapshot;

use berth_core::{object_name, to_yaml, StaticNodeLister, StaticPodLister};
use berth_scheduler::{GenericScheduler, Policy, SchedulerConfig, SchedulerError};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "berth", about = "Berth pod placement scheduler")]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide which node a pod should run on
    Schedule {
        /// YAML or JSON file with the cluster's `nodes` and `pods`
        #[arg(long)]
        snapshot: PathBuf,
        /// YAML or JSON manifest of the pod to place
        #[arg(long)]
        pod: PathBuf,
        /// Scheduler config (seed and policy)
        #[arg(long, env = "BERTH_CONFIG")]
        config: Option<PathBuf>,
        /// Seed for tie-breaking, overrides the config
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the default scheduling policy
    Policy,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Schedule {
            snapshot,
            pod,
            config,
            seed,
        } => run_schedule(&snapshot, &pod, config.as_deref(), seed).await,
        Commands::Policy => {
            let yaml = to_yaml(&Policy::default())?;
            print!("{}", yaml);
            Ok(())
        }
    }
}

/// Run one scheduling attempt against a snapshot and print the chosen node
async fn run_schedule(
    snapshot_path: &std::path::Path,
    pod_path: &std::path::Path,
    config_path: Option<&std::path::Path>,
    seed: Option<u64>,
) -> miette::Result<()> {
    let cluster = snapshot::load_snapshot(snapshot_path)?;
    let pod = snapshot::load_pod(pod_path)?;
    let mut config = match config_path {
        Some(path) => snapshot::load_config(path)?,
        None => SchedulerConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }

    info!(
        "Loaded snapshot with {} nodes and {} pods",
        cluster.nodes.len(),
        cluster.pods.len()
    );

    let nodes = Arc::new(StaticNodeLister::new(cluster.nodes));
    let pods = Arc::new(StaticPodLister::new(cluster.pods));
    let scheduler = GenericScheduler::from_config(&config, nodes.clone(), pods)?;

    match scheduler.schedule(&pod, &*nodes).await {
        Ok(node_name) => {
            println!("{}", node_name);
            Ok(())
        }
        Err(e) => {
            if let SchedulerError::FitError {
                failed_predicates, ..
            } = &e
            {
                for (node_name, reasons) in failed_predicates.iter() {
                    let reasons: Vec<&str> = reasons.iter().map(String::as_str).collect();
                    eprintln!("{}: {}", node_name, reasons.join(", "));
                }
            }
            error!(
                "Failed to schedule pod {}: {}",
                object_name(&pod.metadata),
                e
            );
            Err(e.into())
        }
    }
}
