//! CLI command definitions for gearctl.
//!
//! Four one-shot operations against a Gearman-backed Zuul scheduler:
//! compute a replica count from queue pressure, print the scheduler status,
//! dump every tenant's pipeline state, and replay a dumped snapshot.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::info;

use crate::autoscale;
use crate::gearman::{ClientConfig, GearClient};
use crate::snapshot::{self, TenantStatusSnapshot};
use crate::status;

/// Default scheduler host, matching the in-cluster service name.
const DEFAULT_GEARMAN_HOST: &str = "scheduler";

/// Operational tooling for a Gearman-backed Zuul scheduler.
#[derive(Parser)]
#[command(name = "gearctl")]
#[command(about = "Autoscaling and queue-drain tooling for a Gearman-backed Zuul scheduler")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Directory holding client.key, client.pem and ca.pem for TLS client
    /// authentication on the job protocol. Plaintext when unset.
    #[arg(long, env = "GEARCTL_CERTS_DIR", global = true)]
    pub certs_dir: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Compute the desired replica count for a service from queue pressure.
    Autoscale(AutoscaleArgs),

    /// Submit a `status` job and print the scheduler's reply.
    Status(StatusArgs),

    /// Dump every tenant's pipeline state as a JSON snapshot.
    Dump(DumpArgs),

    /// Replay a dumped snapshot by re-enqueueing its live changes.
    Load(LoadArgs),
}

/// Arguments for `gearctl autoscale`.
#[derive(Parser, Debug)]
pub struct AutoscaleArgs {
    /// Service to scale; merger and executor have demand formulas, anything
    /// else scales to the minimum.
    #[arg(long)]
    pub service: String,

    /// Gearman host whose status port is scanned.
    #[arg(long)]
    pub gearman: String,

    /// Lower bound on the replica count.
    #[arg(long)]
    pub min: u32,

    /// Upper bound on the replica count.
    #[arg(long)]
    pub max: u32,
}

/// Arguments for `gearctl status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Gearman host to query.
    #[arg(long, default_value = DEFAULT_GEARMAN_HOST)]
    pub gearman: String,
}

/// Arguments for `gearctl dump`.
#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// Gearman host to query.
    #[arg(long, default_value = DEFAULT_GEARMAN_HOST)]
    pub gearman: String,

    /// Write the snapshot here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `gearctl load`.
#[derive(Parser, Debug)]
pub struct LoadArgs {
    /// Gearman host to replay against.
    #[arg(long, default_value = DEFAULT_GEARMAN_HOST)]
    pub gearman: String,

    /// Snapshot file produced by `gearctl dump`.
    #[arg(long)]
    pub changes: PathBuf,
}

/// Parses CLI arguments from the process environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses CLI arguments and runs the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Runs the selected command with already parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Autoscale(args) => run_autoscale(args).await,
        Commands::Status(args) => run_status(args, cli.certs_dir).await,
        Commands::Dump(args) => run_dump(args, cli.certs_dir).await,
        Commands::Load(args) => run_load(args, cli.certs_dir).await,
    }
}

async fn run_autoscale(args: AutoscaleArgs) -> anyhow::Result<()> {
    let table = status::scan(&args.gearman)
        .await
        .context("couldn't get gearman status")?;
    let count = autoscale::decide(&args.service, &table, args.min, args.max);
    info!(service = %args.service, queues = table.len(), count, "computed replica count");
    println!("{count}");
    Ok(())
}

async fn run_status(args: StatusArgs, certs_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = client_config(&args.gearman, certs_dir);
    let mut client = GearClient::connect(&config).await?;
    let reply = client.run("status", json!({})).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

async fn run_dump(args: DumpArgs, certs_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = client_config(&args.gearman, certs_dir);
    let mut client = GearClient::connect(&config).await?;
    let snapshot = snapshot::dump_all(&mut client).await?;
    let rendered = serde_json::to_string_pretty(&snapshot)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("couldn't write snapshot to {}", path.display()))?;
            info!(path = %path.display(), tenants = snapshot.len(), "snapshot written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn run_load(args: LoadArgs, certs_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.changes)
        .with_context(|| format!("couldn't read snapshot from {}", args.changes.display()))?;
    let snapshot: TenantStatusSnapshot =
        serde_json::from_str(&raw).context("snapshot file is not valid JSON")?;

    let config = client_config(&args.gearman, certs_dir);
    snapshot::load_all(&config, &snapshot).await?;
    info!(tenants = snapshot.len(), "replay complete");
    Ok(())
}

fn client_config(host: &str, certs_dir: Option<PathBuf>) -> ClientConfig {
    let mut config = ClientConfig::new(host);
    if let Some(dir) = certs_dir {
        config = config.with_certs_dir(dir);
    }
    config
}
