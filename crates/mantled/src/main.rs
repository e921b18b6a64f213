//! mantled: keeps a workload next to the metadata server that owns a path.
//!
//! # Usage
//!
//! ```text
//! mantled run --config /etc/mantle.toml
//! mantled run --path /volumes/db --image postgres:16 --once
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mantle_core::MantleConfig;

#[derive(Parser)]
#[command(name = "mantled", about = "Mantle placement daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Place the workload and follow authority over the tracked path.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Namespace path to track.
    #[arg(long)]
    path: Option<String>,

    /// Workload instance name.
    #[arg(long)]
    workload: Option<String>,

    /// Workload image.
    #[arg(long)]
    image: Option<String>,

    /// Runtime API port on every node.
    #[arg(long)]
    runtime_port: Option<u16>,

    /// Exit after the initial placement.
    #[arg(long)]
    once: bool,

    /// Disable the load generator.
    #[arg(long)]
    no_loadgen: bool,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(long)]
    debug: bool,
}

impl RunArgs {
    fn load_config(&self) -> anyhow::Result<MantleConfig> {
        let mut config = match &self.config {
            Some(path) => MantleConfig::from_file(path)?,
            None => MantleConfig::default(),
        };

        if let Some(path) = &self.path {
            config.tracking.path = path.clone();
        }
        if let Some(name) = &self.workload {
            config.workload.name = name.clone();
        }
        if let Some(image) = &self.image {
            config.workload.image = image.clone();
        }
        if let Some(port) = self.runtime_port {
            config.runtime.port = port;
        }
        if self.no_loadgen {
            config.loadgen.enabled = false;
        }
        Ok(config)
    }
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "info,mantled=debug,mantle=debug"
    } else {
        "info,mantled=info,mantle=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            init_tracing(args.debug);
            let config = args.load_config()?;
            let status = mantled::lifecycle::run(config, args.once).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}
