use anyhow::Result;
use clap::{Parser, Subcommand};
use plume_common::observability::{init_logging, LogConfig};
use plume_config::{PlumeConfig, PlumeConfigLoader};
use uuid::Uuid;

mod jobs;
mod trigger;

use jobs::{build_pipeline, run_deactivate, run_ingest, run_refresh, run_sweep, run_track};
use trigger::verify_trigger_secret;

#[derive(Parser)]
#[command(name = "plume", about = "Creator ingestion pipeline")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "plume.yaml")]
    config: String,

    /// Shared secret presented by the external trigger.
    #[arg(long, env = "PLUME_TRIGGER_SECRET")]
    secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scheduling pass for one user, or all users with active creators.
    Ingest {
        #[arg(long)]
        user: Option<String>,
    },
    /// Refresh a single creator on demand.
    Refresh {
        #[arg(long)]
        creator: Uuid,
    },
    /// Delete items older than the retention window.
    Sweep,
    /// Validate a handle and start tracking it for a user.
    Track {
        #[arg(long)]
        user: String,
        #[arg(long)]
        handle: String,
        #[arg(long, default_value_t = 10)]
        requested: u32,
    },
    /// Stop refreshing a creator without deleting anything.
    Deactivate {
        #[arg(long)]
        creator: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg: PlumeConfig = PlumeConfigLoader::new().with_file(&cli.config).load()?;
    init_logging(LogConfig::default())?;

    // Externally triggered jobs verify the shared secret before the
    // pipeline is even built, so a bad trigger has zero side effects.
    if matches!(
        &cli.command,
        Command::Ingest { .. } | Command::Refresh { .. } | Command::Sweep
    ) {
        verify_trigger_secret(cli.secret.as_deref(), &cfg.trigger.secret)?;
    }

    let pipeline = build_pipeline(&cfg).await?;
    match cli.command {
        Command::Ingest { user } => run_ingest(pipeline, user).await,
        Command::Refresh { creator } => run_refresh(pipeline, creator).await,
        Command::Sweep => run_sweep(pipeline).await,
        Command::Track {
            user,
            handle,
            requested,
        } => run_track(pipeline, &user, &handle, requested.clamp(1, 100)).await,
        Command::Deactivate { creator } => run_deactivate(pipeline, creator).await,
    }
}
