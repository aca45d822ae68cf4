//! Pix-Star Supervisor - lifecycle CLI for the Immich to Pix-Star sync worker

mod commands;
mod logging;
mod settings;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use commands::Context;
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pixstar-supervisor")]
#[command(about = "Start, stop and provision the Immich to Pix-Star sync worker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory to operate from (default: the directory containing this binary)
    #[arg(long, global = true, env = "PIXSTAR_SUPERVISOR_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Settings file (default: <base-dir>/supervisor.toml, optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the worker in the background and record its pid
    Start,

    /// Stop the recorded worker (SIGTERM, then SIGKILL after the grace period)
    Stop,

    /// Show whether the recorded worker is running
    Status,

    /// Copy optional config files from the mounted config directory
    Provision,

    /// Container entrypoint: provision config, then exec the worker in the foreground
    Entrypoint {
        /// Extra arguments passed to the worker
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        worker_args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Resolve the base directory and operate from it
    let base_dir = match cli.base_dir {
        Some(dir) => settings::absolute_base_dir(dir)?,
        None => settings::default_base_dir().context("Cannot locate supervisor binary")?,
    };
    std::env::set_current_dir(&base_dir)
        .with_context(|| format!("Cannot enter base directory {}", base_dir.display()))?;

    // 2. Load configuration
    let settings = Settings::load(&base_dir, cli.config.as_deref())
        .context("Failed to load supervisor settings")?;

    // 3. Initialize logging
    let log_guard = logging::init(&settings.log_path(&base_dir))?;
    info!("Pix-Star supervisor v{} ({})", VERSION, base_dir.display());
    debug!(settings = ?settings, "Settings loaded");

    let ctx = Context { base_dir, settings };

    match cli.command {
        Commands::Start => commands::start(&ctx)?,
        Commands::Stop => commands::stop(&ctx).await?,
        Commands::Status => commands::status(&ctx)?,
        Commands::Provision => commands::provision(&ctx)?,
        Commands::Entrypoint { worker_args } => {
            commands::entrypoint(&ctx, &worker_args, log_guard)?;
            return Ok(());
        }
    }

    drop(log_guard);
    Ok(())
}
