//! Command implementations (composition root wiring)

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use pixstar_supervisor_core::application::{Launcher, StatusService, Terminator};
use pixstar_supervisor_core::domain::{LaunchOutcome, StopOutcome, WorkerStatus};
use pixstar_supervisor_core::port::id_provider::UuidProvider;
use pixstar_supervisor_core::port::time_provider::SystemTimeProvider;
use pixstar_supervisor_infra_system::{
    ConfigProvisioner, DetachedSpawner, FileHandleStore, SystemProcessControl,
};

use crate::settings::Settings;

/// Resolved base directory plus settings
pub struct Context {
    pub base_dir: PathBuf,
    pub settings: Settings,
}

impl Context {
    fn handle_store(&self) -> Arc<FileHandleStore> {
        Arc::new(FileHandleStore::new(self.settings.pid_path(&self.base_dir)))
    }

    fn provisioner(&self) -> Result<ConfigProvisioner> {
        ConfigProvisioner::new(
            self.settings.config_source_path(&self.base_dir),
            &self.base_dir,
            self.settings.provisioned_files.iter().cloned(),
        )
        .context("Invalid provisioned_files setting")
    }
}

pub fn start(ctx: &Context) -> Result<()> {
    let control = Arc::new(SystemProcessControl::new());
    let launcher = Launcher::new(
        ctx.handle_store(),
        Arc::new(DetachedSpawner),
        control,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    )
    .with_single_instance(ctx.settings.single_instance);

    let spec = ctx.settings.launch_spec(&ctx.base_dir, &[]);
    match launcher.launch(&spec).context("Failed to start worker")? {
        LaunchOutcome::Started(identity) => {
            println!(
                "{} Worker started (PID {})",
                "✓".green().bold(),
                identity.pid
            );
        }
        LaunchOutcome::AlreadyRunning { pid } => {
            println!(
                "{} Worker already running (PID {}), not starting another",
                "•".yellow().bold(),
                pid
            );
        }
    }
    Ok(())
}

pub async fn stop(ctx: &Context) -> Result<()> {
    let terminator = Terminator::new(ctx.handle_store(), Arc::new(SystemProcessControl::new()))
        .with_grace_period(ctx.settings.grace_period())
        .with_fallback_pattern(ctx.settings.fallback_pattern.clone());

    println!("{}", "Stopping worker...".cyan().bold());
    let outcome = terminator.stop().await.context("Failed to stop worker")?;

    let marker = match outcome {
        StopOutcome::Stopped { .. } | StopOutcome::FallbackMatched { .. } => "✓".green(),
        StopOutcome::Killed { .. } | StopOutcome::StaleHandle { .. } => "!".yellow(),
        StopOutcome::CorruptHandle { .. } | StopOutcome::Survived { .. } => "!".red(),
        StopOutcome::AlreadyStopped { .. } | StopOutcome::NothingToStop => "○".normal(),
    };
    println!("  {} {}", marker, outcome);
    println!("Done.");
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let service = StatusService::new(ctx.handle_store(), Arc::new(SystemProcessControl::new()));
    let status = service.status().context("Failed to read worker status")?;

    let label = match &status {
        WorkerStatus::Running { verified: true, .. } => "RUNNING".green(),
        WorkerStatus::Running { .. } => "RUNNING".yellow(),
        WorkerStatus::Corrupt { .. } => "UNKNOWN".red(),
        _ => "STOPPED".normal(),
    };
    println!("  {} {}", "Worker:".bold(), label);
    println!("  {} {}", "Detail:".bold(), status);
    println!(
        "  {} {}",
        "Pid file:".bold(),
        ctx.settings.pid_path(&ctx.base_dir).display()
    );
    Ok(())
}

pub fn provision(ctx: &Context) -> Result<()> {
    let report = ctx
        .provisioner()?
        .provision()
        .context("Config provisioning failed")?;

    for name in &report.copied {
        println!("  {} {}", "✓".green(), name);
    }
    for name in &report.missing {
        println!("  {} {} (not present, skipped)", "○".normal(), name);
    }
    Ok(())
}

/// Provision config, then replace this process with the worker
///
/// Only returns on failure.
#[cfg(unix)]
pub fn entrypoint(
    ctx: &Context,
    worker_args: &[String],
    log_guard: Option<WorkerGuard>,
) -> Result<()> {
    let report = ctx
        .provisioner()?
        .provision()
        .context("Config provisioning failed")?;
    info!(copied = ?report.copied, missing = ?report.missing, "Config provisioned");

    let spec = ctx.settings.launch_spec(&ctx.base_dir, worker_args);
    info!(command = ?spec.command(), "Executing worker in the foreground");

    // exec never runs destructors; flush the file log first
    drop(log_guard);
    let error = pixstar_supervisor_infra_system::exec_foreground(&spec);
    Err(error).context("Failed to exec worker")
}

#[cfg(not(unix))]
pub fn entrypoint(
    _ctx: &Context,
    _worker_args: &[String],
    _log_guard: Option<WorkerGuard>,
) -> Result<()> {
    anyhow::bail!("entrypoint is only supported on unix")
}
