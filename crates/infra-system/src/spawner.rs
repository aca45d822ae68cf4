// Worker spawner implementation
// reason: std::process with a setsid pre_exec hook (nix) to detach from the terminal
use std::io;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use pixstar_supervisor_core::domain::LaunchSpec;
use pixstar_supervisor_core::port::{SpawnError, WorkerSpawner};

/// Spawns the worker in a new session with stdio on the null device
///
/// The child is reaped by a background thread, so a worker that exits while
/// the supervisor is still alive never lingers as a zombie.
pub struct DetachedSpawner;

fn build_command(spec: &LaunchSpec) -> Result<Command, SpawnError> {
    if !spec.working_dir.is_dir() {
        return Err(SpawnError::MissingWorkingDir(
            spec.working_dir.display().to_string(),
        ));
    }

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).current_dir(&spec.working_dir);
    for key in &spec.env_remove {
        command.env_remove(key);
    }
    command.envs(&spec.env);
    Ok(command)
}

fn spawn_error(spec: &LaunchSpec, source: io::Error) -> SpawnError {
    SpawnError::Spawn {
        program: spec.program.display().to_string(),
        source,
    }
}

impl WorkerSpawner for DetachedSpawner {
    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32, SpawnError> {
        let mut command = build_command(spec)?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;

            // SAFETY: setsid is async-signal-safe and touches no parent state
            unsafe {
                command.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(io::Error::from)
                });
            }
        }

        let mut child = command.spawn().map_err(|e| spawn_error(spec, e))?;
        let pid = child.id();

        let reaper = std::thread::Builder::new()
            .name(format!("reap-{}", pid))
            .spawn(move || match child.wait() {
                Ok(status) => debug!(pid = %pid, status = %status, "Worker exited"),
                Err(e) => debug!(pid = %pid, error = %e, "Failed to wait for worker"),
            });
        if let Err(e) = reaper {
            warn!(pid = %pid, error = %e, "Failed to start reaper thread");
        }

        Ok(pid)
    }
}

/// Replace the current process with the worker, keeping stdio attached
///
/// Only returns if exec fails.
#[cfg(unix)]
pub fn exec_foreground(spec: &LaunchSpec) -> SpawnError {
    use std::os::unix::process::CommandExt;

    match build_command(spec) {
        Ok(mut command) => spawn_error(spec, command.exec()),
        Err(e) => e,
    }
}
