// Worker launch: spawn detached, record pid and identity
use crate::application::constants::SESSION_TOKEN_ENV;
use crate::application::status::classify;
use crate::domain::{LaunchOutcome, LaunchSpec, TerminationSignal, WorkerIdentity, WorkerStatus};
use crate::error::{Result, SupervisorError};
use crate::port::{HandleStore, IdProvider, ProcessControl, TimeProvider, WorkerSpawner};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Starts the worker and records its handle
pub struct Launcher {
    store: Arc<dyn HandleStore>,
    spawner: Arc<dyn WorkerSpawner>,
    control: Arc<dyn ProcessControl>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    single_instance: bool,
}

impl Launcher {
    /// Create a new launcher
    ///
    /// # Arguments
    /// * `store` - Handle store (pid file + identity record)
    /// * `spawner` - Detached process spawner
    /// * `control` - Process inspection, used to capture the start time
    /// * `time_provider` - Clock for the launch timestamp
    /// * `id_provider` - Session token generator
    pub fn new(
        store: Arc<dyn HandleStore>,
        spawner: Arc<dyn WorkerSpawner>,
        control: Arc<dyn ProcessControl>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            store,
            spawner,
            control,
            time_provider,
            id_provider,
            single_instance: false,
        }
    }

    /// Refuse to launch while the recorded worker is alive
    pub fn with_single_instance(mut self, single_instance: bool) -> Self {
        self.single_instance = single_instance;
        self
    }

    /// Launch the worker and overwrite the handle with its pid
    ///
    /// If the handle cannot be written, the new worker is killed so no
    /// unrecorded worker is left running.
    pub fn launch(&self, spec: &LaunchSpec) -> Result<LaunchOutcome> {
        let _lock = self.store.lock()?;

        let previous = classify(&self.store.read()?, self.control.as_ref());
        if let WorkerStatus::Running { pid, .. } = previous {
            if self.single_instance {
                info!(pid = %pid, "Worker already running, not launching another");
                return Ok(LaunchOutcome::AlreadyRunning { pid });
            }
            warn!(pid = %pid, "Previous worker still running, its pid record will be replaced");
        }

        let session_token = self.id_provider.generate_id();
        let spec = spec.clone().with_env(SESSION_TOKEN_ENV, session_token.clone());

        info!(
            command = ?spec.command(),
            working_dir = %spec.working_dir.display(),
            "Launching worker"
        );
        let pid = self.spawner.spawn_detached(&spec)?;

        let start_time = match self.control.inspect(pid) {
            Some(info) => info.start_time,
            None => {
                warn!(pid = %pid, "Worker exited immediately after launch");
                None
            }
        };

        let identity = WorkerIdentity {
            pid,
            start_time,
            session_token,
            launched_at: self.time_provider.now_millis(),
            command: spec.command(),
        };

        if let Err(source) = self.store.write(&identity) {
            error!(pid = %pid, error = %source, "Failed to record worker pid, killing worker");
            if let Err(e) = self.control.signal(pid, TerminationSignal::Forced) {
                warn!(pid = %pid, error = %e, "Failed to kill unrecorded worker");
            }
            return Err(SupervisorError::UnrecordedWorker { pid, source });
        }

        info!(pid = %pid, start_time = ?start_time, "Worker started");
        Ok(LaunchOutcome::Started(identity))
    }
}
