// Worker Spawner Port
// Starts the worker detached from the supervisor's terminal and session

use crate::domain::LaunchSpec;
use thiserror::Error;

/// Spawn errors
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working directory does not exist: {0}")]
    MissingWorkingDir(String),
}

/// Worker spawner trait
pub trait WorkerSpawner: Send + Sync {
    /// Start the worker in its own session with stdio discarded
    ///
    /// # Returns
    /// Process id of the new worker
    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32, SpawnError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ProcessInfo;
    use crate::port::process_control::mocks::MockProcessControl;
    use std::sync::{Arc, Mutex};

    /// Mock spawner that registers each "spawned" worker in a MockProcessControl
    pub struct MockWorkerSpawner {
        control: MockProcessControl,
        next_pid: Arc<Mutex<u32>>,
        start_time: u64,
        fail: bool,
        launched: Arc<Mutex<Vec<LaunchSpec>>>,
    }

    impl MockWorkerSpawner {
        pub fn new(control: MockProcessControl, first_pid: u32, start_time: u64) -> Self {
            Self {
                control,
                next_pid: Arc::new(Mutex::new(first_pid)),
                start_time,
                fail: false,
                launched: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn failing(control: MockProcessControl) -> Self {
            Self {
                fail: true,
                ..Self::new(control, 1, 0)
            }
        }

        pub fn launched(&self) -> Vec<LaunchSpec> {
            self.launched.lock().unwrap().clone()
        }
    }

    impl WorkerSpawner for MockWorkerSpawner {
        fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32, SpawnError> {
            if self.fail {
                return Err(SpawnError::Spawn {
                    program: spec.program.display().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                });
            }

            let mut next_pid = self.next_pid.lock().unwrap();
            let pid = *next_pid;
            *next_pid += 1;

            self.launched.lock().unwrap().push(spec.clone());
            self.control
                .add_process(ProcessInfo::new(pid, Some(self.start_time), spec.command()));
            Ok(pid)
        }
    }
}
