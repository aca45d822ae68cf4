// Process Control Port
// Abstraction over liveness probes, process-table search and signal delivery

use crate::domain::{ProcessInfo, TerminationSignal};
use thiserror::Error;

/// Signal delivery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessControlError {
    #[error("No such process: {0}")]
    NoSuchProcess(u32),

    #[error("Permission denied signaling process {0}")]
    PermissionDenied(u32),

    #[error("Invalid pid: {0}")]
    InvalidPid(u32),

    #[error("Signal failed: {0}")]
    Other(String),
}

/// Process control trait
///
/// Implementations:
/// - SystemProcessControl (infra-system): nix signals + sysinfo process table
/// - MockProcessControl: in-memory process table for tests
pub trait ProcessControl: Send + Sync {
    /// Inspect a live process
    ///
    /// Returns `None` if no process with this id is running. Zombies count
    /// as not running.
    fn inspect(&self, pid: u32) -> Option<ProcessInfo>;

    /// Check if a process is still alive
    fn is_alive(&self, pid: u32) -> bool {
        self.inspect(pid).is_some()
    }

    /// Send a termination signal
    ///
    /// # Errors
    /// - ProcessControlError::NoSuchProcess if the process is already gone
    fn signal(&self, pid: u32, signal: TerminationSignal) -> Result<(), ProcessControlError>;

    /// Live processes whose command line contains `pattern`,
    /// excluding the calling process
    fn find_by_pattern(&self, pattern: &str) -> Vec<ProcessInfo>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        /// Exits on SIGTERM
        Cooperative,
        /// Ignores SIGTERM, dies on SIGKILL
        Stubborn,
        /// Owned by another user: every signal fails with EPERM
        Protected,
    }

    #[derive(Debug, Clone)]
    struct MockProcess {
        info: ProcessInfo,
        behavior: Behavior,
    }

    /// Mock ProcessControl backed by an in-memory process table
    ///
    /// SIGTERM removes a process unless it was added as stubborn;
    /// SIGKILL always removes it. Protected processes reject both.
    #[derive(Clone, Default)]
    pub struct MockProcessControl {
        processes: Arc<Mutex<HashMap<u32, MockProcess>>>,
        signals: Arc<Mutex<Vec<(u32, TerminationSignal)>>>,
    }

    impl MockProcessControl {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a process that exits on SIGTERM
        pub fn add_process(&self, info: ProcessInfo) {
            self.insert(info, Behavior::Cooperative);
        }

        /// Add a process that ignores SIGTERM
        pub fn add_stubborn_process(&self, info: ProcessInfo) {
            self.insert(info, Behavior::Stubborn);
        }

        /// Add a process the caller is not permitted to signal
        pub fn add_protected_process(&self, info: ProcessInfo) {
            self.insert(info, Behavior::Protected);
        }

        fn insert(&self, info: ProcessInfo, behavior: Behavior) {
            self.processes
                .lock()
                .unwrap()
                .insert(info.pid, MockProcess { info, behavior });
        }

        /// All signals delivered so far, in order
        pub fn signals(&self) -> Vec<(u32, TerminationSignal)> {
            self.signals.lock().unwrap().clone()
        }
    }

    impl ProcessControl for MockProcessControl {
        fn inspect(&self, pid: u32) -> Option<ProcessInfo> {
            self.processes
                .lock()
                .unwrap()
                .get(&pid)
                .map(|p| p.info.clone())
        }

        fn signal(&self, pid: u32, signal: TerminationSignal) -> Result<(), ProcessControlError> {
            let mut processes = self.processes.lock().unwrap();
            let Some(process) = processes.get(&pid) else {
                return Err(ProcessControlError::NoSuchProcess(pid));
            };

            let exits = match process.behavior {
                Behavior::Protected => return Err(ProcessControlError::PermissionDenied(pid)),
                Behavior::Stubborn => signal == TerminationSignal::Forced,
                Behavior::Cooperative => true,
            };

            self.signals.lock().unwrap().push((pid, signal));
            if exits {
                processes.remove(&pid);
            }
            Ok(())
        }

        fn find_by_pattern(&self, pattern: &str) -> Vec<ProcessInfo> {
            let mut matches: Vec<ProcessInfo> = self
                .processes
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.info.matches_pattern(pattern))
                .map(|p| p.info.clone())
                .collect();
            matches.sort_by_key(|info| info.pid);
            matches
        }
    }
}
