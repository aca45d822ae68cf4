// Lifecycle outcomes reported by the application services

use std::fmt;

use super::handle::WorkerIdentity;

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A new worker was spawned and recorded
    Started(WorkerIdentity),
    /// Single-instance mode found a live worker; nothing was spawned
    AlreadyRunning { pid: u32 },
}

/// Result of a stop request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The recorded pid had no live process
    AlreadyStopped { pid: u32 },
    /// The recorded pid now belongs to another process; it was left alone
    StaleHandle { pid: u32, reason: String },
    /// The handle file did not contain a valid pid
    CorruptHandle { content: String },
    /// The worker exited within the grace period after SIGTERM
    Stopped { pid: u32 },
    /// The worker outlived the grace period and was sent SIGKILL
    Killed { pid: u32 },
    /// The worker was still alive after SIGKILL (e.g. not permitted to signal it)
    Survived { pid: u32 },
    /// No handle existed; these pids matched the fallback pattern
    FallbackMatched { pids: Vec<u32> },
    /// No handle existed and nothing matched the fallback pattern
    NothingToStop,
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::AlreadyStopped { pid } => {
                write!(f, "Process {} is not running (already stopped)", pid)
            }
            StopOutcome::StaleHandle { pid, reason } => {
                write!(f, "Pid {} belongs to another process ({})", pid, reason)
            }
            StopOutcome::CorruptHandle { content } => {
                write!(f, "Discarded unreadable pid file content {:?}", content)
            }
            StopOutcome::Stopped { pid } => write!(f, "Process {} stopped", pid),
            StopOutcome::Killed { pid } => write!(f, "Process {} force-killed", pid),
            StopOutcome::Survived { pid } => {
                write!(f, "Process {} is still running after SIGKILL", pid)
            }
            StopOutcome::FallbackMatched { pids } => {
                write!(f, "No pid file; terminated matching process(es) {:?}", pids)
            }
            StopOutcome::NothingToStop => write!(f, "No pid file and no matching process"),
        }
    }
}

/// Classification of the recorded handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    NotRecorded,
    Corrupt { content: String },
    Stopped { pid: u32 },
    Recycled { pid: u32, reason: String },
    Running { pid: u32, verified: bool },
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::NotRecorded => write!(f, "not running (no pid file)"),
            WorkerStatus::Corrupt { content } => write!(f, "unknown (corrupt pid file {:?})", content),
            WorkerStatus::Stopped { pid } => write!(f, "not running (stale pid {})", pid),
            WorkerStatus::Recycled { pid, reason } => {
                write!(f, "not running (pid {} reused: {})", pid, reason)
            }
            WorkerStatus::Running { pid, verified: true } => write!(f, "running (pid {})", pid),
            WorkerStatus::Running {
                pid,
                verified: false,
            } => write!(f, "running (pid {}, identity unverified)", pid),
        }
    }
}
