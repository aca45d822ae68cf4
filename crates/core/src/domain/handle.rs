// Process Handle Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{DomainError, Result};
use super::process::ProcessInfo;

/// Persisted record of the worker's process id
///
/// On disk this is exactly the decimal pid. Zero is rejected (it would address
/// the caller's own process group), as is anything that does not fit a
/// signed 32-bit `pid_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    pub fn new(pid: u32) -> Result<Self> {
        if pid == 0 || pid > i32::MAX as u32 {
            return Err(DomainError::InvalidPid(pid as u64));
        }
        Ok(Self { pid })
    }

    /// Parse handle file content (surrounding whitespace is ignored)
    pub fn parse(content: &str) -> Result<Self> {
        let trimmed = content.trim();
        let pid: u64 = trimmed
            .parse()
            .map_err(|_| DomainError::InvalidHandle(trimmed.to_string()))?;
        let pid = u32::try_from(pid).map_err(|_| DomainError::InvalidPid(pid))?;
        Self::new(pid)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Content written to the handle file
    pub fn to_file_contents(&self) -> String {
        self.pid.to_string()
    }
}

impl TryFrom<u32> for ProcessHandle {
    type Error = DomainError;

    fn try_from(pid: u32) -> Result<Self> {
        Self::new(pid)
    }
}

impl From<ProcessHandle> for u32 {
    fn from(handle: ProcessHandle) -> u32 {
        handle.pid
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pid)
    }
}

/// Identity of a launched worker, persisted next to the handle
///
/// Pids are recycled by the OS, so the handle alone cannot prove that a live
/// process is still our worker. The start time and session token can.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub pid: u32,
    /// Process start time in seconds since the epoch, as reported by the OS
    pub start_time: Option<u64>,
    /// Random token exported to the worker's environment at launch
    pub session_token: String,
    /// Launch time in milliseconds since the epoch
    pub launched_at: i64,
    pub command: Vec<String>,
}

/// Result of comparing a recorded identity with a live process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCheck {
    /// Start time or session token positively match
    Verified,
    /// Nothing contradicts the record, but nothing confirms it either
    Unverifiable,
    /// The pid now belongs to a different process
    Mismatch(String),
}

impl IdentityCheck {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, IdentityCheck::Mismatch(_))
    }
}

impl WorkerIdentity {
    /// Compare against a live process snapshot
    ///
    /// `tolerance_secs` absorbs the jitter of start times derived from boot
    /// time plus clock ticks.
    pub fn check(&self, info: &ProcessInfo, tolerance_secs: u64) -> IdentityCheck {
        if info.pid != self.pid {
            return IdentityCheck::Mismatch(format!(
                "recorded pid {} but inspected pid {}",
                self.pid, info.pid
            ));
        }

        if let Some(token) = &info.session_token {
            if token != &self.session_token {
                return IdentityCheck::Mismatch("session token differs".to_string());
            }
            return IdentityCheck::Verified;
        }
        if info.environ_readable {
            // Every launched worker inherits the token
            return IdentityCheck::Mismatch(
                "session token absent from process environment".to_string(),
            );
        }

        match (self.start_time, info.start_time) {
            (Some(recorded), Some(actual)) if recorded.abs_diff(actual) > tolerance_secs => {
                IdentityCheck::Mismatch(format!(
                    "start time {} differs from recorded {}",
                    actual, recorded
                ))
            }
            (Some(_), Some(_)) => IdentityCheck::Verified,
            _ => IdentityCheck::Unverifiable,
        }
    }
}
