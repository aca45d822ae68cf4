// OS process snapshot and termination signals

use std::fmt;

/// Snapshot of a live OS process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Seconds since the epoch; `None` when the platform does not report it
    pub start_time: Option<u64>,
    pub command: Vec<String>,
    /// Value of the supervisor session variable in the process environment,
    /// when the environment is readable and carries it
    pub session_token: Option<String>,
    /// Whether the process environment could be read at all
    ///
    /// Distinguishes "token absent" from "token unknowable" (another user's
    /// process, or a platform without environment access).
    pub environ_readable: bool,
}

impl ProcessInfo {
    pub fn new(pid: u32, start_time: Option<u64>, command: Vec<String>) -> Self {
        Self {
            pid,
            start_time,
            command,
            session_token: None,
            environ_readable: false,
        }
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// Substring match against the full command line
    ///
    /// An empty (or whitespace-only) pattern never matches.
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        let pattern = pattern.trim();
        !pattern.is_empty() && self.command_line().contains(pattern)
    }
}

/// Termination signal sent to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGTERM
    Graceful,
    /// SIGKILL (cannot be caught or ignored)
    Forced,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Graceful => write!(f, "SIGTERM"),
            TerminationSignal::Forced => write!(f, "SIGKILL"),
        }
    }
}
