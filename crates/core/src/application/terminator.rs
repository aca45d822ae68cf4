// Worker termination: SIGTERM, grace period, SIGKILL, cleanup
use crate::application::constants::{
    DEFAULT_FALLBACK_PATTERN, DEFAULT_GRACE_PERIOD, KILL_CONFIRM_TIMEOUT, LIVENESS_POLL_INTERVAL,
};
use crate::application::status::classify;
use crate::domain::{StopOutcome, TerminationSignal, WorkerStatus};
use crate::error::Result;
use crate::port::{HandleStore, ProcessControl, ProcessControlError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Shutdown phases
#[derive(Debug)]
enum Phase {
    Inspect,
    Signaling { pid: u32 },
    Escalation { pid: u32 },
    Cleanup { outcome: StopOutcome },
    NoHandle,
}

/// Stops the recorded worker
///
/// Every signal is best-effort. Only failing to lock or read the handle is
/// surfaced as an error.
pub struct Terminator {
    store: Arc<dyn HandleStore>,
    control: Arc<dyn ProcessControl>,
    grace_period: Duration,
    poll_interval: Duration,
    fallback_pattern: String,
}

impl Terminator {
    /// Create a terminator with the default grace period and fallback pattern
    ///
    /// # Example
    /// ```ignore
    /// let terminator = Terminator::new(store, control)
    ///     .with_grace_period(Duration::from_secs(5));
    /// let outcome = terminator.stop().await?;
    /// ```
    pub fn new(store: Arc<dyn HandleStore>, control: Arc<dyn ProcessControl>) -> Self {
        Self {
            store,
            control,
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: LIVENESS_POLL_INTERVAL,
            fallback_pattern: DEFAULT_FALLBACK_PATTERN.to_string(),
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// An empty pattern disables the fallback search
    pub fn with_fallback_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.fallback_pattern = pattern.into();
        self
    }

    /// Run the shutdown state machine to completion
    pub async fn stop(&self) -> Result<StopOutcome> {
        let _lock = self.store.lock()?;

        let mut phase = Phase::Inspect;
        loop {
            phase = match phase {
                Phase::Inspect => self.inspect()?,
                Phase::Signaling { pid } => self.signal_graceful(pid).await,
                Phase::Escalation { pid } => self.escalate(pid).await,
                Phase::Cleanup { outcome } => {
                    self.cleanup();
                    return Ok(outcome);
                }
                Phase::NoHandle => return Ok(self.fallback().await),
            };
        }
    }

    fn inspect(&self) -> Result<Phase> {
        let record = self.store.read()?;

        let phase = match classify(&record, self.control.as_ref()) {
            WorkerStatus::NotRecorded => {
                info!("No pid file found, searching for worker by command line");
                Phase::NoHandle
            }
            WorkerStatus::Corrupt { content } => {
                warn!(content = %content, "Pid file does not contain a valid pid");
                Phase::Cleanup {
                    outcome: StopOutcome::CorruptHandle { content },
                }
            }
            WorkerStatus::Stopped { pid } => {
                info!(pid = %pid, "Process not running (already stopped)");
                Phase::Cleanup {
                    outcome: StopOutcome::AlreadyStopped { pid },
                }
            }
            WorkerStatus::Recycled { pid, reason } => {
                warn!(pid = %pid, reason = %reason, "Pid was reused by another process, not signaling it");
                Phase::Cleanup {
                    outcome: StopOutcome::StaleHandle { pid, reason },
                }
            }
            WorkerStatus::Running { pid, verified } => {
                info!(pid = %pid, verified = %verified, "Stopping worker");
                Phase::Signaling { pid }
            }
        };
        Ok(phase)
    }

    async fn signal_graceful(&self, pid: u32) -> Phase {
        if !self.send(pid, TerminationSignal::Graceful) {
            return Phase::Cleanup {
                outcome: StopOutcome::Stopped { pid },
            };
        }

        let deadline = Instant::now() + self.grace_period;
        if self.wait_until_exited(pid, deadline).await {
            info!(pid = %pid, "Worker exited gracefully after SIGTERM");
            Phase::Cleanup {
                outcome: StopOutcome::Stopped { pid },
            }
        } else {
            Phase::Escalation { pid }
        }
    }

    async fn escalate(&self, pid: u32) -> Phase {
        warn!(pid = %pid, grace_ms = %self.grace_period.as_millis(), "Worker did not exit after SIGTERM, sending SIGKILL");
        if !self.send(pid, TerminationSignal::Forced) {
            return Phase::Cleanup {
                outcome: StopOutcome::Stopped { pid },
            };
        }

        let deadline = Instant::now() + KILL_CONFIRM_TIMEOUT;
        let outcome = if self.wait_until_exited(pid, deadline).await {
            StopOutcome::Killed { pid }
        } else {
            error!(pid = %pid, "Worker still running after SIGKILL");
            StopOutcome::Survived { pid }
        };
        Phase::Cleanup { outcome }
    }

    fn cleanup(&self) {
        if let Err(e) = self.store.remove() {
            error!(error = %e, "Failed to remove pid file");
        }
    }

    async fn fallback(&self) -> StopOutcome {
        let pattern = self.fallback_pattern.trim();
        if pattern.is_empty() {
            info!("Fallback search disabled (empty pattern)");
            return StopOutcome::NothingToStop;
        }

        let pids: Vec<u32> = self
            .control
            .find_by_pattern(pattern)
            .into_iter()
            .map(|info| info.pid)
            .collect();

        if pids.is_empty() {
            info!(pattern = %pattern, "No matching worker process found");
            return StopOutcome::NothingToStop;
        }

        info!(pattern = %pattern, pids = ?pids, "Terminating processes matching fallback pattern");
        for &pid in &pids {
            self.send(pid, TerminationSignal::Graceful);
        }

        let deadline = Instant::now() + self.grace_period;
        for &pid in &pids {
            if !self.wait_until_exited(pid, deadline).await {
                warn!(pid = %pid, "Matched process did not exit after SIGTERM, sending SIGKILL");
                self.send(pid, TerminationSignal::Forced);
            }
        }

        StopOutcome::FallbackMatched { pids }
    }

    /// Deliver a signal, returning false if the process was already gone
    fn send(&self, pid: u32, signal: TerminationSignal) -> bool {
        info!(pid = %pid, signal = %signal, "Sending signal");
        match self.control.signal(pid, signal) {
            Ok(()) => true,
            Err(ProcessControlError::NoSuchProcess(_)) => {
                info!(pid = %pid, "Process exited before it could be signaled");
                false
            }
            Err(e) => {
                warn!(pid = %pid, signal = %signal, error = %e, "Signal delivery failed");
                true
            }
        }
    }

    /// Poll liveness until the process is gone or the deadline passes
    async fn wait_until_exited(&self, pid: u32, deadline: Instant) -> bool {
        loop {
            if !self.control.is_alive(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
