// Process control implementation
// reason: nix for signal delivery, sysinfo for cross-platform process table access
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, System};
use tracing::debug;

use pixstar_supervisor_core::application::constants::SESSION_TOKEN_ENV;
use pixstar_supervisor_core::domain::{ProcessInfo, TerminationSignal};
use pixstar_supervisor_core::port::{ProcessControl, ProcessControlError};

/// Process control backed by the live OS process table
pub struct SystemProcessControl {
    system: Mutex<System>,
    self_pid: u32,
}

impl SystemProcessControl {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            self_pid: std::process::id(),
        }
    }

    fn system(&self) -> MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SystemProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert to a positive `pid_t`; 0 and negative values address process groups
fn raw_pid(pid: u32) -> Result<i32, ProcessControlError> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or(ProcessControlError::InvalidPid(pid))
}

/// Signal 0 checks existence without delivering anything.
/// EPERM means the process exists but belongs to someone else.
#[cfg(unix)]
fn probe_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;

    let Ok(raw) = raw_pid(pid) else {
        return false;
    };
    match kill(nix::unistd::Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(errno) => errno == Errno::EPERM,
    }
}

#[cfg(not(unix))]
fn probe_exists(_pid: u32) -> bool {
    true
}

fn session_token(process: &Process) -> Option<String> {
    let prefix = format!("{}=", SESSION_TOKEN_ENV);
    process
        .environ()
        .iter()
        .find_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
}

fn to_info(process: &Process) -> ProcessInfo {
    let mut info = ProcessInfo::new(
        process.pid().as_u32(),
        Some(process.start_time()),
        process.cmd().to_vec(),
    );
    info.session_token = session_token(process);
    info.environ_readable = !process.environ().is_empty();
    info
}

impl ProcessControl for SystemProcessControl {
    fn inspect(&self, pid: u32) -> Option<ProcessInfo> {
        if !probe_exists(pid) {
            return None;
        }

        let sys_pid = Pid::from_u32(pid);
        let mut sys = self.system();
        if !sys.refresh_process_specifics(sys_pid, ProcessRefreshKind::everything()) {
            // Exists per kill(2) but not visible in the process table
            return probe_exists(pid).then(|| ProcessInfo::new(pid, None, Vec::new()));
        }

        match sys.process(sys_pid) {
            Some(process) if process.status() == ProcessStatus::Zombie => {
                debug!(pid = %pid, "Process is a zombie, treating as exited");
                None
            }
            Some(process) => Some(to_info(process)),
            None => None,
        }
    }

    fn signal(&self, pid: u32, signal: TerminationSignal) -> Result<(), ProcessControlError> {
        let raw = raw_pid(pid)?;

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};

            let sig = match signal {
                TerminationSignal::Graceful => Signal::SIGTERM,
                TerminationSignal::Forced => Signal::SIGKILL,
            };
            kill(nix::unistd::Pid::from_raw(raw), sig).map_err(|errno| match errno {
                Errno::ESRCH => ProcessControlError::NoSuchProcess(pid),
                Errno::EPERM => ProcessControlError::PermissionDenied(pid),
                other => ProcessControlError::Other(other.to_string()),
            })
        }

        #[cfg(not(unix))]
        {
            let _ = (raw, signal);
            Err(ProcessControlError::Other(
                "signals are only supported on unix".to_string(),
            ))
        }
    }

    fn find_by_pattern(&self, pattern: &str) -> Vec<ProcessInfo> {
        let mut sys = self.system();
        sys.refresh_processes_specifics(ProcessRefreshKind::everything());

        // Linux lists threads alongside processes; only signal thread group leaders
        let threads: HashSet<Pid> = sys
            .processes()
            .iter()
            .filter_map(|(pid, process)| process.tasks().map(|tasks| (pid, tasks)))
            .flat_map(|(pid, tasks)| tasks.iter().filter(move |task| *task != pid).copied())
            .collect();

        let mut matches: Vec<ProcessInfo> = sys
            .processes()
            .values()
            .filter(|process| process.pid().as_u32() != self.self_pid)
            .filter(|process| !threads.contains(&process.pid()))
            .filter(|process| process.status() != ProcessStatus::Zombie)
            .map(to_info)
            .filter(|info| info.matches_pattern(pattern))
            .collect();
        matches.sort_by_key(|info| info.pid);

        debug!(pattern = %pattern, matches = matches.len(), "Process table searched");
        matches
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    fn wait_gone(control: &SystemProcessControl, pid: u32) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if !control.is_alive(pid) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_inspect_self() {
        let control = SystemProcessControl::new();
        let info = control.inspect(std::process::id()).expect("own process is alive");
        assert_eq!(info.pid, std::process::id());
        assert!(info.start_time.is_some());
        assert!(!info.command.is_empty());
    }

    #[test]
    fn test_invalid_pids() {
        let control = SystemProcessControl::new();
        assert!(control.inspect(0).is_none());
        assert_eq!(
            control.signal(0, TerminationSignal::Graceful),
            Err(ProcessControlError::InvalidPid(0))
        );
        assert_eq!(
            control.signal(u32::MAX, TerminationSignal::Graceful),
            Err(ProcessControlError::InvalidPid(u32::MAX))
        );
    }

    #[test]
    fn test_sigterm_and_reaped_child_is_gone() {
        let control = SystemProcessControl::new();
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();

        assert!(control.is_alive(pid));
        control.signal(pid, TerminationSignal::Graceful).unwrap();

        // Unreaped, the child is a zombie and must already count as exited
        assert!(wait_gone(&control, pid));
        child.wait().unwrap();
        assert_eq!(
            control.signal(pid, TerminationSignal::Graceful),
            Err(ProcessControlError::NoSuchProcess(pid))
        );
    }

    #[test]
    fn test_inspect_reads_session_token_from_environment() {
        let control = SystemProcessControl::new();
        let mut plain = Command::new("sleep").arg("30").spawn().unwrap();
        let mut tagged = Command::new("sleep")
            .arg("30")
            .env(SESSION_TOKEN_ENV, "session-42")
            .spawn()
            .unwrap();

        let plain_info = control.inspect(plain.id()).unwrap();
        assert!(plain_info.environ_readable);
        assert_eq!(plain_info.session_token, None);

        let tagged_info = control.inspect(tagged.id()).unwrap();
        assert!(tagged_info.environ_readable);
        assert_eq!(tagged_info.session_token.as_deref(), Some("session-42"));

        for child in [&mut plain, &mut tagged] {
            child.kill().unwrap();
            child.wait().unwrap();
        }
    }

    #[test]
    fn test_find_by_pattern_excludes_self() {
        let control = SystemProcessControl::new();
        let own_cmd = control
            .inspect(std::process::id())
            .unwrap()
            .command_line();

        let found = control.find_by_pattern(&own_cmd);
        assert!(found.iter().all(|info| info.pid != std::process::id()));
    }
}
