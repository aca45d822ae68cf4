// Worker status classification
use crate::application::constants::START_TIME_TOLERANCE_SECS;
use crate::domain::{IdentityCheck, WorkerStatus};
use crate::error::Result;
use crate::port::{HandleRecord, HandleStore, ProcessControl};
use std::sync::Arc;
use tracing::debug;

/// Classify a handle record against the live process table
///
/// A recorded identity that contradicts the live process means the pid was
/// recycled; a missing identity falls back to liveness alone.
pub fn classify(record: &HandleRecord, control: &dyn ProcessControl) -> WorkerStatus {
    let stored = match record {
        HandleRecord::Missing => return WorkerStatus::NotRecorded,
        HandleRecord::Corrupt(content) => {
            return WorkerStatus::Corrupt {
                content: content.clone(),
            }
        }
        HandleRecord::Present(stored) => stored,
    };

    let pid = stored.handle.pid();
    let Some(info) = control.inspect(pid) else {
        return WorkerStatus::Stopped { pid };
    };

    let check = stored
        .identity
        .as_ref()
        .map(|identity| identity.check(&info, START_TIME_TOLERANCE_SECS));

    debug!(pid = %pid, check = ?check, "Identity check completed");

    match check {
        Some(IdentityCheck::Mismatch(reason)) => WorkerStatus::Recycled { pid, reason },
        Some(IdentityCheck::Verified) => WorkerStatus::Running {
            pid,
            verified: true,
        },
        Some(IdentityCheck::Unverifiable) | None => WorkerStatus::Running {
            pid,
            verified: false,
        },
    }
}

/// Read-only status query
pub struct StatusService {
    store: Arc<dyn HandleStore>,
    control: Arc<dyn ProcessControl>,
}

impl StatusService {
    pub fn new(store: Arc<dyn HandleStore>, control: Arc<dyn ProcessControl>) -> Self {
        Self { store, control }
    }

    pub fn status(&self) -> Result<WorkerStatus> {
        let _lock = self.store.lock()?;
        let record = self.store.read()?;
        Ok(classify(&record, self.control.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProcessHandle, ProcessInfo, WorkerIdentity};
    use crate::port::handle_store::mocks::InMemoryHandleStore;
    use crate::port::process_control::mocks::MockProcessControl;
    use crate::port::StoredHandle;

    fn record_with_identity(pid: u32, start_time: u64) -> HandleRecord {
        HandleRecord::Present(StoredHandle {
            handle: ProcessHandle::new(pid).unwrap(),
            identity: Some(WorkerIdentity {
                pid,
                start_time: Some(start_time),
                session_token: "token".to_string(),
                launched_at: 0,
                command: vec!["python".to_string(), "main.py".to_string()],
            }),
        })
    }

    #[test]
    fn test_classify_missing_and_corrupt() {
        let control = MockProcessControl::new();
        assert_eq!(
            classify(&HandleRecord::Missing, &control),
            WorkerStatus::NotRecorded
        );
        assert_eq!(
            classify(&HandleRecord::Corrupt("abc".to_string()), &control),
            WorkerStatus::Corrupt {
                content: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_classify_dead_pid() {
        let control = MockProcessControl::new();
        assert_eq!(
            classify(&record_with_identity(77, 100), &control),
            WorkerStatus::Stopped { pid: 77 }
        );
    }

    #[test]
    fn test_classify_verified_and_recycled() {
        let control = MockProcessControl::new();
        control.add_process(ProcessInfo::new(77, Some(100), vec![]));

        assert_eq!(
            classify(&record_with_identity(77, 101), &control),
            WorkerStatus::Running {
                pid: 77,
                verified: true
            }
        );
        assert!(matches!(
            classify(&record_with_identity(77, 900), &control),
            WorkerStatus::Recycled { pid: 77, .. }
        ));
    }

    #[test]
    fn test_status_service_bare_pid_is_unverified() {
        let control = Arc::new(MockProcessControl::new());
        control.add_process(ProcessInfo::new(55, Some(100), vec![]));
        let store = Arc::new(InMemoryHandleStore::with_bare_pid(55));

        let status = StatusService::new(store, control).status().unwrap();
        assert_eq!(
            status,
            WorkerStatus::Running {
                pid: 55,
                verified: false
            }
        );
    }
}
