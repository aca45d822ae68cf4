// Handle Store Port
// Persistence of the worker's process handle and identity record

use crate::domain::{ProcessHandle, WorkerIdentity};
use thiserror::Error;

/// Handle persistence errors
#[derive(Error, Debug)]
pub enum HandleStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Handle read back from the store, with its identity when one was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHandle {
    pub handle: ProcessHandle,
    pub identity: Option<WorkerIdentity>,
}

/// What the handle location currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleRecord {
    Missing,
    /// File exists but does not hold a valid pid
    Corrupt(String),
    Present(StoredHandle),
}

/// Exclusive access to the handle, released on drop
pub struct HandleLock {
    _guard: Box<dyn Send>,
}

impl HandleLock {
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

/// Handle store trait
///
/// Callers hold a `HandleLock` across each read-modify-write cycle so
/// concurrent start/stop invocations serialize.
pub trait HandleStore: Send + Sync {
    /// Block until exclusive access is granted
    fn lock(&self) -> Result<HandleLock, HandleStoreError>;

    fn read(&self) -> Result<HandleRecord, HandleStoreError>;

    /// Replace the handle and identity record
    fn write(&self, identity: &WorkerIdentity) -> Result<(), HandleStoreError>;

    /// Remove the handle and identity record; missing files are not an error
    fn remove(&self) -> Result<(), HandleStoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory HandleStore
    #[derive(Clone)]
    pub struct InMemoryHandleStore {
        record: Arc<Mutex<HandleRecord>>,
        fail_writes: Arc<Mutex<bool>>,
    }

    impl InMemoryHandleStore {
        pub fn new() -> Self {
            Self {
                record: Arc::new(Mutex::new(HandleRecord::Missing)),
                fail_writes: Arc::new(Mutex::new(false)),
            }
        }

        pub fn with_record(record: HandleRecord) -> Self {
            let store = Self::new();
            *store.record.lock().unwrap() = record;
            store
        }

        /// Handle without identity, as written by a plain `echo $! > file`
        pub fn with_bare_pid(pid: u32) -> Self {
            Self::with_record(HandleRecord::Present(StoredHandle {
                handle: ProcessHandle::new(pid).unwrap(),
                identity: None,
            }))
        }

        pub fn set_fail_writes(&self, fail: bool) {
            *self.fail_writes.lock().unwrap() = fail;
        }

        pub fn record(&self) -> HandleRecord {
            self.record.lock().unwrap().clone()
        }
    }

    impl Default for InMemoryHandleStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HandleStore for InMemoryHandleStore {
        fn lock(&self) -> Result<HandleLock, HandleStoreError> {
            Ok(HandleLock::new(()))
        }

        fn read(&self) -> Result<HandleRecord, HandleStoreError> {
            Ok(self.record())
        }

        fn write(&self, identity: &WorkerIdentity) -> Result<(), HandleStoreError> {
            if *self.fail_writes.lock().unwrap() {
                return Err(HandleStoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only handle store",
                )));
            }
            let handle = ProcessHandle::new(identity.pid).map_err(|e| {
                HandleStoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    e.to_string(),
                ))
            })?;
            *self.record.lock().unwrap() = HandleRecord::Present(StoredHandle {
                handle,
                identity: Some(identity.clone()),
            });
            Ok(())
        }

        fn remove(&self) -> Result<(), HandleStoreError> {
            *self.record.lock().unwrap() = HandleRecord::Missing;
            Ok(())
        }
    }
}
