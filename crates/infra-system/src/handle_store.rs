// Pid file handle store
// reason: nix flock for exclusive access, tempfile for atomic rename-based writes
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use pixstar_supervisor_core::domain::{ProcessHandle, WorkerIdentity};
use pixstar_supervisor_core::port::{
    HandleLock, HandleRecord, HandleStore, HandleStoreError, StoredHandle,
};

const IDENTITY_SUFFIX: &str = ".identity";
const LOCK_SUFFIX: &str = ".lock";

/// Handle store backed by a pid file plus sibling identity and lock files
///
/// - `<pid_file>`: exactly the decimal pid
/// - `<pid_file>.identity`: JSON `WorkerIdentity`
/// - `<pid_file>.lock`: flock target, never removed
pub struct FileHandleStore {
    pid_path: PathBuf,
    identity_path: PathBuf,
    lock_path: PathBuf,
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl FileHandleStore {
    pub fn new(pid_path: impl Into<PathBuf>) -> Self {
        let pid_path = pid_path.into();
        Self {
            identity_path: sibling(&pid_path, IDENTITY_SUFFIX),
            lock_path: sibling(&pid_path, LOCK_SUFFIX),
            pid_path,
        }
    }

    pub fn pid_path(&self) -> &Path {
        &self.pid_path
    }

    pub fn identity_path(&self) -> &Path {
        &self.identity_path
    }

    fn read_identity(&self, handle: ProcessHandle) -> Option<WorkerIdentity> {
        let content = match fs::read_to_string(&self.identity_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.identity_path.display(), error = %e, "Failed to read identity record");
                return None;
            }
        };

        match serde_json::from_str::<WorkerIdentity>(&content) {
            Ok(identity) if identity.pid == handle.pid() => Some(identity),
            Ok(identity) => {
                debug!(
                    recorded = %identity.pid,
                    handle = %handle,
                    "Identity record belongs to another pid, ignoring it"
                );
                None
            }
            Err(e) => {
                warn!(path = %self.identity_path.display(), error = %e, "Corrupt identity record, ignoring it");
                None
            }
        }
    }

    /// Write to a temp file in the same directory, then rename over the target
    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<(), HandleStoreError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| HandleStoreError::Io(e.error))?;
        Ok(())
    }

    fn remove_if_exists(path: &Path) -> Result<(), HandleStoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl HandleStore for FileHandleStore {
    #[cfg(unix)]
    fn lock(&self) -> Result<HandleLock, HandleStoreError> {
        use nix::fcntl::{Flock, FlockArg};
        use std::os::unix::fs::OpenOptionsExt;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&self.lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusive) {
            Ok(lock) => Ok(HandleLock::new(lock)),
            Err((_file, errno)) => Err(HandleStoreError::Lock(format!(
                "{}: {}",
                self.lock_path.display(),
                errno
            ))),
        }
    }

    #[cfg(not(unix))]
    fn lock(&self) -> Result<HandleLock, HandleStoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        Ok(HandleLock::new(file))
    }

    fn read(&self) -> Result<HandleRecord, HandleStoreError> {
        let content = match fs::read_to_string(&self.pid_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HandleRecord::Missing),
            Err(e) => return Err(e.into()),
        };

        let handle = match ProcessHandle::parse(&content) {
            Ok(handle) => handle,
            Err(_) => return Ok(HandleRecord::Corrupt(content.trim().to_string())),
        };

        Ok(HandleRecord::Present(StoredHandle {
            handle,
            identity: self.read_identity(handle),
        }))
    }

    fn write(&self, identity: &WorkerIdentity) -> Result<(), HandleStoreError> {
        let handle = ProcessHandle::new(identity.pid).map_err(|e| {
            HandleStoreError::Io(std::io::Error::new(ErrorKind::InvalidInput, e.to_string()))
        })?;

        // Identity first: a pid file is only ever visible next to its own record
        self.write_atomic(&self.identity_path, &serde_json::to_vec_pretty(identity)?)?;
        self.write_atomic(&self.pid_path, handle.to_file_contents().as_bytes())?;

        info!(pid = %handle, path = %self.pid_path.display(), "Pid file written");
        Ok(())
    }

    fn remove(&self) -> Result<(), HandleStoreError> {
        Self::remove_if_exists(&self.pid_path)?;
        Self::remove_if_exists(&self.identity_path)?;
        debug!(path = %self.pid_path.display(), "Pid file removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(pid: u32) -> WorkerIdentity {
        WorkerIdentity {
            pid,
            start_time: Some(1_700_000_000),
            session_token: "8f14e45f".to_string(),
            launched_at: 1_700_000_000_123,
            command: vec!["python".to_string(), "main.py".to_string()],
        }
    }

    #[test]
    fn test_missing_handle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("immich-pixstar.pid"));
        assert_eq!(store.read().unwrap(), HandleRecord::Missing);
    }

    #[test]
    fn test_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("immich-pixstar.pid"));

        store.write(&identity(4321)).unwrap();

        assert_eq!(fs::read_to_string(store.pid_path()).unwrap(), "4321");
        let HandleRecord::Present(stored) = store.read().unwrap() else {
            panic!("expected a stored handle");
        };
        assert_eq!(stored.handle.pid(), 4321);
        assert_eq!(stored.identity, Some(identity(4321)));

        store.remove().unwrap();
        assert!(!store.pid_path().exists());
        assert!(!store.identity_path().exists());
        assert_eq!(store.read().unwrap(), HandleRecord::Missing);

        // Removing twice is fine
        store.remove().unwrap();
    }

    #[test]
    fn test_plain_pid_file_without_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("immich-pixstar.pid"));
        fs::write(store.pid_path(), "777\n").unwrap();

        let HandleRecord::Present(stored) = store.read().unwrap() else {
            panic!("expected a stored handle");
        };
        assert_eq!(stored.handle.pid(), 777);
        assert_eq!(stored.identity, None);
    }

    #[test]
    fn test_identity_for_other_pid_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("immich-pixstar.pid"));
        store.write(&identity(100)).unwrap();
        fs::write(store.pid_path(), "200").unwrap();

        let HandleRecord::Present(stored) = store.read().unwrap() else {
            panic!("expected a stored handle");
        };
        assert_eq!(stored.identity, None);
    }

    #[test]
    fn test_corrupt_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("immich-pixstar.pid"));
        fs::write(store.pid_path(), "  not a pid \n").unwrap();

        assert_eq!(
            store.read().unwrap(),
            HandleRecord::Corrupt("not a pid".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_is_exclusive() {
        use nix::fcntl::{Flock, FlockArg};

        let dir = tempfile::tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("immich-pixstar.pid"));

        let held = store.lock().unwrap();

        let probe = OpenOptions::new()
            .write(true)
            .open(dir.path().join("immich-pixstar.pid.lock"))
            .unwrap();
        let probe = match Flock::lock(probe, FlockArg::LockExclusiveNonblock) {
            Ok(_) => panic!("lock should be held"),
            Err((file, _)) => file,
        };

        drop(held);
        assert!(Flock::lock(probe, FlockArg::LockExclusiveNonblock).is_ok());
    }
}
