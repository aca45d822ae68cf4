// Central Error Type for the Supervisor

use thiserror::Error;

/// Supervisor-level error type
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Handle store error: {0}")]
    HandleStore(#[from] crate::port::HandleStoreError),

    #[error("Launch error: {0}")]
    Spawn(#[from] crate::port::SpawnError),

    #[error("Process control error: {0}")]
    ProcessControl(#[from] crate::port::ProcessControlError),

    #[error("Worker {pid} was started but its pid could not be recorded: {source}")]
    UnrecordedWorker {
        pid: u32,
        #[source]
        source: crate::port::HandleStoreError,
    },
}

/// Result type alias using SupervisorError
pub type Result<T> = std::result::Result<T, SupervisorError>;
