// Port Layer - Interfaces for external dependencies

pub mod handle_store;
pub mod id_provider; // For deterministic testing
pub mod process_control;
pub mod time_provider;
pub mod worker_spawner;

// Re-exports
pub use handle_store::{HandleLock, HandleRecord, HandleStore, HandleStoreError, StoredHandle};
pub use id_provider::IdProvider;
pub use process_control::{ProcessControl, ProcessControlError};
pub use time_provider::TimeProvider;
pub use worker_spawner::{SpawnError, WorkerSpawner};
