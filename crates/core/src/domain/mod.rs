// Domain Layer - Pure lifecycle entities

pub mod error;
pub mod handle;
pub mod launch;
pub mod outcome;
pub mod process;

// Re-exports
pub use error::DomainError;
pub use handle::{IdentityCheck, ProcessHandle, WorkerIdentity};
pub use launch::LaunchSpec;
pub use outcome::{LaunchOutcome, StopOutcome, WorkerStatus};
pub use process::{ProcessInfo, TerminationSignal};
