// Application Layer - Lifecycle use cases

pub mod constants;
pub mod launcher;
pub mod status;
pub mod terminator;

// Re-exports
pub use launcher::Launcher;
pub use status::{classify, StatusService};
pub use terminator::Terminator;
