// Pix-Star Supervisor Core - Domain Logic & Ports
// NO infrastructure dependencies: adapters live in infra-system

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{Result, SupervisorError};
