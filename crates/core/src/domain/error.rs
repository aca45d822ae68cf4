// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid process handle content: {0:?}")]
    InvalidHandle(String),

    #[error("Invalid process id: {0}")]
    InvalidPid(u64),
}

pub type Result<T> = std::result::Result<T, DomainError>;
