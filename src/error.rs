use std::io;
use thiserror::Error;

/// Errors surfaced while detaching from the launching session
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// The first fork failed; nothing was detached
    #[error("Fork failed: {0}")]
    Fork(io::Error),

    #[error("Failed to create new session: {0}")]
    Session(io::Error),

    #[error("Failed to rebind standard streams to /dev/null: {0}")]
    StandardStreams(io::Error),

    #[error("Failed to wait for child {pid}: {source}")]
    Wait { pid: i32, source: io::Error },

    /// Target path or argument cannot be handed to the OS (interior NUL byte)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Daemonization is only supported on Unix systems")]
    Unsupported,
}

/// Errors from replacing the daemon's process image
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to launch {path} after {attempts} attempt(s): {last}")]
    Exhausted {
        path: String,
        attempts: u32,
        last: io::Error,
    },
}

/// Result type alias for daemonization operations
pub type Result<T> = std::result::Result<T, DaemonizeError>;
