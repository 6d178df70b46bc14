use std::time::Duration;
use thiserror::Error;

/// Global error type for the forking service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The control socket could not be bound. Fatal at startup.
    #[error("Failed to bind control socket on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Underlying IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A raw system call (fork, mkfifo, waitpid, ...) failed.
    #[error("System call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    /// Layered settings could not be loaded or deserialized.
    #[error("Settings error: {0}")]
    Settings(#[from] ::config::ConfigError),

    /// Global logger configuration error.
    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),

    /// The supervisor did not reach `stopped` within the caller's timeout.
    #[error("Timed out after {0:?} waiting for the service to stop")]
    StopTimeout(Duration),

    /// The thread hosting the supervisor panicked.
    #[error("Supervisor thread panicked")]
    SupervisorPanicked,
}

/// A specialized Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
