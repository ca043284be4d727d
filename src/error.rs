//! Unified error types for memwatch

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for memwatch operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Handler errors
    #[error("Failed to signal process {pid}: {source}")]
    Signal { pid: i32, source: nix::errno::Errno },

    #[error("Worker manager request failed: {0}")]
    WorkerManager(String),

    // Watchdog errors
    #[error("Failed to spawn watchdog thread: {0}")]
    Spawn(io::Error),

    #[error("Watchdog lifecycle error: {0}")]
    Lifecycle(String),
}

/// Result type alias for memwatch operations
pub type Result<T> = std::result::Result<T, Error>;
