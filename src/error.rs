//! Error types for the credential trial pipeline

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to install interrupt handler: {0}")]
    Interrupt(#[from] ctrlc::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dispatch thread panicked")]
    DispatchPanicked,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
