// Error types for fleetmux

use thiserror::Error;

/// Result type alias using anyhow::Error
pub type Result<T> = anyhow::Result<T>;

/// Fleetmux-specific error types
#[derive(Error, Debug)]
pub enum FleetmuxError {
    #[error("SSH connection to '{host}' failed: {message}")]
    Connection { host: String, message: String },

    #[error("Failed to parse unit listing: {0}")]
    Parse(String),

    #[error("Failed to control unit '{unit}' on '{host}': {message}")]
    Control {
        unit: String,
        host: String,
        message: String,
    },

    #[error("Interactive channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
