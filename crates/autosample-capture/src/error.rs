//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be (de)serialized.
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Invalid note name in settings input.
    #[error(transparent)]
    Core(#[from] autosample_core::Error),

    /// Worker thread could not be started.
    #[error("Render worker error: {0}")]
    Worker(String),

    /// A capture is running or a start request is already queued.
    #[error("Capture busy: {0}")]
    Busy(&'static str),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
