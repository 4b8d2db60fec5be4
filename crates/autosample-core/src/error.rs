//! Error types for autosample-core.

use thiserror::Error;

/// Error type for autosample-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid note name: {0:?}")]
    InvalidNoteName(String),
}

/// Result type for autosample-core operations.
pub type Result<T> = core::result::Result<T, Error>;
