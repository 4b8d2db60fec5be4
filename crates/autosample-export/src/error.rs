//! Error types for autosample-export

use std::io;
use thiserror::Error;

/// Export error type
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Writer used out of order (e.g. samples before the data chunk)
    #[error("Invalid writer state: {0}")]
    InvalidState(&'static str),

    /// Sample data exceeds what a RIFF file can address
    #[error("WAV file too large: {0} bytes")]
    TooLarge(u64),

    /// Packaging the output directory failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// Archive support not compiled in
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;
