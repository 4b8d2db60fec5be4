//! Counters kept by the render worker.

use std::sync::atomic::{AtomicU64, Ordering};

/// I/O counters for the render worker.
#[derive(Default)]
pub struct WorkerMetrics {
    /// Commands handled
    commands: AtomicU64,
    /// WAV files finalized
    files_written: AtomicU64,
    /// Sample data bytes written
    bytes_written: AtomicU64,
    /// Failed file operations
    errors: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_file(&self, data_bytes: u64) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(data_bytes, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands: self.commands.load(Ordering::Relaxed),
            files_written: self.files_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WorkerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub commands: u64,
    pub files_written: u64,
    pub bytes_written: u64,
    pub errors: u64,
}
