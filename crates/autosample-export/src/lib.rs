//! # autosample-export
//!
//! File output for captured samples:
//! - **RIFF WAV**: incremental 32-bit float writer with `inst` and `smpl` chunks
//! - **Manifests**: SFZ, DecentSampler and Bitwig MultiSample writers
//! - **Archives**: packaging a MultiSample directory into one file
//!
//! ## Feature Flags
//!
//! - `archive` (default): zip packaging via the `zip` crate

pub mod archive;
pub mod container;
pub mod error;
pub mod layout;
pub mod riff;

pub use archive::{Archiver, NoArchiver};
#[cfg(feature = "archive")]
pub use archive::ZipArchiver;
pub use container::{
    open_container, ContainerWriter, DecentSamplerWriter, MultiSampleWriter, NoContainer,
    SampleEntry, SfzWriter,
};
pub use error::{ExportError, Result};
pub use layout::{OutputFormat, OutputLayout};
pub use riff::{InstrumentZone, LoopPoints, RiffWavWriter, WavSummary};

/// Archiver for the enabled feature set.
pub fn default_archiver() -> std::sync::Arc<dyn Archiver> {
    #[cfg(feature = "archive")]
    return std::sync::Arc::new(ZipArchiver);
    #[cfg(not(feature = "archive"))]
    return std::sync::Arc::new(NoArchiver);
}
