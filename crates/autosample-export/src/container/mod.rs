//! Manifest writers mapping captured WAV files onto key, velocity and
//! round-robin zones.
//!
//! Every format follows the same lifecycle: open writes the header, each
//! finished sample appends one entry, and [`ContainerWriter::finish`] writes
//! the footer. A writer that is dropped without `finish` leaves the manifest
//! unfinalized.

mod decent;
mod multisample;
mod sfz;

pub use decent::DecentSamplerWriter;
pub use multisample::MultiSampleWriter;
pub use sfz::SfzWriter;

use crate::error::Result;
use crate::layout::{OutputFormat, OutputLayout};
use crate::riff::LoopPoints;
use autosample_core::RenderJob;
use std::path::Path;

/// One finished sample as referenced by a manifest.
#[derive(Debug, Clone, Copy)]
pub struct SampleEntry<'a> {
    pub job: &'a RenderJob,
    /// File name relative to the sample directory.
    pub file_name: &'a str,
    pub frames: u64,
    pub loop_points: Option<LoopPoints>,
}

/// Incremental manifest writer.
pub trait ContainerWriter: Send {
    fn format(&self) -> OutputFormat;

    /// Manifest file on disk, if any.
    fn path(&self) -> Option<&Path>;

    fn append(&mut self, entry: &SampleEntry<'_>) -> Result<()>;

    /// Write the footer and flush. Later calls are no-ops.
    fn finish(&mut self) -> Result<()>;
}

/// Writer for [`OutputFormat::WavOnly`]: accepts and ignores entries.
#[derive(Debug, Default)]
pub struct NoContainer;

impl ContainerWriter for NoContainer {
    fn format(&self) -> OutputFormat {
        OutputFormat::WavOnly
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn append(&mut self, _entry: &SampleEntry<'_>) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Open the manifest for a layout and write its header.
///
/// `round_robins` is the cycle length shared by every job in the run.
pub fn open_container(layout: &OutputLayout, round_robins: u32) -> Result<Box<dyn ContainerWriter>> {
    let Some(path) = layout.container_path() else {
        return Ok(Box::new(NoContainer));
    };

    Ok(match layout.format() {
        OutputFormat::WavOnly => Box::new(NoContainer),
        OutputFormat::Sfz => Box::new(SfzWriter::create(path, round_robins)?),
        OutputFormat::DecentSampler => Box::new(DecentSamplerWriter::create(path)?),
        OutputFormat::MultiSample => Box::new(MultiSampleWriter::create(path, layout.name())?),
    })
}

/// Escape text for use inside an XML attribute.
pub(crate) fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
