//! Where a capture run puts its files.

use crate::error::Result;
use autosample_core::RenderJob;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Manifest format written alongside the WAV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// WAV files only.
    WavOnly,
    #[default]
    Sfz,
    DecentSampler,
    /// Bitwig multisample: `multisample.xml` zipped with the samples.
    MultiSample,
}

impl OutputFormat {
    /// Subdirectory holding the WAV files.
    pub fn sample_subdir(self) -> &'static str {
        match self {
            OutputFormat::MultiSample => "raw",
            _ => "wav",
        }
    }

    /// Sample path prefix as referenced from the manifest.
    pub fn manifest_prefix(self) -> &'static str {
        match self {
            OutputFormat::Sfz | OutputFormat::DecentSampler => "wav/",
            _ => "",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::WavOnly => f.write_str("WAV only"),
            OutputFormat::Sfz => f.write_str("SFZ"),
            OutputFormat::DecentSampler => f.write_str("Decent Sampler"),
            OutputFormat::MultiSample => f.write_str("MultiSample"),
        }
    }
}

/// Resolved output paths for one capture run.
///
/// `name` is the final component of `root` and names the manifest and
/// archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    name: String,
    format: OutputFormat,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, format: OutputFormat) -> Self {
        let root = root.into();
        let name = root
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Default".to_string());
        Self { root, name, format }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn sample_dir(&self) -> PathBuf {
        self.root.join(self.format.sample_subdir())
    }

    pub fn sample_path(&self, job: &RenderJob) -> PathBuf {
        self.sample_dir().join(job.file_name())
    }

    /// Manifest file, if the format has one.
    pub fn container_path(&self) -> Option<PathBuf> {
        match self.format {
            OutputFormat::WavOnly => None,
            OutputFormat::Sfz => Some(self.root.join(format!("{}.sfz", self.name))),
            OutputFormat::DecentSampler => Some(self.root.join(format!("{}.dspreset", self.name))),
            OutputFormat::MultiSample => Some(self.sample_dir().join("multisample.xml")),
        }
    }

    /// Archive packaging the sample directory, if the format has one.
    pub fn archive_path(&self) -> Option<PathBuf> {
        match self.format {
            OutputFormat::MultiSample => {
                Some(self.root.join(format!("{}.multisample", self.name)))
            }
            _ => None,
        }
    }

    /// Create the output and sample directories.
    pub fn create_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.sample_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sfz_layout() {
        let layout = OutputLayout::new("/tmp/out/Piano", OutputFormat::Sfz);
        assert_eq!(layout.name(), "Piano");
        assert_eq!(layout.sample_dir(), PathBuf::from("/tmp/out/Piano/wav"));
        assert_eq!(
            layout.container_path(),
            Some(PathBuf::from("/tmp/out/Piano/Piano.sfz"))
        );
        assert_eq!(layout.archive_path(), None);
    }

    #[test]
    fn test_multisample_layout() {
        let layout = OutputLayout::new("/tmp/out/Bass", OutputFormat::MultiSample);
        assert_eq!(layout.sample_dir(), PathBuf::from("/tmp/out/Bass/raw"));
        assert_eq!(
            layout.container_path(),
            Some(PathBuf::from("/tmp/out/Bass/raw/multisample.xml"))
        );
        assert_eq!(
            layout.archive_path(),
            Some(PathBuf::from("/tmp/out/Bass/Bass.multisample"))
        );
    }

    #[test]
    fn test_wav_only_has_no_manifest() {
        let layout = OutputLayout::new("/tmp/out/Pad", OutputFormat::WavOnly);
        assert_eq!(layout.container_path(), None);
        assert_eq!(layout.sample_dir(), PathBuf::from("/tmp/out/Pad/wav"));
    }

    #[test]
    fn test_decent_sampler_name_drops_extension() {
        let layout = OutputLayout::new("/tmp/out/Lead.v2", OutputFormat::DecentSampler);
        assert_eq!(layout.name(), "Lead");
        assert_eq!(
            layout.container_path(),
            Some(PathBuf::from("/tmp/out/Lead.v2/Lead.dspreset"))
        );
    }

    #[test]
    fn test_sample_path_uses_job_file_name() {
        let job = RenderJob {
            midi_note: 60,
            note_from: 58,
            note_to: 61,
            velocity: 91,
            vel_from: 1,
            vel_to: 127,
            round_robin_index: 0,
            round_robin_out_of: 1,
            control_voltage: [0.0, 0.0],
        };
        let layout = OutputLayout::new("/tmp/out/Piano", OutputFormat::Sfz);
        assert_eq!(
            layout.sample_path(&job),
            PathBuf::from("/tmp/out/Piano/wav/sample_note_60_vel_91_rr_0.wav")
        );
    }
}
