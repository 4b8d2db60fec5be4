//! User-facing capture settings, persisted as JSON.

use crate::error::Result;
use autosample_core::{parse_note_name, PlannerConfig};
use autosample_export::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory used when no output directory has been chosen.
pub const DEFAULT_OUTPUT_DIR: &str = "autosample/Default";

/// What happens after the gate closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReleaseMode {
    /// Record the release tail until the input falls silent.
    #[default]
    Silence,
    /// Stop at gate off with a short fade.
    GateOnly,
    /// Like `Silence`, plus a sustain loop with a 5% crossfade.
    Loop5,
    Loop10,
    Loop25,
}

impl ReleaseMode {
    /// Crossfade fraction of the sustain loop, `None` for unlooped modes.
    pub fn loop_crossfade(self) -> Option<f32> {
        match self {
            ReleaseMode::Silence | ReleaseMode::GateOnly => None,
            ReleaseMode::Loop5 => Some(0.05),
            ReleaseMode::Loop10 => Some(0.10),
            ReleaseMode::Loop25 => Some(0.25),
        }
    }

    /// Whether the release tail is recorded until silence.
    pub fn records_release(self) -> bool {
        self != ReleaseMode::GateOnly
    }
}

/// Everything a capture run is configured by.
///
/// Snapshotted when a run starts; later edits affect only the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    #[serde(flatten)]
    pub planner: PlannerConfig,
    /// Time the gate is held per note.
    pub gate_seconds: f32,
    /// Frames skipped at the start of each note before capturing.
    pub latency_samples: u32,
    pub release_mode: ReleaseMode,
    pub output_format: OutputFormat,
    pub output_dir: Option<PathBuf>,
    /// Seed for the random round-robin CVs; `None` draws a fresh seed per run.
    pub rr_seed: Option<u64>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            gate_seconds: 1.0,
            latency_samples: 0,
            release_mode: ReleaseMode::Silence,
            output_format: OutputFormat::Sfz,
            output_dir: None,
            rr_seed: None,
        }
    }
}

impl CaptureSettings {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Output directory, falling back to [`DEFAULT_OUTPUT_DIR`].
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Set the note range from names such as `"C3"` or `"60"`.
    pub fn set_note_range(&mut self, from: &str, to: &str) -> Result<()> {
        let start = parse_note_name(from)?;
        let end = parse_note_name(to)?;
        self.planner.midi_start = start;
        self.planner.midi_end = end;
        Ok(())
    }

    /// Gate length in frames at `sample_rate`, rounded up.
    #[inline]
    pub fn gate_frames(&self, sample_rate: f32) -> u64 {
        (sample_rate * self.gate_seconds.max(0.0)).ceil() as u64
    }
}
