//! Test helpers for autosample integration tests
//!
//! A simulated instrument answers the capture controller's CVs the way a
//! hardware voice would: a sine while the gate is high, an exponential
//! release after it drops. Frames are driven by hand, one `process` call at
//! a time, so every run is deterministic.

#![allow(dead_code)]

use autosample::prelude::*;
use autosample::CaptureController;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Low sample rate keeps runs short.
pub const TEST_SAMPLE_RATE: f32 = 8000.0;

/// Gate time per note at [`TEST_SAMPLE_RATE`] (80 frames).
pub const TEST_GATE_SECONDS: f32 = 0.01;

/// Silence window used by [`test_system`].
pub const TEST_SILENCE_WINDOW: usize = 64;

/// Level below which the simulated release snaps to zero.
pub const RELEASE_FLOOR: f32 = 1e-4;

/// One recorded controller frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub state: CaptureState,
    pub cv: CvOutputs,
}

/// Simulated voice driven by the previous frame's CVs.
pub struct Instrument {
    phase: f32,
    level: f32,
    release: f32,
    mono: bool,
}

impl Instrument {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            level: 0.0,
            release: 0.9,
            mono: false,
        }
    }

    /// Mono voice: the right input is left disconnected.
    pub fn mono() -> Self {
        Self {
            mono: true,
            ..Self::new()
        }
    }

    /// Next input frame in volts for the given CVs.
    pub fn next(&mut self, cv: &CvOutputs, sample_rate: f32) -> FrameInput {
        if cv.gate > 0.0 {
            self.level = (cv.velocity / 10.0).max(0.1);
        } else {
            self.level *= self.release;
            if self.level < RELEASE_FLOOR {
                self.level = 0.0;
            }
        }

        let freq = 261.63 * 2f32.powf(cv.pitch);
        self.phase = (self.phase + freq / sample_rate).fract();
        let volts = 5.0 * self.level * (self.phase * std::f32::consts::TAU).sin();

        if self.mono {
            FrameInput::mono(volts)
        } else {
            FrameInput::stereo(volts, -volts)
        }
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for a short sweep starting at `from`, with a fixed seed.
pub fn test_settings(dir: &Path, format: OutputFormat, from: u8, to: u8) -> CaptureSettings {
    let mut settings = CaptureSettings {
        gate_seconds: TEST_GATE_SECONDS,
        output_format: format,
        output_dir: Some(dir.to_path_buf()),
        rr_seed: Some(42),
        ..Default::default()
    };
    settings.planner.midi_start = from;
    settings.planner.midi_end = to;
    settings.planner.midi_step = 1;
    settings.planner.velocity_layers = 1;
    settings.planner.round_robins = 1;
    settings
}

/// Route worker logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Capture system sized for tests, with a 1 ms worker poll.
pub fn test_system(settings: CaptureSettings) -> (CaptureSystem, CaptureController) {
    init_tracing();
    CaptureSystem::builder()
        .settings(settings)
        .command_capacity(8192)
        .block_count(2048)
        .silence_window(TEST_SILENCE_WINDOW)
        .poll_interval(Duration::from_millis(1))
        .build()
        .expect("Failed to build capture system")
}

/// Drive the controller until a started run returns to idle.
///
/// The first frame picks up the queued start request.
pub fn run_capture(
    controller: &mut CaptureController,
    instrument: &mut Instrument,
    max_frames: usize,
) -> Vec<Frame> {
    run_until(controller, instrument, max_frames, |_| false)
}

/// Like [`run_capture`], but also stops right after the first frame for
/// which `stop_at` returns true.
pub fn run_until(
    controller: &mut CaptureController,
    instrument: &mut Instrument,
    max_frames: usize,
    mut stop_at: impl FnMut(&Frame) -> bool,
) -> Vec<Frame> {
    let mut timeline = Vec::new();
    let mut last = CvOutputs::default();
    let mut started = false;

    for _ in 0..max_frames {
        let input = instrument.next(&last, TEST_SAMPLE_RATE);
        last = controller.process(TEST_SAMPLE_RATE, &input);
        let frame = Frame {
            state: controller.state(),
            cv: last,
        };
        timeline.push(frame);

        started |= frame.state.is_active();
        if (started && !frame.state.is_active()) || stop_at(&frame) {
            break;
        }
    }
    timeline
}

/// Poll `done` for up to five seconds.
pub fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}

/// Files in `dir` with the given extension, sorted.
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// Little-endian u32 at `offset`.
pub fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Offset and declared size of the first chunk with the given id.
pub fn find_chunk(bytes: &[u8], id: &[u8; 4]) -> Option<(usize, u32)> {
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let size = read_u32(bytes, offset + 4);
        if &bytes[offset..offset + 4] == id {
            return Some((offset, size));
        }
        offset += 8 + size as usize + (size as usize & 1);
    }
    None
}

/// Assert the RIFF and data sizes were patched to match the file.
pub fn assert_patched_sizes(path: &Path) {
    let bytes = std::fs::read(path).expect("Failed to read WAV");
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(
        read_u32(&bytes, 4) as usize,
        bytes.len() - 8,
        "RIFF size not patched in {}",
        path.display()
    );

    let (offset, data_size) = find_chunk(&bytes, b"data").expect("no data chunk");
    assert!(offset + 8 + data_size as usize <= bytes.len());
}

/// Count non-overlapping occurrences of `needle` in `haystack`.
pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|w| *w == needle)
        .count()
}
