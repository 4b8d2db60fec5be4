//! Real-time capture of an external instrument, note by note.
//!
//! The audio callback owns a [`CaptureController`] and calls
//! [`CaptureController::process`] once per frame; it drives pitch, gate,
//! velocity and round-robin CVs and moves captured audio to a background
//! render worker that writes WAV files and instrument manifests.
//!
//! # Example
//!
//! ```no_run
//! use autosample_capture::{CaptureSystem, FrameInput};
//!
//! let (system, mut controller) = CaptureSystem::builder().build()?;
//! system.set_output_dir("/tmp/autosample/Piano");
//! system.start_record()?;
//!
//! // Inside the audio callback:
//! let cv = controller.process(48_000.0, &FrameInput::stereo(0.0, 0.0));
//! # let _ = cv;
//! # Ok::<(), autosample_capture::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result};

mod system;
pub use system::{CaptureHandle, CaptureSystem, CaptureSystemBuilder};

mod controller;
pub use controller::{
    CaptureController, CvOutputs, FrameInput, GATE_FADE_FRAMES, GATE_ONLY_SPINDOWN_FACTOR,
    GO_THRESHOLD_VOLTS, INPUT_VOLTS_FULL_SCALE, SPINDOWN_FRAMES,
};

mod settings;
pub use settings::{CaptureSettings, ReleaseMode, DEFAULT_OUTPUT_DIR};

mod session;
pub use session::CaptureSession;

mod shared;
pub use shared::CaptureState;

mod metrics;
pub use metrics::{MetricsSnapshot, WorkerMetrics};

pub mod blocks;
pub mod command;
mod worker;
pub use worker::{RenderWorker, DEFAULT_POLL_INTERVAL};
