//! # autosample - unattended instrument sampling
//!
//! Plays an external instrument note by note through pitch, gate and
//! velocity CVs, records what comes back and writes a playable
//! multi-sample library.
//!
//! ## Architecture
//!
//! autosample is an umbrella crate over:
//! - **autosample-core** - render jobs, job planning, level detection, lock-free log
//! - **autosample-export** - RIFF WAV writer, SFZ / DecentSampler / MultiSample manifests, zip
//! - **autosample-capture** - real-time capture controller, render worker, control handle
//!
//! ## Quick Start
//!
//! ```no_run
//! use autosample::prelude::*;
//!
//! let (system, mut controller) = CaptureSystem::builder().build()?;
//! system
//!     .update_settings(|s| {
//!         s.output_format = OutputFormat::Sfz;
//!         s.planner.round_robins = 3;
//!     })
//!     .set_output_dir("/tmp/autosample/Piano");
//! system.start_record()?;
//!
//! // Audio callback, once per frame:
//! let cv = controller.process(48_000.0, &FrameInput::stereo(0.0, 0.0));
//! # let _ = cv;
//! # Ok::<(), autosample::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `archive` (default) - package MultiSample output as a zip archive

/// Re-export of autosample-core for direct access
pub use autosample_core as core;
/// Re-export of autosample-export for direct access
pub use autosample_export as export;
/// Re-export of autosample-capture for direct access
pub use autosample_capture as capture;

pub use autosample_capture::{
    CaptureController, CaptureHandle, CaptureSession, CaptureSettings, CaptureState,
    CaptureSystem, CaptureSystemBuilder, CvOutputs, Error, FrameInput, MetricsSnapshot,
    ReleaseMode, Result,
};
pub use autosample_core::{
    note_name, parse_note_name, JobPlanner, Message, MessageBody, PlannerConfig, RenderJob,
    RoundRobinCv, Severity, StatusLine, StatusSlot, VelocityCurve,
};
pub use autosample_export::{ExportError, OutputFormat, OutputLayout};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        CaptureHandle, CaptureSettings, CaptureState, CaptureSystem, CvOutputs, FrameInput,
        OutputFormat, PlannerConfig, ReleaseMode, RenderJob, RoundRobinCv, Severity, StatusSlot,
        VelocityCurve,
    };
}
