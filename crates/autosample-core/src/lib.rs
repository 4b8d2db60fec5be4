//! Render-job model, planning and the lock-free primitives shared by the
//! capture engine.
//!
//! # Primary API
//!
//! - [`RenderJob`]: one note/velocity/round-robin sample to capture
//! - [`JobPlanner`] / [`PlannerConfig`]: expands a sweep into ordered jobs
//! - [`SilenceDetector`] / [`LevelMeter`]: per-frame level tracking
//! - [`MessageLog`] / [`StatusReader`]: timestamped messages and status lines
//!
//! # Example
//!
//! ```
//! use autosample_core::{JobPlanner, PlannerConfig};
//!
//! let config = PlannerConfig::default();
//! let jobs = JobPlanner::plan_seeded(&config, 7);
//! assert_eq!(jobs.len(), JobPlanner::job_count(&config));
//! ```

pub mod error;
pub use error::{Error, Result};

mod job;
pub use job::{
    note_name, parse_note_name, pitch_cv, velocity_cv, RenderJob, GATE_HIGH_VOLTS,
    PITCH_CV_LIMIT, VELOCITY_CV_MAX,
};

mod planner;
pub use planner::{
    key_zones, velocity_zones, JobPlanner, KeyZone, PlannerConfig, RoundRobinCv, VelocityCurve,
    VelocityZone, MAX_MIDI_STEP, MAX_ROUND_ROBINS, MAX_VELOCITY_LAYERS,
};

mod level;
pub use level::{LevelMeter, SilenceDetector, LEVEL_DECAY, SILENCE_THRESHOLD, SILENCE_WINDOW};

pub mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat, AtomicJobCursor};

pub mod log;
pub use log::{
    status_channel, Message, MessageBody, MessageLog, MessageProducer, Severity, StatusLine,
    StatusReader, StatusSlot, StatusWriter, MESSAGE_CAPACITY, STATUS_CAPACITY,
};

/// Frames per audio block handed from the audio thread to the render worker.
pub const BLOCK_FRAMES: usize = 16;

/// Audio blocks in the block ring.
pub const BLOCK_COUNT: usize = 8192;

/// Capacity of the command channel.
pub const COMMAND_CAPACITY: usize = 65536;
