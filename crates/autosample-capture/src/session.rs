//! Immutable snapshot of one capture run.

use crate::settings::CaptureSettings;
use autosample_core::{JobPlanner, RenderJob};
use autosample_export::OutputLayout;

/// Settings, planned jobs and output paths frozen at start.
///
/// Shared between the control handle, the audio thread and the render
/// worker through an `Arc`; never mutated after planning.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub settings: CaptureSettings,
    pub jobs: Vec<RenderJob>,
    pub test_mode: bool,
    pub layout: OutputLayout,
}

impl CaptureSession {
    /// Plan a session. Random round-robin CVs use `settings.rr_seed` when set.
    pub fn plan(settings: &CaptureSettings, test_mode: bool) -> Self {
        let jobs = match settings.rr_seed {
            Some(seed) => JobPlanner::plan_seeded(&settings.planner, seed),
            None => JobPlanner::plan(&settings.planner, &mut rand::thread_rng()),
        };
        Self::with_jobs(settings, jobs, test_mode)
    }

    /// Build a session around an explicit job list.
    pub fn with_jobs(settings: &CaptureSettings, jobs: Vec<RenderJob>, test_mode: bool) -> Self {
        let layout = OutputLayout::new(settings.resolved_output_dir(), settings.output_format);
        Self {
            settings: settings.clone(),
            jobs,
            test_mode,
            layout,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job(&self, index: usize) -> Option<&RenderJob> {
        self.jobs.get(index)
    }

    /// Round-robin cycle length shared by the jobs.
    pub fn round_robins(&self) -> u32 {
        self.jobs.first().map_or(1, |job| job.round_robin_out_of)
    }
}
