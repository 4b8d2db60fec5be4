//! Per-frame capture state machine, run on the audio thread.
//!
//! The controller drives the instrument through CV outputs and streams the
//! returning audio to the render worker. It never allocates, locks or
//! blocks: it only pushes into preallocated rings and stores atomics.

use crate::blocks::BlockWriter;
use crate::command::{Command, CommandSender};
use crate::session::CaptureSession;
use crate::settings::ReleaseMode;
use crate::shared::{CaptureShared, CaptureState};
use autosample_core::{
    MessageBody, MessageProducer, RenderJob, SilenceDetector, StatusLine, StatusSlot,
    StatusWriter, GATE_HIGH_VOLTS,
};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Frames of silence between notes.
pub const SPINDOWN_FRAMES: u64 = 1024;

/// Spindown multiplier in gate-only mode, where the release is not recorded.
pub const GATE_ONLY_SPINDOWN_FACTOR: u64 = 16;

/// Length of the fade applied at gate off in gate-only mode.
pub const GATE_FADE_FRAMES: u64 = 1024;

/// Audio input scale: ±5 V is full scale.
pub const INPUT_VOLTS_FULL_SCALE: f32 = 5.0;

/// Voltage above which the go input counts as high.
pub const GO_THRESHOLD_VOLTS: f32 = 1.0;

/// Inputs for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub left: f32,
    /// `None` when the right input is disconnected; capture is then mono.
    pub right: Option<f32>,
    /// Go trigger; a rising edge restarts the last session.
    pub go: f32,
}

impl FrameInput {
    pub fn stereo(left: f32, right: f32) -> Self {
        Self {
            left,
            right: Some(right),
            go: 0.0,
        }
    }

    pub fn mono(left: f32) -> Self {
        Self {
            left,
            right: None,
            go: 0.0,
        }
    }
}

/// CV outputs for one frame, in volts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CvOutputs {
    pub pitch: f32,
    pub gate: f32,
    pub velocity: f32,
    pub round_robin: [f32; 2],
}

impl CvOutputs {
    fn for_job(job: &RenderJob, gate: bool) -> Self {
        Self {
            pitch: job.pitch_cv(),
            gate: if gate { GATE_HIGH_VOLTS } else { 0.0 },
            velocity: job.velocity_cv(),
            round_robin: job.control_voltage,
        }
    }
}

/// Audio-thread half of a [`CaptureSystem`](crate::CaptureSystem).
pub struct CaptureController {
    shared: Arc<CaptureShared>,
    requests: Receiver<Arc<CaptureSession>>,
    commands: CommandSender,
    blocks: BlockWriter,
    messages: MessageProducer,
    status: StatusWriter,
    silence: SilenceDetector,

    session: Option<Arc<CaptureSession>>,
    retired: Option<Arc<CaptureSession>>,
    state: CaptureState,
    job_index: Option<usize>,
    release_mode: ReleaseMode,
    gate_frames: u64,
    latency_frames: u64,
    latency_left: u64,
    counter: u64,
    sustain_frames: u64,
    go_high: bool,
}

impl CaptureController {
    pub(crate) fn new(
        shared: Arc<CaptureShared>,
        requests: Receiver<Arc<CaptureSession>>,
        commands: CommandSender,
        blocks: BlockWriter,
        messages: MessageProducer,
        status: StatusWriter,
        silence: SilenceDetector,
    ) -> Self {
        Self {
            shared,
            requests,
            commands,
            blocks,
            messages,
            status,
            silence,
            session: None,
            retired: None,
            state: CaptureState::Inactive,
            job_index: None,
            release_mode: ReleaseMode::Silence,
            gate_frames: 0,
            latency_frames: 0,
            latency_left: 0,
            counter: 0,
            sustain_frames: 0,
            go_high: false,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Index of the job being captured.
    pub fn current_job(&self) -> Option<usize> {
        self.job_index
    }

    /// Advance one frame.
    pub fn process(&mut self, sample_rate: f32, input: &FrameInput) -> CvOutputs {
        let left = input.left / INPUT_VOLTS_FULL_SCALE;
        let right = input.right.map(|r| r / INPUT_VOLTS_FULL_SCALE);

        let go_high = input.go > GO_THRESHOLD_VOLTS;
        let go_edge = go_high && !self.go_high;
        self.go_high = go_high;

        self.flush_retired();

        if self.state.is_active() && self.shared.stop.take() {
            self.stop();
        }

        match self.state {
            CaptureState::Inactive => self.poll_start(sample_rate, go_edge),
            CaptureState::NewNote => self.new_note(sample_rate, right.is_some()),
            CaptureState::GatedRecord => self.gated_record(left, right),
            CaptureState::ReleaseRecord => self.release_record(left, right),
            CaptureState::GateReleaseFade => self.gate_release_fade(left, right),
            CaptureState::SpindownBuffer => self.spindown(),
        }

        self.shared.set_state(self.state);
        self.outputs()
    }

    fn outputs(&self) -> CvOutputs {
        if self.state == CaptureState::Inactive {
            return CvOutputs::default();
        }
        match self.current_render_job() {
            Some(job) => CvOutputs::for_job(job, self.state == CaptureState::GatedRecord),
            None => CvOutputs::default(),
        }
    }

    fn current_render_job(&self) -> Option<&RenderJob> {
        let index = self.job_index?;
        self.session.as_ref()?.job(index)
    }

    fn total_jobs(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.len())
    }

    /// Hand a superseded session to the worker so it is freed off this thread.
    fn flush_retired(&mut self) {
        if let Some(session) = &self.retired {
            if self
                .commands
                .try_send(Command::Retire(Arc::clone(session)))
                .is_ok()
            {
                self.retired = None;
            }
        }
    }

    fn poll_start(&mut self, sample_rate: f32, go_edge: bool) {
        // A stop requested while idle must not cancel the next run.
        self.shared.stop.take();

        // Keep at most one retired session pending.
        if self.retired.is_some() {
            return;
        }

        if let Ok(session) = self.requests.try_recv() {
            self.start(session, sample_rate);
        } else if go_edge {
            match self.session.clone() {
                // A start queued by the handle wins over the trigger.
                Some(session) if self.shared.try_claim() => self.start(session, sample_rate),
                Some(_) => {}
                None => self.messages.warn(MessageBody::NothingToRestart),
            }
        }
    }

    fn start(&mut self, session: Arc<CaptureSession>, sample_rate: f32) {
        if let Some(previous) = self.session.replace(Arc::clone(&session)) {
            if !Arc::ptr_eq(&previous, &session) {
                self.retired = Some(previous);
            }
        }

        let settings = &session.settings;
        self.release_mode = settings.release_mode;
        self.gate_frames = settings.gate_frames(sample_rate);
        self.latency_frames = settings.latency_samples as u64;

        self.commands
            .send(Command::StartRender(Arc::clone(&session)));

        self.job_index = None;
        self.shared.current_job.set(None);
        self.shared.set_total_jobs(session.len());

        self.messages.info(MessageBody::RenderStarting {
            test_mode: session.test_mode,
        });
        self.messages.info(MessageBody::JobsGenerated {
            count: session.len(),
        });

        let mode = if session.test_mode {
            StatusLine::Testing
        } else {
            StatusLine::Recording
        };
        self.status.publish(StatusSlot::Mode, mode);
        self.status.publish(StatusSlot::Progress, StatusLine::Starting);
        self.shared.levels.clear();

        if session.is_empty() {
            self.finish();
        } else {
            self.state = CaptureState::NewNote;
        }
    }

    fn new_note(&mut self, sample_rate: f32, stereo: bool) {
        let index = self.job_index.map_or(0, |i| i + 1);
        self.job_index = Some(index);
        self.shared.current_job.set(Some(index));

        let total = self.total_jobs();
        let note = self.current_render_job().map_or(0, |job| job.midi_note);
        self.status.publish(
            StatusSlot::Progress,
            StatusLine::Progress {
                index: index + 1,
                total,
                note,
            },
        );

        self.counter = 0;
        self.sustain_frames = 0;
        self.latency_left = self.latency_frames;
        self.silence.reset();
        self.blocks.discard();

        self.commands.send(Command::BeginNote {
            job: index,
            sample_rate: sample_rate.round() as u32,
            channels: if stereo { 2 } else { 1 },
        });
        self.state = CaptureState::GatedRecord;
    }

    fn gated_record(&mut self, left: f32, right: Option<f32>) {
        self.counter += 1;
        if self.latency_elapsed() {
            self.capture(left, right.unwrap_or(0.0));
            self.sustain_frames += 1;
        }

        if self.counter > self.gate_frames {
            self.flush_block();
            self.counter = 0;
            self.silence.reset();
            self.state = if self.release_mode.records_release() {
                CaptureState::ReleaseRecord
            } else {
                CaptureState::GateReleaseFade
            };
        }
    }

    fn release_record(&mut self, left: f32, right: Option<f32>) {
        let right = right.unwrap_or(0.0);
        // Latency left over from a short gate still delays capture, but
        // silence is watched from the first release frame.
        if self.latency_elapsed() {
            self.capture(left, right);
        }

        if self.silence.push(left, right) == Some(true) {
            self.flush_block();
            self.close_file();
            self.shared.levels.clear();
        }
    }

    fn gate_release_fade(&mut self, left: f32, right: Option<f32>) {
        let fade = 1.0 - self.counter as f32 / GATE_FADE_FRAMES as f32;
        self.commands.send(Command::PushSingleSample {
            left: left * fade,
            right: right.unwrap_or(0.0) * fade,
        });

        if self.counter >= GATE_FADE_FRAMES {
            self.close_file();
        } else {
            self.counter += 1;
        }
    }

    fn spindown(&mut self) {
        self.counter += 1;
        let limit = if self.release_mode.records_release() {
            SPINDOWN_FRAMES
        } else {
            SPINDOWN_FRAMES * GATE_ONLY_SPINDOWN_FACTOR
        };
        if self.counter < limit {
            return;
        }

        let next = self.job_index.map_or(0, |i| i + 1);
        if next < self.total_jobs() {
            self.state = CaptureState::NewNote;
        } else {
            self.finish();
        }
    }

    fn close_file(&mut self) {
        if let Some(job) = self.job_index {
            self.commands.send(Command::CloseFile {
                job,
                sustain_frames: self.sustain_frames,
            });
        }
        self.counter = 0;
        self.state = CaptureState::SpindownBuffer;
    }

    fn finish(&mut self) {
        self.commands.send(Command::EndRender);
        self.status.publish_idle();
        self.job_index = None;
        self.shared.current_job.set(None);
        self.shared.release_claim();
        self.state = CaptureState::Inactive;
    }

    fn stop(&mut self) {
        self.commands.send(Command::Abort);
        self.messages.info(MessageBody::Stopping);
        self.status.publish_idle();
        self.blocks.discard();
        self.job_index = None;
        self.shared.current_job.set(None);
        self.shared.release_claim();
        self.state = CaptureState::Inactive;
    }

    /// Count down the latency delay; true once it has elapsed.
    #[inline]
    fn latency_elapsed(&mut self) -> bool {
        if self.latency_left == 0 {
            return true;
        }
        self.latency_left -= 1;
        false
    }

    #[inline]
    fn capture(&mut self, left: f32, right: f32) {
        if let Some((block, frames)) = self.blocks.push(left, right) {
            self.commands.send(Command::PushAudioBlock { block, frames });
        }
    }

    #[inline]
    fn flush_block(&mut self) {
        if let Some((block, frames)) = self.blocks.flush() {
            self.commands.send(Command::PushAudioBlock { block, frames });
        }
    }
}
