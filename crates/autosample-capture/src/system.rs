//! Capture system: wires the audio-thread controller, render worker and
//! control handle together.

use crate::blocks::{BlockRing, BlockWriter};
use crate::command::command_channel;
use crate::controller::CaptureController;
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, WorkerMetrics};
use crate::session::CaptureSession;
use crate::settings::CaptureSettings;
use crate::shared::{CaptureShared, CaptureState};
use crate::worker::{RenderWorker, WorkerState, DEFAULT_POLL_INTERVAL};
use arc_swap::ArcSwap;
use autosample_core::{
    status_channel, Message, MessageLog, RenderJob, SilenceDetector, StatusLine, StatusReader,
    StatusSlot, BLOCK_COUNT, BLOCK_FRAMES, COMMAND_CAPACITY, MESSAGE_CAPACITY, SILENCE_THRESHOLD,
    SILENCE_WINDOW, STATUS_CAPACITY,
};
use autosample_export::Archiver;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Capture system with its render worker thread.
///
/// Derefs to [`CaptureHandle`]; clone the handle to control the capture from
/// other threads. Dropping the system joins the worker.
pub struct CaptureSystem {
    handle: CaptureHandle,
    worker: RenderWorker,
}

impl CaptureSystem {
    /// Create a capture system builder.
    pub fn builder() -> CaptureSystemBuilder {
        CaptureSystemBuilder::default()
    }

    /// Cloneable control handle.
    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Drain queued commands and join the render worker.
    ///
    /// Any render still open is aborted. The controller keeps running but its
    /// commands go nowhere.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
    }
}

impl Deref for CaptureSystem {
    type Target = CaptureHandle;

    fn deref(&self) -> &CaptureHandle {
        &self.handle
    }
}

/// Builder for [`CaptureSystem`].
pub struct CaptureSystemBuilder {
    settings: CaptureSettings,
    command_capacity: usize,
    block_count: usize,
    message_capacity: usize,
    status_capacity: usize,
    silence_window: usize,
    poll_interval: Duration,
    archiver: Option<Arc<dyn Archiver>>,
}

impl Default for CaptureSystemBuilder {
    fn default() -> Self {
        Self {
            settings: CaptureSettings::default(),
            command_capacity: COMMAND_CAPACITY,
            block_count: BLOCK_COUNT,
            message_capacity: MESSAGE_CAPACITY,
            status_capacity: STATUS_CAPACITY,
            silence_window: SILENCE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            archiver: None,
        }
    }
}

impl CaptureSystemBuilder {
    /// Initial capture settings.
    pub fn settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Capacity of the audio-thread to worker command ring (default: 65536).
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity.max(1);
        self
    }

    /// Number of audio blocks in the shared arena (default: 8192).
    pub fn block_count(mut self, count: usize) -> Self {
        self.block_count = count.max(1);
        self
    }

    /// Capacity of each message ring (default: 1024).
    pub fn message_capacity(mut self, capacity: usize) -> Self {
        self.message_capacity = capacity.max(1);
        self
    }

    /// Capacity of each status history ring (default: 32).
    pub fn status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity.max(1);
        self
    }

    /// Frames of silence that end a release recording (default: 4096).
    pub fn silence_window(mut self, frames: usize) -> Self {
        self.silence_window = frames.max(1);
        self
    }

    /// How long the worker sleeps when its queue is empty (default: 20 ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Archiver used for MultiSample output. Defaults to zip when the
    /// `archive` feature is enabled.
    pub fn archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    /// Build the system (starts the render worker).
    ///
    /// The returned [`CaptureController`] belongs to the audio callback.
    pub fn build(self) -> Result<(CaptureSystem, CaptureController)> {
        let shared = Arc::new(CaptureShared::new());
        let (commands, command_rx) = command_channel(self.command_capacity);
        let dropped_commands = command_rx.dropped_counter();
        let ring = Arc::new(BlockRing::new(self.block_count, BLOCK_FRAMES));

        let mut log = MessageLog::new();
        let audio_messages = log.producer(self.message_capacity);
        let worker_messages = log.producer(self.message_capacity);
        let (status_writer, status_reader) = status_channel(self.status_capacity);

        let (requests, request_rx) = crossbeam_channel::bounded(1);
        let metrics = Arc::new(WorkerMetrics::new());
        let archiver = self
            .archiver
            .unwrap_or_else(autosample_export::default_archiver);

        let state = WorkerState::new(
            Arc::clone(&ring),
            Arc::clone(&shared),
            worker_messages,
            archiver,
            Arc::clone(&metrics),
        );
        let worker = RenderWorker::spawn(command_rx, state, self.poll_interval)?;

        let controller = CaptureController::new(
            Arc::clone(&shared),
            request_rx.clone(),
            commands,
            BlockWriter::new(ring),
            audio_messages,
            status_writer,
            SilenceDetector::new(self.silence_window, SILENCE_THRESHOLD),
        );

        let handle = CaptureHandle {
            inner: Arc::new(HandleInner {
                settings: ArcSwap::from_pointee(self.settings),
                requests,
                pending: request_rx,
                shared,
                log: Mutex::new(log),
                status: Mutex::new(status_reader),
                dropped_commands,
                metrics,
            }),
        };

        tracing::debug!("Capture system ready");
        Ok((CaptureSystem { handle, worker }, controller))
    }
}

struct HandleInner {
    settings: ArcSwap<CaptureSettings>,
    requests: Sender<Arc<CaptureSession>>,
    pending: Receiver<Arc<CaptureSession>>,
    shared: Arc<CaptureShared>,
    log: Mutex<MessageLog>,
    status: Mutex<StatusReader>,
    dropped_commands: Arc<AtomicU64>,
    metrics: Arc<WorkerMetrics>,
}

/// Control surface for a running [`CaptureSystem`].
///
/// Cheap to clone; every method is safe to call from any non-audio thread.
#[derive(Clone)]
pub struct CaptureHandle {
    inner: Arc<HandleInner>,
}

impl CaptureHandle {
    /// Start recording with the current settings.
    ///
    /// Returns the planned session. Fails with [`Error::Busy`] while a
    /// capture runs or a start is still queued.
    pub fn start_record(&self) -> Result<Arc<CaptureSession>> {
        self.start(false)
    }

    /// Run the full CV sequence without writing any file.
    pub fn start_test(&self) -> Result<Arc<CaptureSession>> {
        self.start(true)
    }

    fn start(&self, test_mode: bool) -> Result<Arc<CaptureSession>> {
        let inner = &self.inner;
        if !inner.shared.try_claim() {
            return Err(Error::Busy("capture already running or queued"));
        }

        let settings = inner.settings.load_full();
        let session = Arc::new(CaptureSession::plan(&settings, test_mode));

        match inner.requests.try_send(Arc::clone(&session)) {
            Ok(()) => Ok(session),
            Err(TrySendError::Full(_)) => {
                inner.shared.release_claim();
                Err(Error::Busy("start already queued"))
            }
            Err(TrySendError::Disconnected(_)) => {
                inner.shared.release_claim();
                Err(Error::Worker("capture controller dropped".into()))
            }
        }
    }

    /// Abort the current capture and cancel a queued start.
    ///
    /// The open WAV is closed, the container is left unfinalized.
    pub fn stop_immediately(&self) -> &Self {
        if self.inner.pending.try_recv().is_ok() {
            self.inner.shared.release_claim();
        }
        self.inner.shared.stop.set(true);
        self
    }

    /// Set the output directory used by the next capture.
    pub fn set_output_dir(&self, path: impl Into<PathBuf>) -> &Self {
        let path = path.into();
        self.update_settings(|settings| settings.output_dir = Some(path.clone()));
        self
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<CaptureSettings> {
        self.inner.settings.load_full()
    }

    /// Modify settings. Running captures keep the settings they started with.
    pub fn update_settings<F>(&self, mut f: F) -> &Self
    where
        F: FnMut(&mut CaptureSettings),
    {
        self.inner.settings.rcu(|current| {
            let mut next = CaptureSettings::clone(current);
            f(&mut next);
            next
        });
        self
    }

    /// Jobs the current settings would produce.
    pub fn plan_preview(&self) -> Vec<RenderJob> {
        CaptureSession::plan(&self.settings(), false).jobs
    }

    /// Drain pending log messages in timestamp order.
    pub fn poll_messages(&self) -> Vec<Message> {
        self.inner.log.lock().drain()
    }

    /// Messages lost to full log rings.
    pub fn dropped_messages(&self) -> u64 {
        self.inner.log.lock().dropped()
    }

    /// Latest line published to a status slot.
    pub fn status(&self, slot: StatusSlot) -> StatusLine {
        self.inner.status.lock().latest(slot)
    }

    /// Status lines published since the last call, oldest first.
    pub fn status_history(&self, slot: StatusSlot) -> Vec<StatusLine> {
        self.inner.status.lock().history(slot)
    }

    /// Status history lines lost because nobody polled.
    pub fn dropped_status_lines(&self) -> u64 {
        self.inner.status.lock().dropped()
    }

    /// Peak-hold input levels (left, right).
    pub fn levels(&self) -> (f32, f32) {
        self.inner.shared.levels.levels()
    }

    /// Index of the job being captured.
    pub fn current_job(&self) -> Option<usize> {
        self.inner.shared.current_job.get()
    }

    /// Job count of the current or last session.
    pub fn total_jobs(&self) -> usize {
        self.inner.shared.total_jobs()
    }

    pub fn state(&self) -> CaptureState {
        self.inner.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Commands dropped because the command ring was full.
    pub fn dropped_commands(&self) -> u64 {
        self.inner.dropped_commands.load(Ordering::Relaxed)
    }

    /// Render worker counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}
