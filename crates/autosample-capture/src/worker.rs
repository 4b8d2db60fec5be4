//! Render worker thread: every blocking file operation of a capture run.
//!
//! The worker drains the command ring, then sleeps for the poll interval.
//! Failures are logged and never reach the audio thread; the run simply
//! continues without the file that failed.

use crate::blocks::BlockRing;
use crate::command::{Command, CommandReceiver};
use crate::error::{Error, Result};
use crate::metrics::WorkerMetrics;
use crate::session::CaptureSession;
use crate::shared::CaptureShared;
use autosample_core::{note_name, MessageBody, MessageProducer};
use autosample_export::{
    open_container, Archiver, ContainerWriter, InstrumentZone, LoopPoints, OutputFormat,
    OutputLayout, RiffWavWriter, SampleEntry,
};
use std::fmt::Display;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thread_priority::ThreadPriority;

/// Default sleep between command drains.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct OpenFile {
    writer: RiffWavWriter,
    job: usize,
    file_name: String,
}

/// Everything the worker owns between commands.
pub(crate) struct WorkerState {
    blocks: Arc<BlockRing>,
    shared: Arc<CaptureShared>,
    messages: MessageProducer,
    archiver: Arc<dyn Archiver>,
    metrics: Arc<WorkerMetrics>,
    session: Option<Arc<CaptureSession>>,
    container: Option<Box<dyn ContainerWriter>>,
    file: Option<OpenFile>,
    channels: u16,
    unopened_reported: bool,
    scratch: Vec<f32>,
    seen_dropped: u64,
}

impl WorkerState {
    pub fn new(
        blocks: Arc<BlockRing>,
        shared: Arc<CaptureShared>,
        messages: MessageProducer,
        archiver: Arc<dyn Archiver>,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        let scratch = Vec::with_capacity(blocks.block_frames() * 2);
        Self {
            blocks,
            shared,
            messages,
            archiver,
            metrics,
            session: None,
            container: None,
            file: None,
            channels: 2,
            unopened_reported: false,
            scratch,
            seen_dropped: 0,
        }
    }

    /// Handle every queued command. Returns how many were handled.
    pub fn drain(&mut self, rx: &mut CommandReceiver) -> usize {
        let mut handled = 0;
        while let Some(command) = rx.try_recv() {
            self.handle(command);
            handled += 1;
        }
        self.check_overflow(rx.dropped());
        handled
    }

    pub fn handle(&mut self, command: Command) {
        self.metrics.record_command();
        match command {
            Command::StartRender(session) => self.start_render(session),
            Command::EndRender => self.end_render(),
            Command::BeginNote {
                job,
                sample_rate,
                channels,
            } => self.begin_note(job, sample_rate, channels),
            Command::CloseFile {
                job,
                sustain_frames,
            } => self.close_file(job, sustain_frames),
            Command::PushAudioBlock { block, frames } => self.push_block(block, frames),
            Command::PushSingleSample { left, right } => self.push_sample(left, right),
            Command::Abort => self.abort(),
            Command::Retire(session) => drop(session),
        }
    }

    /// Warn once per growth of the dropped-command counter.
    pub fn check_overflow(&mut self, dropped: u64) {
        if dropped > self.seen_dropped {
            let lost = dropped - self.seen_dropped;
            self.seen_dropped = dropped;
            tracing::warn!("Command queue overflow: {} commands dropped", lost);
            self.messages.warn(MessageBody::Text(format!(
                "Command queue overflow: {} commands dropped ({} total)",
                lost, dropped
            )));
        }
    }

    /// Called once the thread is asked to stop and the ring is drained.
    pub fn shutdown(&mut self) {
        if self.session.is_some() || self.file.is_some() {
            tracing::warn!("Render worker stopped during a render");
            self.abort();
        }
    }

    fn info(&mut self, text: String) {
        tracing::info!("{}", text);
        self.messages.text(text);
    }

    fn report_error(&mut self, context: &str, err: impl Display) {
        tracing::error!("{}: {}", context, err);
        self.metrics.record_error();
        self.messages.error_text(format!("{}: {}", context, err));
    }

    fn test_mode(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.test_mode)
    }

    fn start_render(&mut self, session: Arc<CaptureSession>) {
        if self.session.is_some() || self.file.is_some() {
            tracing::warn!("New render started before the previous one ended");
            self.discard_open_file();
            self.container = None;
        }

        let layout = &session.layout;
        self.info(format!(
            "Rendering {} samples into {}",
            session.len(),
            layout.root().display()
        ));

        if session.test_mode {
            self.info("Test mode: no files will be written".to_string());
        } else if let Err(e) = layout.create_dirs() {
            let context = format!("Failed to create {}", layout.sample_dir().display());
            self.report_error(&context, e);
        } else if layout.format() == OutputFormat::WavOnly {
            self.info("Wav files only - no multi-sample format created".to_string());
        } else {
            match open_container(layout, session.round_robins()) {
                Ok(container) => {
                    self.info(format!("MultiFile format: {}", layout.format()));
                    if let Some(name) = container.path().and_then(Path::file_name) {
                        self.info(format!("   - '{}'", name.to_string_lossy()));
                    }
                    self.container = Some(container);
                }
                Err(e) => self.report_error("Failed to open output MultiFile", e),
            }
        }

        self.session = Some(session);
    }

    fn begin_note(&mut self, index: usize, sample_rate: u32, channels: u16) {
        let Some(session) = self.session.clone() else {
            tracing::warn!("BeginNote {} without an active render", index);
            return;
        };
        let Some(job) = session.job(index).copied() else {
            self.report_error("Invalid job index", index);
            return;
        };

        if self.file.is_some() {
            tracing::warn!("Previous note was not closed; discarding its manifest entry");
            self.discard_open_file();
        }
        self.channels = channels.clamp(1, 2);
        self.unopened_reported = false;

        self.info(format!(
            "Starting note {} vel={} rr={}",
            note_name(job.midi_note),
            job.velocity,
            job.round_robin_index
        ));

        if session.test_mode {
            return;
        }

        let path = session.layout.sample_path(&job);
        let opened = RiffWavWriter::create(&path, self.channels).and_then(|mut writer| {
            writer.write_header(sample_rate)?;
            writer.write_inst_chunk(InstrumentZone::from(&job))?;
            writer.start_data()?;
            Ok(writer)
        });

        match opened {
            Ok(writer) => {
                self.file = Some(OpenFile {
                    writer,
                    job: index,
                    file_name: job.file_name(),
                });
            }
            Err(e) => {
                let context = format!("Failed to open {}", path.display());
                self.report_error(&context, e);
            }
        }
    }

    fn push_block(&mut self, block: usize, frames: usize) {
        if self.session.is_none() {
            return;
        }

        self.scratch.clear();
        self.blocks
            .read_into(block, frames, self.channels, &mut self.scratch);
        self.shared
            .levels
            .update_interleaved(&self.scratch, self.channels);

        let scratch = &self.scratch;
        let written = self
            .file
            .as_mut()
            .map(|open| open.writer.push_interleaved(scratch));
        self.after_write(written);
    }

    fn push_sample(&mut self, left: f32, right: f32) {
        if self.session.is_none() {
            return;
        }
        self.shared.levels.update(left, right);

        let written = self
            .file
            .as_mut()
            .map(|open| open.writer.push_frame(left, right));
        self.after_write(written);
    }

    fn after_write(&mut self, written: Option<autosample_export::Result<()>>) {
        match written {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                self.report_error("Failed to write samples", e);
                self.discard_open_file();
                self.unopened_reported = true;
            }
            None if !self.test_mode() && !self.unopened_reported => {
                self.unopened_reported = true;
                self.report_error("Attempted to write to unopened file", "no WAV file open");
            }
            None => {}
        }
    }

    fn close_file(&mut self, index: usize, sustain_frames: u64) {
        let Some(open) = self.file.take() else {
            return;
        };
        if open.job != index {
            tracing::warn!("CloseFile for job {} but job {} is open", index, open.job);
        }

        let session = self.session.clone();
        let loop_points = session
            .as_ref()
            .and_then(|s| s.settings.release_mode.loop_crossfade())
            .and_then(|fraction| LoopPoints::sustain_loop(sustain_frames, fraction));

        let OpenFile {
            mut writer,
            job,
            file_name,
        } = open;

        let summary = match writer.finish(loop_points) {
            Ok(summary) => summary,
            Err(e) => {
                self.report_error(&format!("Failed to finalize {}", file_name), e);
                return;
            }
        };
        self.metrics.record_file(summary.data_bytes);
        tracing::debug!("Wrote {} ({} frames)", file_name, summary.frames);

        let (Some(session), Some(container)) = (session.as_ref(), self.container.as_mut()) else {
            return;
        };
        let Some(job) = session.job(job) else {
            return;
        };
        let appended = container.append(&SampleEntry {
            job,
            file_name: &file_name,
            frames: summary.frames,
            loop_points,
        });
        if let Err(e) = appended {
            self.report_error("Failed to append to MultiFile", e);
        }
    }

    fn end_render(&mut self) {
        self.info("END RENDER".to_string());
        if self.file.is_some() {
            tracing::warn!("Render ended with a note still open");
            self.discard_open_file();
        }

        let session = self.session.take();
        let Some(mut container) = self.container.take() else {
            return;
        };

        let format = container.format();
        if let Err(e) = container.finish() {
            self.report_error("Failed to finalize MultiFile", e);
            return;
        }
        self.info(format!("Closing {} file", format));

        if format == OutputFormat::MultiSample {
            if let Some(session) = session {
                self.archive(&session.layout);
            }
        }
    }

    fn archive(&mut self, layout: &OutputLayout) {
        let Some(dest) = layout.archive_path() else {
            return;
        };
        let source = layout.sample_dir();
        self.info(format!("Creating zip : {}", dest.display()));

        match self.archiver.archive_dir(&source, &dest) {
            Ok(()) => {
                if let Err(e) = std::fs::remove_dir_all(&source) {
                    let context = format!("Failed to remove {}", source.display());
                    self.report_error(&context, e);
                }
            }
            Err(e) => {
                let context = format!(
                    "Failed to create {}; samples kept in {}",
                    dest.display(),
                    source.display()
                );
                self.report_error(&context, e);
            }
        }
    }

    fn abort(&mut self) {
        self.discard_open_file();
        let unfinalized = self.container.take().is_some();
        self.session = None;

        if unfinalized {
            self.info("Render aborted; MultiFile left unfinalized".to_string());
        } else {
            self.info("Render aborted".to_string());
        }
    }

    /// Close the open WAV, if any, without a manifest entry.
    fn discard_open_file(&mut self) {
        if let Some(mut open) = self.file.take() {
            match open.writer.finish(None) {
                Ok(summary) => self.metrics.record_file(summary.data_bytes),
                Err(e) => {
                    let context = format!("Failed to close {}", open.file_name);
                    self.report_error(&context, e);
                }
            }
        }
    }
}

/// Handle to the running worker thread; joins it on drop.
pub struct RenderWorker {
    thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl RenderWorker {
    pub(crate) fn spawn(
        rx: CommandReceiver,
        state: WorkerState,
        poll_interval: Duration,
    ) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let thread = thread::Builder::new()
            .name("autosample-render".into())
            .spawn(move || {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                worker_loop(rx, state, flag, poll_interval);
            })
            .map_err(|e| Error::Worker(format!("failed to spawn render thread: {}", e)))?;

        Ok(Self {
            thread: Some(thread),
            shutdown,
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Drain outstanding commands and join the thread.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Render worker panicked");
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    mut rx: CommandReceiver,
    mut state: WorkerState,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    tracing::debug!("Render worker started");
    loop {
        let stopping = shutdown.load(Ordering::SeqCst);
        state.drain(&mut rx);
        if stopping {
            break;
        }
        thread::sleep(poll_interval);
    }
    state.shutdown();
    tracing::debug!("Render worker stopped");
}
