//! Incremental RIFF WAV writer for 32-bit float samples.
//!
//! Unlike a one-shot encoder, the writer streams samples as they arrive and
//! only learns the final sizes on [`RiffWavWriter::finish`], where it seeks
//! back and patches the RIFF and data chunk lengths. Files carry an `inst`
//! chunk describing the key/velocity zone and, for looped captures, a
//! trailing `smpl` chunk.

use crate::error::{ExportError, Result};
use autosample_core::RenderJob;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const BYTES_PER_SAMPLE: u16 = 4;
const INST_CHUNK_LEN: u32 = 8;
const SMPL_HEADER_LEN: u32 = 36;
const SMPL_LOOP_LEN: u32 = 24;

/// Key and velocity zone stored in the `inst` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentZone {
    pub root: u8,
    pub low_key: u8,
    pub high_key: u8,
    pub low_vel: u8,
    pub high_vel: u8,
}

impl From<&RenderJob> for InstrumentZone {
    fn from(job: &RenderJob) -> Self {
        Self {
            root: job.midi_note,
            low_key: job.note_from,
            high_key: job.note_to,
            low_vel: job.vel_from,
            high_vel: job.vel_to,
        }
    }
}

/// Sustain loop in frames, inclusive of `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPoints {
    pub start: u32,
    pub end: u32,
    pub crossfade: u32,
}

impl LoopPoints {
    /// Loop over the second half of the sustained portion.
    ///
    /// Returns `None` when the sustain is too short to hold a loop.
    pub fn sustain_loop(sustain_frames: u64, crossfade_fraction: f32) -> Option<Self> {
        if sustain_frames < 2 {
            return None;
        }
        let sustain = u32::try_from(sustain_frames).ok()?;
        let start = sustain - sustain / 2;
        let end = sustain - 1;
        let length = end - start + 1;
        let crossfade = (length as f32 * crossfade_fraction.clamp(0.0, 1.0)).round() as u32;

        Some(Self {
            start,
            end,
            crossfade: crossfade.min(start),
        })
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// What a finished file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WavSummary {
    pub frames: u64,
    pub data_bytes: u64,
}

/// Streaming float WAV writer.
pub struct RiffWavWriter<W: Write + Seek = BufWriter<File>> {
    out: Option<W>,
    path: Option<PathBuf>,
    channels: u16,
    sample_rate: u32,
    root_key: u8,
    bytes_written: u64,
    riff_size_pos: Option<u64>,
    data_size_pos: Option<u64>,
    data_bytes: u64,
    finished: bool,
}

impl RiffWavWriter<BufWriter<File>> {
    /// Create (truncate) a file at `path`.
    pub fn create(path: impl AsRef<Path>, channels: u16) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = Self::new(BufWriter::new(file), channels);
        writer.path = Some(path.to_path_buf());
        Ok(writer)
    }
}

impl<W: Write + Seek> RiffWavWriter<W> {
    /// Wrap any seekable sink. Channel count is clamped to mono or stereo.
    pub fn new(out: W, channels: u16) -> Self {
        Self {
            out: Some(out),
            path: None,
            channels: channels.clamp(1, 2),
            sample_rate: 0,
            root_key: 60,
            bytes_written: 0,
            riff_size_pos: None,
            data_size_pos: None,
            data_bytes: 0,
            finished: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_open(&self) -> bool {
        self.out.is_some() && !self.finished
    }

    /// Frames written to the data chunk so far.
    pub fn frames(&self) -> u64 {
        self.data_bytes / self.frame_bytes()
    }

    fn frame_bytes(&self) -> u64 {
        (self.channels * BYTES_PER_SAMPLE) as u64
    }

    /// `RIFF` + `WAVE` + `fmt ` chunk.
    pub fn write_header(&mut self, sample_rate: u32) -> Result<()> {
        if self.riff_size_pos.is_some() {
            return Err(ExportError::InvalidState("header already written"));
        }
        self.sample_rate = sample_rate;

        self.push_tag(b"RIFF")?;
        self.riff_size_pos = Some(self.bytes_written);
        self.push_u32(0)?;
        self.push_tag(b"WAVE")?;

        let block_align = self.channels * BYTES_PER_SAMPLE;
        self.push_tag(b"fmt ")?;
        self.push_u32(16)?;
        self.push_u16(WAVE_FORMAT_IEEE_FLOAT)?;
        self.push_u16(self.channels)?;
        self.push_u32(sample_rate)?;
        self.push_u32(sample_rate * block_align as u32)?;
        self.push_u16(block_align)?;
        self.push_u16(BYTES_PER_SAMPLE * 8)
    }

    /// `inst` chunk: root, fine tune 0, gain 127, key range, velocity range.
    pub fn write_inst_chunk(&mut self, zone: InstrumentZone) -> Result<()> {
        if self.riff_size_pos.is_none() || self.data_size_pos.is_some() {
            return Err(ExportError::InvalidState("inst chunk must precede data"));
        }
        self.root_key = zone.root;

        self.push_tag(b"inst")?;
        self.push_u32(INST_CHUNK_LEN)?;
        self.push_bytes(&[
            zone.root,
            0,
            127,
            zone.low_key,
            zone.high_key,
            zone.low_vel,
            zone.high_vel,
            0,
        ])
    }

    /// Open the data chunk with a placeholder length.
    pub fn start_data(&mut self) -> Result<()> {
        if self.riff_size_pos.is_none() {
            return Err(ExportError::InvalidState("data before header"));
        }
        if self.data_size_pos.is_some() {
            return Err(ExportError::InvalidState("data chunk already started"));
        }
        self.push_tag(b"data")?;
        self.data_size_pos = Some(self.bytes_written);
        self.push_u32(0)
    }

    /// Append interleaved samples (`channels` values per frame).
    pub fn push_interleaved(&mut self, samples: &[f32]) -> Result<()> {
        self.check_data()?;
        let bytes = samples.len() as u64 * BYTES_PER_SAMPLE as u64;
        if self.bytes_written + bytes > u32::MAX as u64 {
            return Err(ExportError::TooLarge(self.bytes_written + bytes));
        }
        for sample in samples {
            self.push_bytes(&sample.to_le_bytes())?;
        }
        self.data_bytes += bytes;
        Ok(())
    }

    /// Append one frame; `right` is ignored for mono files.
    pub fn push_frame(&mut self, left: f32, right: f32) -> Result<()> {
        if self.channels == 2 {
            self.push_interleaved(&[left, right])
        } else {
            self.push_interleaved(&[left])
        }
    }

    /// Finalize the file and patch chunk sizes.
    pub fn finish(&mut self, loop_points: Option<LoopPoints>) -> Result<WavSummary> {
        let summary = self.finalize(loop_points)?;
        self.out = None;
        Ok(summary)
    }

    /// Finish and hand back the sink.
    pub fn into_inner(mut self, loop_points: Option<LoopPoints>) -> Result<(W, WavSummary)> {
        let summary = self.finalize(loop_points)?;
        let out = self
            .out
            .take()
            .ok_or(ExportError::InvalidState("writer already finished"))?;
        Ok((out, summary))
    }

    fn finalize(&mut self, loop_points: Option<LoopPoints>) -> Result<WavSummary> {
        self.check_data()?;
        if let Some(points) = loop_points {
            self.write_smpl_chunk(points)?;
        }

        let riff_len = self.bytes_written - 8;
        let data_len = self.data_bytes;
        let riff_pos = self.riff_size_pos.unwrap_or(4);
        let data_pos = self.data_size_pos.unwrap_or(0);

        let out = self.sink()?;
        out.seek(SeekFrom::Start(riff_pos))?;
        out.write_all(&(riff_len as u32).to_le_bytes())?;
        out.seek(SeekFrom::Start(data_pos))?;
        out.write_all(&(data_len as u32).to_le_bytes())?;
        out.seek(SeekFrom::End(0))?;
        out.flush()?;

        self.finished = true;
        Ok(WavSummary {
            frames: data_len / self.frame_bytes(),
            data_bytes: data_len,
        })
    }

    fn write_smpl_chunk(&mut self, points: LoopPoints) -> Result<()> {
        let sample_period = if self.sample_rate > 0 {
            1_000_000_000 / self.sample_rate
        } else {
            0
        };
        let root_key = self.root_key as u32;

        self.push_tag(b"smpl")?;
        self.push_u32(SMPL_HEADER_LEN + SMPL_LOOP_LEN)?;
        for value in [0, 0, sample_period, root_key, 0, 0, 0, 1, 0] {
            self.push_u32(value)?;
        }
        // cue id, forward loop, start, end, fraction, infinite play count
        for value in [0, 0, points.start, points.end, 0, 0] {
            self.push_u32(value)?;
        }
        Ok(())
    }

    fn check_data(&self) -> Result<()> {
        if self.out.is_none() || self.finished {
            return Err(ExportError::InvalidState("writer already finished"));
        }
        if self.data_size_pos.is_none() {
            return Err(ExportError::InvalidState("data chunk not started"));
        }
        Ok(())
    }

    fn sink(&mut self) -> Result<&mut W> {
        self.out
            .as_mut()
            .ok_or(ExportError::InvalidState("writer already finished"))
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink()?.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn push_tag(&mut self, tag: &[u8; 4]) -> Result<()> {
        self.push_bytes(tag)
    }

    fn push_u32(&mut self, value: u32) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }

    fn push_u16(&mut self, value: u16) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }
}

impl<W: Write + Seek> Drop for RiffWavWriter<W> {
    fn drop(&mut self) {
        if self.out.is_some() && !self.finished && self.data_size_pos.is_some() {
            if let Err(e) = self.finalize(None) {
                tracing::warn!("Failed to finalize WAV file on drop: {}", e);
            }
        }
    }
}
