use super::{ContainerWriter, SampleEntry};
use crate::error::Result;
use crate::layout::OutputFormat;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// SFZ manifest: one `<group>` of `<region>` lines.
pub struct SfzWriter<W: Write = BufWriter<File>> {
    out: W,
    path: Option<PathBuf>,
    finished: bool,
}

impl SfzWriter<BufWriter<File>> {
    pub fn create(path: impl Into<PathBuf>, round_robins: u32) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        let mut writer = Self::new(BufWriter::new(file), round_robins)?;
        writer.path = Some(path);
        Ok(writer)
    }
}

impl<W: Write> SfzWriter<W> {
    pub fn new(mut out: W, round_robins: u32) -> Result<Self> {
        writeln!(out, "// Basic SFZ file from autosample\n")?;
        writeln!(out, "<global>")?;
        write!(out, "<group>")?;
        if round_robins > 1 {
            write!(out, " seq_length={}", round_robins)?;
        }
        writeln!(out)?;
        out.flush()?;

        Ok(Self {
            out,
            path: None,
            finished: false,
        })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ContainerWriter for SfzWriter<W> {
    fn format(&self) -> OutputFormat {
        OutputFormat::Sfz
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn append(&mut self, entry: &SampleEntry<'_>) -> Result<()> {
        let job = entry.job;
        let out = &mut self.out;

        write!(out, "<region>")?;
        if job.is_round_robin() {
            write!(out, " seq_position={}", job.sequence_position())?;
        }
        write!(
            out,
            " sample={}{} lokey={} hikey={} pitch_keycenter={} lovel={} hivel={}",
            OutputFormat::Sfz.manifest_prefix(),
            entry.file_name,
            job.note_from,
            job.note_to,
            job.midi_note,
            job.vel_from,
            job.vel_to
        )?;
        if let Some(points) = entry.loop_points {
            write!(
                out,
                " loop_mode=loop_sustain loop_start={} loop_end={}",
                points.start, points.end
            )?;
        }
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.finished {
            self.out.flush()?;
            self.finished = true;
        }
        Ok(())
    }
}
