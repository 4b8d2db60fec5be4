use super::{ContainerWriter, SampleEntry};
use crate::error::Result;
use crate::layout::OutputFormat;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// DecentSampler `.dspreset`: all samples in a single group.
pub struct DecentSamplerWriter<W: Write = BufWriter<File>> {
    out: W,
    path: Option<PathBuf>,
    finished: bool,
}

impl DecentSamplerWriter<BufWriter<File>> {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        let mut writer = Self::new(BufWriter::new(file))?;
        writer.path = Some(path);
        Ok(writer)
    }
}

impl<W: Write> DecentSamplerWriter<W> {
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, r#"<DecentSampler minVersion="1.0.0">"#)?;
        writeln!(out, "  <groups>")?;
        writeln!(out, "    <group>")?;
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

impl<W: Write + Send> ContainerWriter for DecentSamplerWriter<W> {
    fn format(&self) -> OutputFormat {
        OutputFormat::DecentSampler
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn append(&mut self, entry: &SampleEntry<'_>) -> Result<()> {
        let job = entry.job;
        let out = &mut self.out;

        write!(
            out,
            r#"      <sample path="{}{}" loNote="{}" hiNote="{}" rootNote="{}" loVel="{}" hiVel="{}""#,
            OutputFormat::DecentSampler.manifest_prefix(),
            super::xml_escape(entry.file_name),
            job.note_from,
            job.note_to,
            job.midi_note,
            job.vel_from,
            job.vel_to
        )?;
        if job.is_round_robin() {
            write!(
                out,
                r#" seqMode="round_robin" seqLength="{}" seqPosition="{}""#,
                job.round_robin_out_of,
                job.sequence_position()
            )?;
        }
        if let Some(points) = entry.loop_points {
            write!(
                out,
                r#" loopEnabled="true" loopStart="{}" loopEnd="{}" loopCrossfade="{}""#,
                points.start, points.end, points.crossfade
            )?;
        }
        writeln!(out, "/>")?;
        out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.finished {
            writeln!(self.out, "    </group>")?;
            writeln!(self.out, "  </groups>")?;
            writeln!(self.out, "</DecentSampler>")?;
            self.out.flush()?;
            self.finished = true;
        }
        Ok(())
    }
}
