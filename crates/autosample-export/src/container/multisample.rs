use super::{xml_escape, ContainerWriter, SampleEntry};
use crate::error::Result;
use crate::layout::OutputFormat;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Bitwig `multisample.xml`, written next to the samples it references.
pub struct MultiSampleWriter<W: Write = BufWriter<File>> {
    out: W,
    path: Option<PathBuf>,
    finished: bool,
}

impl MultiSampleWriter<BufWriter<File>> {
    pub fn create(path: impl Into<PathBuf>, name: &str) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        let mut writer = Self::new(BufWriter::new(file), name)?;
        writer.path = Some(path);
        Ok(writer)
    }
}

impl<W: Write> MultiSampleWriter<W> {
    pub fn new(mut out: W, name: &str) -> Result<Self> {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, r#"<multisample name="{}">"#, xml_escape(name))?;
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

impl<W: Write + Send> ContainerWriter for MultiSampleWriter<W> {
    fn format(&self) -> OutputFormat {
        OutputFormat::MultiSample
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn append(&mut self, entry: &SampleEntry<'_>) -> Result<()> {
        let job = entry.job;
        let out = &mut self.out;

        write!(out, r#"  <sample file="{}""#, xml_escape(entry.file_name))?;
        if job.is_round_robin() {
            write!(out, r#" zone-logic="round-robin""#)?;
        }
        writeln!(out, r#" sample-start="0" sample-stop="{}">"#, entry.frames)?;
        writeln!(
            out,
            r#"    <key low="{}" high="{}" root="{}"/>"#,
            job.note_from, job.note_to, job.midi_note
        )?;
        writeln!(
            out,
            r#"    <velocity low="{}" high="{}"/>"#,
            job.vel_from, job.vel_to
        )?;
        if let Some(points) = entry.loop_points {
            let fade = if points.is_empty() {
                0.0
            } else {
                points.crossfade as f32 / points.len() as f32
            };
            writeln!(
                out,
                r#"    <loop mode="loop" start="{}" stop="{}" fade="{:.2}"/>"#,
                points.start,
                points.end + 1,
                fade
            )?;
        }
        writeln!(out, "  </sample>")?;
        out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.finished {
            writeln!(self.out, "</multisample>")?;
            self.out.flush()?;
            self.finished = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::test_support::job;
    use crate::riff::LoopPoints;

    #[test]
    fn test_samples_and_footer() {
        let mut writer = MultiSampleWriter::new(Vec::new(), "Strings & Pads").unwrap();
        for rr in 0..2 {
            let j = job(60, rr, 2);
            let name = j.file_name();
            writer
                .append(&SampleEntry {
                    job: &j,
                    file_name: &name,
                    frames: 4410,
                    loop_points: None,
                })
                .unwrap();
        }
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        assert!(text.contains(r#"<multisample name="Strings &amp; Pads">"#));
        assert!(text.contains(
            r#"<sample file="sample_note_60_vel_91_rr_0.wav" zone-logic="round-robin" sample-start="0" sample-stop="4410">"#
        ));
        assert_eq!(text.matches(r#"<key low="58" high="61" root="60"/>"#).count(), 2);
        assert_eq!(text.matches(r#"<velocity low="1" high="127"/>"#).count(), 2);
        assert!(text.trim_end().ends_with("</multisample>"));
    }

    #[test]
    fn test_loop_element() {
        let mut writer = MultiSampleWriter::new(Vec::new(), "Loops").unwrap();
        let j = job(60, 0, 1);
        let name = j.file_name();
        writer
            .append(&SampleEntry {
                job: &j,
                file_name: &name,
                frames: 500,
                loop_points: LoopPoints::sustain_loop(400, 0.25),
            })
            .unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        assert!(!text.contains("zone-logic"));
        assert!(text.contains(r#"<loop mode="loop" start="200" stop="400" fade="0.25"/>"#));
    }
}
