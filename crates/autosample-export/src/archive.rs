//! Packaging a finished sample directory into a single archive file.

use crate::error::{ExportError, Result};
use std::path::Path;

/// Packs the regular files of a flat directory into `dest`.
pub trait Archiver: Send + Sync {
    fn archive_dir(&self, source_dir: &Path, dest: &Path) -> Result<()>;
}

/// Archiver used when no archive backend is compiled in; always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArchiver;

impl Archiver for NoArchiver {
    fn archive_dir(&self, _source_dir: &Path, dest: &Path) -> Result<()> {
        Err(ExportError::Unsupported(format!(
            "cannot create {}: archive support not enabled",
            dest.display()
        )))
    }
}

/// Regular files directly inside `dir`, sorted by name.
pub fn archive_entries(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(feature = "archive")]
pub use zip_archiver::ZipArchiver;

#[cfg(feature = "archive")]
mod zip_archiver {
    use super::{archive_entries, Archiver};
    use crate::error::{ExportError, Result};
    use std::fs::File;
    use std::io::{self, BufWriter};
    use std::path::Path;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Uncompressed zip archiver.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ZipArchiver;

    impl Archiver for ZipArchiver {
        fn archive_dir(&self, source_dir: &Path, dest: &Path) -> Result<()> {
            let files = archive_entries(source_dir)?;
            let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .unix_permissions(0o644);

            for path in &files {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    tracing::warn!("Skipping non UTF-8 file name: {}", path.display());
                    continue;
                };
                zip.start_file(name, options)?;
                io::copy(&mut File::open(path)?, &mut zip)?;
            }

            let mut out = zip.finish()?;
            io::Write::flush(&mut out)?;
            tracing::debug!("Archived {} files into {}", files.len(), dest.display());
            Ok(())
        }
    }

    impl From<zip::result::ZipError> for ExportError {
        fn from(e: zip::result::ZipError) -> Self {
            ExportError::Archive(e.to_string())
        }
    }
}
