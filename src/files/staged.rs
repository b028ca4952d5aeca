use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;

/// Prefix of in-flight temp files. Listings skip these.
pub(super) const TEMP_PREFIX: &str = ".staged-";

/// A temp file next to its final path. `commit` renames it into place;
/// dropping it uncommitted removes it.
pub struct StagedFile {
    writer: Option<BufWriter<File>>,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl StagedFile {
    pub(super) fn create(final_path: PathBuf) -> Result<Self> {
        let temp_path = final_path.with_file_name(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let file = File::create(&temp_path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            temp_path,
            final_path,
        })
    }

    #[must_use]
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn commit(mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
            file.sync_all()?;
        }
        fs::rename(&self.temp_path, &self.final_path)?;
        Ok(self.final_path.clone())
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("staged file already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.writer.take();
        // Already renamed after a successful commit.
        let _ = fs::remove_file(&self.temp_path);
    }
}
