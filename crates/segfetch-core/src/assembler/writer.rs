//! Sequential output writer with temp file and atomic finalize.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::ContentHasher;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `out.bin` -> `out.bin.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Appends bytes to `<final>.part`, hashing them on the way; `finalize`
/// renames it into place. Dropping the writer without finalizing removes the temp file.
pub struct OutputWriter {
    file: Option<BufWriter<File>>,
    temp_path: PathBuf,
    hasher: ContentHasher,
}

impl OutputWriter {
    /// Create (or truncate) the temp file next to `final_path`.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        Ok(Self {
            file: Some(BufWriter::new(file)),
            temp_path,
            hasher: ContentHasher::new(),
        })
    }

    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already closed"))?;
        file.write_all(data)?;
        self.hasher.update(data);
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.hasher.bytes()
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Flush, fsync, and rename the temp file to `final_path`. Returns bytes
    /// written and their SHA-256.
    pub fn finalize(mut self, final_path: &Path) -> io::Result<(u64, String)> {
        let buf = self
            .file
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already closed"))?;
        let res = buf
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all())
            .and_then(|()| std::fs::rename(&self.temp_path, final_path));
        if res.is_err() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
        let hasher = std::mem::take(&mut self.hasher);
        res.map(|()| (hasher.bytes(), hasher.finish()))
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
