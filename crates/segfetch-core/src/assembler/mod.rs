//! Output assembly after the worker barrier.
//!
//! Runs only once every worker has been joined. If any segment failed the
//! transfer is a partial failure and nothing is written: partial successes
//! are discarded, never partially written. Otherwise buffers are appended in
//! ascending segment id order to `<output>.part`, synced, and renamed into place.

mod writer;

pub use writer::{temp_path, OutputWriter, TEMP_SUFFIX};

use std::io;
use std::path::{Path, PathBuf};

use crate::downloader::SegmentOutcome;

/// Error writing the assembled output.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// Could not create or write the output file.
    #[error("cannot write output {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A worker reported success with a buffer of the wrong size.
    #[error("segment {id} buffer is {actual} bytes, expected {expected}")]
    LengthMismatch {
        id: u32,
        expected: usize,
        actual: usize,
    },
}

/// Result of an assembly attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// Every segment succeeded; the output holds `bytes` bytes with this SHA-256.
    Written { bytes: u64, sha256: String },
    /// At least one segment failed (ids listed); no output was created.
    Incomplete { failed: Vec<u32> },
}

/// Merges segment buffers into `output`, or writes nothing if any segment failed.
pub fn assemble(
    mut outcomes: Vec<SegmentOutcome>,
    output: &Path,
) -> Result<Assembly, AssembleError> {
    outcomes.sort_by_key(|o| o.segment.id);

    let failed: Vec<u32> = outcomes
        .iter()
        .filter(|o| !o.succeeded())
        .map(|o| o.segment.id)
        .collect();
    if !failed.is_empty() {
        tracing::warn!(failed = ?failed, "skipping assembly: segment(s) failed");
        return Ok(Assembly::Incomplete { failed });
    }

    for o in &outcomes {
        if let Ok(buf) = &o.result {
            if buf.len() != o.segment.len() {
                return Err(AssembleError::LengthMismatch {
                    id: o.segment.id,
                    expected: o.segment.len(),
                    actual: buf.len(),
                });
            }
        }
    }

    let file_err = |source: io::Error| AssembleError::FileAccess {
        path: output.to_path_buf(),
        source,
    };
    let mut writer = OutputWriter::create(output).map_err(file_err)?;
    for o in outcomes {
        if let Ok(buf) = o.result {
            writer.append(&buf).map_err(file_err)?;
        }
    }
    let (bytes, sha256) = writer.finalize(output).map_err(file_err)?;
    tracing::info!(path = %output.display(), bytes, %sha256, "output assembled");
    Ok(Assembly::Written { bytes, sha256 })
}
