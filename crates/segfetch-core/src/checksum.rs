//! SHA-256 of served and assembled files.
//!
//! The assembler hashes output bytes as it appends them, so a finished
//! transfer reports its digest without reading the file back.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Incremental SHA-256 over bytes in the order they are fed.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Hashes everything `r` yields until EOF.
pub fn sha256_reader<R: Read>(mut r: R) -> io::Result<String> {
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish())
}

/// SHA-256 of the file at `path`, as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    sha256_reader(f).with_context(|| format!("read {}", path.display()))
}

/// Compares a digest against one supplied by the user (case-insensitive, surrounding
/// whitespace ignored).
pub fn digest_matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

/// Returns true when both files have the same SHA-256 digest.
pub fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    Ok(sha256_path(a)? == sha256_path(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn hasher_is_independent_of_update_boundaries() {
        let mut whole = ContentHasher::new();
        whole.update(b"hello world");
        let mut pieces = ContentHasher::new();
        pieces.update(b"hello");
        pieces.update(b"");
        pieces.update(b" world");
        assert_eq!(pieces.bytes(), 11);
        assert_eq!(whole.finish(), HELLO_WORLD);
        assert_eq!(pieces.finish(), HELLO_WORLD);
    }

    #[test]
    fn reader_digest_spans_buffer_refills() {
        let data = vec![0xabu8; BUF_SIZE * 2 + 17];
        let mut hasher = ContentHasher::new();
        hasher.update(&data);
        assert_eq!(sha256_reader(Cursor::new(&data)).unwrap(), hasher.finish());
    }

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(sha256_path(f.path()).unwrap(), EMPTY);
    }

    #[test]
    fn sha256_path_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sha256_path(&dir.path().join("nope.bin")).is_err());
    }

    #[test]
    fn digest_match_ignores_case_and_whitespace() {
        assert!(digest_matches(HELLO_WORLD, &format!(" {}\n", HELLO_WORLD.to_uppercase())));
        assert!(!digest_matches(HELLO_WORLD, EMPTY));
    }

    #[test]
    fn same_contents_detects_difference() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"segment").unwrap();
        b.write_all(b"segment").unwrap();
        assert!(same_contents(a.path(), b.path()).unwrap());
        b.write_all(b"!").unwrap();
        b.flush().unwrap();
        assert!(!same_contents(a.path(), b.path()).unwrap());
    }
}
