//! Persisting completed extents to the output directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::scanner::{Closure, RecoveredExtent};
use crate::error::{Error, Result};

/// A recovered file written (or, in dry-run mode, planned) on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveredFile {
    pub path: PathBuf,
    pub tag: String,
    pub size: u64,
    pub start_block: u64,
    pub end_block: u64,
    /// Byte offset of the first block in the source
    pub offset: u64,
    pub closure: Closure,
    /// Blake3 hash of the written bytes
    pub blake3: String,
}

/// Writes extents as `recovered_<run-id>_<seq>.<tag>`.
///
/// The run id comes from the clock at startup and the sequence number
/// advances on every attempt, so names never repeat within a run. Files are
/// opened with `create_new`: if a name already exists the write fails instead
/// of appending to someone else's output.
#[derive(Debug)]
pub struct Recoverer {
    output_dir: PathBuf,
    run_id: String,
    next_seq: u64,
    dry_run: bool,
    dir_ready: bool,
}

impl Recoverer {
    pub fn new(output_dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            run_id: run_id.into(),
            next_seq: 1,
            dry_run: false,
            dir_ready: false,
        }
    }

    /// Recoverer whose run id is the current local time
    pub fn for_run(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(output_dir, Local::now().format("%Y%m%d-%H%M%S").to_string())
    }

    /// Report what would be written without touching the filesystem
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// File name for sequence number `seq`
    pub fn file_name(&self, seq: u64, tag: &str) -> String {
        format!("recovered_{}_{:05}.{}", self.run_id, seq, tag)
    }

    /// Write one extent. The extent's bytes are dropped when this returns,
    /// whatever the outcome.
    pub fn persist(&mut self, extent: RecoveredExtent) -> Result<RecoveredFile> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let path = self.output_dir.join(self.file_name(seq, extent.tag));
        let hash = blake3::hash(&extent.bytes);

        if !self.dry_run {
            self.ensure_output_dir()?;
            write_new(&path, &extent.bytes).map_err(|source| Error::Write {
                path: path.clone(),
                source,
            })?;
        }

        tracing::info!(
            path = %path.display(),
            tag = extent.tag,
            size = extent.len(),
            start_block = extent.start_block,
            end_block = extent.end_block,
            dry_run = self.dry_run,
            "Recovered file"
        );

        Ok(RecoveredFile {
            path,
            tag: extent.tag.to_string(),
            size: extent.len() as u64,
            start_block: extent.start_block,
            end_block: extent.end_block,
            offset: extent.offset(),
            closure: extent.closure,
            blake3: hex::encode(hash.as_bytes()),
        })
    }

    fn ensure_output_dir(&mut self) -> Result<()> {
        if self.dir_ready {
            return Ok(());
        }
        fs::create_dir_all(&self.output_dir).map_err(|source| Error::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;
        self.dir_ready = true;
        Ok(())
    }
}

fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(data).and_then(|()| file.sync_all());
    drop(file);
    discard_on_error(path, written)
}

/// A failed write leaves no partial file behind
fn discard_on_error(path: &Path, written: std::io::Result<()>) -> std::io::Result<()> {
    if written.is_err() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not remove partially written file"
            );
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extent(tag: &'static str, bytes: &[u8]) -> RecoveredExtent {
        RecoveredExtent {
            tag,
            bytes: bytes.to_vec(),
            start_block: 4,
            end_block: 6,
            closure: Closure::Footer,
        }
    }

    #[test]
    fn test_persist_creates_dir_and_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("recovered");
        let mut recoverer = Recoverer::new(&out, "run1");

        let file = recoverer.persist(extent("pdf", b"%PDF data")).unwrap();

        assert_eq!(file.path, out.join("recovered_run1_00001.pdf"));
        assert_eq!(std::fs::read(&file.path).unwrap(), b"%PDF data");
        assert_eq!(file.size, 9);
        assert_eq!(file.offset, 4 * 512);
        assert_eq!(file.blake3, hex::encode(blake3::hash(b"%PDF data").as_bytes()));
    }

    #[test]
    fn test_existing_dir_is_fine() {
        let dir = TempDir::new().unwrap();
        let mut recoverer = Recoverer::new(dir.path(), "run1");
        recoverer.persist(extent("gif", b"GIF8;")).unwrap();
        recoverer.persist(extent("gif", b"GIF8;;")).unwrap();

        assert!(dir.path().join("recovered_run1_00001.gif").exists());
        assert!(dir.path().join("recovered_run1_00002.gif").exists());
    }

    #[test]
    fn test_collision_fails_instead_of_appending() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("recovered_run1_00001.jpg");
        std::fs::write(&existing, b"earlier run").unwrap();

        let mut recoverer = Recoverer::new(dir.path(), "run1");
        let err = recoverer.persist(extent("jpg", b"new bytes")).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
        assert_eq!(std::fs::read(&existing).unwrap(), b"earlier run");

        // The sequence moved on; the next extent gets a fresh name
        let file = recoverer.persist(extent("jpg", b"new bytes")).unwrap();
        assert_eq!(file.path, dir.path().join("recovered_run1_00002.jpg"));
    }

    #[test]
    fn test_output_dir_blocked_by_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("recovered");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut recoverer = Recoverer::new(&blocker, "run1");
        let err = recoverer.persist(extent("png", b"x")).unwrap_err();
        assert!(matches!(err, Error::OutputDir { .. }));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("recovered");
        let mut recoverer = Recoverer::new(&out, "run1").dry_run(true);

        let file = recoverer.persist(extent("pdf", b"%PDF")).unwrap();
        assert_eq!(file.path, out.join("recovered_run1_00001.pdf"));
        assert!(!out.exists());
    }

    /// Accepts `budget` bytes, then fails like a full disk
    struct FailAfter<W> {
        inner: W,
        budget: usize,
    }

    impl<W: Write> Write for FailAfter<W> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            let n = self.inner.write(&buf[..buf.len().min(self.budget)])?;
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn test_partial_write_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recovered_run1_00001.pdf");
        let file = OpenOptions::new().write(true).create_new(true).open(&path).unwrap();

        let mut writer = FailAfter { inner: file, budget: 1024 };
        let written = writer.write_all(&[0x25u8; 1536]);
        drop(writer);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024);

        let err = discard_on_error(&path, written).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
    }

    #[test]
    fn test_successful_write_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recovered_run1_00001.gif");
        write_new(&path, b"GIF8;").unwrap();
        discard_on_error(&path, Ok(())).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF8;");
    }

    #[test]
    fn test_run_id_from_clock() {
        let recoverer = Recoverer::for_run("out");
        // YYYYmmdd-HHMMSS
        assert_eq!(recoverer.run_id().len(), 15);
        assert_eq!(recoverer.run_id().as_bytes()[8], b'-');
        assert_eq!(recoverer.file_name(12, "zip"), format!("recovered_{}_00012.zip", recoverer.run_id()));
    }
}
