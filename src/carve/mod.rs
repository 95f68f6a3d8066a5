//! File carving module - Recover files from raw disk images by signature.
//!
//! Reads a device or image front to back in 512-byte blocks and runs a
//! header/footer state machine over them. Files are assumed to start on a
//! block boundary, the way filesystems allocate them.
//!
//! # Design
//!
//! - **Single pass**: one blocking read loop, one in-flight extent, no
//!   backtracking
//! - **Ordered signatures**: the registry's declaration order decides between
//!   formats that share a header
//! - **Footer or cap**: an extent closes on its footer, or at
//!   [`DEFAULT_MAX_UNTERMINATED_SIZE`] for formats without one
//! - **Drop on truncation**: an extent still open when the stream ends (or a
//!   read fails) is discarded, never written

pub mod recover;
pub mod scanner;
pub mod signatures;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
pub use recover::{RecoveredFile, Recoverer};
pub use scanner::{
    Closure, DetectionState, RecoveredExtent, SectorScanner, BLOCK_SIZE,
    DEFAULT_MAX_UNTERMINATED_SIZE,
};
pub use signatures::{Category, Selection, SignatureEntry, SignatureRegistry, TypeFilter};

/// Emit a `Scanning` progress event every this many blocks (1 MiB)
const PROGRESS_INTERVAL_BLOCKS: u64 = 2048;

/// Options for a carve operation
#[derive(Debug, Clone)]
pub struct CarveOptions {
    /// Which signatures to look for
    pub filter: TypeFilter,
    /// Size at which footer-less extents are closed
    pub max_unterminated_size: usize,
}

impl Default for CarveOptions {
    fn default() -> Self {
        Self {
            filter: TypeFilter::All,
            max_unterminated_size: DEFAULT_MAX_UNTERMINATED_SIZE,
        }
    }
}

/// Why the read loop ended
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndOfStream,
    /// A read failed mid-stream; treated as the end of the input
    ReadError(String),
}

/// Result of a carve operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarveResult {
    pub filter: String,
    /// The filter named a type the registry does not know
    pub unknown_filter: bool,
    pub blocks_scanned: u64,
    pub bytes_scanned: u64,
    pub headers_found: usize,
    pub files_recovered: usize,
    pub files_failed: usize,
    /// Extents still open when the input ended
    pub extents_dropped: usize,
    pub bytes_dropped: u64,
    pub total_bytes_recovered: u64,
    pub duration_ms: u64,
    pub stop_reason: StopReason,
    pub by_type: BTreeMap<String, usize>,
    pub files: Vec<RecoveredFile>,
}

/// Progress updates emitted during carving
#[derive(Debug, Clone)]
pub enum CarveProgress {
    /// Periodic read position; `total_bytes` is `None` when the size is unknown
    Scanning {
        bytes_scanned: u64,
        total_bytes: Option<u64>,
    },
    /// A header started a new extent
    HeaderFound { tag: &'static str, block: u64 },
    /// An extent was persisted
    Recovered(RecoveredFile),
    /// Persisting an extent failed
    Failed { tag: &'static str, error: String },
    Done,
}

/// The file carver: drives a [`SectorScanner`] over a byte stream
pub struct Carver<'r> {
    registry: &'r SignatureRegistry,
    options: CarveOptions,
}

impl<'r> Carver<'r> {
    pub fn new(registry: &'r SignatureRegistry, options: CarveOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &CarveOptions {
        &self.options
    }

    /// Open `path` and carve it. Failing to open is the only error; the
    /// handle is closed when this returns.
    pub fn carve_path<F>(
        &self,
        path: &Path,
        recoverer: &mut Recoverer,
        on_progress: F,
    ) -> Result<CarveResult>
    where
        F: FnMut(CarveProgress),
    {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

        // Block devices report a zero length; progress falls back to a spinner
        let total_bytes = file
            .metadata()
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len());

        tracing::info!(
            source = %path.display(),
            total_bytes,
            "Opened source for carving"
        );

        Ok(self.carve_reader(file, total_bytes, recoverer, on_progress))
    }

    /// Carve an already-open stream
    pub fn carve_reader<R, F>(
        &self,
        mut reader: R,
        total_bytes: Option<u64>,
        recoverer: &mut Recoverer,
        mut on_progress: F,
    ) -> CarveResult
    where
        R: Read,
        F: FnMut(CarveProgress),
    {
        let start = Instant::now();
        let selection = self.registry.select(&self.options.filter);

        let mut result = CarveResult {
            filter: self.options.filter.to_string(),
            unknown_filter: selection.unknown,
            ..Default::default()
        };

        if selection.unknown {
            tracing::info!(
                filter = %self.options.filter,
                "Unknown file type; the scan will not detect anything"
            );
        }

        tracing::info!(
            filter = %self.options.filter,
            signatures = selection.entries.len(),
            max_unterminated_size = self.options.max_unterminated_size,
            dry_run = recoverer.is_dry_run(),
            "Starting file carve"
        );

        let mut scanner = SectorScanner::new(selection, self.options.max_unterminated_size);
        let mut block = [0u8; BLOCK_SIZE];
        let mut index: u64 = 0;

        loop {
            let n = match read_block(&mut reader, &mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::info!(
                        block = index,
                        offset = index * BLOCK_SIZE as u64,
                        error = %e,
                        "Read failed, ending scan"
                    );
                    result.stop_reason = StopReason::ReadError(e.to_string());
                    break;
                }
            };

            let was_detecting = scanner.is_detecting();
            let completed = scanner.process_block(index, &block[..n]);

            let started = !was_detecting && (scanner.is_detecting() || completed.is_some());
            if started {
                let tag = scanner
                    .state()
                    .entry()
                    .map(|e| e.tag)
                    .or(completed.as_ref().map(|e| e.tag))
                    .unwrap_or_default();
                result.headers_found += 1;
                tracing::info!(tag, block = index, "Found header, starting recovery");
                on_progress(CarveProgress::HeaderFound { tag, block: index });
            }

            if let Some(extent) = completed {
                self.handle_extent(extent, recoverer, &mut result, &mut on_progress);
            }

            result.blocks_scanned += 1;
            result.bytes_scanned += n as u64;
            index += 1;

            if index % PROGRESS_INTERVAL_BLOCKS == 0 {
                on_progress(CarveProgress::Scanning {
                    bytes_scanned: result.bytes_scanned,
                    total_bytes,
                });
            }

            if n < BLOCK_SIZE {
                // Short block only happens at the end of the stream
                break;
            }
        }

        if let Some((tag, len)) = scanner.finish() {
            tracing::info!(
                tag,
                bytes = len,
                "Input ended before the file was complete; discarding partial recovery"
            );
            result.extents_dropped += 1;
            result.bytes_dropped += len as u64;
        }

        on_progress(CarveProgress::Scanning {
            bytes_scanned: result.bytes_scanned,
            total_bytes,
        });
        on_progress(CarveProgress::Done);
        result.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            blocks_scanned = result.blocks_scanned,
            headers_found = result.headers_found,
            files_recovered = result.files_recovered,
            files_failed = result.files_failed,
            extents_dropped = result.extents_dropped,
            total_bytes = result.total_bytes_recovered,
            duration_ms = result.duration_ms,
            "Carve complete"
        );

        result
    }

    /// Convenience wrapper without progress
    pub fn carve(&self, path: &Path, recoverer: &mut Recoverer) -> Result<CarveResult> {
        self.carve_path(path, recoverer, |_| {})
    }

    fn handle_extent<F>(
        &self,
        extent: RecoveredExtent,
        recoverer: &mut Recoverer,
        result: &mut CarveResult,
        on_progress: &mut F,
    ) where
        F: FnMut(CarveProgress),
    {
        let tag = extent.tag;
        tracing::debug!(
            tag,
            closure = ?extent.closure,
            start_block = extent.start_block,
            end_block = extent.end_block,
            "Extent complete, saving file"
        );

        match recoverer.persist(extent) {
            Ok(file) => {
                result.files_recovered += 1;
                result.total_bytes_recovered += file.size;
                *result.by_type.entry(file.tag.clone()).or_insert(0) += 1;
                on_progress(CarveProgress::Recovered(file.clone()));
                result.files.push(file);
            }
            Err(e) => {
                tracing::info!(tag, error = %e, "Failed to save recovered file");
                result.files_failed += 1;
                on_progress(CarveProgress::Failed {
                    tag,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
/// Returns the number of bytes read; 0 means the stream is exhausted.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn block_with(prefix: &[u8]) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[..prefix.len()].copy_from_slice(prefix);
        block
    }

    fn pdf_blocks() -> Vec<u8> {
        let mut tail = vec![0u8; BLOCK_SIZE];
        tail[10..16].copy_from_slice(b"\n%%EOF");
        [block_with(b"%PDF-1.5"), vec![0x20; BLOCK_SIZE], tail].concat()
    }

    /// Yields `good` bytes, then fails every read
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(std::io::Error::new(ErrorKind::Other, "bad sector"));
            }
            Ok(n)
        }
    }

    /// Hands out at most 7 bytes per read
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(7);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_read_block_completes_short_reads() {
        let data: Vec<u8> = (0..1200u32).map(|i| i as u8).collect();
        let mut reader = Trickle(Cursor::new(data.clone()));
        let mut buf = [0u8; BLOCK_SIZE];

        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), BLOCK_SIZE);
        assert_eq!(&buf[..], &data[..BLOCK_SIZE]);
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), BLOCK_SIZE);
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 176);
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_carve_reader_recovers_pdf() {
        let dir = TempDir::new().unwrap();
        let registry = SignatureRegistry::builtin();
        let carver = Carver::new(&registry, CarveOptions::default());
        let mut recoverer = Recoverer::new(dir.path(), "t");

        let data = [vec![0u8; BLOCK_SIZE * 2], pdf_blocks()].concat();
        let result = carver.carve_reader(Trickle(Cursor::new(data)), None, &mut recoverer, |_| {});

        assert_eq!(result.blocks_scanned, 5);
        assert_eq!(result.headers_found, 1);
        assert_eq!(result.files_recovered, 1);
        assert_eq!(result.by_type.get("pdf"), Some(&1));
        assert_eq!(result.stop_reason, StopReason::EndOfStream);
        let file = &result.files[0];
        assert_eq!(file.start_block, 2);
        assert_eq!(file.end_block, 4);
        assert_eq!(std::fs::read(&file.path).unwrap(), pdf_blocks());
    }

    #[test]
    fn test_read_error_drops_in_flight_extent() {
        let dir = TempDir::new().unwrap();
        let registry = SignatureRegistry::builtin();
        let carver = Carver::new(&registry, CarveOptions::default());
        let mut recoverer = Recoverer::new(dir.path(), "t");

        // PDF header and body, but the footer block is unreadable
        let data = pdf_blocks()[..BLOCK_SIZE * 2].to_vec();
        let reader = FailingReader {
            data: Cursor::new(data),
        };
        let result = carver.carve_reader(reader, None, &mut recoverer, |_| {});

        assert!(matches!(result.stop_reason, StopReason::ReadError(ref m) if m.contains("bad sector")));
        assert_eq!(result.blocks_scanned, 2);
        assert_eq!(result.files_recovered, 0);
        assert_eq!(result.extents_dropped, 1);
        assert_eq!(result.bytes_dropped, 2 * BLOCK_SIZE as u64);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_failure_does_not_stop_scan() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"file in the way").unwrap();

        let registry = SignatureRegistry::builtin();
        let carver = Carver::new(&registry, CarveOptions::default());
        let mut recoverer = Recoverer::new(&blocker, "t");

        let data = [pdf_blocks(), pdf_blocks()].concat();
        let mut failures = 0;
        let result = carver.carve_reader(Cursor::new(data), None, &mut recoverer, |p| {
            if let CarveProgress::Failed { .. } = p {
                failures += 1;
            }
        });

        assert_eq!(result.headers_found, 2);
        assert_eq!(result.files_failed, 2);
        assert_eq!(failures, 2);
        assert_eq!(result.blocks_scanned, 6);
    }

    #[test]
    fn test_unknown_filter_is_flagged() {
        let registry = SignatureRegistry::builtin();
        let carver = Carver::new(
            &registry,
            CarveOptions {
                filter: TypeFilter::parse("exe"),
                ..Default::default()
            },
        );
        let mut recoverer = Recoverer::new("unused", "t").dry_run(true);

        let result = carver.carve_reader(Cursor::new(pdf_blocks()), None, &mut recoverer, |_| {});
        assert!(result.unknown_filter);
        assert_eq!(result.filter, "exe");
        assert_eq!(result.headers_found, 0);
        assert_eq!(result.blocks_scanned, 3);
    }

    #[test]
    fn test_progress_events() {
        let registry = SignatureRegistry::builtin();
        let carver = Carver::new(&registry, CarveOptions::default());
        let mut recoverer = Recoverer::new("unused", "t").dry_run(true);

        let data = [pdf_blocks(), vec![0u8; BLOCK_SIZE * 2048]].concat();
        let total = data.len() as u64;
        let mut events = Vec::new();
        carver.carve_reader(Cursor::new(data), Some(total), &mut recoverer, |p| events.push(p));

        assert!(matches!(events[0], CarveProgress::HeaderFound { tag: "pdf", block: 0 }));
        assert!(matches!(events[1], CarveProgress::Recovered(ref f) if f.tag == "pdf"));
        assert!(events.iter().any(|e| matches!(
            e,
            CarveProgress::Scanning { bytes_scanned, total_bytes: Some(t) } if *bytes_scanned == *t
        )));
        assert!(matches!(events.last(), Some(CarveProgress::Done)));
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let registry = SignatureRegistry::builtin();
        let carver = Carver::new(&registry, CarveOptions::default());
        let mut recoverer = Recoverer::new(dir.path().join("out"), "t");

        let err = carver
            .carve(&dir.path().join("missing.img"), &mut recoverer)
            .unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_result_serializes() {
        let result = CarveResult {
            stop_reason: StopReason::ReadError("boom".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stop_reason"]["kind"], "read_error");
        assert_eq!(json["stop_reason"]["message"], "boom");
    }
}
