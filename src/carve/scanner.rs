//! Per-scan detection state machine.
//!
//! The scanner is fed one block at a time and decides, block by block,
//! whether a file starts, continues or ends. It performs no I/O; the
//! [`Carver`](super::Carver) owns the read loop and the [`Recoverer`](super::Recoverer)
//! owns the writes.

use serde::{Deserialize, Serialize};

use super::signatures::{Selection, SignatureEntry};

/// Size of one block read from the device
pub const BLOCK_SIZE: usize = 512;

/// Footer-less files are closed once they grow past this many bytes
pub const DEFAULT_MAX_UNTERMINATED_SIZE: usize = 1_000_000;

/// How the end of a recovered extent was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Closure {
    /// The format's footer bytes were found
    Footer,
    /// The format has no footer and the size threshold was exceeded
    SizeCap,
}

/// A finished extent, ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredExtent {
    pub tag: &'static str,
    pub bytes: Vec<u8>,
    pub start_block: u64,
    /// Block in which the extent was closed (inclusive)
    pub end_block: u64,
    pub closure: Closure,
}

impl RecoveredExtent {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte offset of the first block on the device
    pub fn offset(&self) -> u64 {
        self.start_block * BLOCK_SIZE as u64
    }
}

/// Current carving state. `Idle` carries nothing, so an inactive state can
/// never hold stale bytes or a stale type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetectionState<'r> {
    #[default]
    Idle,
    Detecting {
        entry: &'r SignatureEntry,
        accumulated: Vec<u8>,
        start_block: u64,
    },
}

impl<'r> DetectionState<'r> {
    pub fn is_active(&self) -> bool {
        matches!(self, DetectionState::Detecting { .. })
    }

    pub fn entry(&self) -> Option<&'r SignatureEntry> {
        match self {
            DetectionState::Idle => None,
            DetectionState::Detecting { entry, .. } => Some(*entry),
        }
    }

    pub fn start_block(&self) -> Option<u64> {
        match self {
            DetectionState::Idle => None,
            DetectionState::Detecting { start_block, .. } => Some(*start_block),
        }
    }

    pub fn accumulated_len(&self) -> usize {
        match self {
            DetectionState::Idle => 0,
            DetectionState::Detecting { accumulated, .. } => accumulated.len(),
        }
    }
}

/// Single-pass header/footer state machine over a block stream
pub struct SectorScanner<'r> {
    candidates: Vec<&'r SignatureEntry>,
    state: DetectionState<'r>,
    max_unterminated_size: usize,
}

impl<'r> SectorScanner<'r> {
    pub fn new(selection: Selection<'r>, max_unterminated_size: usize) -> Self {
        Self {
            candidates: selection.entries,
            state: DetectionState::Idle,
            max_unterminated_size,
        }
    }

    pub fn state(&self) -> &DetectionState<'r> {
        &self.state
    }

    pub fn is_detecting(&self) -> bool {
        self.state.is_active()
    }

    /// Signatures this scanner will look for, in match order
    pub fn candidates(&self) -> &[&'r SignatureEntry] {
        &self.candidates
    }

    /// Feed the block read at `index`. Returns the extent when this block
    /// completes one.
    pub fn process_block(&mut self, index: u64, block: &[u8]) -> Option<RecoveredExtent> {
        if block.is_empty() {
            return None;
        }

        match &mut self.state {
            DetectionState::Idle => {
                let entry = self.candidates.iter().copied().find(|e| e.matches_header(block))?;
                tracing::debug!(tag = entry.tag, block = index, "Header matched");
                self.state = DetectionState::Detecting {
                    entry,
                    accumulated: block.to_vec(),
                    start_block: index,
                };
            }
            DetectionState::Detecting { accumulated, .. } => {
                accumulated.extend_from_slice(block);
            }
        }

        let closure = self.completion(block.len())?;
        Some(self.finalize(index, closure))
    }

    /// End of stream: drop whatever is still being accumulated. Returns the
    /// tag and byte count of the discarded extent, if any.
    pub fn finish(&mut self) -> Option<(&'r str, usize)> {
        match std::mem::take(&mut self.state) {
            DetectionState::Idle => None,
            DetectionState::Detecting {
                entry, accumulated, ..
            } => Some((entry.tag, accumulated.len())),
        }
    }

    fn completion(&self, block_len: usize) -> Option<Closure> {
        let DetectionState::Detecting {
            entry, accumulated, ..
        } = &self.state
        else {
            return None;
        };

        match entry.footer {
            Some(footer) => {
                // Current block plus enough of the preceding extent bytes to
                // catch a footer split across the boundary.
                let carry = footer.len() - 1;
                let start = accumulated.len().saturating_sub(block_len + carry);
                contains(&accumulated[start..], footer).then_some(Closure::Footer)
            }
            None => (accumulated.len() > self.max_unterminated_size).then_some(Closure::SizeCap),
        }
    }

    fn finalize(&mut self, end_block: u64, closure: Closure) -> RecoveredExtent {
        match std::mem::take(&mut self.state) {
            DetectionState::Detecting {
                entry,
                accumulated,
                start_block,
            } => RecoveredExtent {
                tag: entry.tag,
                bytes: accumulated,
                start_block,
                end_block,
                closure,
            },
            // completion() only reports a closure while detecting
            DetectionState::Idle => unreachable!("finalize called while idle"),
        }
    }
}

/// Sub-sequence search
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
