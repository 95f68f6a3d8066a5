//! Error types shared by the carving engine and its platform adapters.
//!
//! Every variant is reported at the boundary of the operation that caused it.
//! Only [`Error::Open`] is fatal to a scan; the rest abort a single recovery,
//! metadata lookup or partition listing.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for sector-drill operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write recovered file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error accessing {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("disk not found: {}", .0.display())]
    DiskNotFound(PathBuf),

    #[error("partition tool `{program}` failed: {message}")]
    PartitionTool { program: String, message: String },

    #[error("invalid signature `{tag}`: {reason}")]
    InvalidSignature { tag: String, reason: String },
}

/// Result type alias for sector-drill operations
pub type Result<T> = std::result::Result<T, Error>;
