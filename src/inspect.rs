//! File metadata lookup for `--info`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{Error, Result};

/// Size, modification time and inode of a file
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
    /// Unix only
    pub inode: Option<u64>,
}

/// Stat `path`
pub fn describe(path: &Path) -> Result<FileMetadata> {
    let meta = fs::metadata(path).map_err(|source| Error::Stat {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(FileMetadata {
        path: path.to_path_buf(),
        size: meta.len(),
        modified: meta.modified().ok().map(DateTime::<Local>::from),
        inode: inode(&meta),
    })
}

#[cfg(unix)]
fn inode(meta: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn inode(_meta: &fs::Metadata) -> Option<u64> {
    None
}
