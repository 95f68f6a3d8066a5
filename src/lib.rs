//! sector-drill Library
//!
//! Recovers deleted files from raw block devices and disk images by
//! scanning them sector by sector for known file signatures ("carving").
//! Filesystem metadata is never consulted, so it works when the filesystem
//! is damaged, reformatted or gone.
//!
//! # Features
//!
//! - **Sector-aligned carving**: 512-byte blocks, headers recognized at block
//!   boundaries, footers anywhere in a block (including across the boundary)
//! - **Deterministic matching**: an ordered, immutable signature registry
//! - **Safe output**: run-unique file names, never appends to existing files
//! - **Blake3 digests** for every recovered file
//! - **Graceful degradation**: read errors end the scan, write errors skip one
//!   file
//!
//! # Example
//!
//! ```no_run
//! use sector_drill::carve::{CarveOptions, Carver, Recoverer, SignatureRegistry, TypeFilter};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let registry = SignatureRegistry::builtin();
//!     let carver = Carver::new(
//!         &registry,
//!         CarveOptions {
//!             filter: TypeFilter::parse("pdf"),
//!             ..Default::default()
//!         },
//!     );
//!     let mut recoverer = Recoverer::for_run("recovered");
//!
//!     let result = carver.carve(Path::new("disk.img"), &mut recoverer)?;
//!     println!("Recovered {} files", result.files_recovered);
//!     Ok(())
//! }
//! ```

pub mod carve;
pub mod cli;
pub mod config;
pub mod error;
pub mod inspect;
pub mod platform;

// Re-export commonly used types
pub use carve::{
    CarveOptions, CarveProgress, CarveResult, Carver, RecoveredFile, Recoverer, SectorScanner,
    SignatureRegistry, TypeFilter,
};
pub use config::Config;
pub use error::{Error, Result};
pub use inspect::{describe, FileMetadata};
pub use platform::{default_disk_path, list_partitions, EnvProbe, SystemEnv};
