//! File signature registry for carving.
//!
//! Each entry pairs a file-type tag with the magic bytes a block must start
//! with and, optionally, the trailer bytes that close the file. The table is
//! built once and never mutated; its declaration order is the tie-break when
//! several formats share a header (ZIP containers, RIFF, `ftyp` boxes, TIFF).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Group a signature is declared under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Document,
    Video,
    Audio,
    Archive,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Image,
        Category::Document,
        Category::Video,
        Category::Audio,
        Category::Archive,
    ];

    /// Parse a category name as typed on the command line ("images", "video", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "image" | "images" => Some(Category::Image),
            "document" | "documents" => Some(Category::Document),
            "video" | "videos" => Some(Category::Video),
            "audio" => Some(Category::Audio),
            "archive" | "archives" => Some(Category::Archive),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Image => "images",
            Category::Document => "documents",
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Archive => "archives",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A file format signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// File-type tag, also used as the recovered file's extension
    pub tag: &'static str,
    pub category: Category,
    /// Bytes a block must start with
    pub header: &'static [u8],
    /// Literal bytes marking the end of the file, if the format has one
    pub footer: Option<&'static [u8]>,
}

impl SignatureEntry {
    pub const fn new(
        tag: &'static str,
        category: Category,
        header: &'static [u8],
        footer: Option<&'static [u8]>,
    ) -> Self {
        Self {
            tag,
            category,
            header,
            footer,
        }
    }

    /// Prefix comparison against the bytes actually read for a block
    pub fn matches_header(&self, block: &[u8]) -> bool {
        block.starts_with(self.header)
    }
}

/// Which signatures a scan considers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Category(Category),
    Tag(String),
}

impl TypeFilter {
    /// `""` and `"all"` select everything, category names select a group,
    /// anything else is taken as a single tag.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return TypeFilter::All;
        }
        match Category::from_name(trimmed) {
            Some(category) => TypeFilter::Category(category),
            None => TypeFilter::Tag(trimmed.to_lowercase()),
        }
    }

    fn admits(&self, entry: &SignatureEntry) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Category(category) => entry.category == *category,
            TypeFilter::Tag(tag) => entry.tag == tag,
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::All => f.write_str("all"),
            TypeFilter::Category(category) => write!(f, "{category}"),
            TypeFilter::Tag(tag) => f.write_str(tag),
        }
    }
}

/// Ordered subset of the registry a scan runs with
#[derive(Debug, Clone)]
pub struct Selection<'r> {
    pub entries: Vec<&'r SignatureEntry>,
    /// The filter named a tag the registry does not know
    pub unknown: bool,
}

impl Selection<'_> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable, explicitly ordered signature table
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    entries: Vec<SignatureEntry>,
}

impl SignatureRegistry {
    /// Build a registry from custom entries. Headers must be non-empty and
    /// tags unique.
    pub fn new(entries: Vec<SignatureEntry>) -> Result<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if entry.header.is_empty() {
                return Err(Error::InvalidSignature {
                    tag: entry.tag.to_string(),
                    reason: "header is empty".to_string(),
                });
            }
            if matches!(entry.footer, Some(footer) if footer.is_empty()) {
                return Err(Error::InvalidSignature {
                    tag: entry.tag.to_string(),
                    reason: "footer is present but empty".to_string(),
                });
            }
            if entries[..i].iter().any(|e| e.tag == entry.tag) {
                return Err(Error::InvalidSignature {
                    tag: entry.tag.to_string(),
                    reason: "duplicate tag".to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The built-in signature table
    pub fn builtin() -> Self {
        Self {
            entries: builtin_signatures(),
        }
    }

    pub fn lookup(&self, tag: &str) -> Option<&SignatureEntry> {
        let tag = tag.trim().to_lowercase();
        self.entries.iter().find(|e| e.tag == tag)
    }

    /// All entries in declaration order
    pub fn all(&self) -> &[SignatureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn select(&self, filter: &TypeFilter) -> Selection<'_> {
        let entries: Vec<&SignatureEntry> =
            self.entries.iter().filter(|e| filter.admits(e)).collect();
        let unknown = matches!(filter, TypeFilter::Tag(_)) && entries.is_empty();
        Selection { entries, unknown }
    }

    /// First entry, in declaration order, whose header starts the block
    pub fn first_match(&self, block: &[u8]) -> Option<&SignatureEntry> {
        self.entries.iter().find(|e| e.matches_header(block))
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

use Category::*;

/// Built-in signatures. Order matters: the first matching entry wins.
fn builtin_signatures() -> Vec<SignatureEntry> {
    vec![
        // === Images ===
        SignatureEntry::new("jpg", Image, &[0xFF, 0xD8, 0xFF], Some(&[0xFF, 0xD9])),
        SignatureEntry::new(
            "png",
            Image,
            &[0x89, 0x50, 0x4E, 0x47],
            Some(&[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82]),
        ),
        SignatureEntry::new("gif", Image, &[0x47, 0x49, 0x46, 0x38], Some(&[0x3B])),
        SignatureEntry::new("bmp", Image, &[0x42, 0x4D], None),
        SignatureEntry::new("tiff", Image, &[0x49, 0x49, 0x2A, 0x00], None),
        // RIFF container; closes on the WEBP fourcc
        SignatureEntry::new(
            "webp",
            Image,
            &[0x52, 0x49, 0x46, 0x46],
            Some(&[0x57, 0x45, 0x42, 0x50]),
        ),
        SignatureEntry::new("svg", Image, b"<svg", Some(b"</svg")),
        // ISO base media `ftyp` box
        SignatureEntry::new("heic", Image, b"ftyp", None),
        SignatureEntry::new("ico", Image, &[0x00, 0x00, 0x01, 0x00], None),
        SignatureEntry::new("raw", Image, &[0x49, 0x49, 0x2A, 0x00], None),
        SignatureEntry::new("cr2", Image, &[0x49, 0x49, 0x2A, 0x00], None),
        SignatureEntry::new("nef", Image, &[0x4E, 0x45, 0x46, 0x46], None),
        SignatureEntry::new("orf", Image, &[0x4F, 0x52, 0x46, 0x00], None),
        SignatureEntry::new("arw", Image, &[0x41, 0x52, 0x57, 0x00], None),
        SignatureEntry::new("dng", Image, &[0x44, 0x4E, 0x47, 0x00], None),
        SignatureEntry::new("psd", Image, b"8BPS", None),
        SignatureEntry::new("heif", Image, b"ftyp", None),
        SignatureEntry::new("avif", Image, b"ftyp", None),
        SignatureEntry::new("jxl", Image, &[0x0A, 0x4A, 0x58, 0x4C], None),
        SignatureEntry::new(
            "svgz",
            Image,
            &[0x1F, 0x8B, 0x08],
            Some(&[
                0x1F, 0x8B, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0xFF, 0x3C, 0xB2, 0xC1,
                0x4A, 0xC3, 0x30, 0x10, 0x85, 0xE1,
            ]),
        ),
        SignatureEntry::new("x3d", Image, b"<x3d", Some(b"</x3d")),
        SignatureEntry::new("hdr", Image, b"#HDR", None),
        SignatureEntry::new("exr", Image, &[0x76, 0x2F, 0x31, 0x01], None),
        SignatureEntry::new("xpm", Image, b"/* X", Some(b"*/")),
        // === Documents ===
        SignatureEntry::new("pdf", Document, b"%PDF", Some(b"\n%%EOF")),
        // ZIP-based office formats share the local file header
        SignatureEntry::new("docx", Document, &[0x50, 0x4B, 0x03, 0x04], None),
        SignatureEntry::new("xlsx", Document, &[0x50, 0x4B, 0x03, 0x04], None),
        SignatureEntry::new("pptx", Document, &[0x50, 0x4B, 0x03, 0x04], None),
        // UTF-8 BOM
        SignatureEntry::new("txt", Document, &[0xEF, 0xBB, 0xBF], None),
        SignatureEntry::new("rtf", Document, b"{\\rtf", Some(b"}")),
        SignatureEntry::new("epub", Document, &[0x50, 0x4B, 0x03, 0x04], None),
        // === Videos ===
        SignatureEntry::new("mp4", Video, b"ftyp", None),
        SignatureEntry::new("avi", Video, b"RIFF", None),
        SignatureEntry::new("mkv", Video, &[0x1A, 0x45, 0xDF, 0xA3], None),
        SignatureEntry::new("mov", Video, b"moov", None),
        SignatureEntry::new("wmv", Video, &[0x30, 0x26, 0xB2, 0x75], None),
        SignatureEntry::new("flv", Video, b"FLV", None),
        // === Audio ===
        SignatureEntry::new("mp3", Audio, b"ID3", None),
        SignatureEntry::new("wav", Audio, b"RIFF", Some(b"WAVE")),
        SignatureEntry::new("aac", Audio, &[0xFF, 0xF1], None),
        SignatureEntry::new("flac", Audio, b"fLaC", None),
        SignatureEntry::new("ogg", Audio, b"OggS", None),
        SignatureEntry::new(
            "m4a",
            Audio,
            &[0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70],
            None,
        ),
        // === Archives ===
        SignatureEntry::new("zip", Archive, &[0x50, 0x4B, 0x03, 0x04], None),
        SignatureEntry::new("rar", Archive, &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07], None),
        SignatureEntry::new("7z", Archive, &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], None),
        SignatureEntry::new("tar", Archive, b"ustar", None),
        SignatureEntry::new("iso", Archive, b"CD001", None),
        SignatureEntry::new("dmg", Archive, &[0x78, 0x01, 0x73, 0x0D, 0x62, 0x62], None),
    ]
}
