//! Configuration Module - User preferences from ~/.sector-drill/config.toml
//!
//! Supports:
//! - Default disk and output directory
//! - Default file type filter
//! - Size cap for files without a footer
//! - Log level

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::carve::DEFAULT_MAX_UNTERMINATED_SIZE;

/// sector-drill configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Scan settings
    pub scan: ScanConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Disk or image to scan when `--disk` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<PathBuf>,
    /// Default type filter (tag, category or "all")
    pub file_type: String,
    /// Where recovered files are written
    pub output_dir: PathBuf,
    /// Footer-less files are closed after this many bytes
    pub max_unterminated_size: usize,
    /// Show a progress bar while scanning
    pub progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            disk: None,
            file_type: "all".to_string(),
            output_dir: PathBuf::from("recovered"),
            max_unterminated_size: DEFAULT_MAX_UNTERMINATED_SIZE,
            progress: true,
        }
    }
}

impl Config {
    /// Load config from the default path. Runs before logging is set up, so
    /// a broken file is handed back for the caller to report.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default(&Self::default_path())
    }

    /// Missing file: defaults. Unreadable or invalid file: defaults plus the
    /// reason it was ignored.
    pub fn load_or_default(path: &Path) -> (Self, Option<anyhow::Error>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "sector-drill", "sector-drill")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".sector-drill")
                    .join("config.toml")
            })
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    r#"# sector-drill configuration
# Location: ~/.config/sector-drill/config.toml (or %APPDATA%\sector-drill\config.toml on Windows)

[general]
# Log level for diagnostics on stderr: trace, debug, info, warn, error
log_level = "warn"

[scan]
# Disk or image to scan when --disk is not given.
# Without it the disk is guessed from the environment (/dev/sda, /dev/disk0, C:\, /mnt/c).
# disk = "/dev/sdb"

# File type to recover: a tag ("pdf", "jpg"), a category
# ("images", "documents", "video", "audio", "archives") or "all"
file_type = "all"

# Directory recovered files are written to
output_dir = "recovered"

# Files without a footer (bmp, zip, mp4, ...) are cut off after this many bytes
max_unterminated_size = 1000000

# Show a progress bar while scanning
progress = true
"#
    .to_string()
}
