//! Platform adapters: default disk path and partition listing.
//!
//! Everything that depends on the host OS or its environment variables lives
//! here, behind [`EnvProbe`], so the carving engine never consults the
//! environment itself.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Source of environment facts
pub trait EnvProbe {
    /// Value of an environment variable, `None` when unset or empty
    fn var(&self, key: &str) -> Option<String>;

    /// Operating system name as in `std::env::consts::OS`
    fn os(&self) -> &str;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl EnvProbe for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn os(&self) -> &str {
        std::env::consts::OS
    }
}

fn is_windows(probe: &impl EnvProbe) -> bool {
    probe.var("OS").as_deref() == Some("Windows_NT")
}

/// Best-guess disk to scan when none was configured. This does not detect
/// the boot device.
pub fn default_disk_path(probe: &impl EnvProbe) -> PathBuf {
    let path = if probe.var("WSL_DISTRO_NAME").is_some() {
        "/mnt/c"
    } else if is_windows(probe) {
        "C:\\"
    } else if probe.var("XDG_SESSION_TYPE").is_some() {
        "/dev/sda"
    } else if probe.os() == "macos" {
        "/dev/disk0"
    } else {
        "/dev/sda"
    };
    PathBuf::from(path)
}

/// Inventory command for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionTool {
    Wmic,
    Diskutil,
    Lsblk,
}

impl PartitionTool {
    pub fn detect(probe: &impl EnvProbe) -> Self {
        if is_windows(probe) {
            PartitionTool::Wmic
        } else if probe.os() == "macos" {
            PartitionTool::Diskutil
        } else {
            PartitionTool::Lsblk
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            PartitionTool::Wmic => "wmic",
            PartitionTool::Diskutil => "diskutil",
            PartitionTool::Lsblk => "lsblk",
        }
    }

    pub fn args(&self) -> &'static [&'static str] {
        match self {
            PartitionTool::Wmic => &[
                "logicaldisk",
                "get",
                "DeviceID,VolumeName,FileSystem,Size,FreeSpace",
            ],
            PartitionTool::Diskutil => &["list"],
            PartitionTool::Lsblk => &["-o", "NAME,SIZE,FSTYPE,MOUNTPOINT"],
        }
    }
}

/// Run the host's partition inventory tool and return its output verbatim
pub fn list_partitions(disk: &Path, probe: &impl EnvProbe) -> Result<String> {
    if !disk.exists() {
        return Err(Error::DiskNotFound(disk.to_path_buf()));
    }

    let tool = PartitionTool::detect(probe);
    tracing::debug!(disk = %disk.display(), program = tool.program(), "Listing partitions");
    run_tool(tool.program(), tool.args())
}

fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::PartitionTool {
            program: program.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::PartitionTool {
            program: program.to_string(),
            message: format!("{} {}", output.status, stderr.trim()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
