//! Terminal output - status lines, progress bar and report rendering

use std::io::{self, Write};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::carve::{CarveProgress, CarveResult, Category, SignatureRegistry, StopReason};
use crate::inspect::FileMetadata;

/// Status indicators
pub struct StatusIcons;

impl StatusIcons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const SCAN: &'static str = "🔍";
}

const HEADER_WIDTH: usize = 60;

/// Left padding that centers `title` in a header line
fn header_padding(title: &str) -> usize {
    HEADER_WIDTH.saturating_sub(title.chars().count() + 4) / 2
}

/// Print a styled header
pub fn print_header(title: &str) {
    let width = HEADER_WIDTH;
    let padding = header_padding(title);

    println!();
    println!("{}", "═".repeat(width).cyan());
    println!("{}  {}", " ".repeat(padding), title.bright_white().bold());
    println!("{}", "═".repeat(width).cyan());
    println!();
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {}: {}", key.bright_black(), value.white());
}

pub fn print_success(msg: &str) {
    println!("{} {}", StatusIcons::SUCCESS.green(), msg.green());
}

pub fn write_success<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    writeln!(out, "{} {}", StatusIcons::SUCCESS.green(), msg.green())
}

pub fn write_info<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    writeln!(out, "{} {}", StatusIcons::INFO.cyan(), msg.cyan())
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", StatusIcons::ERROR.red(), msg.red());
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", StatusIcons::WARNING.yellow(), msg.yellow());
}

pub fn print_info(msg: &str) {
    println!("{} {}", StatusIcons::INFO.cyan(), msg.cyan());
}

fn bytes(n: u64) -> String {
    humansize::format_size(n, humansize::BINARY)
}

/// Render carve progress events on a progress bar. Lines about individual
/// files are printed above the bar.
pub struct ScanProgressView {
    bar: ProgressBar,
    quiet: bool,
}

impl ScanProgressView {
    /// `show_bar` controls the bar; `quiet` also suppresses per-file lines
    pub fn new(total_bytes: Option<u64>, show_bar: bool, quiet: bool) -> Self {
        let bar = if !show_bar || quiet {
            ProgressBar::hidden()
        } else if let Some(total) = total_bytes {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            bar
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} [{elapsed_precise}] {bytes} scanned ({bytes_per_sec}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };

        Self { bar, quiet }
    }

    fn line(&self, msg: String) {
        if self.quiet {
            return;
        }
        if self.bar.is_hidden() {
            println!("{}", msg);
        } else {
            self.bar.println(msg);
        }
    }

    pub fn handle(&self, event: CarveProgress) {
        match event {
            CarveProgress::Scanning { bytes_scanned, .. } => {
                self.bar.set_position(bytes_scanned);
            }
            CarveProgress::HeaderFound { tag, block } => {
                self.line(format!(
                    "{} Found {} header at block {}, starting recovery...",
                    StatusIcons::SCAN,
                    tag.bright_white().bold(),
                    block
                ));
            }
            CarveProgress::Recovered(file) => {
                self.line(format!(
                    "{} Recovered {} ({})",
                    StatusIcons::SUCCESS.green(),
                    file.path.display().to_string().green(),
                    bytes(file.size)
                ));
            }
            CarveProgress::Failed { tag, error } => {
                self.line(format!(
                    "{} Failed to save recovered {} file: {}",
                    StatusIcons::ERROR.red(),
                    tag,
                    error.red()
                ));
            }
            CarveProgress::Done => self.bar.finish_and_clear(),
        }
    }
}

/// Human-readable carve summary
pub fn print_carve_summary(result: &CarveResult) {
    print_header("Scan Summary");
    print_kv("File type", &result.filter);
    print_kv(
        "Scanned",
        &format!("{} ({} blocks)", bytes(result.bytes_scanned), result.blocks_scanned),
    );
    print_kv("Headers found", &result.headers_found.to_string());
    print_kv("Files recovered", &result.files_recovered.to_string());
    print_kv("Bytes recovered", &bytes(result.total_bytes_recovered));
    print_kv(
        "Duration",
        &humantime::format_duration(Duration::from_millis(result.duration_ms)).to_string(),
    );

    if !result.by_type.is_empty() {
        println!();
        for (tag, count) in &result.by_type {
            println!("    {:<6} {}", tag.bright_white(), count);
        }
    }
    println!();

    if result.files_failed > 0 {
        print_warning(&format!("{} file(s) could not be saved", result.files_failed));
    }
    if result.extents_dropped > 0 {
        print_warning(&format!(
            "Input ended inside a file; {} of unterminated data was discarded",
            bytes(result.bytes_dropped)
        ));
    }
    if let StopReason::ReadError(msg) = &result.stop_reason {
        print_warning(&format!(
            "Scan stopped early after a read error at {}: {}",
            bytes(result.bytes_scanned),
            msg
        ));
    }
    if result.files_recovered > 0 {
        print_success(&format!("{} file(s) recovered", result.files_recovered));
    } else {
        print_info("No files recovered");
    }
}

pub fn print_metadata(meta: &FileMetadata) {
    print_success(&format!("Metadata for: {}", meta.path.display()));
    print_kv("Size", &format!("{} ({} bytes)", bytes(meta.size), meta.size));
    print_kv(
        "Last Modified",
        &meta
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S %z").to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    );
    print_kv(
        "Inode",
        &meta
            .inode
            .map(|i| i.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
    );
}

/// Table of the signature registry, grouped by category
pub fn print_signatures(registry: &SignatureRegistry) {
    for category in Category::ALL {
        println!("\n{} {}", "▶".bright_cyan(), category.label().bright_white());
        for entry in registry.all().iter().filter(|e| e.category == category) {
            let footer = entry
                .footer
                .map(hex::encode_upper)
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<6} {:<14} {}",
                entry.tag.bright_white(),
                hex::encode_upper(entry.header),
                footer.bright_black()
            );
        }
    }
    println!();
}
