//! CLI module - Command line interface definitions and handlers

pub mod output;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::carve::{CarveOptions, Carver, Recoverer, SignatureRegistry, TypeFilter};
use crate::config::{generate_sample_config, Config};
use crate::platform::{default_disk_path, list_partitions, EnvProbe, SystemEnv};
use crate::{inspect, Error};

/// sector-drill - Signature-based file carving for raw disks and images
///
/// Scans a block device or disk image sector by sector for known file
/// headers and footers and writes every file it can delimit to the output
/// directory. Filesystem metadata is never consulted.
#[derive(Parser, Debug)]
#[command(name = "sector-drill")]
#[command(version)]
#[command(about = "Recover deleted files from raw disks by signature carving", long_about = None)]
pub struct Cli {
    /// File type to recover: a tag (pdf, jpg, zip, ...), a category
    /// (images, documents, video, audio, archives) or "all"
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub file_type: Option<String>,

    /// Disk or image to scan (e.g. /dev/sda, /dev/disk0, C:\, disk.img)
    #[arg(long, short)]
    pub disk: Option<PathBuf>,

    /// Display size, modification time and inode of a file
    #[arg(long, short, value_name = "PATH")]
    pub info: Option<PathBuf>,

    /// List partitions before scanning
    #[arg(long, short)]
    pub partitions: bool,

    /// Output directory for recovered files (default: ./recovered)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Scan and report without writing any files
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Print the known file signatures and exit
    #[arg(long)]
    pub list_types: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub sample_config: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "human")]
    pub report: ReportFormat,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose diagnostics on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human readable (default)
    #[default]
    Human,
    /// JSON summary on stdout
    Json,
}

impl Cli {
    /// The scan runs when a type was asked for, or when nothing else was
    pub fn should_scan(&self) -> bool {
        self.file_type.is_some() || (self.info.is_none() && !self.partitions)
    }

    /// Disk from the command line, then the config file, then the environment
    pub fn resolve_disk(&self, config: &Config, probe: &impl EnvProbe) -> PathBuf {
        self.disk
            .clone()
            .or_else(|| config.scan.disk.clone())
            .unwrap_or_else(|| default_disk_path(probe))
    }

    pub fn resolve_filter(&self, config: &Config) -> TypeFilter {
        TypeFilter::parse(self.file_type.as_deref().unwrap_or(&config.scan.file_type))
    }

    /// Level for the crate's own diagnostics when `RUST_LOG` is unset
    pub fn log_level<'a>(&self, config: &'a Config) -> &'a str {
        if self.verbose {
            "debug"
        } else if self.json() {
            "warn"
        } else {
            &config.general.log_level
        }
    }

    fn json(&self) -> bool {
        self.report == ReportFormat::Json
    }
}

/// Message shown when the default config file had to be ignored
pub fn config_warning(problem: &anyhow::Error) -> String {
    format!("Ignoring config file, using defaults: {:#}", problem)
}

/// Run partitions, metadata and scan in that order. Failures of one step are
/// reported and the next step still runs.
pub fn run(cli: &Cli, config: &Config) -> Result<()> {
    if cli.sample_config {
        print!("{}", generate_sample_config());
        return Ok(());
    }

    let registry = SignatureRegistry::builtin();
    if cli.list_types {
        output::print_signatures(&registry);
        return Ok(());
    }

    let probe = SystemEnv;
    let disk = cli.resolve_disk(config, &probe);

    if cli.partitions {
        run_partitions(&disk, &probe, cli.json());
    }

    if let Some(path) = &cli.info {
        run_info(path, cli.json())?;
    }

    if cli.should_scan() {
        run_scan(cli, config, &registry, &disk)?;
    }

    Ok(())
}

/// Partition tools print free text, so with a JSON report it goes to stderr
/// and stdout stays parseable.
fn run_partitions(disk: &Path, probe: &impl EnvProbe, json: bool) {
    let listing = list_partitions(disk, probe);
    let written = if json {
        write_partitions(&mut io::stderr().lock(), disk, &listing)
    } else {
        write_partitions(&mut io::stdout().lock(), disk, &listing)
    };
    if let Err(e) = written {
        tracing::debug!(error = %e, "Could not print partition listing");
    }
    if let Err(e) = listing {
        output::print_error(&format!("Error scanning partitions: {}", e));
    }
}

fn write_partitions<W: Write>(
    out: &mut W,
    disk: &Path,
    listing: &crate::Result<String>,
) -> io::Result<()> {
    output::write_info(out, &format!("Listing partitions on disk: {}", disk.display()))?;
    if let Ok(report) = listing {
        output::write_success(out, "Detected partitions:")?;
        writeln!(out, "{}", report)?;
    }
    Ok(())
}

fn run_info(path: &Path, json: bool) -> Result<()> {
    match inspect::describe(path) {
        Ok(meta) if json => println!("{}", serde_json::to_string_pretty(&meta)?),
        Ok(meta) => output::print_metadata(&meta),
        Err(e) => output::print_error(&e.to_string()),
    }
    Ok(())
}

fn run_scan(cli: &Cli, config: &Config, registry: &SignatureRegistry, disk: &Path) -> Result<()> {
    let filter = cli.resolve_filter(config);
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| config.scan.output_dir.clone());

    let selection = registry.select(&filter);
    if selection.unknown {
        output::print_warning(&format!(
            "Unknown file type '{}': nothing will be recovered (see --list-types)",
            filter
        ));
    }

    if !cli.json() {
        output::print_info(&format!("Scanning {} for deleted files...", disk.display()));
        output::print_info(&format!("Starting recovery for file type: {}", filter));
    }

    let carver = Carver::new(
        registry,
        CarveOptions {
            filter,
            max_unterminated_size: config.scan.max_unterminated_size,
        },
    );
    let mut recoverer = Recoverer::for_run(output_dir).dry_run(cli.dry_run);

    let total_bytes = std::fs::metadata(disk)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len());
    let view = output::ScanProgressView::new(
        total_bytes,
        config.scan.progress && !cli.no_progress,
        cli.json(),
    );

    match carver.carve_path(disk, &mut recoverer, |event| view.handle(event)) {
        Ok(result) if cli.json() => println!("{}", serde_json::to_string_pretty(&result)?),
        Ok(result) => output::print_carve_summary(&result),
        Err(e @ Error::Open { .. }) => output::print_error(&format!("Failed to open disk: {}", e)),
        Err(e) => output::print_error(&e.to_string()),
    }

    Ok(())
}
