//! sector-drill - Signature-based file carving for raw disks and images
//!
//! Lists partitions, prints file metadata and carves deleted files out of a
//! block device or disk image by their header and footer bytes.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sector_drill::cli::{self, output, Cli};
use sector_drill::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_problem) = match &cli.config {
        Some(path) => (Config::load_from(path)?, None),
        None => Config::load(),
    };

    // RUST_LOG wins when set; diagnostics go to stderr so stdout carries only results
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("sector_drill={}", cli.log_level(&config)))
    })?;
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .init();

    if let Some(problem) = config_problem {
        output::print_warning(&cli::config_warning(&problem));
    }

    cli::run(&cli, &config)
}
