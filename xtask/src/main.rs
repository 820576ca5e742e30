// Licensed under the Apache-2.0 license

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod deps;
mod fetch;
mod logs;
mod run;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Xtask {
    #[command(subcommand)]
    xtask: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the test host has the tools the suites depend on
    CheckDeps,
    /// Run the HIL suites against a configured DUT
    Run {
        /// Path to the suite TOML config
        #[arg(long)]
        config: PathBuf,

        /// Only run tests whose names match this filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Download an OS image through the cloud API
    FetchOs {
        /// Path to the suite TOML config
        #[arg(long)]
        config: PathBuf,

        /// Version to download. Default: the configured base version
        #[arg(long)]
        version: Option<String>,

        /// Directory to download into. Default: <tmpdir>/images
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Pull the DUT journal and bundle collected artifacts into a zip
    ArchiveLogs {
        /// Path to the suite TOML config
        #[arg(long)]
        config: PathBuf,

        /// Zip to write. Default: artifacts-<timestamp>.zip
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init();
    let cli = Xtask::parse();
    let result = match &cli.xtask {
        Commands::CheckDeps => deps::check_host_dependencies(),
        Commands::Run { config, filter } => run::run_suite(config, filter.as_deref()),
        Commands::FetchOs {
            config,
            version,
            dest,
        } => fetch::fetch_os(config, version.as_deref(), dest.as_deref()),
        Commands::ArchiveLogs { config, output } => logs::archive_logs(config, output.as_deref()),
    };
    result.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    });
}
