use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use shpidx::build::{self, BuildError, ShapefileBackend};
use shpidx::index::stats;
use shpidx::output::{ConsoleReporter, print_error};
use shpidx::utils::AppConfig;
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shpidx", version)]
#[command(about = "Build on-disk spatial indexes for shapefiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index for a shapefile or a directory of shapefiles
    Build {
        /// Source .shp file or directory
        #[arg(short, long)]
        source: PathBuf,

        /// Output index file or directory (defaults to the source directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace existing indexes
        #[arg(short = 'w', long)]
        overwrite: bool,
    },
    /// Show index statistics
    Info {
        /// Index file (.idx)
        index: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the files of an index
    Remove {
        /// Index file (.idx)
        index: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            source,
            output,
            overwrite,
        } => run_build(source, output, overwrite)?,
        Commands::Info { index, json } => {
            stats::show_stats(&index, json)?;
        }
        Commands::Remove { index } => {
            let removed = build::remove_index_files(&index)
                .with_context(|| format!("Failed to remove index {}", index.display()))?;
            if removed.is_empty() {
                println!("No index files found for: {}", index.display());
            }
            for path in removed {
                println!("Removed: {}", path.display());
            }
        }
    }

    Ok(())
}

fn run_build(source: PathBuf, output: Option<PathBuf>, overwrite: bool) -> Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("ignoring config: {:#}", e);
        AppConfig::default()
    });

    let backend = ShapefileBackend::new(config.cache_pages);
    let mut reporter = ConsoleReporter::new(std::io::stdout().is_terminal(), config.progress);

    let report = match build::build(&backend, &source, output.as_deref(), overwrite, &mut reporter) {
        Ok(report) => report,
        Err(BuildError::SourceNotFound(_)) => {
            print_error("Source file not exists.");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Build failed"),
    };

    if !report.is_success() {
        bail!(
            "{} of {} index builds failed",
            report.failed(),
            report.jobs.len()
        );
    }
    Ok(())
}
