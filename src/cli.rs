//
// cli.rs
// Dti-Lesion-Stats-rs
//
// Defines the CLI surface with Clap, sets up logging and hands the root directory to the cohort driver.
//

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::batch;
use crate::config::AnalysisConfig;
use crate::stats::DEFAULT_MIN_VOXELS;

/// Command-line interface: one root directory plus a few tuning knobs.
#[derive(Parser, Debug)]
#[command(name = "dti-lesion-stats")]
#[command(
    about = "DTI lesion, atlas ROI and contrast-to-noise statistics for a cohort of subjects",
    long_about = None
)]
pub struct Cli {
    /// Root folder, scanned recursively for subject directories
    pub root: PathBuf,

    /// Minimum mask size (voxels) for a mean/std to be reported
    #[arg(long, default_value_t = DEFAULT_MIN_VOXELS)]
    pub min_voxels: usize,

    /// Write reports here instead of next to each subject's inputs
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// More diagnostics (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn config(&self) -> AnalysisConfig {
        AnalysisConfig {
            min_voxels: self.min_voxels,
            output_dir: self.output_dir.clone(),
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    // Clap exits with the usage text (non-zero status) when the root argument is missing.
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let summary = batch::process_root(&cli.root, &cli.config())?;
    info!(
        discovered = summary.discovered,
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        "analysis finished"
    );

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A subscriber may already be installed when embedded (tests); keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
