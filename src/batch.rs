use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::analysis;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::report;
use crate::subject;

/// Outcome counts of one cohort run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CohortSummary {
    pub discovered: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Every directory under `root` holding a diffusion-coefficient map, in path order.
pub fn discover_subjects(root: &Path) -> Vec<PathBuf> {
    let dirs: BTreeSet<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map_or(false, subject::is_subject_marker)
        })
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .collect();
    dirs.into_iter().collect()
}

/// Analyses every subject below `root` one after the other; a failing subject never stops the run.
pub fn process_root(root: &Path, config: &AnalysisConfig) -> Result<CohortSummary> {
    if !root.is_dir() {
        bail!("Root directory {:?} does not exist or is not a directory", root);
    }
    if let Some(dir) = &config.output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    info!(root = %root.display(), "starting analysis");
    let subjects = discover_subjects(root);
    info!(count = subjects.len(), "found subject directories");

    let mut summary = CohortSummary {
        discovered: subjects.len(),
        ..CohortSummary::default()
    };

    for dir in &subjects {
        match process_subject(dir, config) {
            Ok(paths) => {
                summary.processed += 1;
                info!(subject = %dir.display(), outputs = paths.all().len(), "subject done");
            }
            Err(err @ AnalysisError::MissingInputs { .. }) => {
                summary.skipped += 1;
                warn!("{err}");
            }
            Err(err) => {
                summary.failed += 1;
                error!(subject = %dir.display(), "{:#}", anyhow::Error::new(err));
            }
        }
    }

    Ok(summary)
}

fn process_subject(dir: &Path, config: &AnalysisConfig) -> Result<report::ReportPaths, AnalysisError> {
    let results = analysis::analyze_subject(dir, config)?;
    report::write_results(&results, config.output_dir_for(dir))
}
