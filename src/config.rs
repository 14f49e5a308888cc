//
// config.rs
// Dti-Lesion-Stats-rs
//
// Run-wide settings assembled by the CLI and passed down to the cohort driver and analyzer.
//

use std::path::{Path, PathBuf};

use crate::stats::DEFAULT_MIN_VOXELS;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Masks with fewer voxels than this produce undefined statistics.
    pub min_voxels: usize,
    /// Where reports go; `None` writes them next to each subject's inputs.
    pub output_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_voxels: DEFAULT_MIN_VOXELS,
            output_dir: None,
        }
    }
}

impl AnalysisConfig {
    pub fn output_dir_for<'a>(&'a self, subject_dir: &'a Path) -> &'a Path {
        self.output_dir.as_deref().unwrap_or(subject_dir)
    }
}
