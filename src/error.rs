//
// error.rs
// Dti-Lesion-Stats-rs
//
// Typed failures raised while discovering, loading, resampling and reporting a subject's volumes.
//

use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort the analysis of a single subject (never the whole cohort).
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("missing required files in {}: {}", dir.display(), missing.join(", "))]
    MissingInputs { dir: PathBuf, missing: Vec<String> },

    #[error("failed to read volume {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },

    #[error("failed to list directory {}", dir.display())]
    ListDirectory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Reasons the resampling adapter could not produce an array on the reference grid.
#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("rank mismatch: image has {image} axes, reference has {reference}")]
    RankMismatch { image: usize, reference: usize },

    #[error("cannot resample an empty image of shape {0:?}")]
    EmptyImage(Vec<usize>),

    #[error("image voxel-to-world transform is not invertible")]
    SingularAffine,
}
