//
// subject.rs
// Dti-Lesion-Stats-rs
//
// Names the per-subject input files and resolves them inside a subject directory.
//

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::AnalysisError;

pub const LESIONS_STEM: &str = "lesions_in_dwi";
pub const DC_STEM: &str = "dti_DC_fsl";
pub const FA_STEM: &str = "dti_FA";
pub const MD_STEM: &str = "dti_MD";
pub const ATLAS_STEM: &str = "HO_atlas_in_dwi";
/// FLAIR images carry a subject-specific prefix, so only the suffix is fixed.
pub const FLAIR_SUFFIX: &str = "flair_to_dwi_Warped";

/// Accepted NIfTI extensions, in order of preference.
pub const NIFTI_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// Intensity channels summarised inside lesions, ROIs and normal tissue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricRole {
    Dc,
    Fa,
    Md,
    Flair,
}

impl MetricRole {
    pub const ALL: [MetricRole; 4] = [
        MetricRole::Dc,
        MetricRole::Fa,
        MetricRole::Md,
        MetricRole::Flair,
    ];

    /// Column prefix used in the CSV reports.
    pub fn key(self) -> &'static str {
        match self {
            MetricRole::Dc => "dc",
            MetricRole::Fa => "fa",
            MetricRole::Md => "md",
            MetricRole::Flair => "flair",
        }
    }

    /// Diffusion maps define the brain extent for the normal-tissue mask; FLAIR does not.
    pub fn is_diffusion(self) -> bool {
        match self {
            MetricRole::Dc | MetricRole::Fa | MetricRole::Md => true,
            MetricRole::Flair => false,
        }
    }
}

impl fmt::Display for MetricRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Files making up one subject. Everything except FLAIR is mandatory.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRecord {
    pub name: String,
    pub dir: PathBuf,
    pub lesions: PathBuf,
    pub atlas: PathBuf,
    pub dc: PathBuf,
    pub fa: PathBuf,
    pub md: PathBuf,
    pub flair: Option<PathBuf>,
}

impl SubjectRecord {
    /// Resolves every role inside `dir`; fails listing all the required files that are absent.
    pub fn discover(dir: &Path) -> Result<Self, AnalysisError> {
        let mut missing = Vec::new();
        let mut require = |stem: &str| {
            let found = find_volume(dir, stem);
            if found.is_none() {
                missing.push(format!("{stem}{}", NIFTI_EXTENSIONS[0]));
            }
            found
        };

        let lesions = require(LESIONS_STEM);
        let dc = require(DC_STEM);
        let fa = require(FA_STEM);
        let md = require(MD_STEM);
        let atlas = require(ATLAS_STEM);

        let (Some(lesions), Some(dc), Some(fa), Some(md), Some(atlas)) = (lesions, dc, fa, md, atlas)
        else {
            return Err(AnalysisError::MissingInputs {
                dir: dir.to_path_buf(),
                missing,
            });
        };

        let flair = find_flair(dir)?;
        match &flair {
            Some(path) => info!(flair = %path.display(), "FLAIR image found"),
            None => debug!("no FLAIR image, continuing with diffusion metrics only"),
        }

        Ok(Self {
            name: subject_name(dir),
            dir: dir.to_path_buf(),
            lesions,
            atlas,
            dc,
            fa,
            md,
            flair,
        })
    }

    pub fn metric_path(&self, role: MetricRole) -> Option<&Path> {
        match role {
            MetricRole::Dc => Some(&self.dc),
            MetricRole::Fa => Some(&self.fa),
            MetricRole::Md => Some(&self.md),
            MetricRole::Flair => self.flair.as_deref(),
        }
    }
}

/// A directory is a subject when it holds the diffusion-coefficient map.
pub fn is_subject_marker(file_name: &str) -> bool {
    NIFTI_EXTENSIONS
        .iter()
        .any(|ext| file_name.strip_suffix(ext) == Some(DC_STEM))
}

/// Subject identifier used in report file names: the directory's last component.
pub fn subject_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn find_volume(dir: &Path, stem: &str) -> Option<PathBuf> {
    NIFTI_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}{ext}")))
        .find(|path| path.is_file())
}

fn find_flair(dir: &Path) -> Result<Option<PathBuf>, AnalysisError> {
    let entries = fs::read_dir(dir).map_err(|source| AnalysisError::ListDirectory {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| {
                    NIFTI_EXTENSIONS
                        .iter()
                        .any(|ext| name.ends_with(&format!("{FLAIR_SUFFIX}{ext}")))
                })
        })
        .collect();
    candidates.sort();

    if candidates.len() > 1 {
        debug!(count = candidates.len(), "several FLAIR candidates, using the first");
    }
    Ok(candidates.into_iter().next())
}
