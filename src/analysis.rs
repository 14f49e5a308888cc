//
// analysis.rs
// Dti-Lesion-Stats-rs
//
// Per-subject pipeline: load the volumes, then measure lesions, atlas ROIs and lesion contrast.
//

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ndarray::Zip;
use tracing::{debug, info, info_span, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ResampleError};
use crate::models::{AtlasLabel, LesionMetrics, LesionOverlap, ResultSet, RoiMetrics};
use crate::resample;
use crate::stats::{finite, masked_stats, MaskedStats};
use crate::subject::{subject_name, MetricRole, SubjectRecord};
use crate::volume::{Grid, Mask, Volume};

/// The loaded inputs of one subject; dropped as soon as the subject is done.
#[derive(Debug, Clone)]
pub struct SubjectVolumes {
    pub lesions: Volume,
    pub atlas: Volume,
    pub dc: Volume,
    pub fa: Volume,
    pub md: Volume,
    pub flair: Option<Volume>,
}

impl SubjectVolumes {
    pub fn load(record: &SubjectRecord) -> Result<Self, AnalysisError> {
        let flair = record
            .metric_path(MetricRole::Flair)
            .map(|path| load_role(MetricRole::Flair.key(), path))
            .transpose()?;

        Ok(Self {
            lesions: load_role("lesions", &record.lesions)?,
            atlas: load_role("atlas", &record.atlas)?,
            dc: load_role("dc", &record.dc)?,
            fa: load_role("fa", &record.fa)?,
            md: load_role("md", &record.md)?,
            flair,
        })
    }

    pub fn metric(&self, role: MetricRole) -> Option<&Volume> {
        match role {
            MetricRole::Dc => Some(&self.dc),
            MetricRole::Fa => Some(&self.fa),
            MetricRole::Md => Some(&self.md),
            MetricRole::Flair => self.flair.as_ref(),
        }
    }

    /// Available metrics in report order.
    pub fn metrics(&self) -> Vec<(MetricRole, &Volume)> {
        MetricRole::ALL
            .into_iter()
            .filter_map(|role| self.metric(role).map(|volume| (role, volume)))
            .collect()
    }
}

fn load_role(role: &str, path: &Path) -> Result<Volume, AnalysisError> {
    let volume = Volume::load(path)?;
    info!(role, file = %volume.label(), shape = ?volume.shape(), "loaded");
    Ok(volume)
}

/// Discovers, loads and analyses the subject stored in `dir`.
pub fn analyze_subject(dir: &Path, config: &AnalysisConfig) -> Result<ResultSet, AnalysisError> {
    let span = info_span!("subject", subject = %subject_name(dir));
    let _guard = span.enter();

    info!(dir = %dir.display(), "processing subject");
    let record = SubjectRecord::discover(dir)?;
    let volumes = SubjectVolumes::load(&record)?;
    Ok(analyze_volumes(&record.name, &volumes, config.min_voxels))
}

/// Runs every measurement on already loaded volumes.
pub fn analyze_volumes(subject: &str, volumes: &SubjectVolumes, min_voxels: usize) -> ResultSet {
    let lesion_mask = volumes.lesions.mask_where(|v| v > 0.0);

    info!("calculating metrics in lesion areas");
    let lesion = lesion_metrics(volumes, &lesion_mask, min_voxels);

    info!("calculating metrics in atlas ROIs");
    let atlas = atlas_metrics(volumes, &lesion_mask, min_voxels);

    info!("calculating contrast-to-noise ratios");
    let normal = normal_tissue_mask(volumes, &lesion_mask);
    let cnr = cnr_metrics(volumes, &lesion, normal.as_ref(), min_voxels);

    ResultSet {
        subject: subject.to_string(),
        metrics: volumes.metrics().into_iter().map(|(role, _)| role).collect(),
        lesion,
        atlas,
        cnr,
    }
}

/// Lesion burden (voxels and mm³) and every metric summarised inside the lesion mask.
pub fn lesion_metrics(
    volumes: &SubjectVolumes,
    lesion_mask: &Mask,
    min_voxels: usize,
) -> LesionMetrics {
    let volume_voxels = lesion_mask.count();
    let volume_mm3 = volume_voxels as f64 * volumes.lesions.grid().voxel_volume();
    info!(volume_voxels, volume_mm3, "lesion volume");

    let stats = volumes
        .metrics()
        .into_iter()
        .map(|(role, volume)| (role, masked_stats(volume, lesion_mask, min_voxels)))
        .collect();

    LesionMetrics {
        volume_voxels,
        volume_mm3,
        stats,
    }
}

/// Atlas value interpreted as a region label: any finite value above zero, taken exactly.
pub fn label_of(value: f64) -> Option<AtlasLabel> {
    AtlasLabel::new(value)
}

/// Distinct region labels present in the atlas, ascending.
pub fn atlas_labels(atlas: &Volume) -> BTreeSet<AtlasLabel> {
    atlas.data().iter().filter_map(|&v| label_of(v)).collect()
}

/// Per-ROI metric statistics and lesion overlap for every label found in the atlas.
///
/// ROI masks select voxels equal to the label value. The overlap is counted on the atlas grid,
/// so `volume_mm3` uses the atlas voxel volume, not the lesion one.
pub fn atlas_metrics(
    volumes: &SubjectVolumes,
    lesion_mask: &Mask,
    min_voxels: usize,
) -> BTreeMap<AtlasLabel, RoiMetrics> {
    let atlas = &volumes.atlas;
    let grid = atlas.grid();
    let labels = atlas.data().mapv(label_of);
    let distinct = atlas_labels(atlas);
    info!(rois = distinct.len(), "atlas labels discovered");
    warn_shared_names(&distinct);

    // Metrics are brought onto the atlas grid once instead of once per ROI.
    let aligned: Vec<(MetricRole, Option<Cow<'_, Volume>>)> = volumes
        .metrics()
        .into_iter()
        .map(|(role, volume)| match resample::align(volume, grid) {
            Ok(aligned) => (role, Some(aligned)),
            Err(err) => {
                warn!(metric = %role, error = %err, "could not resample metric onto atlas grid");
                (role, None)
            }
        })
        .collect();

    let lesion_on_atlas = match mask_on_grid(lesion_mask, grid, |v| v >= 0.5) {
        Ok(mask) => Some(mask),
        Err(err) => {
            warn!(error = %err, "could not resample lesion mask onto atlas grid, overlap undefined");
            None
        }
    };
    let voxel_volume = grid.voxel_volume();

    distinct
        .into_iter()
        .map(|label| {
            let roi = Mask::from_parts(labels.mapv(|l| l == Some(label)), grid);

            let stats = aligned
                .iter()
                .map(|(role, volume)| {
                    let stats = volume
                        .as_deref()
                        .map_or(MaskedStats::UNDEFINED, |v| masked_stats(v, &roi, min_voxels));
                    (*role, stats)
                })
                .collect();

            let overlap = lesion_on_atlas
                .as_ref()
                .map(|lesion| {
                    let voxels = roi.intersection_count(lesion);
                    LesionOverlap {
                        voxels: Some(voxels),
                        volume_mm3: Some(voxels as f64 * voxel_volume),
                    }
                })
                .unwrap_or_default();

            debug!(roi = %label, voxels = roi.count(), overlap = ?overlap.voxels, "roi measured");
            (
                label,
                RoiMetrics {
                    label,
                    stats,
                    overlap,
                },
            )
        })
        .collect()
}

/// Non-integer labels are kept apart, but their report names can collide.
fn warn_shared_names(labels: &BTreeSet<AtlasLabel>) {
    let mut by_name: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for label in labels {
        by_name.entry(label.name()).or_default().push(label.value());
    }
    for (name, values) in by_name.iter().filter(|(_, values)| values.len() > 1) {
        warn!(roi = %name, ?values, "distinct atlas values share a report name, one row each");
    }
}

/// Brain voxels (any diffusion map is not NaN) outside the lesion, on the FA grid.
///
/// The mask is shared by all metrics: a voxel that is NaN in one map but not in another stays in.
pub fn normal_tissue_mask(volumes: &SubjectVolumes, lesion_mask: &Mask) -> Option<Mask> {
    let reference = volumes.fa.grid();
    let mut normal = Mask::empty_like(reference);

    for (role, volume) in volumes.metrics() {
        if !role.is_diffusion() {
            continue;
        }
        match resample::align(volume, reference) {
            Ok(aligned) => {
                Zip::from(normal.data_mut())
                    .and(aligned.data())
                    .for_each(|brain, &v| *brain |= !v.is_nan());
            }
            Err(err) => {
                warn!(metric = %role, error = %err, "metric left out of the brain mask");
            }
        }
    }

    // Any lesion partial volume after resampling is excluded from normal tissue.
    let lesion = match mask_on_grid(lesion_mask, reference, |v| v > 0.0) {
        Ok(lesion) => lesion,
        Err(err) => {
            warn!(error = %err, "could not resample lesion mask onto FA grid, CNR undefined");
            return None;
        }
    };
    Zip::from(normal.data_mut())
        .and(lesion.data())
        .for_each(|brain, &in_lesion| *brain = *brain && !in_lesion);

    debug!(voxels = normal.count(), "normal tissue mask");
    Some(normal)
}

/// CNR per metric, undefined when the normal-tissue mask or any input statistic is unavailable.
pub fn cnr_metrics(
    volumes: &SubjectVolumes,
    lesion: &LesionMetrics,
    normal: Option<&Mask>,
    min_voxels: usize,
) -> BTreeMap<MetricRole, Option<f64>> {
    volumes
        .metrics()
        .into_iter()
        .map(|(role, volume)| {
            let lesion_mean = lesion.stats.get(&role).and_then(|stats| stats.mean);
            let normal_stats = normal.map_or(MaskedStats::UNDEFINED, |mask| {
                masked_stats(volume, mask, min_voxels)
            });
            let cnr = contrast_to_noise(lesion_mean, normal_stats);
            match cnr {
                Some(value) => info!(metric = %role, cnr = value, "contrast-to-noise ratio"),
                None => warn!(metric = %role, "contrast-to-noise ratio undefined"),
            }
            (role, cnr)
        })
        .collect()
}

/// |lesion mean - normal mean| / normal std, only when both means exist and the std is positive.
pub fn contrast_to_noise(lesion_mean: Option<f64>, normal: MaskedStats) -> Option<f64> {
    match (lesion_mean, normal.mean, normal.std) {
        (Some(lesion), Some(mean), Some(std)) if std > 0.0 => finite((lesion - mean).abs() / std),
        _ => None,
    }
}

/// Brings a mask onto `grid`; after interpolation `inside` decides which voxels belong to it.
fn mask_on_grid(
    mask: &Mask,
    grid: &Grid,
    inside: impl Fn(f64) -> bool,
) -> Result<Mask, ResampleError> {
    if mask.shape() == grid.shape() {
        return Ok(mask.clone());
    }
    debug!(from = ?mask.shape(), to = ?grid.shape(), "resampling lesion mask");
    let resampled = resample::resample(&mask.to_volume(), grid)?;
    Ok(Mask::from_parts(resampled.mapv(inside), grid))
}
