//
// stats.rs
// Dti-Lesion-Stats-rs
//
// Mean and standard deviation of a metric volume restricted to a mask, with explicit "undefined" results.
//

use tracing::{debug, warn};

use crate::resample;
use crate::volume::{Mask, Volume};

/// Smallest mask that still yields a summary; smaller regions are reported as undefined.
pub const DEFAULT_MIN_VOXELS: usize = 10;

/// Mean and population standard deviation inside a mask. `None` marks an infeasible value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MaskedStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

impl MaskedStats {
    pub const UNDEFINED: MaskedStats = MaskedStats {
        mean: None,
        std: None,
    };
}

pub fn mean_in_mask(image: &Volume, mask: &Mask, min_voxels: usize) -> Option<f64> {
    masked_stats(image, mask, min_voxels).mean
}

pub fn std_in_mask(image: &Volume, mask: &Mask, min_voxels: usize) -> Option<f64> {
    masked_stats(image, mask, min_voxels).std
}

/// Summarises `image` over `mask`, resampling the image onto the mask grid when shapes differ.
pub fn masked_stats(image: &Volume, mask: &Mask, min_voxels: usize) -> MaskedStats {
    let voxels = mask.count();
    if voxels == 0 || voxels < min_voxels {
        debug!(voxels, min_voxels, "mask too small for statistics");
        return MaskedStats::UNDEFINED;
    }

    let aligned = match resample::align(image, mask.grid()) {
        Ok(aligned) => aligned,
        Err(err) => {
            warn!(image = %image.label(), error = %err, "could not resample image onto mask grid");
            return MaskedStats::UNDEFINED;
        }
    };

    let values: Vec<f64> = aligned
        .data()
        .iter()
        .zip(mask.data().iter())
        .filter_map(|(&value, &inside)| inside.then_some(value))
        .collect();

    let (mean, std_dev) = compute_stats(&values);
    MaskedStats {
        mean: finite(mean),
        std: finite(std_dev),
    }
}

fn compute_stats(values: &[f64]) -> (f64, f64) {
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;

    let variance = values
        .iter()
        .map(|x| {
            let diff = mean - x;
            diff * diff
        })
        .sum::<f64>()
        / count;

    (mean, variance.sqrt())
}

/// NaN or infinite results become undefined rather than leaking into reports.
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
