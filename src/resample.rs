//
// resample.rs
// Dti-Lesion-Stats-rs
//
// Brings a volume onto another volume's voxel grid, using the header geometry when both sides have it.
//

use std::borrow::Cow;

use nalgebra::{Matrix4, Vector4};
use ndarray::{ArrayD, IxDyn};
use tracing::{debug, warn};

use crate::error::ResampleError;
use crate::volume::{Grid, Volume};

/// Returns `image` unchanged when it already has the reference shape, otherwise a resampled copy.
pub fn align<'a>(image: &'a Volume, reference: &Grid) -> Result<Cow<'a, Volume>, ResampleError> {
    if image.shape() == reference.shape() {
        return Ok(Cow::Borrowed(image));
    }

    debug!(
        image = %image.label(),
        image_shape = ?image.shape(),
        reference_shape = ?reference.shape(),
        "shape mismatch, resampling"
    );
    let data = resample(image, reference)?;
    Ok(Cow::Owned(Volume::on_grid(data, reference)))
}

/// Samples `image` on every voxel of `reference`; the output always has the reference shape.
///
/// With an affine on both sides (rank 3) each reference voxel is mapped through world space into
/// the image and interpolated trilinearly, voxels falling outside the image get 0. Without that
/// geometry the axes are simply stretched onto each other, which ignores orientation and origin.
pub fn resample(image: &Volume, reference: &Grid) -> Result<ArrayD<f64>, ResampleError> {
    if image.shape().len() != reference.rank() {
        return Err(ResampleError::RankMismatch {
            image: image.shape().len(),
            reference: reference.rank(),
        });
    }
    if image.data().is_empty() {
        return Err(ResampleError::EmptyImage(image.shape().to_vec()));
    }

    match (image.grid().affine(), reference.affine()) {
        (Some(image_affine), Some(reference_affine)) if reference.rank() == 3 => {
            debug!(image = %image.label(), "resampling through voxel-to-world transforms");
            resample_physical(image.data(), image_affine, reference_affine, reference.shape())
        }
        _ => {
            warn!(
                image = %image.label(),
                "no usable header geometry, stretching axes to the reference shape (orientation and origin ignored)"
            );
            Ok(zoom(image.data(), reference.shape()))
        }
    }
}

fn resample_physical(
    data: &ArrayD<f64>,
    image_affine: &Matrix4<f64>,
    reference_affine: &Matrix4<f64>,
    shape: &[usize],
) -> Result<ArrayD<f64>, ResampleError> {
    let world_to_image = image_affine
        .try_inverse()
        .ok_or(ResampleError::SingularAffine)?;
    // Reference voxel index -> world -> continuous image index.
    let reference_to_image = world_to_image * reference_affine;

    Ok(ArrayD::from_shape_fn(IxDyn(shape), |idx| {
        let point = reference_to_image
            * Vector4::new(idx[0] as f64, idx[1] as f64, idx[2] as f64, 1.0);
        interpolate(data, &[point.x, point.y, point.z])
    }))
}

/// Corner-aligned scale-factor interpolation: the first and last voxel of every axis line up.
fn zoom(data: &ArrayD<f64>, shape: &[usize]) -> ArrayD<f64> {
    let factors: Vec<f64> = data
        .shape()
        .iter()
        .zip(shape)
        .map(|(&input, &output)| {
            if output > 1 {
                (input as f64 - 1.0) / (output as f64 - 1.0)
            } else {
                0.0
            }
        })
        .collect();

    let mut coords = vec![0.0; shape.len()];
    ArrayD::from_shape_fn(IxDyn(shape), |idx| {
        for (axis, coord) in coords.iter_mut().enumerate() {
            *coord = idx[axis] as f64 * factors[axis];
        }
        interpolate(data, &coords)
    })
}

/// N-linear interpolation at a continuous index. Points beyond half a voxel outside the array
/// read as 0; inside that border the edge voxels are extended.
fn interpolate(data: &ArrayD<f64>, coords: &[f64]) -> f64 {
    let shape = data.shape();
    let rank = coords.len();

    let mut base = vec![0usize; rank];
    let mut frac = vec![0.0; rank];
    for axis in 0..rank {
        let last = shape[axis] as f64 - 1.0;
        let c = coords[axis];
        if !(c >= -0.5 && c <= last + 0.5) {
            return 0.0;
        }
        let c = c.clamp(0.0, last);
        let floor = c.floor();
        base[axis] = floor as usize;
        frac[axis] = c - floor;
    }

    let mut index = vec![0usize; rank];
    let mut value = 0.0;
    'corners: for corner in 0..(1usize << rank) {
        let mut weight = 1.0;
        for axis in 0..rank {
            let upper = (corner >> axis) & 1 == 1;
            let w = if upper { frac[axis] } else { 1.0 - frac[axis] };
            if w == 0.0 {
                // Zero-weight corners are skipped so NaN neighbours cannot leak in.
                continue 'corners;
            }
            weight *= w;
            index[axis] = if upper {
                (base[axis] + 1).min(shape[axis] - 1)
            } else {
                base[axis]
            };
        }
        value += weight * data[IxDyn(&index)];
    }
    value
}
