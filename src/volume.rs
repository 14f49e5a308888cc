//
// volume.rs
// Dti-Lesion-Stats-rs
//
// In-memory NIfTI volumes, their voxel grids and the boolean masks derived from them.
//

use std::path::{Path, PathBuf};

use nalgebra::Matrix4;
use ndarray::{ArrayD, IxDyn};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::debug;

use crate::error::AnalysisError;

/// Shape, voxel spacing and (when known) the voxel-to-world transform of an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    shape: Vec<usize>,
    spacing: Vec<f64>,
    affine: Option<Matrix4<f64>>,
}

impl Grid {
    pub fn new(shape: Vec<usize>, spacing: Vec<f64>, affine: Option<Matrix4<f64>>) -> Self {
        Self {
            shape,
            spacing,
            affine,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    pub fn affine(&self) -> Option<&Matrix4<f64>> {
        self.affine.as_ref()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Physical volume of one voxel (product of the spacing components).
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    fn with_shape(&self, shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            spacing: self.spacing.clone(),
            affine: self.affine,
        }
    }
}

/// A scalar volume loaded from disk (or built in memory) together with its geometry.
#[derive(Debug, Clone)]
pub struct Volume {
    data: ArrayD<f64>,
    grid: Grid,
    source: Option<PathBuf>,
}

impl Volume {
    /// Builds a volume without physical orientation; resampling against it uses the zoom fallback.
    pub fn new(data: ArrayD<f64>, spacing: Vec<f64>) -> Self {
        let grid = Grid::new(data.shape().to_vec(), spacing, None);
        Self {
            data,
            grid,
            source: None,
        }
    }

    pub fn with_affine(mut self, affine: Matrix4<f64>) -> Self {
        self.grid.affine = Some(affine);
        self
    }

    /// Wraps `data` as a volume living on `grid` (used for resampled arrays).
    pub(crate) fn on_grid(data: ArrayD<f64>, grid: &Grid) -> Self {
        let grid = grid.with_shape(data.shape());
        Self {
            data,
            grid,
            source: None,
        }
    }

    /// Reads a `.nii` / `.nii.gz` file, keeping spacing and orientation from its header.
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let load_error = |source| AnalysisError::Load {
            path: path.to_path_buf(),
            source,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(load_error)?;
        let header = obj.header().clone();
        let data = obj
            .into_volume()
            .into_ndarray::<f64>()
            .map_err(load_error)?;

        let spatial = data.ndim().min(3);
        let spacing = header.pixdim[1..=spatial]
            .iter()
            .map(|&d| f64::from(d).abs())
            .collect();
        let grid = Grid::new(data.shape().to_vec(), spacing, Some(header_affine(&header)));

        debug!(path = %path.display(), shape = ?data.shape(), spacing = ?grid.spacing, "volume loaded");

        Ok(Self {
            data,
            grid,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn spacing(&self) -> &[f64] {
        self.grid.spacing()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Short label for log lines: the file name when loaded from disk.
    pub fn label(&self) -> String {
        self.source()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<in-memory>".to_string())
    }

    /// Boolean mask of the voxels whose value satisfies `predicate`, on this volume's grid.
    pub fn mask_where(&self, predicate: impl Fn(f64) -> bool) -> Mask {
        Mask {
            data: self.data.mapv(predicate),
            grid: self.grid.clone(),
        }
    }
}

/// Boolean region of interest, tied to the grid of the volume it came from.
#[derive(Debug, Clone)]
pub struct Mask {
    data: ArrayD<bool>,
    grid: Grid,
}

impl Mask {
    /// Mask with unit spacing and no orientation.
    pub fn new(data: ArrayD<bool>) -> Self {
        let rank = data.ndim().min(3);
        let grid = Grid::new(data.shape().to_vec(), vec![1.0; rank], None);
        Self { data, grid }
    }

    pub(crate) fn from_parts(data: ArrayD<bool>, grid: &Grid) -> Self {
        let grid = grid.with_shape(data.shape());
        Self { data, grid }
    }

    pub fn data(&self) -> &ArrayD<bool> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Number of voxels inside the mask.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&inside| inside).count()
    }

    /// Voxels inside both masks. Both must share a shape.
    pub fn intersection_count(&self, other: &Mask) -> usize {
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|&(&a, &b)| a && b)
            .count()
    }

    /// 0/1 volume on the same grid, so the mask can be interpolated like any image.
    pub fn to_volume(&self) -> Volume {
        let data = self.data.mapv(|inside| if inside { 1.0 } else { 0.0 });
        Volume::on_grid(data, &self.grid)
    }

    pub fn empty_like(grid: &Grid) -> Self {
        Self::from_parts(ArrayD::from_elem(IxDyn(grid.shape()), false), grid)
    }

    pub(crate) fn data_mut(&mut self) -> &mut ArrayD<bool> {
        &mut self.data
    }
}

/// Voxel-to-world matrix following the NIfTI precedence: sform, then qform, then pixdim scaling.
#[rustfmt::skip]
pub fn header_affine(header: &NiftiHeader) -> Matrix4<f64> {
    let f = |v: f32| f64::from(v);

    if header.sform_code > 0 {
        let (x, y, z) = (header.srow_x, header.srow_y, header.srow_z);
        let sform = Matrix4::new(
            f(x[0]), f(x[1]), f(x[2]), f(x[3]),
            f(y[0]), f(y[1]), f(y[2]), f(y[3]),
            f(z[0]), f(z[1]), f(z[2]), f(z[3]),
            0.0, 0.0, 0.0, 1.0,
        );
        // An all-zero sform flagged as valid is not unheard of; fall through to qform/pixdim.
        if sform.fixed_view::<3, 3>(0, 0).clone_owned().determinant() != 0.0 {
            return sform;
        }
    }

    let (dx, dy, dz) = (f(header.pixdim[1]), f(header.pixdim[2]), f(header.pixdim[3]));

    if header.qform_code > 0 {
        let (b, c, d) = (f(header.quatern_b), f(header.quatern_c), f(header.quatern_d));
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let dz = dz * qfac;

        return Matrix4::new(
            (a * a + b * b - c * c - d * d) * dx,
            (2.0 * b * c - 2.0 * a * d) * dy,
            (2.0 * b * d + 2.0 * a * c) * dz,
            f(header.quatern_x),
            (2.0 * b * c + 2.0 * a * d) * dx,
            (a * a + c * c - b * b - d * d) * dy,
            (2.0 * c * d - 2.0 * a * b) * dz,
            f(header.quatern_y),
            (2.0 * b * d - 2.0 * a * c) * dx,
            (2.0 * c * d + 2.0 * a * b) * dy,
            (a * a + d * d - c * c - b * b) * dz,
            f(header.quatern_z),
            0.0, 0.0, 0.0, 1.0,
        );
    }

    // Zero pixdims in sloppy headers would make the matrix singular.
    let unit = |v: f64| if v == 0.0 { 1.0 } else { v };
    Matrix4::new(
        unit(dx), 0.0, 0.0, 0.0,
        0.0, unit(dy), 0.0, 0.0,
        0.0, 0.0, unit(dz), 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}
