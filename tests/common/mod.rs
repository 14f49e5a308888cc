//
// common/mod.rs
// Dti-Lesion-Stats-rs
//
// Synthetic subjects written as real NIfTI files, plus small numeric oracles shared by the tests.
//

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;

pub const SHAPE: (usize, usize, usize) = (10, 10, 10);
pub const SPACING: [f32; 3] = [2.0, 2.0, 2.5];

pub fn write_volume(path: &Path, data: &Array3<f32>, spacing: [f32; 3]) {
    // No sform/qform: the reader falls back to a pixdim-scaled grid.
    let header = NiftiHeader {
        pixdim: [1.0, spacing[0], spacing[1], spacing[2], 1.0, 1.0, 1.0, 1.0],
        sform_code: 0,
        qform_code: 0,
        ..NiftiHeader::default()
    };
    write_volume_with(path, data, &header);
}

/// Header with an aligned sform whose rows are `rows`; pixdim follows the diagonal.
pub fn sform_header(rows: [[f32; 4]; 3]) -> NiftiHeader {
    NiftiHeader {
        pixdim: [
            1.0,
            rows[0][0].abs(),
            rows[1][1].abs(),
            rows[2][2].abs(),
            1.0,
            1.0,
            1.0,
            1.0,
        ],
        sform_code: 2,
        qform_code: 0,
        srow_x: rows[0],
        srow_y: rows[1],
        srow_z: rows[2],
        ..NiftiHeader::default()
    }
}

pub fn write_volume_with(path: &Path, data: &Array3<f32>, header: &NiftiHeader) {
    WriterOptions::new(path)
        .reference_header(header)
        .write_nifti(data)
        .expect("write nifti");
}

/// 3×3×3 lesion cube (27 voxels).
pub fn in_lesion(x: usize, y: usize, z: usize) -> bool {
    (2..5).contains(&x) && (2..5).contains(&y) && (2..5).contains(&z)
}

/// Three slabs along x labelled 3, 7 and 12; the top slice is background.
pub fn atlas_label(x: usize, _y: usize, z: usize) -> f32 {
    if z == 9 {
        0.0
    } else if x < 4 {
        3.0
    } else if x < 7 {
        7.0
    } else {
        12.0
    }
}

/// Metric maps: a textured background with lesions 50% brighter.
pub fn metric_value(key: &str, x: usize, y: usize, z: usize) -> f32 {
    let base = match key {
        "dc" => 1.0,
        "fa" => 0.4,
        "md" => 0.8,
        "flair" => 100.0,
        _ => 0.0,
    };
    let texture = base * 0.05 * ((x + 2 * y + 3 * z) % 7) as f32;
    let lesion = if in_lesion(x, y, z) { base * 0.5 } else { 0.0 };
    base + texture + lesion
}

pub fn lesion_array() -> Array3<f32> {
    Array3::from_shape_fn(SHAPE, |(x, y, z)| if in_lesion(x, y, z) { 1.0 } else { 0.0 })
}

pub fn atlas_array() -> Array3<f32> {
    Array3::from_shape_fn(SHAPE, |(x, y, z)| atlas_label(x, y, z))
}

pub fn metric_array(key: &str) -> Array3<f32> {
    Array3::from_shape_fn(SHAPE, |(x, y, z)| metric_value(key, x, y, z))
}

/// Writes a complete subject (optionally with FLAIR) under `root/name`.
pub fn write_subject(root: &Path, name: &str, with_flair: bool) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("subject dir");

    write_volume(&dir.join("lesions_in_dwi.nii.gz"), &lesion_array(), SPACING);
    write_volume(&dir.join("HO_atlas_in_dwi.nii.gz"), &atlas_array(), SPACING);
    write_volume(&dir.join("dti_DC_fsl.nii.gz"), &metric_array("dc"), SPACING);
    write_volume(&dir.join("dti_FA.nii.gz"), &metric_array("fa"), SPACING);
    write_volume(&dir.join("dti_MD.nii.gz"), &metric_array("md"), SPACING);
    if with_flair {
        let flair = dir.join(format!("{name}_flair_to_dwi_Warped.nii.gz"));
        write_volume(&flair, &metric_array("flair"), SPACING);
    }

    dir
}

/// Values of `key` split into (lesion, normal tissue) voxels.
pub fn split_by_lesion(key: &str) -> (Vec<f64>, Vec<f64>) {
    let (mut lesion, mut normal) = (Vec::new(), Vec::new());
    for ((x, y, z), _) in lesion_array().indexed_iter() {
        let value = f64::from(metric_value(key, x, y, z));
        if in_lesion(x, y, z) {
            lesion.push(value);
        } else {
            normal.push(value);
        }
    }
    (lesion, normal)
}

/// Brute-force mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {expected}, got {actual}"
    );
}

pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("open csv");
    let header = reader
        .headers()
        .expect("csv header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|record| {
            record
                .expect("csv record")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect();
    (header, rows)
}

/// Looks up `column` in a single-row table.
pub fn cell<'a>(header: &[String], row: &'a [String], column: &str) -> &'a str {
    let idx = header
        .iter()
        .position(|h| h == column)
        .unwrap_or_else(|| panic!("column {column} missing from {header:?}"));
    &row[idx]
}
