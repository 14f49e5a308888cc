//
// report.rs
// Dti-Lesion-Stats-rs
//
// Writes a subject's ResultSet as three CSV tables (lesion, CNR and per-ROI atlas metrics).
//

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::info;

use crate::error::AnalysisError;
use crate::models::ResultSet;
use crate::subject::MetricRole;

/// Written in place of any value that could not be computed.
pub const UNDEFINED: &str = "NA";

/// Output locations for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub lesion: PathBuf,
    pub cnr: PathBuf,
    pub atlas: PathBuf,
}

impl ReportPaths {
    pub fn new(output_dir: &Path, subject: &str) -> Self {
        Self {
            lesion: output_dir.join(format!("{subject}_lesion_metrics.csv")),
            cnr: output_dir.join(format!("{subject}_cnr_metrics.csv")),
            atlas: output_dir.join(format!("{subject}_atlas_metrics.csv")),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.lesion, &self.cnr, &self.atlas]
    }
}

/// Persists the three tables into `output_dir` and returns where they went.
pub fn write_results(results: &ResultSet, output_dir: &Path) -> Result<ReportPaths, AnalysisError> {
    let paths = ReportPaths::new(output_dir, &results.subject);

    write_table(&paths.lesion, lesion_table(results))?;
    info!(path = %paths.lesion.display(), "saved lesion metrics");

    write_table(&paths.cnr, cnr_table(results))?;
    info!(path = %paths.cnr.display(), "saved CNR metrics");

    write_table(&paths.atlas, atlas_table(results))?;
    info!(path = %paths.atlas.display(), "saved atlas metrics");

    Ok(paths)
}

/// Header plus rows, every cell already formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn lesion_table(results: &ResultSet) -> Table {
    let lesion = &results.lesion;
    let mut header = vec!["volume_voxels".to_string(), "volume_mm3".to_string()];
    let mut row = vec![
        lesion.volume_voxels.to_string(),
        format_value(Some(lesion.volume_mm3)),
    ];

    for &role in &results.metrics {
        let stats = lesion.stats.get(&role).copied().unwrap_or_default();
        header.extend(stat_columns(role));
        row.push(format_value(stats.mean));
        row.push(format_value(stats.std));
    }

    Table {
        header,
        rows: vec![row],
    }
}

pub fn cnr_table(results: &ResultSet) -> Table {
    let header = results
        .metrics
        .iter()
        .map(|role| format!("{}_cnr", role.key()))
        .collect();
    let row = results
        .metrics
        .iter()
        .map(|role| format_value(results.cnr.get(role).copied().flatten()))
        .collect();

    Table {
        header,
        rows: vec![row],
    }
}

pub fn atlas_table(results: &ResultSet) -> Table {
    let mut header = vec!["roi".to_string()];
    for &role in &results.metrics {
        header.extend(stat_columns(role));
    }
    header.push("lesion_overlap_voxels".to_string());
    header.push("lesion_overlap_mm3".to_string());

    let rows = results
        .atlas
        .values()
        .map(|roi| {
            let mut row = vec![roi.name()];
            for role in &results.metrics {
                let stats = roi.stats.get(role).copied().unwrap_or_default();
                row.push(format_value(stats.mean));
                row.push(format_value(stats.std));
            }
            row.push(
                roi.overlap
                    .voxels
                    .map_or_else(|| UNDEFINED.to_string(), |v| v.to_string()),
            );
            row.push(format_value(roi.overlap.volume_mm3));
            row
        })
        .collect();

    Table { header, rows }
}

fn stat_columns(role: MetricRole) -> [String; 2] {
    [format!("{}_mean", role.key()), format!("{}_std", role.key())]
}

/// Finite numbers in full precision, everything else as the undefined marker.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => UNDEFINED.to_string(),
    }
}

fn write_table(path: &Path, table: Table) -> Result<(), AnalysisError> {
    let write_error = |source: csv::Error| AnalysisError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer: Writer<File> = Writer::from_path(path).map_err(write_error)?;
    writer.write_record(&table.header).map_err(write_error)?;
    for row in &table.rows {
        writer.write_record(row).map_err(write_error)?;
    }
    writer
        .flush()
        .map_err(|err| write_error(csv::Error::from(err)))?;
    Ok(())
}
