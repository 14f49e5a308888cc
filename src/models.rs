//
// models.rs
// Dti-Lesion-Stats-rs
//
// Defines the per-subject result structures: lesion burden, per-ROI statistics, overlaps and CNR.
//

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::stats::MaskedStats;
use crate::subject::MetricRole;

/// Lesion burden plus metric summaries inside the lesion mask.
#[derive(Debug, Clone, PartialEq)]
pub struct LesionMetrics {
    pub volume_voxels: usize,
    pub volume_mm3: f64,
    pub stats: BTreeMap<MetricRole, MaskedStats>,
}

/// Portion of the lesion mask falling inside one ROI. `None` when the lesion could not be brought
/// onto the atlas grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LesionOverlap {
    pub voxels: Option<usize>,
    pub volume_mm3: Option<f64>,
}

/// Exact atlas value identifying one ROI. Only finite values above zero are labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasLabel(f64);

impl AtlasLabel {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Report name, the value truncated toward zero: 0.4 is `ROI_0`, 7.9 is `ROI_7`.
    /// Distinct values may therefore share a name.
    pub fn name(self) -> String {
        format!("ROI_{}", self.0.trunc() as u64)
    }
}

// NaN, infinities and signed zeros never get in, so total_cmp agrees with `==`.
impl Eq for AtlasLabel {}

impl PartialOrd for AtlasLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AtlasLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for AtlasLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Statistics for one atlas label.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiMetrics {
    pub label: AtlasLabel,
    pub stats: BTreeMap<MetricRole, MaskedStats>,
    pub overlap: LesionOverlap,
}

impl RoiMetrics {
    pub fn name(&self) -> String {
        self.label.name()
    }
}

/// Everything computed for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub subject: String,
    /// Metric roles present for this subject, in report column order.
    pub metrics: Vec<MetricRole>,
    pub lesion: LesionMetrics,
    /// Keyed by exact atlas value, ascending; the label set comes from the atlas itself.
    pub atlas: BTreeMap<AtlasLabel, RoiMetrics>,
    pub cnr: BTreeMap<MetricRole, Option<f64>>,
}

impl ResultSet {
    /// The ROI whose atlas value is exactly `value`.
    pub fn roi(&self, value: f64) -> Option<&RoiMetrics> {
        AtlasLabel::new(value).and_then(|label| self.atlas.get(&label))
    }
}
