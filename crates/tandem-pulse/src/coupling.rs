//! Temporal coupling scoring.
//!
//! Scores every pair of components by how often their commit clusters
//! coincide, using a set-similarity coefficient over the inverted
//! [`ClusterIndex`]. Each pair also carries a normalized support: its
//! shared-cluster count divided by the 99th percentile of that count across
//! all pairs of the same run, which flags unusually strong coupling.
//!
//! Scoring is quadratic in the number of distinct components.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tandem_core::{ScoringMethod, TandemError};

use crate::index::{ActivePeriod, ClusterIndex};

/// Column names of a coupling table, in output order.
pub const COLUMNS: [&str; 9] = [
    "componentX",
    "componentY",
    "sizeX",
    "sizeY",
    "intersectionSize",
    "unionSize",
    "score",
    "normalizedSupport",
    "activePeriod",
];

/// Percentile of shared-cluster counts used as the support divisor.
pub const SUPPORT_PERCENTILE: f64 = 99.0;

/// Coupling between one unordered pair of components.
///
/// # Examples
///
/// ```
/// use tandem_pulse::coupling::CouplingRecord;
/// use tandem_pulse::index::ActivePeriod;
///
/// let record = CouplingRecord {
///     component_x: "billing".into(),
///     component_y: "invoices".into(),
///     size_x: 20,
///     size_y: 18,
///     intersection_size: 15,
///     union_size: 23,
///     score: 15.0 / 23.0,
///     normalized_support: 1.0,
///     active_period: ActivePeriod::Undetermined,
/// };
/// assert!(record.score > 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouplingRecord {
    /// First component of the pair.
    pub component_x: String,
    /// Second component of the pair.
    pub component_y: String,
    /// Clusters containing `component_x`.
    pub size_x: usize,
    /// Clusters containing `component_y`.
    pub size_y: usize,
    /// Clusters containing both.
    pub intersection_size: usize,
    /// Clusters containing either.
    pub union_size: usize,
    /// Similarity coefficient in `[0, 1]`.
    pub score: f64,
    /// `intersection_size / P99(intersection_size)` over the run.
    pub normalized_support: f64,
    /// Dates of the earliest and latest shared clusters.
    pub active_period: ActivePeriod,
}

/// Result of a scoring run: rows under the fixed [`COLUMNS`] schema.
///
/// Serializes as `{"method", "columns", "rows"}` so the column set is
/// present even when there are no rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingTable {
    /// Coefficient used for `score`.
    pub method: ScoringMethod,
    /// One record per pair.
    pub records: Vec<CouplingRecord>,
}

impl CouplingTable {
    /// An empty table for `method`.
    pub fn empty(method: ScoringMethod) -> Self {
        Self {
            method,
            records: Vec::new(),
        }
    }

    /// Column names, in order.
    pub fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort rows by score descending, then shared clusters descending,
    /// then component names.
    pub fn sort_by_score(&mut self) {
        self.records.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.intersection_size.cmp(&a.intersection_size))
                .then_with(|| a.component_x.cmp(&b.component_x))
                .then_with(|| a.component_y.cmp(&b.component_y))
        });
    }

    /// Keep only the first `n` rows.
    pub fn truncate(&mut self, n: usize) {
        self.records.truncate(n);
    }
}

impl Serialize for CouplingTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut table = serializer.serialize_struct("CouplingTable", 3)?;
        table.serialize_field("method", &self.method)?;
        table.serialize_field("columns", &COLUMNS)?;
        table.serialize_field("rows", &self.records)?;
        table.end()
    }
}

/// Scores component pairs over a [`ClusterIndex`].
///
/// # Examples
///
/// ```
/// use tandem_core::ScoringMethod;
/// use tandem_pulse::cluster::NeighborhoodClusterer;
/// use tandem_pulse::commits::CommitEvent;
/// use tandem_pulse::coupling::CouplingScorer;
/// use tandem_pulse::index::ClusterIndex;
///
/// let events = vec![
///     CommitEvent::new(0, "api"),
///     CommitEvent::new(30, "web"),
///     CommitEvent::new(10_000, "api"),
///     CommitEvent::new(10_020, "web"),
///     CommitEvent::new(20_000, "db"),
/// ];
/// let partition = NeighborhoodClusterer::new("1m", 1).unwrap().run(&events);
/// let index = ClusterIndex::build(&partition);
/// let table = CouplingScorer::new(&index, ScoringMethod::Jaccard).score_all();
///
/// assert_eq!(table.len(), 3);
/// let api_web = table
///     .records
///     .iter()
///     .find(|r| r.component_x == "api" && r.component_y == "web")
///     .unwrap();
/// assert_eq!(api_web.score, 1.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CouplingScorer<'i> {
    index: &'i ClusterIndex,
    method: ScoringMethod,
}

impl<'i> CouplingScorer<'i> {
    /// Create a scorer for `index` using `method`.
    pub fn new(index: &'i ClusterIndex, method: ScoringMethod) -> Self {
        Self { index, method }
    }

    /// Create a scorer from a method name (`"jaccard"` or `"sorensen"`).
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::UnsupportedMethod`] for any other name.
    pub fn with_method_name(index: &'i ClusterIndex, method: &str) -> Result<Self, TandemError> {
        Ok(Self::new(index, method.parse()?))
    }

    /// The coefficient this scorer uses.
    pub fn method(&self) -> ScoringMethod {
        self.method
    }

    /// Score all C(n, 2) unordered pairs of indexed components.
    ///
    /// Within each record `component_x < component_y`.
    pub fn score_all(&self) -> CouplingTable {
        let pairs = self.pairs();
        let divisor = self.support_divisor(&pairs);
        let records: Vec<CouplingRecord> = pairs
            .iter()
            .map(|&(x, y)| self.record(x, y, divisor))
            .collect();

        tracing::debug!(
            method = %self.method,
            components = self.index.len(),
            pairs = records.len(),
            support_divisor = divisor,
            "scored all pairs"
        );
        CouplingTable {
            method: self.method,
            records,
        }
    }

    /// Score the pairs that contain `component`, which is reported as
    /// `component_x`. Support is normalized against the full run, so a row
    /// here matches the corresponding row of [`score_all`](Self::score_all).
    ///
    /// An unknown component yields an empty table.
    pub fn score_one_vs_all(&self, component: &str) -> CouplingTable {
        if !self.index.contains(component) {
            return CouplingTable::empty(self.method);
        }

        let divisor = self.support_divisor(&self.pairs());
        let records = self
            .index
            .components()
            .filter(|&other| other != component)
            .map(|other| self.record(component, other, divisor))
            .collect();

        CouplingTable {
            method: self.method,
            records,
        }
    }

    fn pairs(&self) -> Vec<(&'i str, &'i str)> {
        let components: Vec<&'i str> = self.index.components().collect();
        let mut pairs = Vec::with_capacity(components.len() * components.len().saturating_sub(1) / 2);
        for (i, &x) in components.iter().enumerate() {
            for &y in &components[i + 1..] {
                pairs.push((x, y));
            }
        }
        pairs
    }

    /// P99 of shared-cluster counts over `pairs`, recomputed per call.
    fn support_divisor(&self, pairs: &[(&str, &str)]) -> f64 {
        let shared: Vec<f64> = pairs
            .iter()
            .map(|&(x, y)| self.intersection(x, y) as f64)
            .collect();
        percentile(&shared, SUPPORT_PERCENTILE).unwrap_or(0.0)
    }

    fn intersection(&self, x: &str, y: &str) -> usize {
        match (self.index.memberships(x), self.index.memberships(y)) {
            (Some(sx), Some(sy)) => sx.intersection(sy).count(),
            _ => 0,
        }
    }

    fn record(&self, x: &str, y: &str, divisor: f64) -> CouplingRecord {
        let size_x = self.index.memberships(x).map_or(0, |s| s.len());
        let size_y = self.index.memberships(y).map_or(0, |s| s.len());
        let intersection_size = self.intersection(x, y);
        let normalized_support = if divisor > 0.0 {
            intersection_size as f64 / divisor
        } else {
            0.0
        };

        CouplingRecord {
            component_x: x.to_string(),
            component_y: y.to_string(),
            size_x,
            size_y,
            intersection_size,
            union_size: size_x + size_y - intersection_size,
            score: self.method.score(size_x, size_y, intersection_size),
            normalized_support,
            active_period: self.index.active_period(x, y),
        }
    }
}

/// The `q`-th percentile (0–100) of `values`, linearly interpolated
/// between the two closest ranks. `None` for an empty slice.
///
/// # Examples
///
/// ```
/// use tandem_pulse::coupling::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), Some(2.5));
/// assert_eq!(percentile(&[7.0], 99.0), Some(7.0));
/// assert_eq!(percentile(&[], 99.0), None);
/// ```
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
