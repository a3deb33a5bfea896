//! Density-valley temporal segmentation.
//!
//! Fits a Gaussian kernel density over commit timestamps, samples its log
//! on an even grid spanning the first to the last commit, and cuts the time
//! axis at every local minimum of the sampled curve. A flat run of equal
//! samples lower than both flanks is one minimum, so a valley that falls
//! exactly between two grid points is not lost.

use std::f64::consts::PI;

use serde::Serialize;
use tandem_core::TandemError;

use crate::cluster::{Cluster, Partition};
use crate::commits::CommitEvent;
use crate::duration::parse_duration;

/// Sampled log-density curve and its extrema.
///
/// `minima` are the cut points used for segmentation; `maxima` mark the
/// modes and are purely descriptive.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityProfile {
    /// Evaluation points (Unix seconds), evenly spaced.
    pub grid: Vec<f64>,
    /// Log-density at each grid point.
    pub log_density: Vec<f64>,
    /// Grid indices of the valleys: lower than both neighbours, or the
    /// middle of a flat run lower than both flanks.
    pub minima: Vec<usize>,
    /// Grid indices of the peaks, located the same way.
    pub maxima: Vec<usize>,
}

impl DensityProfile {
    /// Timestamps of the density valleys, ascending.
    pub fn boundaries(&self) -> Vec<f64> {
        self.minima.iter().map(|&i| self.grid[i]).collect()
    }

    /// Timestamps of the density peaks, ascending.
    pub fn modes(&self) -> Vec<f64> {
        self.maxima.iter().map(|&i| self.grid[i]).collect()
    }
}

/// Splits a commit stream at the valleys of its kernel density.
///
/// # Examples
///
/// ```
/// use tandem_pulse::commits::CommitEvent;
/// use tandem_pulse::density::DensitySegmenter;
///
/// let events: Vec<_> = [0, 60, 120, 86_400, 86_460]
///     .into_iter()
///     .map(|t| CommitEvent::new(t, "svc"))
///     .collect();
/// let segmenter = DensitySegmenter::from_duration("1h", 1000).unwrap();
/// let partition = segmenter.run(&events).unwrap();
/// assert_eq!(partition.len(), 2);
/// assert_eq!(partition.clusters[0].len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensitySegmenter {
    bandwidth: f64,
    granularity: usize,
}

impl DensitySegmenter {
    /// Create a segmenter with a bandwidth in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::InvalidParameter`] if the bandwidth is not a
    /// positive finite number or `granularity < 2`.
    pub fn new(bandwidth: f64, granularity: usize) -> Result<Self, TandemError> {
        if !bandwidth.is_finite() || bandwidth <= 0.0 {
            return Err(TandemError::InvalidParameter(format!(
                "bandwidth must be positive, got {bandwidth}"
            )));
        }
        if granularity < 2 {
            return Err(TandemError::InvalidParameter(format!(
                "granularity must be at least 2, got {granularity}"
            )));
        }
        Ok(Self {
            bandwidth,
            granularity,
        })
    }

    /// Create a segmenter from a bandwidth duration string such as `"1h"`.
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::Format`] for a malformed duration, then the
    /// same errors as [`new`](Self::new).
    pub fn from_duration(bandwidth: &str, granularity: usize) -> Result<Self, TandemError> {
        Self::new(parse_duration(bandwidth)? as f64, granularity)
    }

    /// Kernel bandwidth in seconds.
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Number of evaluation points.
    pub fn granularity(&self) -> usize {
        self.granularity
    }

    /// Evaluate the log-density curve and locate its extrema.
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::InsufficientData`] for an empty event slice.
    pub fn profile(&self, events: &[CommitEvent]) -> Result<DensityProfile, TandemError> {
        let mut times: Vec<f64> = events.iter().map(|e| e.timestamp as f64).collect();
        if times.is_empty() {
            return Err(TandemError::InsufficientData(
                "density estimation needs at least one commit".into(),
            ));
        }
        times.sort_by(f64::total_cmp);

        let lo = times[0];
        let hi = times[times.len() - 1];
        let steps = (self.granularity - 1) as f64;
        let grid: Vec<f64> = (0..self.granularity)
            .map(|i| lo + (hi - lo) * i as f64 / steps)
            .collect();
        let log_density: Vec<f64> = grid.iter().map(|&x| self.log_density_at(x, &times)).collect();

        let (minima, maxima) = if lo == hi {
            (Vec::new(), Vec::new())
        } else {
            local_extrema(&log_density)
        };

        Ok(DensityProfile {
            grid,
            log_density,
            minima,
            maxima,
        })
    }

    /// Partition `events` into segments bounded by density valleys.
    ///
    /// Segments are `[start, v1], (v1, v2], ..., (vk, end]`. Segments
    /// without any commit are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::InsufficientData`] for an empty event slice.
    pub fn run<'a>(&self, events: &'a [CommitEvent]) -> Result<Partition<'a>, TandemError> {
        let profile = self.profile(events)?;
        let boundaries = profile.boundaries();

        let mut ordered: Vec<&'a CommitEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.timestamp);

        let mut segments: Vec<Vec<&'a CommitEvent>> = vec![Vec::new(); boundaries.len() + 1];
        for event in ordered {
            let t = event.timestamp as f64;
            let segment = boundaries.partition_point(|&b| b < t);
            segments[segment].push(event);
        }

        let clusters: Vec<Cluster<'a>> = segments
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|events| Cluster { events })
            .collect();

        tracing::debug!(
            bandwidth = self.bandwidth,
            granularity = self.granularity,
            valleys = boundaries.len(),
            modes = profile.maxima.len(),
            clusters = clusters.len(),
            "density segmentation done"
        );

        Ok(Partition {
            clusters,
            noise: Vec::new(),
        })
    }

    /// Gaussian KDE log-density at `x`, via log-sum-exp so distant grid
    /// points stay finite.
    fn log_density_at(&self, x: f64, times: &[f64]) -> f64 {
        let h = self.bandwidth;
        let exponents = times.iter().map(|&t| {
            let z = (x - t) / h;
            -0.5 * z * z
        });
        let max = exponents.clone().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = exponents.map(|e| (e - max).exp()).sum();
        let norm = -((times.len() as f64) * h * (2.0 * PI).sqrt()).ln();
        norm + max + sum.ln()
    }
}

/// Indices of interior local minima and maxima.
///
/// Equal neighbouring samples are collapsed into one run first; a run
/// counts when both flanks are strictly higher (minimum) or strictly lower
/// (maximum), and is reported at its middle index. Runs touching either end
/// of the curve never count.
fn local_extrema(values: &[f64]) -> (Vec<usize>, Vec<usize>) {
    let mut minima = Vec::new();
    let mut maxima = Vec::new();
    let mut start = 1;
    while start + 1 < values.len() {
        let cur = values[start];
        let mut end = start;
        while end + 1 < values.len() && values[end + 1] == cur {
            end += 1;
        }
        if end + 1 == values.len() {
            break;
        }
        let (prev, next) = (values[start - 1], values[end + 1]);
        let middle = start + (end - start) / 2;
        if cur < prev && cur < next {
            minima.push(middle);
        } else if cur > prev && cur > next {
            maxima.push(middle);
        }
        start = end + 1;
    }
    (minima, maxima)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_at(times: &[i64]) -> Vec<CommitEvent> {
        times.iter().map(|&t| CommitEvent::new(t, "svc")).collect()
    }

    #[test]
    fn empty_input_is_insufficient_data() {
        let segmenter = DensitySegmenter::new(3600.0, 100).unwrap();
        assert!(matches!(
            segmenter.run(&[]),
            Err(TandemError::InsufficientData(_))
        ));
    }

    #[test]
    fn single_event_is_one_cluster() {
        let events = events_at(&[1_700_000_000]);
        let partition = DensitySegmenter::new(60.0, 1000).unwrap().run(&events).unwrap();
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.clusters[0].len(), 1);
        assert!(partition.noise.is_empty());
    }

    #[test]
    fn identical_timestamps_are_one_cluster() {
        let events = events_at(&[500, 500, 500, 500]);
        let segmenter = DensitySegmenter::new(1.0, 1000).unwrap();
        let profile = segmenter.profile(&events).unwrap();
        assert!(profile.minima.is_empty());

        let partition = segmenter.run(&events).unwrap();
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.clusters[0].len(), 4);
    }

    #[test]
    fn two_bursts_split_at_the_valley() {
        let events = events_at(&[0, 100, 200, 50_000, 50_100]);
        let segmenter = DensitySegmenter::new(600.0, 1000).unwrap();
        let profile = segmenter.profile(&events).unwrap();

        assert_eq!(profile.minima.len(), 1);
        assert_eq!(profile.maxima.len(), 2);
        let valley = profile.boundaries()[0];
        assert!(valley > 200.0 && valley < 50_000.0, "valley at {valley}");

        let partition = segmenter.run(&events).unwrap();
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.clusters[0].len(), 3);
        assert_eq!(partition.clusters[1].len(), 2);
    }

    #[test]
    fn every_event_lands_in_exactly_one_segment() {
        let times = [0, 10, 3_000, 3_050, 9_000, 9_001, 20_000, 20_500, 40_000];
        let events = events_at(&times);
        let partition = DensitySegmenter::new(300.0, 500).unwrap().run(&events).unwrap();

        assert_eq!(partition.clustered_events(), times.len());
        let starts: Vec<i64> = partition.clusters.iter().map(Cluster::start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert!(partition.clusters.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn wide_bandwidth_merges_everything() {
        let events = events_at(&[0, 1_000, 2_000]);
        let partition = DensitySegmenter::new(1_000_000.0, 1000)
            .unwrap()
            .run(&events)
            .unwrap();
        assert_eq!(partition.len(), 1);
    }

    #[test]
    fn log_density_stays_finite_far_from_data() {
        let events = events_at(&[0, 10_000_000]);
        let profile = DensitySegmenter::new(1.0, 50).unwrap().profile(&events).unwrap();
        assert!(profile.log_density.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn grid_spans_first_to_last_commit() {
        let events = events_at(&[100, 400]);
        let profile = DensitySegmenter::new(10.0, 4).unwrap().profile(&events).unwrap();
        assert_eq!(profile.grid, vec![100.0, 200.0, 300.0, 400.0]);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(
            DensitySegmenter::new(0.0, 100),
            Err(TandemError::InvalidParameter(_))
        ));
        assert!(matches!(
            DensitySegmenter::new(f64::NAN, 100),
            Err(TandemError::InvalidParameter(_))
        ));
        assert!(matches!(
            DensitySegmenter::new(1.0, 1),
            Err(TandemError::InvalidParameter(_))
        ));
        assert!(matches!(
            DensitySegmenter::from_duration("1d", 100),
            Err(TandemError::Format(_))
        ));
    }

    #[test]
    fn flat_valley_counts_once() {
        let (minima, maxima) = local_extrema(&[3.0, 1.0, 1.0, 3.0, 5.0, 2.0]);
        assert_eq!(minima, vec![1]);
        assert_eq!(maxima, vec![4]);

        let (minima, _) = local_extrema(&[4.0, 2.0, 2.0, 2.0, 4.0]);
        assert_eq!(minima, vec![2]);
    }

    #[test]
    fn runs_touching_the_edges_are_not_extrema() {
        let (minima, maxima) = local_extrema(&[1.0, 1.0, 3.0, 2.0, 2.0]);
        assert!(minima.is_empty());
        assert_eq!(maxima, vec![2]);

        let (minima, maxima) = local_extrema(&[5.0, 5.0, 5.0]);
        assert!(minima.is_empty());
        assert!(maxima.is_empty());
    }

    #[test]
    fn valley_between_grid_points_still_splits() {
        // With 1000 points over [0, 1000] the valley at 500 sits between
        // two samples of equal density.
        let events = events_at(&[0, 1_000]);
        let segmenter = DensitySegmenter::new(10.0, 1000).unwrap();
        let partition = segmenter.run(&events).unwrap();
        assert_eq!(partition.len(), 2);
    }

    #[test]
    fn modes_sit_inside_each_burst() {
        let events = events_at(&[0, 60, 120, 86_400, 86_460, 86_520]);
        let profile = DensitySegmenter::new(3_600.0, 1000)
            .unwrap()
            .profile(&events)
            .unwrap();
        let modes = profile.modes();
        assert_eq!(modes.len(), 2);
        assert!(modes[0] < 3_600.0);
        assert!(modes[1] > 82_800.0);

        let valleys = profile.boundaries();
        assert_eq!(valleys.len(), 1);
        assert!(modes[0] < valleys[0] && valleys[0] < modes[1]);
    }
}
