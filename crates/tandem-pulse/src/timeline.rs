//! Cumulative month-by-month coupling.
//!
//! Events are labelled once with the neighborhood clusterer. Walking the
//! calendar months from the first commit to the last, each month's events
//! are grouped by label into clusters that are appended to a running list,
//! and a snapshot scores every pair over all clusters accumulated so far.
//! A cluster that straddles a month boundary contributes one cluster to
//! each month it touches.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike};
use rayon::prelude::*;
use serde::Serialize;
use tandem_core::ScoringMethod;

use crate::cluster::{Cluster, NeighborhoodClusterer};
use crate::commits::CommitEvent;
use crate::coupling::{CouplingScorer, CouplingTable};
use crate::index::ClusterIndex;

/// Cumulative coupling at the end of one calendar month.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySnapshot {
    /// Month as `YYYY-MM` (UTC).
    pub month: String,
    /// Clusters accumulated up to and including this month.
    pub clusters: usize,
    /// Coupling over those clusters.
    pub table: CouplingTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Month {
    year: i32,
    month: u32,
}

impl Month {
    fn of(timestamp: i64) -> Option<Self> {
        DateTime::from_timestamp(timestamp, 0).map(|dt| Self {
            year: dt.year(),
            month: dt.month(),
        })
    }

    fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    fn label(self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Build one snapshot per calendar month between the first and the last
/// event, months without commits included.
///
/// Snapshots are scored in parallel and returned in month order. Noise
/// events are left out.
///
/// # Examples
///
/// ```
/// use tandem_core::ScoringMethod;
/// use tandem_pulse::cluster::NeighborhoodClusterer;
/// use tandem_pulse::commits::CommitEvent;
/// use tandem_pulse::timeline::cumulative_coupling;
///
/// // 2024-01-10 and 2024-03-05
/// let events = vec![
///     CommitEvent::new(1_704_844_800, "api"),
///     CommitEvent::new(1_704_844_900, "web"),
///     CommitEvent::new(1_709_596_800, "api"),
/// ];
/// let clusterer = NeighborhoodClusterer::new("1h", 1).unwrap();
/// let snapshots = cumulative_coupling(&events, &clusterer, ScoringMethod::Jaccard);
///
/// let months: Vec<&str> = snapshots.iter().map(|s| s.month.as_str()).collect();
/// assert_eq!(months, ["2024-01", "2024-02", "2024-03"]);
/// assert_eq!(snapshots[0].table.records[0].score, 1.0);
/// assert_eq!(snapshots[2].table.records[0].score, 0.5);
/// ```
pub fn cumulative_coupling(
    events: &[CommitEvent],
    clusterer: &NeighborhoodClusterer,
    method: ScoringMethod,
) -> Vec<MonthlySnapshot> {
    let labels = clusterer.labels(events);

    let mut dated: Vec<(Month, usize, &CommitEvent)> = Vec::with_capacity(events.len());
    for (event, label) in events.iter().zip(&labels) {
        let Some(cluster) = label.cluster() else {
            continue;
        };
        match Month::of(event.timestamp) {
            Some(month) => dated.push((month, cluster, event)),
            None => tracing::warn!(timestamp = event.timestamp, "timestamp out of range, skipped"),
        }
    }
    dated.sort_by_key(|(_, _, e)| e.timestamp);

    let (Some(&(first, _, _)), Some(&(last, _, _))) = (dated.first(), dated.last()) else {
        return Vec::new();
    };

    let mut clusters: Vec<Cluster<'_>> = Vec::new();
    let mut ends: Vec<(Month, usize)> = Vec::new();
    let mut rest = dated.as_slice();
    let mut month = first;
    loop {
        let split = rest.partition_point(|(m, _, _)| *m == month);
        let (current, tail) = rest.split_at(split);
        rest = tail;

        // Labels are assigned in time order, so key order is chronological.
        let mut by_label: BTreeMap<usize, Vec<&CommitEvent>> = BTreeMap::new();
        for &(_, cluster, event) in current {
            by_label.entry(cluster).or_default().push(event);
        }
        clusters.extend(by_label.into_values().map(|events| Cluster { events }));
        ends.push((month, clusters.len()));

        if month >= last {
            break;
        }
        month = month.next();
    }

    tracing::debug!(
        months = ends.len(),
        clusters = clusters.len(),
        "built cumulative timeline"
    );

    ends.par_iter()
        .map(|&(month, count)| {
            let index = ClusterIndex::from_clusters(&clusters[..count]);
            MonthlySnapshot {
                month: month.label(),
                clusters: count,
                table: CouplingScorer::new(&index, method).score_all(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-01T00:00:00Z
    const JAN_1: i64 = 1_704_067_200;
    const DAY: i64 = 86_400;

    fn clusterer() -> NeighborhoodClusterer {
        NeighborhoodClusterer::from_seconds(3_600, 1)
    }

    #[test]
    fn empty_input_has_no_snapshots() {
        assert!(cumulative_coupling(&[], &clusterer(), ScoringMethod::Jaccard).is_empty());
    }

    #[test]
    fn gap_months_repeat_previous_state() {
        let events = vec![
            CommitEvent::new(JAN_1, "a"),
            CommitEvent::new(JAN_1 + 60, "b"),
            CommitEvent::new(JAN_1 + 100 * DAY, "a"),
        ];
        let snapshots = cumulative_coupling(&events, &clusterer(), ScoringMethod::Jaccard);
        let months: Vec<&str> = snapshots.iter().map(|s| s.month.as_str()).collect();
        assert_eq!(months, ["2024-01", "2024-02", "2024-03", "2024-04"]);

        assert_eq!(snapshots[1].clusters, snapshots[0].clusters);
        assert_eq!(snapshots[2].table, snapshots[0].table);
        assert_eq!(snapshots[3].clusters, 2);
    }

    #[test]
    fn cluster_counts_never_decrease() {
        let events: Vec<CommitEvent> = (0..12)
            .map(|i| CommitEvent::new(JAN_1 + i * 17 * DAY, if i % 2 == 0 { "a" } else { "b" }))
            .collect();
        let snapshots = cumulative_coupling(&events, &clusterer(), ScoringMethod::Sorensen);
        assert!(snapshots.windows(2).all(|w| w[0].clusters <= w[1].clusters));
        assert_eq!(snapshots.last().unwrap().clusters, 12);
    }

    #[test]
    fn final_snapshot_matches_whole_run_when_months_align() {
        let events = vec![
            CommitEvent::new(JAN_1, "a"),
            CommitEvent::new(JAN_1 + 10, "b"),
            CommitEvent::new(JAN_1 + 40 * DAY, "a"),
            CommitEvent::new(JAN_1 + 40 * DAY + 5, "c"),
            CommitEvent::new(JAN_1 + 70 * DAY, "b"),
            CommitEvent::new(JAN_1 + 70 * DAY + 5, "c"),
        ];
        let partition = clusterer().run(&events);
        let index = ClusterIndex::build(&partition);
        let whole = CouplingScorer::new(&index, ScoringMethod::Jaccard).score_all();

        let snapshots = cumulative_coupling(&events, &clusterer(), ScoringMethod::Jaccard);
        assert_eq!(snapshots.last().unwrap().table, whole);
    }

    #[test]
    fn cluster_across_month_boundary_is_split() {
        let end_of_jan = JAN_1 + 31 * DAY - 60;
        let events = vec![
            CommitEvent::new(end_of_jan, "a"),
            CommitEvent::new(end_of_jan + 120, "b"),
        ];
        assert_eq!(clusterer().run(&events).len(), 1);

        let snapshots = cumulative_coupling(&events, &clusterer(), ScoringMethod::Jaccard);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].clusters, 2);
        assert_eq!(snapshots[1].table.records[0].intersection_size, 0);
    }

    #[test]
    fn noise_is_left_out() {
        let clusterer = NeighborhoodClusterer::from_seconds(60, 2);
        let events = vec![
            CommitEvent::new(JAN_1, "a"),
            CommitEvent::new(JAN_1 + 30, "b"),
            CommitEvent::new(JAN_1 + 5 * DAY, "lonely"),
        ];
        let snapshots = cumulative_coupling(&events, &clusterer, ScoringMethod::Jaccard);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].clusters, 1);
        assert!(snapshots[0]
            .table
            .records
            .iter()
            .all(|r| r.component_x != "lonely" && r.component_y != "lonely"));
    }

    #[test]
    fn year_rollover() {
        let dec = Month { year: 2023, month: 12 };
        assert_eq!(dec.next(), Month { year: 2024, month: 1 });
        assert_eq!(dec.label(), "2023-12");
    }
}
