//! Inverted component → cluster index.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde::{Serialize, Serializer};

use crate::cluster::{Cluster, Partition};

/// Date range during which two components were active together.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use tandem_pulse::index::ActivePeriod;
///
/// assert_eq!(ActivePeriod::Undetermined.to_string(), "TBD to TBD");
///
/// let period = ActivePeriod::Range {
///     start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
///     end: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
/// };
/// assert_eq!(period.to_string(), "2024-01-02 to 2024-03-04");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePeriod {
    /// The two components never share a cluster.
    Undetermined,
    /// First event dates of the earliest and latest shared clusters.
    Range {
        /// Date of the earliest shared cluster.
        start: NaiveDate,
        /// Date of the latest shared cluster.
        end: NaiveDate,
    },
}

impl fmt::Display for ActivePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivePeriod::Undetermined => write!(f, "TBD to TBD"),
            ActivePeriod::Range { start, end } => write!(f, "{start} to {end}"),
        }
    }
}

impl Serialize for ActivePeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Mapping from component name to the cluster positions it appears in.
///
/// Built in one pass from a [`Partition`]; noise is ignored. Every
/// membership set is non-empty. Components are kept in lexicographic
/// order so pair enumeration is deterministic.
///
/// # Examples
///
/// ```
/// use tandem_pulse::cluster::NeighborhoodClusterer;
/// use tandem_pulse::commits::CommitEvent;
/// use tandem_pulse::index::ClusterIndex;
///
/// let events = vec![
///     CommitEvent::new(0, "api"),
///     CommitEvent::new(10, "web"),
///     CommitEvent::new(5_000, "api"),
/// ];
/// let partition = NeighborhoodClusterer::new("1m", 1).unwrap().run(&events);
/// let index = ClusterIndex::build(&partition);
///
/// assert_eq!(index.memberships("api").unwrap().len(), 2);
/// assert_eq!(index.memberships("web").unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClusterIndex {
    index: BTreeMap<String, BTreeSet<usize>>,
    starts: Vec<i64>,
    clusters_per_day: Option<f64>,
}

impl ClusterIndex {
    /// Build the index from a clustering run.
    pub fn build(partition: &Partition<'_>) -> Self {
        Self::from_clusters(&partition.clusters)
    }

    /// Build the index from an ordered list of clusters.
    pub fn from_clusters(clusters: &[Cluster<'_>]) -> Self {
        let mut index: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (position, cluster) in clusters.iter().enumerate() {
            for event in &cluster.events {
                // Avoid allocating a key for components already indexed.
                match index.get_mut(event.component.as_str()) {
                    Some(set) => {
                        set.insert(position);
                    }
                    None => {
                        index.insert(event.component.clone(), BTreeSet::from([position]));
                    }
                }
            }
        }

        Self {
            index,
            starts: clusters.iter().map(Cluster::start).collect(),
            clusters_per_day: clusters_per_day(clusters),
        }
    }

    /// Number of distinct components.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no component appears in any cluster.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of clusters the index was built from.
    pub fn cluster_count(&self) -> usize {
        self.starts.len()
    }

    /// Component names in lexicographic order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Cluster positions for `component`, if it is indexed.
    pub fn memberships(&self, component: &str) -> Option<&BTreeSet<usize>> {
        self.index.get(component)
    }

    /// Whether `component` appears in the index.
    pub fn contains(&self, component: &str) -> bool {
        self.index.contains_key(component)
    }

    /// The period over which `x` and `y` shared clusters.
    ///
    /// Returns [`ActivePeriod::Undetermined`] when the two membership sets
    /// are disjoint or either component is unknown.
    pub fn active_period(&self, x: &str, y: &str) -> ActivePeriod {
        let (Some(sx), Some(sy)) = (self.index.get(x), self.index.get(y)) else {
            return ActivePeriod::Undetermined;
        };

        let mut shared = sx.intersection(sy).copied();
        let Some(first) = shared.next() else {
            return ActivePeriod::Undetermined;
        };
        let last = shared.last().unwrap_or(first);

        match (utc_date(self.starts[first]), utc_date(self.starts[last])) {
            (Some(start), Some(end)) => ActivePeriod::Range { start, end },
            _ => ActivePeriod::Undetermined,
        }
    }

    /// Mean number of distinct clusters touched per calendar day (UTC),
    /// over days with at least one clustered commit. `None` when there are
    /// no clustered commits.
    pub fn clusters_per_day(&self) -> Option<f64> {
        self.clusters_per_day
    }
}

fn utc_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

fn clusters_per_day(clusters: &[Cluster<'_>]) -> Option<f64> {
    let mut days: HashMap<NaiveDate, HashSet<usize>> = HashMap::new();
    for (position, cluster) in clusters.iter().enumerate() {
        for event in &cluster.events {
            if let Some(day) = utc_date(event.timestamp) {
                days.entry(day).or_default().insert(position);
            }
        }
    }

    if days.is_empty() {
        return None;
    }
    let total: usize = days.values().map(HashSet::len).sum();
    Some(total as f64 / days.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NeighborhoodClusterer;
    use crate::commits::CommitEvent;

    const DAY: i64 = 86_400;
    // 2024-01-01T00:00:00Z
    const JAN_1: i64 = 1_704_067_200;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cluster<'a>(events: &'a [CommitEvent]) -> Cluster<'a> {
        Cluster {
            events: events.iter().collect(),
        }
    }

    #[test]
    fn memberships_follow_cluster_positions() {
        let c0 = [CommitEvent::new(0, "a"), CommitEvent::new(1, "b")];
        let c1 = [CommitEvent::new(100, "a")];
        let c2 = [CommitEvent::new(200, "c"), CommitEvent::new(201, "a")];
        let index = ClusterIndex::from_clusters(&[cluster(&c0), cluster(&c1), cluster(&c2)]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.cluster_count(), 3);
        assert_eq!(
            index.memberships("a").unwrap(),
            &BTreeSet::from([0, 1, 2])
        );
        assert_eq!(index.memberships("b").unwrap(), &BTreeSet::from([0]));
        assert_eq!(index.memberships("c").unwrap(), &BTreeSet::from([2]));
        assert!(index.memberships("d").is_none());
        assert_eq!(index.components().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn noise_is_not_indexed() {
        let events = vec![
            CommitEvent::new(0, "a"),
            CommitEvent::new(5, "b"),
            CommitEvent::new(1_000, "lonely"),
        ];
        let partition = NeighborhoodClusterer::from_seconds(10, 2).run(&events);
        let index = ClusterIndex::build(&partition);
        assert!(!index.contains("lonely"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn empty_partition_gives_empty_index() {
        let index = ClusterIndex::build(&Partition::default());
        assert!(index.is_empty());
        assert_eq!(index.clusters_per_day(), None);
    }

    #[test]
    fn disjoint_components_have_undetermined_period() {
        let c0 = [CommitEvent::new(JAN_1, "a")];
        let c1 = [CommitEvent::new(JAN_1 + DAY, "b")];
        let index = ClusterIndex::from_clusters(&[cluster(&c0), cluster(&c1)]);

        assert_eq!(index.active_period("a", "b"), ActivePeriod::Undetermined);
        assert_eq!(index.active_period("a", "missing"), ActivePeriod::Undetermined);
    }

    #[test]
    fn active_period_spans_first_and_last_shared_cluster() {
        let c0 = [CommitEvent::new(JAN_1 + 3600, "a"), CommitEvent::new(JAN_1 + 3700, "b")];
        let c1 = [CommitEvent::new(JAN_1 + 10 * DAY, "a")];
        let c2 = [
            CommitEvent::new(JAN_1 + 40 * DAY, "b"),
            CommitEvent::new(JAN_1 + 41 * DAY, "a"),
        ];
        let index = ClusterIndex::from_clusters(&[cluster(&c0), cluster(&c1), cluster(&c2)]);

        assert_eq!(
            index.active_period("a", "b"),
            ActivePeriod::Range {
                start: date(2024, 1, 1),
                end: date(2024, 2, 10),
            }
        );
        assert_eq!(index.active_period("b", "a"), index.active_period("a", "b"));
    }

    #[test]
    fn single_shared_cluster_has_equal_bounds() {
        let c0 = [CommitEvent::new(JAN_1, "a"), CommitEvent::new(JAN_1 + 1, "b")];
        let index = ClusterIndex::from_clusters(&[cluster(&c0)]);
        assert_eq!(index.active_period("a", "b").to_string(), "2024-01-01 to 2024-01-01");
    }

    #[test]
    fn clusters_per_day_skips_idle_days() {
        // Day 1: clusters 0 and 1. Day 3: cluster 2. Day 2 has nothing.
        let c0 = [CommitEvent::new(JAN_1 + 100, "a")];
        let c1 = [CommitEvent::new(JAN_1 + 50_000, "b")];
        let c2 = [CommitEvent::new(JAN_1 + 2 * DAY + 10, "a")];
        let index = ClusterIndex::from_clusters(&[cluster(&c0), cluster(&c1), cluster(&c2)]);
        assert_eq!(index.clusters_per_day(), Some(1.5));
    }

    #[test]
    fn cluster_crossing_midnight_counts_on_both_days() {
        let c0 = [
            CommitEvent::new(JAN_1 + DAY - 10, "a"),
            CommitEvent::new(JAN_1 + DAY + 10, "b"),
        ];
        let index = ClusterIndex::from_clusters(&[cluster(&c0)]);
        assert_eq!(index.clusters_per_day(), Some(1.0));
    }

    #[test]
    fn active_period_serializes_as_string() {
        let json = serde_json::to_value(ActivePeriod::Undetermined).unwrap();
        assert_eq!(json, serde_json::json!("TBD to TBD"));
    }
}
