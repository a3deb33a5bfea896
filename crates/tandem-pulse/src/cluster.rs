//! Epsilon-neighborhood temporal clustering.
//!
//! Commits are points on a single time axis. Two commits are directly
//! connected when their timestamps differ by at most `eps`, and a maximal
//! chain of connected commits is a candidate cluster. Chains shorter than
//! `min_size` are reported as noise. In one dimension this is exactly
//! density-based clustering with `min_size` as the core-point threshold,
//! without a neighbor-search structure.

use serde::Serialize;
use tandem_core::TandemError;

use crate::commits::CommitEvent;
use crate::duration::parse_duration;

/// A burst of temporally close commits, in time order. Never empty.
///
/// # Examples
///
/// ```
/// use tandem_pulse::cluster::Cluster;
/// use tandem_pulse::commits::CommitEvent;
///
/// let a = CommitEvent::new(100, "api");
/// let b = CommitEvent::new(160, "web");
/// let cluster = Cluster { events: vec![&a, &b] };
/// assert_eq!(cluster.start(), 100);
/// assert_eq!(cluster.span(), 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster<'a> {
    /// Member events, ordered by timestamp.
    pub events: Vec<&'a CommitEvent>,
}

impl<'a> Cluster<'a> {
    /// Timestamp of the first event.
    pub fn start(&self) -> i64 {
        self.events.first().map_or(0, |e| e.timestamp)
    }

    /// Timestamp of the last event.
    pub fn end(&self) -> i64 {
        self.events.last().map_or(0, |e| e.timestamp)
    }

    /// Seconds between the first and last event.
    pub fn span(&self) -> i64 {
        self.end().saturating_sub(self.start())
    }

    /// Number of member events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the cluster has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// The output of one clustering run.
///
/// Clusters are ordered by their first timestamp. `noise` holds events the
/// neighborhood clusterer rejected for being in a chain shorter than the
/// minimum size; the density segmenter never produces noise.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition<'a> {
    /// Clusters in time order.
    pub clusters: Vec<Cluster<'a>>,
    /// Events that belong to no cluster, in time order.
    pub noise: Vec<&'a CommitEvent>,
}

impl<'a> Partition<'a> {
    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Number of events assigned to some cluster.
    pub fn clustered_events(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }
}

/// Per-event cluster assignment from the label view.
///
/// # Examples
///
/// ```
/// use tandem_pulse::cluster::Label;
///
/// assert_eq!(Label::Cluster(3).cluster(), Some(3));
/// assert_eq!(Label::Noise.cluster(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Position of the cluster in the partition.
    Cluster(usize),
    /// The event is not clustered.
    Noise,
}

impl Label {
    /// The cluster position, if any.
    pub fn cluster(self) -> Option<usize> {
        match self {
            Label::Cluster(id) => Some(id),
            Label::Noise => None,
        }
    }
}

/// Chain-linkage clusterer over commit timestamps.
///
/// `min_size = 1` puts every event in some cluster (singletons allowed);
/// `min_size = 2` discards isolated activity as noise.
///
/// # Examples
///
/// ```
/// use tandem_pulse::cluster::NeighborhoodClusterer;
/// use tandem_pulse::commits::CommitEvent;
///
/// let events: Vec<_> = [0, 10, 20, 200, 210]
///     .into_iter()
///     .map(|t| CommitEvent::new(t, "svc"))
///     .collect();
/// let clusterer = NeighborhoodClusterer::new("30s", 2).unwrap();
/// let partition = clusterer.run(&events);
/// assert_eq!(partition.len(), 2);
/// assert_eq!(partition.clusters[0].len(), 3);
/// assert!(partition.noise.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborhoodClusterer {
    eps: i64,
    min_size: usize,
}

impl NeighborhoodClusterer {
    /// Create a clusterer from a duration string such as `"4h"`.
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::Format`] if `eps` is not a valid duration.
    pub fn new(eps: &str, min_size: usize) -> Result<Self, TandemError> {
        Ok(Self::from_seconds(parse_duration(eps)?, min_size))
    }

    /// Create a clusterer with `eps` already in seconds. `min_size = 0`
    /// behaves like `1` and a negative `eps` like `0`.
    pub fn from_seconds(eps: i64, min_size: usize) -> Self {
        Self {
            eps: eps.max(0),
            min_size: min_size.max(1),
        }
    }

    /// Neighborhood radius in seconds.
    pub fn eps(&self) -> i64 {
        self.eps
    }

    /// Minimum number of events for a chain to count as a cluster.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Partition `events` into clusters and noise.
    pub fn run<'a>(&self, events: &'a [CommitEvent]) -> Partition<'a> {
        let mut partition = Partition::default();
        for chain in self.chains(events) {
            let members: Vec<&'a CommitEvent> = chain.iter().map(|&i| &events[i]).collect();
            if members.len() >= self.min_size {
                partition.clusters.push(Cluster { events: members });
            } else {
                partition.noise.extend(members);
            }
        }

        tracing::debug!(
            eps = self.eps,
            min_size = self.min_size,
            events = events.len(),
            clusters = partition.clusters.len(),
            noise = partition.noise.len(),
            "neighborhood clustering done"
        );
        partition
    }

    /// Label every event with its cluster position, aligned with the input
    /// order. Positions match the clusters returned by [`run`](Self::run).
    ///
    /// # Examples
    ///
    /// ```
    /// use tandem_pulse::cluster::{Label, NeighborhoodClusterer};
    /// use tandem_pulse::commits::CommitEvent;
    ///
    /// let events: Vec<_> = [0, 5, 100]
    ///     .into_iter()
    ///     .map(|t| CommitEvent::new(t, "svc"))
    ///     .collect();
    /// let labels = NeighborhoodClusterer::new("10s", 2).unwrap().labels(&events);
    /// assert_eq!(labels, vec![Label::Cluster(0), Label::Cluster(0), Label::Noise]);
    /// ```
    pub fn labels(&self, events: &[CommitEvent]) -> Vec<Label> {
        let mut labels = vec![Label::Noise; events.len()];
        let mut next_id = 0;
        for chain in self.chains(events) {
            if chain.len() < self.min_size {
                continue;
            }
            for i in chain {
                labels[i] = Label::Cluster(next_id);
            }
            next_id += 1;
        }
        labels
    }

    /// Maximal chains of directly connected events, as indices into
    /// `events`, in time order.
    fn chains(&self, events: &[CommitEvent]) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..events.len()).collect();
        order.sort_by_key(|&i| events[i].timestamp);

        let mut chains: Vec<Vec<usize>> = Vec::new();
        let eps = self.eps.unsigned_abs();
        let mut previous: Option<i64> = None;
        for i in order {
            let timestamp = events[i].timestamp;
            let connected = previous.is_some_and(|prev| timestamp.abs_diff(prev) <= eps);
            previous = Some(timestamp);
            match chains.last_mut() {
                Some(chain) if connected => chain.push(i),
                _ => chains.push(vec![i]),
            }
        }
        chains
    }
}
