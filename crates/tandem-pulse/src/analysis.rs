//! One-shot coupling analysis: cluster, index, score.

use std::time::Instant;

use serde::Serialize;
use tandem_core::{ClusterStrategy, ClusteringConfig, ScoringMethod, TandemError};

use crate::cluster::{NeighborhoodClusterer, Partition};
use crate::commits::CommitEvent;
use crate::coupling::{CouplingScorer, CouplingTable};
use crate::density::DensitySegmenter;
use crate::index::ClusterIndex;

/// Run the clusterer selected by `config` over `events`.
///
/// # Errors
///
/// Returns [`TandemError::Format`] for a malformed `eps` or `bandwidth`,
/// [`TandemError::InvalidParameter`] for an unusable density setup, and
/// [`TandemError::InsufficientData`] when the density strategy gets no
/// events.
///
/// # Examples
///
/// ```
/// use tandem_core::ClusteringConfig;
/// use tandem_pulse::analysis::cluster;
/// use tandem_pulse::commits::CommitEvent;
///
/// let events = vec![CommitEvent::new(0, "a"), CommitEvent::new(60, "b")];
/// let partition = cluster(&events, &ClusteringConfig::default()).unwrap();
/// assert_eq!(partition.len(), 1);
/// ```
pub fn cluster<'a>(
    events: &'a [CommitEvent],
    config: &ClusteringConfig,
) -> Result<Partition<'a>, TandemError> {
    match config.strategy {
        ClusterStrategy::Neighborhood => {
            Ok(NeighborhoodClusterer::new(&config.eps, config.min_size)?.run(events))
        }
        ClusterStrategy::Density => {
            DensitySegmenter::from_duration(&config.bandwidth, config.granularity)?.run(events)
        }
    }
}

/// Summary numbers for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Commit events analyzed.
    pub commits: usize,
    /// Clusters found.
    pub clusters: usize,
    /// Events left out of every cluster.
    pub noise: usize,
    /// Distinct components that appear in some cluster.
    pub components: usize,
    /// Mean clusters per active day, if anything clustered.
    pub clusters_per_day: Option<f64>,
    /// Wall time of clustering plus scoring.
    pub elapsed_ms: u128,
}

/// Coupling table together with the statistics of the run that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouplingReport {
    /// Scored pairs.
    pub table: CouplingTable,
    /// Run statistics.
    pub stats: RunStats,
}

/// Cluster `events`, index the clusters and score them.
///
/// With `component` set, only pairs containing it are reported; support is
/// still normalized over all pairs.
///
/// # Errors
///
/// Same as [`cluster`].
///
/// # Examples
///
/// ```
/// use tandem_core::{ClusteringConfig, ScoringMethod};
/// use tandem_pulse::analysis::analyze;
/// use tandem_pulse::commits::CommitEvent;
///
/// let events = vec![
///     CommitEvent::new(0, "api"),
///     CommitEvent::new(100, "web"),
///     CommitEvent::new(1_000_000, "api"),
/// ];
/// let report = analyze(&events, &ClusteringConfig::default(), ScoringMethod::Jaccard, None).unwrap();
/// assert_eq!(report.stats.clusters, 2);
/// assert_eq!(report.table.records[0].score, 0.5);
/// ```
pub fn analyze(
    events: &[CommitEvent],
    config: &ClusteringConfig,
    method: ScoringMethod,
    component: Option<&str>,
) -> Result<CouplingReport, TandemError> {
    let started = Instant::now();

    let partition = cluster(events, config)?;
    let index = ClusterIndex::build(&partition);
    let scorer = CouplingScorer::new(&index, method);
    let table = match component {
        Some(name) => scorer.score_one_vs_all(name),
        None => scorer.score_all(),
    };

    let stats = RunStats {
        commits: events.len(),
        clusters: partition.len(),
        noise: partition.noise.len(),
        components: index.len(),
        clusters_per_day: index.clusters_per_day(),
        elapsed_ms: started.elapsed().as_millis(),
    };
    tracing::debug!(
        commits = stats.commits,
        clusters = stats.clusters,
        noise = stats.noise,
        pairs = table.len(),
        "analysis finished"
    );

    Ok(CouplingReport { table, stats })
}
