//! Temporal coupling between components from commit history.
//!
//! Commits from many components are grouped into bursts of activity on a
//! single time axis, either by epsilon-neighborhood chaining or by cutting
//! at the valleys of a kernel density. Components that keep showing up in
//! the same bursts are temporally coupled; each pair is scored with a
//! Jaccard or Sørensen–Dice coefficient over the bursts they appear in.

pub mod analysis;
pub mod cluster;
pub mod commits;
pub mod coupling;
pub mod density;
pub mod duration;
pub mod index;
pub mod matrix;
pub mod mining;
pub mod timeline;

pub use analysis::{analyze, CouplingReport, RunStats};
pub use cluster::{Cluster, Label, NeighborhoodClusterer, Partition};
pub use commits::CommitEvent;
pub use coupling::{CouplingRecord, CouplingScorer, CouplingTable};
pub use density::DensitySegmenter;
pub use index::{ActivePeriod, ClusterIndex};
