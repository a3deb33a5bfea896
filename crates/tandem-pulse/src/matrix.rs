//! Score × normalized-support cross-tabulation.

use serde::Serialize;

use crate::coupling::CouplingTable;

/// Upper edges of the score bins. The first bin includes 0.
pub const SCORE_EDGES: [f64; 5] = [0.2, 0.4, 0.6, 0.8, 1.0];

/// Upper edges of the support bins; values above the last edge land in a
/// trailing `> 1.0` bin.
pub const SUPPORT_EDGES: [f64; 5] = [0.2, 0.4, 0.6, 0.8, 1.0];

/// Counts of coupling pairs per (score bin, support bin).
///
/// # Examples
///
/// ```
/// use tandem_core::ScoringMethod;
/// use tandem_pulse::coupling::CouplingTable;
/// use tandem_pulse::matrix::SupportMatrix;
///
/// let matrix = SupportMatrix::from_table(&CouplingTable::empty(ScoringMethod::Jaccard));
/// assert_eq!(matrix.total(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportMatrix {
    /// Row labels, one per score bin.
    pub score_bins: Vec<String>,
    /// Column labels, one per support bin.
    pub support_bins: Vec<String>,
    /// `counts[score_bin][support_bin]`.
    pub counts: Vec<Vec<usize>>,
}

impl SupportMatrix {
    /// Tabulate every record of `table`.
    pub fn from_table(table: &CouplingTable) -> Self {
        let mut counts = vec![vec![0; SUPPORT_EDGES.len() + 1]; SCORE_EDGES.len()];
        for record in &table.records {
            let row = bin(record.score, &SCORE_EDGES).min(SCORE_EDGES.len() - 1);
            let col = bin(record.normalized_support, &SUPPORT_EDGES);
            counts[row][col] += 1;
        }

        let mut support_bins = bin_labels(&SUPPORT_EDGES);
        support_bins.push(format!("> {:.1}", SUPPORT_EDGES[SUPPORT_EDGES.len() - 1]));

        Self {
            score_bins: bin_labels(&SCORE_EDGES),
            support_bins,
            counts,
        }
    }

    /// Number of pairs tabulated.
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// Index of the first edge `value` does not exceed, or `edges.len()`.
fn bin(value: f64, edges: &[f64]) -> usize {
    edges.partition_point(|&edge| value > edge)
}

fn bin_labels(edges: &[f64]) -> Vec<String> {
    let mut lower = 0.0;
    edges
        .iter()
        .enumerate()
        .map(|(i, &upper)| {
            let label = if i == 0 {
                format!("[{lower:.1}, {upper:.1}]")
            } else {
                format!("({lower:.1}, {upper:.1}]")
            };
            lower = upper;
            label
        })
        .collect()
}
