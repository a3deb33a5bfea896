use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TandemError;

/// Set-similarity coefficient used to score a pair of components.
///
/// Parsing an unknown name fails with [`TandemError::UnsupportedMethod`].
///
/// # Examples
///
/// ```
/// use tandem_core::ScoringMethod;
///
/// let method: ScoringMethod = "sorensen".parse().unwrap();
/// assert_eq!(method, ScoringMethod::Sorensen);
/// assert!("cosine".parse::<ScoringMethod>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMethod {
    /// `|Sx ∩ Sy| / |Sx ∪ Sy|`.
    #[default]
    Jaccard,
    /// `2|Sx ∩ Sy| / (|Sx| + |Sy|)`.
    Sorensen,
}

impl ScoringMethod {
    /// Score two membership sets given their sizes and overlap.
    ///
    /// Both coefficients are symmetric and bounded by `[0, 1]`. Empty
    /// inputs score `0.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tandem_core::ScoringMethod;
    ///
    /// // |Sx| = 2, |Sy| = 4, one shared cluster
    /// assert_eq!(ScoringMethod::Jaccard.score(2, 4, 1), 0.2);
    /// assert!((ScoringMethod::Sorensen.score(2, 4, 1) - 1.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn score(self, size_x: usize, size_y: usize, intersection: usize) -> f64 {
        match self {
            ScoringMethod::Jaccard => {
                let union = size_x + size_y - intersection;
                if union == 0 {
                    return 0.0;
                }
                intersection as f64 / union as f64
            }
            ScoringMethod::Sorensen => {
                let total = size_x + size_y;
                if total == 0 {
                    return 0.0;
                }
                2.0 * intersection as f64 / total as f64
            }
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMethod::Jaccard => write!(f, "jaccard"),
            ScoringMethod::Sorensen => write!(f, "sorensen"),
        }
    }
}

impl FromStr for ScoringMethod {
    type Err = TandemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jaccard" => Ok(ScoringMethod::Jaccard),
            "sorensen" => Ok(ScoringMethod::Sorensen),
            other => Err(TandemError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Which temporal clusterer to run.
///
/// # Examples
///
/// ```
/// use tandem_core::ClusterStrategy;
///
/// let s: ClusterStrategy = "density".parse().unwrap();
/// assert_eq!(s, ClusterStrategy::Density);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStrategy {
    /// Epsilon-neighborhood chain linkage.
    #[default]
    Neighborhood,
    /// Gaussian density valleys.
    Density,
}

impl fmt::Display for ClusterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStrategy::Neighborhood => write!(f, "neighborhood"),
            ClusterStrategy::Density => write!(f, "density"),
        }
    }
}

impl FromStr for ClusterStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "neighborhood" | "dbscan" => Ok(ClusterStrategy::Neighborhood),
            "density" | "kde" => Ok(ClusterStrategy::Density),
            other => Err(format!("unknown cluster strategy: {other}")),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use tandem_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
