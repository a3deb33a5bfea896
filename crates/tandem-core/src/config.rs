use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TandemError;
use crate::types::ClusterStrategy;

/// Top-level configuration loaded from `.tandem.toml`.
///
/// Resolution order is CLI flags > config file > defaults. Durations and the
/// scoring method are kept as strings here and validated when an analysis
/// actually uses them.
///
/// # Examples
///
/// ```
/// use tandem_core::TandemConfig;
///
/// let config = TandemConfig::default();
/// assert_eq!(config.clustering.eps, "4h");
/// assert_eq!(config.coupling.method, "jaccard");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TandemConfig {
    /// Temporal clustering settings.
    #[serde(default)]
    pub clustering: ClusteringConfig,
    /// Coupling scoring settings.
    #[serde(default)]
    pub coupling: CouplingConfig,
    /// Git history ingestion settings.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Cumulative timeline settings.
    #[serde(default)]
    pub timeline: TimelineConfig,
}

impl TandemConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::Config`] if `path` does not exist,
    /// [`TandemError::Io`] if the file cannot be read, or
    /// [`TandemError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tandem_core::TandemConfig;
    /// use std::path::Path;
    ///
    /// let config = TandemConfig::from_file(Path::new(".tandem.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, TandemError> {
        if !path.exists() {
            return Err(TandemError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`TandemError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use tandem_core::TandemConfig;
    ///
    /// let toml = r#"
    /// [clustering]
    /// eps = "30m"
    /// "#;
    /// let config = TandemConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.clustering.eps, "30m");
    /// assert_eq!(config.clustering.min_size, 1);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, TandemError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Temporal clustering configuration.
///
/// # Examples
///
/// ```
/// use tandem_core::{ClusterStrategy, ClusteringConfig};
///
/// let config = ClusteringConfig::default();
/// assert_eq!(config.strategy, ClusterStrategy::Neighborhood);
/// assert_eq!(config.granularity, 1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Clusterer to run (default: `"neighborhood"`).
    #[serde(default)]
    pub strategy: ClusterStrategy,
    /// Neighborhood radius as a duration string (default: `"4h"`).
    #[serde(default = "default_eps")]
    pub eps: String,
    /// Minimum cluster size; smaller chains become noise (default: 1).
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    /// Density kernel bandwidth as a duration string (default: `"1h"`).
    #[serde(default = "default_bandwidth")]
    pub bandwidth: String,
    /// Density evaluation points along the time axis (default: 1000).
    #[serde(default = "default_granularity")]
    pub granularity: usize,
}

fn default_eps() -> String {
    "4h".into()
}

fn default_min_size() -> usize {
    1
}

fn default_bandwidth() -> String {
    "1h".into()
}

fn default_granularity() -> usize {
    1000
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            strategy: ClusterStrategy::default(),
            eps: default_eps(),
            min_size: default_min_size(),
            bandwidth: default_bandwidth(),
            granularity: default_granularity(),
        }
    }
}

/// Coupling scoring configuration.
///
/// # Examples
///
/// ```
/// use tandem_core::CouplingConfig;
///
/// let config = CouplingConfig::default();
/// assert_eq!(config.limit, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Scoring method name (default: `"jaccard"`).
    #[serde(default = "default_method")]
    pub method: String,
    /// Maximum rows to print (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_method() -> String {
    "jaccard".into()
}

fn default_limit() -> usize {
    20
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            limit: default_limit(),
        }
    }
}

/// Git history ingestion configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Include merge commits when mining (default: false).
    #[serde(default)]
    pub include_merges: bool,
    /// Branch to walk in every component repository (default: HEAD).
    pub branch: Option<String>,
}

/// Cumulative timeline configuration.
///
/// The timeline shares `eps` with `[clustering]` but keeps its own minimum
/// cluster size, so isolated commits are noise there by default.
///
/// # Examples
///
/// ```
/// use tandem_core::TimelineConfig;
///
/// assert_eq!(TimelineConfig::default().min_size, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Minimum cluster size for the monthly snapshots (default: 2).
    #[serde(default = "default_timeline_min_size")]
    pub min_size: usize,
}

fn default_timeline_min_size() -> usize {
    2
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_size: default_timeline_min_size(),
        }
    }
}
