//! Core types, configuration, and error handling for tandem.
//!
//! This crate provides the shared foundation used by the other tandem crates:
//! - [`TandemError`]: unified error type using `thiserror` and `miette`
//! - [`TandemConfig`]: configuration loaded from `.tandem.toml`
//! - Shared types: [`ScoringMethod`], [`ClusterStrategy`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{ClusteringConfig, CouplingConfig, HistoryConfig, TandemConfig, TimelineConfig};
pub use error::TandemError;
pub use types::{ClusterStrategy, OutputFormat, ScoringMethod};

/// A convenience `Result` type for tandem operations.
pub type Result<T> = std::result::Result<T, TandemError>;
