//! Git history extraction via git2.
//!
//! Each component lives in its own repository under a common root. Mining
//! walks every component's history oldest-first and turns each commit into
//! a [`CommitEvent`] carrying the author timestamp and summed line counts.

use std::path::{Path, PathBuf};

use git2::{Commit, DiffOptions, Repository, Sort};
use rayon::prelude::*;
use tandem_core::TandemError;

use crate::commits::CommitEvent;

/// Options for history mining.
///
/// # Examples
///
/// ```
/// use tandem_pulse::mining::MiningOptions;
///
/// let opts = MiningOptions::default();
/// assert!(!opts.include_merges);
/// assert!(opts.branch.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MiningOptions {
    /// Keep merge commits (default: skipped).
    pub include_merges: bool,
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
}

/// A component repository found under a mining root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRepo {
    /// Component name, taken from the directory name.
    pub name: String,
    /// Path to the repository working tree.
    pub path: PathBuf,
}

/// List the immediate subdirectories of `root` that are git repositories,
/// sorted by name.
///
/// # Errors
///
/// Returns [`TandemError::Io`] if `root` cannot be read.
pub fn discover_components(root: &Path) -> Result<Vec<ComponentRepo>, TandemError> {
    let mut components = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || !path.join(".git").exists() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        components.push(ComponentRepo { name, path });
    }
    components.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(components)
}

/// Mine one component repository into commit events, oldest first.
///
/// An empty repository yields no events.
///
/// # Errors
///
/// Returns [`TandemError::Git`] if the repository cannot be opened or walked.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use tandem_pulse::mining::{mine_component, MiningOptions};
///
/// let events = mine_component(Path::new("repos/billing"), "billing", &MiningOptions::default()).unwrap();
/// for e in &events {
///     println!("{} {} +{} -{}", e.timestamp, &e.hash[..7], e.lines_added, e.lines_deleted);
/// }
/// ```
pub fn mine_component(
    repo_path: &Path,
    component: &str,
    options: &MiningOptions,
) -> Result<Vec<CommitEvent>, TandemError> {
    let repo = Repository::open(repo_path)
        .map_err(|e| TandemError::Git(format!("failed to open repository: {e}")))?;

    if repo.is_empty().unwrap_or(false) {
        tracing::warn!(component, path = %repo_path.display(), "repository has no commits");
        return Ok(Vec::new());
    }

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| TandemError::Git(format!("failed to create revwalk: {e}")))?;
    revwalk
        .set_sorting(Sort::TIME | Sort::REVERSE)
        .map_err(|e| TandemError::Git(format!("failed to set revwalk order: {e}")))?;

    if let Some(ref branch) = options.branch {
        let reference = repo
            .resolve_reference_from_short_name(branch)
            .map_err(|e| TandemError::Git(format!("failed to resolve branch '{branch}': {e}")))?;
        let oid = reference
            .target()
            .ok_or_else(|| TandemError::Git(format!("branch '{branch}' has no target")))?;
        revwalk
            .push(oid)
            .map_err(|e| TandemError::Git(format!("failed to push oid: {e}")))?;
    } else {
        revwalk
            .push_head()
            .map_err(|e| TandemError::Git(format!("failed to push HEAD: {e}")))?;
    }

    let mut events = Vec::new();
    for oid_result in revwalk {
        let oid = oid_result.map_err(|e| TandemError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| TandemError::Git(format!("failed to find commit: {e}")))?;

        if commit.parent_count() > 1 && !options.include_merges {
            continue;
        }

        let (lines_added, lines_deleted) = line_stats(&repo, &commit)?;
        let author = commit.author();
        events.push(CommitEvent {
            timestamp: author.when().seconds(),
            component: component.to_string(),
            hash: oid.to_string(),
            author: author.name().unwrap_or("unknown").to_string(),
            lines_added,
            lines_deleted,
        });
    }

    // Commit and author times can disagree; the walk orders by commit time.
    events.sort_by_key(|e| e.timestamp);
    tracing::debug!(component, commits = events.len(), "mined component");
    Ok(events)
}

/// Mine every component repository under `root` in parallel and merge the
/// results into one chronologically sorted stream.
///
/// # Errors
///
/// Returns the first [`TandemError`] raised by discovery or any component.
pub fn mine_components(root: &Path, options: &MiningOptions) -> Result<Vec<CommitEvent>, TandemError> {
    let components = discover_components(root)?;
    if components.is_empty() {
        tracing::warn!(root = %root.display(), "no component repositories found");
    }

    let per_component: Vec<Vec<CommitEvent>> = components
        .par_iter()
        .map(|c| mine_component(&c.path, &c.name, options))
        .collect::<Result<_, _>>()?;

    let mut events: Vec<CommitEvent> = per_component.into_iter().flatten().collect();
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

/// Lines inserted and deleted by `commit` relative to its first parent.
fn line_stats(repo: &Repository, commit: &Commit<'_>) -> Result<(u64, u64), TandemError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| TandemError::Git(format!("failed to get commit tree: {e}")))?;

    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit
            .parent(0)
            .map_err(|e| TandemError::Git(format!("failed to get parent: {e}")))?;
        Some(
            parent
                .tree()
                .map_err(|e| TandemError::Git(format!("failed to get parent tree: {e}")))?,
        )
    } else {
        None
    };

    let mut diff_opts = DiffOptions::new();
    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), Some(&mut diff_opts))
        .map_err(|e| TandemError::Git(format!("failed to compute diff: {e}")))?;
    let stats = diff
        .stats()
        .map_err(|e| TandemError::Git(format!("failed to compute diff stats: {e}")))?;

    Ok((stats.insertions() as u64, stats.deletions() as u64))
}
