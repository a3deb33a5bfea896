//! Commit event records and their JSON file format.
//!
//! A [`CommitEvent`] is the only input shape the clustering and scoring
//! engine depends on: a Unix timestamp and the name of the component the
//! commit belongs to. The remaining fields are carried through untouched.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tandem_core::TandemError;

/// One commit, attributed to a single component.
///
/// Ordering between events is defined by `timestamp` alone; ties keep
/// their input order.
///
/// # Examples
///
/// ```
/// use tandem_pulse::commits::CommitEvent;
///
/// let event = CommitEvent::new(1_700_000_000, "billing");
/// assert_eq!(event.component, "billing");
/// assert!(event.hash.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitEvent {
    /// Unix timestamp (seconds) of the commit.
    #[serde(alias = "unix_time")]
    pub timestamp: i64,
    /// Name of the owning component.
    #[serde(alias = "ms", deserialize_with = "component_name")]
    pub component: String,
    /// Commit hash.
    #[serde(default)]
    pub hash: String,
    /// Author name.
    #[serde(default)]
    pub author: String,
    /// Lines added across all files of the commit.
    #[serde(default, alias = "lines_added")]
    pub lines_added: u64,
    /// Lines deleted across all files of the commit.
    #[serde(default, alias = "lines_deleted")]
    pub lines_deleted: u64,
}

impl CommitEvent {
    /// Create an event with an empty payload.
    pub fn new(timestamp: i64, component: impl Into<String>) -> Self {
        Self {
            timestamp,
            component: component.into(),
            hash: String::new(),
            author: String::new(),
            lines_added: 0,
            lines_deleted: 0,
        }
    }
}

/// Accept either a bare component name or an object carrying a `name`.
fn component_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ComponentField {
        Name(String),
        Object { name: String },
    }

    Ok(match ComponentField::deserialize(deserializer)? {
        ComponentField::Name(name) | ComponentField::Object { name } => name,
    })
}

/// Parse commit events from a JSON array.
///
/// The result is stably sorted by timestamp, so files written in any order
/// satisfy the chronological input contract of the clusterers.
///
/// # Errors
///
/// Returns [`TandemError::Serialization`] if the JSON does not match the
/// record shape.
///
/// # Examples
///
/// ```
/// use tandem_pulse::commits::parse_commits;
///
/// let json = r#"[
///     {"timestamp": 200, "component": "api"},
///     {"unix_time": 100, "ms": {"path": "repos/web", "name": "web"}, "lines_added": 4}
/// ]"#;
/// let events = parse_commits(json).unwrap();
/// assert_eq!(events[0].component, "web");
/// assert_eq!(events[0].lines_added, 4);
/// assert_eq!(events[1].timestamp, 200);
/// ```
pub fn parse_commits(json: &str) -> Result<Vec<CommitEvent>, TandemError> {
    let mut events: Vec<CommitEvent> = serde_json::from_str(json)?;
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

/// Load commit events from a JSON file.
///
/// # Errors
///
/// Returns [`TandemError::Io`] if the file cannot be read and
/// [`TandemError::Serialization`] if its content is malformed.
pub fn load_commits(path: &Path) -> Result<Vec<CommitEvent>, TandemError> {
    let content = std::fs::read_to_string(path)?;
    let events = parse_commits(&content)?;
    tracing::debug!(path = %path.display(), count = events.len(), "loaded commit events");
    Ok(events)
}

/// Write commit events to a JSON file.
///
/// # Errors
///
/// Returns [`TandemError::Io`] or [`TandemError::Serialization`] on failure.
pub fn save_commits(path: &Path, events: &[CommitEvent]) -> Result<(), TandemError> {
    let json = serde_json::to_string_pretty(events)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// The prefix of a chronologically sorted slice with `timestamp <= cutoff`.
///
/// # Examples
///
/// ```
/// use tandem_pulse::commits::{commits_before, CommitEvent};
///
/// let events: Vec<_> = [10, 20, 20, 30]
///     .into_iter()
///     .map(|t| CommitEvent::new(t, "a"))
///     .collect();
/// assert_eq!(commits_before(&events, 20).len(), 3);
/// assert!(commits_before(&events, 5).is_empty());
/// ```
pub fn commits_before(events: &[CommitEvent], cutoff: i64) -> &[CommitEvent] {
    let end = events.partition_point(|e| e.timestamp <= cutoff);
    &events[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_round_trip_keeps_payload() {
        let event = CommitEvent {
            timestamp: 42,
            component: "orders".into(),
            hash: "deadbeef".into(),
            author: "alice".into(),
            lines_added: 7,
            lines_deleted: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["linesAdded"], 7);
        assert!(json.get("lines_added").is_none());

        let back: CommitEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn payload_fields_are_optional() {
        let events = parse_commits(r#"[{"timestamp": 1, "component": "x"}]"#).unwrap();
        assert_eq!(events, vec![CommitEvent::new(1, "x")]);
    }

    #[test]
    fn sort_is_stable_for_equal_timestamps() {
        let json = r#"[
            {"timestamp": 5, "component": "b"},
            {"timestamp": 1, "component": "z"},
            {"timestamp": 5, "component": "a"}
        ]"#;
        let events = parse_commits(json).unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.component.as_str()).collect();
        assert_eq!(names, vec!["z", "b", "a"]);
    }

    #[test]
    fn missing_component_is_an_error() {
        let result = parse_commits(r#"[{"timestamp": 1}]"#);
        assert!(matches!(result, Err(TandemError::Serialization(_))));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.json");
        let events = vec![CommitEvent::new(1, "a"), CommitEvent::new(2, "b")];

        save_commits(&path, &events).unwrap();
        assert_eq!(load_commits(&path).unwrap(), events);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = load_commits(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(TandemError::Io(_))));
    }

    #[test]
    fn commits_before_includes_cutoff() {
        let events: Vec<_> = [1, 2, 3].into_iter().map(|t| CommitEvent::new(t, "a")).collect();
        assert_eq!(commits_before(&events, 3).len(), 3);
        assert_eq!(commits_before(&events, 2).len(), 2);
        assert_eq!(commits_before(&[], 2).len(), 0);
    }
}
