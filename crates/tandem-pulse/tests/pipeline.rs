//! Integration test: mine → cluster → index → score on throwaway repositories.

use std::path::Path;

use git2::{Repository, Signature, Time};
use tandem_core::{ClusterStrategy, ClusteringConfig, ScoringMethod};
use tandem_pulse::commits::{commits_before, load_commits, save_commits};
use tandem_pulse::coupling::COLUMNS;
use tandem_pulse::matrix::SupportMatrix;
use tandem_pulse::mining::{mine_components, MiningOptions};
use tandem_pulse::timeline::cumulative_coupling;
use tandem_pulse::{analyze, NeighborhoodClusterer};

// 2024-01-01T00:00:00Z
const JAN_1: i64 = 1_704_067_200;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

fn commit_at(repo: &Repository, time: i64, content: &str) {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join("data.txt"), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("data.txt")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let sig = Signature::new("dev", "dev@example.com", &Time::new(time, 0)).unwrap();
    let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &parents)
        .unwrap();
}

/// `orders` and `payments` always change together; `search` moves alone.
fn build_fleet(root: &Path) {
    let plan: [(&str, &[i64]); 3] = [
        ("orders", &[0, 2 * DAY, 35 * DAY, 60 * DAY]),
        ("payments", &[HOUR, 2 * DAY + HOUR, 35 * DAY + 2 * HOUR, 60 * DAY + HOUR]),
        ("search", &[10 * DAY, 20 * DAY, 60 * DAY + 30 * HOUR]),
    ];
    for (name, offsets) in plan {
        let path = root.join(name);
        std::fs::create_dir(&path).unwrap();
        let repo = Repository::init(&path).unwrap();
        for (i, offset) in offsets.iter().enumerate() {
            commit_at(&repo, JAN_1 + offset, &format!("{name} {i}\n"));
        }
    }
}

#[test]
fn end_to_end_on_mined_fleet() {
    let root = tempfile::tempdir().unwrap();
    build_fleet(root.path());

    // Step 1: Mine
    let events = mine_components(root.path(), &MiningOptions::default()).unwrap();
    assert_eq!(events.len(), 11);
    assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // Step 2: Round-trip through the commit file
    let file = root.path().join("commits.json");
    save_commits(&file, &events).unwrap();
    let events = load_commits(&file).unwrap();

    // Step 3: Cluster, index, score
    let report = analyze(
        &events,
        &ClusteringConfig::default(),
        ScoringMethod::Jaccard,
        None,
    )
    .unwrap();
    assert_eq!(report.stats.commits, 11);
    assert_eq!(report.stats.noise, 0);
    assert_eq!(report.stats.components, 3);
    assert_eq!(report.table.len(), 3);

    let mut table = report.table;
    table.sort_by_score();
    let top = &table.records[0];
    assert_eq!(
        (top.component_x.as_str(), top.component_y.as_str()),
        ("orders", "payments")
    );
    assert_eq!(top.score, 1.0);
    assert_eq!(top.intersection_size, 4);
    assert_eq!(top.active_period.to_string(), "2024-01-01 to 2024-03-01");

    let search_pairs: Vec<_> = table
        .records
        .iter()
        .filter(|r| r.component_y == "search")
        .collect();
    assert_eq!(search_pairs.len(), 2);
    assert!(search_pairs.iter().all(|r| r.score == 0.0));

    // Step 4: JSON keeps the fixed column set
    let json = serde_json::to_value(&table).unwrap();
    let columns: Vec<&str> = json["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert_eq!(columns, COLUMNS);

    // Step 5: Support matrix covers every pair
    assert_eq!(SupportMatrix::from_table(&table).total(), 3);
}

#[test]
fn time_window_and_timeline() {
    let root = tempfile::tempdir().unwrap();
    build_fleet(root.path());
    let events = mine_components(root.path(), &MiningOptions::default()).unwrap();

    let window = commits_before(&events, JAN_1 + 30 * DAY);
    assert_eq!(window.len(), 6);

    let clusterer = NeighborhoodClusterer::new("4h", 1).unwrap();
    let snapshots = cumulative_coupling(&events, &clusterer, ScoringMethod::Sorensen);
    let months: Vec<&str> = snapshots.iter().map(|s| s.month.as_str()).collect();
    assert_eq!(months, ["2024-01", "2024-02", "2024-03"]);
    assert!(snapshots.windows(2).all(|w| w[0].clusters <= w[1].clusters));
}

#[test]
fn density_strategy_separates_the_lone_component() {
    let root = tempfile::tempdir().unwrap();
    build_fleet(root.path());
    let events = mine_components(root.path(), &MiningOptions::default()).unwrap();

    let config = ClusteringConfig {
        strategy: ClusterStrategy::Density,
        bandwidth: "2h".into(),
        ..ClusteringConfig::default()
    };
    let report = analyze(&events, &config, ScoringMethod::Jaccard, None).unwrap();
    assert_eq!(report.stats.noise, 0);

    let orders_payments = report
        .table
        .records
        .iter()
        .find(|r| r.component_x == "orders" && r.component_y == "payments")
        .unwrap();
    assert!(orders_payments.score > 0.5);
}
