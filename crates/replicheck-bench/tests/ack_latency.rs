//! Benchmark runner against the in-memory sim cluster.
//!
//! Uses real time (no paused clock): the sim charges a per-ack delay on
//! every write, so stronger levels must come out measurably slower.

use std::time::Duration;

use replicheck_bench::BenchmarkRunner;
use replicheck_client::{StoreConnector, Timeouts};
use replicheck_sim::{SimCluster, SimConfig, SimConnector};
use replicheck_types::{AckLevel, Role};

fn sim() -> SimCluster {
    SimCluster::new(SimConfig {
        nodes: 3,
        replication_delay: Duration::from_millis(1),
        election_delay: Duration::from_millis(50),
        ack_delay: Duration::from_millis(5),
    })
}

#[tokio::test]
async fn stronger_ack_levels_cost_more() {
    let cluster = sim();
    let connector = SimConnector::new(cluster.clone());
    let session = connector
        .connect(&cluster.seed_endpoint(), Timeouts::default())
        .await
        .unwrap();

    let mut runner = BenchmarkRunner::new("bench");
    let results = runner
        .run(
            session.as_ref(),
            &[AckLevel::None, AckLevel::Majority, AckLevel::All],
            10,
        )
        .await;

    let none = results[&AckLevel::None];
    let majority = results[&AckLevel::Majority];
    let all = results[&AckLevel::All];

    assert_eq!(none.samples, 10);
    assert_eq!(majority.samples, 10);
    assert_eq!(all.samples, 10);
    assert_eq!(none.errors + majority.errors + all.errors, 0);

    // 0, 2, and 3 acks at 5ms each.
    assert!(none.mean <= majority.mean);
    assert!(majority.mean <= all.mean);
}

#[tokio::test]
async fn failed_writes_are_counted_not_sampled() {
    let cluster = sim();
    let connector = SimConnector::new(cluster.clone());
    // Pinned to a secondary: every write is rejected with not-primary.
    let endpoints = cluster.member_endpoints();
    let session = connector
        .connect(&endpoints[1], Timeouts::default())
        .await
        .unwrap();

    let mut runner = BenchmarkRunner::new("bench");
    let results = runner.run(session.as_ref(), &[AckLevel::One], 5).await;

    let summary = results[&AckLevel::One];
    assert_eq!(summary.samples, 0);
    assert_eq!(summary.errors, 5);
}

#[tokio::test]
async fn overview_reports_roles_and_replication_factor() {
    let cluster = sim();
    let connector = SimConnector::new(cluster.clone());
    let endpoints = cluster.member_endpoints();

    let overview = BenchmarkRunner::overview(&connector, &endpoints, Timeouts::default()).await;

    assert_eq!(overview.replication_factor, 3);
    assert_eq!(overview.reachable_count(), 3);
    let primaries = overview
        .members
        .iter()
        .filter(|m| m.role == Role::Primary)
        .count();
    assert_eq!(primaries, 1);
}
