//! End-to-end failover scenario against the in-memory sim cluster.

mod common;

use replicheck_harness::{ScenarioError, run_failover};
use replicheck_types::{NodeId, WriteOutcome};

use common::{connector, init_tracing, injector, sim_cluster, sim_config};

#[tokio::test(start_paused = true)]
async fn failover_observes_outage_election_and_recovery() {
    init_tracing();
    let cluster = sim_cluster();
    let connector = connector(&cluster);
    let mut injector = injector(&cluster);
    let config = sim_config();

    let result = run_failover(&connector, &mut injector, &config)
        .await
        .expect("scenario must complete");

    assert_eq!(result.scenario, "failover");
    assert!(
        result.unmet_expectations.is_empty(),
        "unexpected unmet expectations: {:?}",
        result.unmet_expectations
    );

    // The full batch ran, sequence numbers contiguous from 0.
    assert_eq!(result.records.len(), config.total_writes as usize);
    for (i, record) in result.records.iter().enumerate() {
        assert_eq!(record.seq, i as u64);
    }

    // Pausing the primary must have produced at least one failed write.
    let failures = result
        .records
        .iter()
        .filter(|r| !r.outcome.is_success())
        .count();
    assert!(failures >= 1, "no write failed during the outage");
    assert_eq!(result.metrics.writes.failures, failures as u64);

    // A different member took over.
    let old = NodeId::from("node1");
    let new = result.metrics.new_primary.clone().expect("a new primary");
    assert_ne!(new, old);
    assert!(result.leadership.len() >= 2);
    assert_eq!(result.leadership[0].primary, Some(old));

    // Writes recovered after the election: downtime is defined.
    assert!(result.metrics.first_failure_at.is_some());
    assert!(result.metrics.first_recovery_at.is_some());
    assert!(result.metrics.downtime.is_some());

    // After resume and settle, every member holds the same ids.
    assert!(result.metrics.converged);
    let last = result.snapshots.last().expect("at least one snapshot");
    assert_eq!(last.readings.len(), 3);
    assert!(last.readings.values().all(|r| r.is_readable()));

    // The report is the externally consumed artifact: a full run must
    // round-trip through JSON intact.
    let json = serde_json::to_string(&result).expect("report must serialize");
    let back: replicheck_types::ScenarioResult =
        serde_json::from_str(&json).expect("report must deserialize");
    assert_eq!(back, result);
}

#[tokio::test(start_paused = true)]
async fn failover_without_failed_writes_reports_nothing_as_downtime() {
    init_tracing();
    // Fault a secondary instead of the primary: the seed stream never
    // breaks, so downtime must be None rather than zero.
    let cluster = sim_cluster();
    let connector = connector(&cluster);
    let mut injector = injector(&cluster);
    let mut config = sim_config();
    config.fault_target = Some(NodeId::from("node3"));
    config.failure_signal_deadline = std::time::Duration::from_secs(3);
    config.election_deadline = std::time::Duration::from_secs(3);

    let result = run_failover(&connector, &mut injector, &config)
        .await
        .expect("scenario must complete");

    assert!(
        result
            .records
            .iter()
            .all(|r| matches!(r.outcome, WriteOutcome::Success)),
        "seed writes must not fail when a secondary is paused"
    );
    assert_eq!(result.metrics.first_failure_at, None);
    assert_eq!(result.metrics.downtime, None);
    // The expectations of a leader-kill run go unmet, and say so.
    assert!(
        result
            .unmet_expectations
            .iter()
            .any(|u| u.contains("no write failure"))
    );
    assert!(
        result
            .unmet_expectations
            .iter()
            .any(|u| u.contains("no new primary"))
    );
    assert!(result.metrics.converged);
}

#[tokio::test(start_paused = true)]
async fn injection_failure_aborts_with_partial_results() {
    init_tracing();
    let cluster = sim_cluster();
    let connector = connector(&cluster);
    let mut injector = injector(&cluster);
    let mut config = sim_config();
    // Valid member list for validation, but the injector knows no such node.
    config.members.push(replicheck_types::ClusterEndpoint::direct(
        "node9",
        "sim://node9",
    ));
    config.fault_target = Some(NodeId::from("node9"));

    let err = run_failover(&connector, &mut injector, &config)
        .await
        .expect_err("injection against an unknown node must abort");

    match err {
        ScenarioError::Injection { stage, partial, .. } => {
            assert_eq!(stage, "pause");
            // The partial report still carries the pre-fault write log.
            assert!(!partial.records.is_empty());
            assert!(
                partial
                    .unmet_expectations
                    .iter()
                    .any(|u| u.contains("fault was not injected"))
            );
        }
        other => panic!("expected an injection error, got {other:?}"),
    }
}
