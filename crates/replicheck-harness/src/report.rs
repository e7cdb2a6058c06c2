//! Derived metrics and result assembly.

use std::time::Duration;

use chrono::{DateTime, Utc};

use replicheck_types::{
    ConsistencySnapshot, LeadershipEvent, NodeId, ScenarioMetrics, ScenarioResult, WriteRecord,
    WriteSummary,
};

/// Counts over a record log.
pub fn summarize(records: &[WriteRecord]) -> WriteSummary {
    let successes = records.iter().filter(|r| r.outcome.is_success()).count() as u64;
    WriteSummary {
        attempts: records.len() as u64,
        successes,
        failures: records.len() as u64 - successes,
    }
}

/// Timestamp of the first failed attempt, if any failed.
pub fn first_failure(records: &[WriteRecord]) -> Option<DateTime<Utc>> {
    records
        .iter()
        .find(|r| !r.outcome.is_success())
        .map(|r| r.issued_at)
}

/// Timestamp of the first successful attempt issued strictly after
/// `after`.
pub fn first_success_after(records: &[WriteRecord], after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    records
        .iter()
        .find(|r| r.outcome.is_success() && r.issued_at > after)
        .map(|r| r.issued_at)
}

/// Downtime = first post-failure success − first failure. Defined only
/// when both exist; the strictly-after requirement makes it non-negative
/// by construction. `None` means undefined, never zero.
pub fn downtime(records: &[WriteRecord]) -> Option<Duration> {
    let failed_at = first_failure(records)?;
    let recovered_at = first_success_after(records, failed_at)?;
    (recovered_at - failed_at).to_std().ok()
}

/// Derives the full metric set from a scenario's raw observations.
pub fn metrics(
    records: &[WriteRecord],
    final_snapshot: Option<&ConsistencySnapshot>,
    new_primary: Option<NodeId>,
) -> ScenarioMetrics {
    let first_failure_at = first_failure(records);
    let first_recovery_at = first_failure_at.and_then(|t| first_success_after(records, t));
    ScenarioMetrics {
        writes: summarize(records),
        first_failure_at,
        first_recovery_at,
        downtime: downtime(records),
        new_primary,
        missing: final_snapshot.map(ConsistencySnapshot::divergence).unwrap_or_default(),
        converged: final_snapshot.is_some_and(ConsistencySnapshot::is_converged),
    }
}

/// Assembles the final report. Called on every exit path — aborted
/// scenarios report whatever was collected, with the reason in
/// `unmet_expectations`.
pub fn assemble(
    scenario: &str,
    started_at: DateTime<Utc>,
    records: Vec<WriteRecord>,
    leadership: Vec<LeadershipEvent>,
    snapshots: Vec<ConsistencySnapshot>,
    new_primary: Option<NodeId>,
    unmet_expectations: Vec<String>,
) -> ScenarioResult {
    let metrics = metrics(&records, snapshots.last(), new_primary);
    ScenarioResult {
        scenario: scenario.to_string(),
        started_at,
        ended_at: Utc::now(),
        records,
        leadership,
        snapshots,
        metrics,
        unmet_expectations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use proptest::prelude::*;
    use replicheck_types::{FailureKind, WriteOutcome};

    fn record(seq: u64, at: DateTime<Utc>, ok: bool) -> WriteRecord {
        WriteRecord {
            seq,
            issued_at: at,
            outcome: if ok {
                WriteOutcome::Success
            } else {
                WriteOutcome::failed(FailureKind::Timeout, true)
            },
            latency: Duration::from_millis(5),
        }
    }

    fn log(pattern: &[bool]) -> Vec<WriteRecord> {
        let base = Utc::now();
        pattern
            .iter()
            .enumerate()
            .map(|(i, ok)| record(i as u64, base + TimeDelta::seconds(i as i64), *ok))
            .collect()
    }

    #[test]
    fn downtime_undefined_without_failure() {
        assert_eq!(downtime(&log(&[true, true, true])), None);
        assert_eq!(downtime(&[]), None);
    }

    #[test]
    fn downtime_undefined_without_recovery() {
        assert_eq!(downtime(&log(&[true, false, false])), None);
    }

    #[test]
    fn downtime_spans_first_failure_to_first_recovery() {
        // fail at t=1, recover at t=3
        let records = log(&[true, false, false, true, true]);
        assert_eq!(downtime(&records), Some(Duration::from_secs(2)));
    }

    #[test]
    fn success_at_same_instant_as_failure_is_not_recovery() {
        let at = Utc::now();
        let records = vec![record(0, at, false), record(1, at, true)];
        assert_eq!(downtime(&records), None);
    }

    #[test]
    fn summary_counts_add_up() {
        let summary = summarize(&log(&[true, false, true, false, false]));
        assert_eq!(summary.attempts, 5);
        assert_eq!(summary.successes, 2);
        assert_eq!(summary.failures, 3);
    }

    proptest! {
        /// Downtime is never negative, for any outcome pattern over a
        /// monotonic timeline.
        #[test]
        fn downtime_never_negative(pattern in proptest::collection::vec(any::<bool>(), 0..64)) {
            let records = log(&pattern);
            if let Some(d) = downtime(&records) {
                // Duration is unsigned; the point is that the computation
                // did not fail on a negative delta.
                prop_assert!(d >= Duration::ZERO);
            } else {
                // Undefined only when no failure or no later success.
                let failed_at = first_failure(&records);
                let recovery = failed_at.and_then(|t| first_success_after(&records, t));
                prop_assert!(failed_at.is_none() || recovery.is_none());
            }
        }

        /// The summary always partitions the attempts.
        #[test]
        fn summary_partitions_attempts(pattern in proptest::collection::vec(any::<bool>(), 0..64)) {
            let summary = summarize(&log(&pattern));
            prop_assert_eq!(summary.successes + summary.failures, summary.attempts);
        }
    }
}
