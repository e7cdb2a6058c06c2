//! # replicheck-types: Core types for the replicheck harness
//!
//! This crate contains the shared data model used across the harness:
//! - Cluster identity ([`NodeId`], [`ClusterEndpoint`], [`EndpointMode`])
//! - Observed state ([`Role`], [`Reachability`])
//! - Write stream records ([`AckLevel`], [`WriteOutcome`], [`WriteRecord`])
//! - Probe results ([`NodeReading`], [`ConsistencySnapshot`])
//! - Scenario reporting ([`LeadershipEvent`], [`ScenarioResult`],
//!   [`ScenarioMetrics`], [`WriteSummary`])
//!
//! All types here are plain data: no I/O, no clocks, no driver dependency.
//! They are the only vocabulary the harness components share.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Cluster Identity
// ============================================================================

/// Identifier of one cluster member, as known to the node controller
/// (e.g. a container or process name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How an endpoint routes requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointMode {
    /// Cluster-aware entry point: the driver routes writes to whichever
    /// member is currently primary.
    Seed,
    /// Direct connection to a single member, bypassing routing. Used for
    /// per-node probes and role observation.
    Direct,
}

/// One addressable connection target. Immutable once configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    /// The member this endpoint reaches (for [`EndpointMode::Seed`], a
    /// synthetic id naming the cluster entry point).
    pub node_id: NodeId,
    /// Driver-understood address (URI, host:port, or a sim address).
    pub address: String,
    /// Seed vs. direct routing.
    pub mode: EndpointMode,
}

impl ClusterEndpoint {
    pub fn seed(node_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            node_id: NodeId::new(node_id),
            address: address.into(),
            mode: EndpointMode::Seed,
        }
    }

    pub fn direct(node_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            node_id: NodeId::new(node_id),
            address: address.into(),
            mode: EndpointMode::Direct,
        }
    }
}

// ============================================================================
// Observed Member State
// ============================================================================

/// Last-observed role of a member, from that observer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Accepting writes.
    Primary,
    /// Replicating from the primary.
    Secondary,
    /// Role could not be determined.
    Unknown,
}

/// Reachability of a member as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    /// Never probed.
    Unknown,
    /// Last operation succeeded.
    Reachable,
    /// Last operation failed or timed out.
    Unreachable,
}

// ============================================================================
// Write Stream
// ============================================================================

/// How many replicas must confirm a write before it counts as successful.
///
/// Ordered by strength: `None < One < Majority < All`. The mapping onto a
/// concrete store's write-concern vocabulary is the connector's job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AckLevel {
    /// Fire-and-forget: no acknowledgment requested.
    None,
    /// Acknowledged by the primary only.
    One,
    /// Acknowledged by a majority of members.
    Majority,
    /// Acknowledged by every member.
    All,
}

impl AckLevel {
    /// Number of members that must acknowledge, given the cluster size.
    pub fn required_acks(self, cluster_size: usize) -> usize {
        match self {
            AckLevel::None => 0,
            AckLevel::One => 1,
            AckLevel::Majority => cluster_size / 2 + 1,
            AckLevel::All => cluster_size,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AckLevel::None => "none",
            AckLevel::One => "one",
            AckLevel::Majority => "majority",
            AckLevel::All => "all",
        }
    }
}

impl Display for AckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a write attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No acknowledgment within the operation timeout.
    Timeout,
    /// The connection dropped mid-operation.
    Disconnect,
    /// The store accepted the write but could not satisfy the requested
    /// acknowledgment level.
    WriteConcernUnsatisfied,
    /// The member contacted was not the primary.
    NotPrimary,
    /// Anything else, with the driver's own description.
    Other(String),
}

/// A failed write attempt.
///
/// `dispatched` records whether the write reached the transport at all:
/// `false` means it was never sent (e.g. no member was selectable), `true`
/// means it was sent but not acknowledged. Durability analysis depends on
/// this distinction — an unacknowledged-but-sent write may still be present
/// on some member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub kind: FailureKind,
    pub dispatched: bool,
}

/// Outcome of one write attempt. Recorded, never propagated as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    Success,
    Failed(WriteFailure),
}

impl WriteOutcome {
    pub fn failed(kind: FailureKind, dispatched: bool) -> Self {
        WriteOutcome::Failed(WriteFailure { kind, dispatched })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Success)
    }
}

/// One entry in a write driver's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRecord {
    /// Monotonic sequence number, unique within one driver run.
    pub seq: u64,
    /// Wall-clock time the attempt was issued.
    pub issued_at: DateTime<Utc>,
    /// What happened.
    pub outcome: WriteOutcome,
    /// Time from issue to outcome.
    pub latency: Duration,
}

// ============================================================================
// Consistency Probes
// ============================================================================

/// What one node reported when probed for its id set.
///
/// An empty id set and an unreadable node are different observations: the
/// first means "zero rows", the second means "could not ask". They must
/// never be conflated, so the distinction is baked into the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeReading {
    /// The node answered with this ordered id set (possibly empty).
    Ids(BTreeSet<u64>),
    /// The node could not be read; the string is the read error.
    Unreadable(String),
}

impl NodeReading {
    pub fn ids(&self) -> Option<&BTreeSet<u64>> {
        match self {
            NodeReading::Ids(ids) => Some(ids),
            NodeReading::Unreadable(_) => None,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, NodeReading::Ids(_))
    }
}

/// Point-in-time observation of every node's id set.
///
/// Staleness between nodes is expected — it is the quantity under test,
/// not an error. Immutable once taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencySnapshot {
    pub taken_at: DateTime<Utc>,
    pub readings: BTreeMap<NodeId, NodeReading>,
}

impl ConsistencySnapshot {
    pub fn new(taken_at: DateTime<Utc>, readings: BTreeMap<NodeId, NodeReading>) -> Self {
        Self { taken_at, readings }
    }

    /// The baseline node for missing-id comparisons: the readable node with
    /// the highest observed id. Ties break to the first node id in order.
    /// `None` when no node was readable.
    pub fn baseline(&self) -> Option<&NodeId> {
        self.readings
            .iter()
            .filter_map(|(node, reading)| reading.ids().map(|ids| (node, ids)))
            .max_by(|(a_node, a), (b_node, b)| {
                let a_max = a.iter().next_back();
                let b_max = b.iter().next_back();
                // BTreeMap iteration is ascending, so prefer the earlier
                // node id on equal max: compare (max, Reverse(node)).
                a_max
                    .cmp(&b_max)
                    .then_with(|| b_node.cmp(a_node))
            })
            .map(|(node, _)| node)
    }

    /// Ids present on `baseline` but missing on `node`. `None` when either
    /// reading is unreadable.
    pub fn missing_from(&self, baseline: &NodeId, node: &NodeId) -> Option<BTreeSet<u64>> {
        let base = self.readings.get(baseline)?.ids()?;
        let other = self.readings.get(node)?.ids()?;
        Some(base.difference(other).copied().collect())
    }

    /// Per-node missing-id sets relative to [`Self::baseline`]. Unreadable
    /// nodes are omitted — absence of a node here does not mean it agrees.
    pub fn divergence(&self) -> BTreeMap<NodeId, BTreeSet<u64>> {
        let Some(baseline) = self.baseline() else {
            return BTreeMap::new();
        };
        self.readings
            .keys()
            .filter(|node| *node != baseline)
            .filter_map(|node| {
                self.missing_from(baseline, node)
                    .map(|missing| (node.clone(), missing))
            })
            .collect()
    }

    /// True when all readable nodes report identical id sets. Vacuously
    /// true with fewer than two readable nodes.
    pub fn is_converged(&self) -> bool {
        let mut readable = self.readings.values().filter_map(NodeReading::ids);
        match readable.next() {
            Some(first) => readable.all(|ids| ids == first),
            None => true,
        }
    }

    /// Number of readable nodes in this snapshot.
    pub fn readable_count(&self) -> usize {
        self.readings.values().filter(|r| r.is_readable()).count()
    }
}

// ============================================================================
// Scenario Reporting
// ============================================================================

/// One observed change in the cluster's leadership, from the harness's
/// polling perspective. `primary: None` records "no primary observed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadershipEvent {
    pub at: DateTime<Utc>,
    pub primary: Option<NodeId>,
}

/// Counts over one write driver's record log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Metrics derived from a scenario's raw observations.
///
/// Every field that depends on an event that may not have happened is an
/// `Option`: undefined is reported as `None`, never as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub writes: WriteSummary,
    /// Timestamp of the first failed write, if any failed.
    pub first_failure_at: Option<DateTime<Utc>>,
    /// Timestamp of the first successful write strictly after the first
    /// failure, if both exist.
    pub first_recovery_at: Option<DateTime<Utc>>,
    /// `first_recovery_at - first_failure_at`. Defined only when both
    /// exist; by construction never negative.
    pub downtime: Option<Duration>,
    /// New primary observed after fault injection, if any.
    pub new_primary: Option<NodeId>,
    /// Per-node missing-id sets from the final snapshot.
    pub missing: BTreeMap<NodeId, BTreeSet<u64>>,
    /// Whether the final snapshot converged.
    pub converged: bool,
}

/// The structured report a scenario run produces. This is the sole
/// externally consumed artifact; rendering it is a presentation concern.
///
/// Always emitted, even when a sub-step did not reach its expected
/// condition — unmet expectations are listed explicitly instead of
/// discarding the collected data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Full write log, ordered by sequence number.
    pub records: Vec<WriteRecord>,
    /// Leadership-change timeline as observed by polling.
    pub leadership: Vec<LeadershipEvent>,
    /// Every snapshot taken, in probe order.
    pub snapshots: Vec<ConsistencySnapshot>,
    pub metrics: ScenarioMetrics,
    /// Conditions the scenario expected but did not observe within its
    /// deadlines (e.g. "no new primary within 60s").
    pub unmet_expectations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ids(xs: &[u64]) -> BTreeSet<u64> {
        xs.iter().copied().collect()
    }

    fn snapshot(readings: &[(&str, NodeReading)]) -> ConsistencySnapshot {
        ConsistencySnapshot::new(
            Utc::now(),
            readings
                .iter()
                .map(|(n, r)| (NodeId::from(*n), r.clone()))
                .collect(),
        )
    }

    #[test]
    fn ack_level_ordering_by_strength() {
        assert!(AckLevel::None < AckLevel::One);
        assert!(AckLevel::One < AckLevel::Majority);
        assert!(AckLevel::Majority < AckLevel::All);
    }

    #[test_case(3, 2 ; "three members")]
    #[test_case(4, 3 ; "four members")]
    #[test_case(5, 3 ; "five members")]
    fn required_acks_scale_with_cluster_size(size: usize, majority: usize) {
        assert_eq!(AckLevel::None.required_acks(size), 0);
        assert_eq!(AckLevel::One.required_acks(size), 1);
        assert_eq!(AckLevel::Majority.required_acks(size), majority);
        assert_eq!(AckLevel::All.required_acks(size), size);
    }

    #[test]
    fn baseline_picks_highest_observed_id() {
        let snap = snapshot(&[
            ("n1", NodeReading::Ids(ids(&[0, 1, 2]))),
            ("n2", NodeReading::Ids(ids(&[0, 1, 2, 3, 4]))),
            ("n3", NodeReading::Ids(ids(&[0]))),
        ]);
        assert_eq!(snap.baseline(), Some(&NodeId::from("n2")));
    }

    #[test]
    fn baseline_tie_breaks_to_first_node() {
        let snap = snapshot(&[
            ("n1", NodeReading::Ids(ids(&[0, 2]))),
            ("n2", NodeReading::Ids(ids(&[0, 1, 2]))),
        ]);
        assert_eq!(snap.baseline(), Some(&NodeId::from("n1")));
    }

    #[test]
    fn baseline_ignores_unreadable_nodes() {
        let snap = snapshot(&[
            ("n1", NodeReading::Unreadable("timed out".into())),
            ("n2", NodeReading::Ids(ids(&[0]))),
        ]);
        assert_eq!(snap.baseline(), Some(&NodeId::from("n2")));

        let all_down = snapshot(&[("n1", NodeReading::Unreadable("down".into()))]);
        assert_eq!(all_down.baseline(), None);
    }

    #[test]
    fn empty_set_is_readable_and_distinct_from_unreadable() {
        let snap = snapshot(&[
            ("n1", NodeReading::Ids(ids(&[]))),
            ("n2", NodeReading::Unreadable("refused".into())),
        ]);
        assert!(snap.readings[&NodeId::from("n1")].is_readable());
        assert!(!snap.readings[&NodeId::from("n2")].is_readable());
        assert_eq!(snap.readable_count(), 1);
    }

    #[test]
    fn divergence_reports_missing_per_node() {
        let snap = snapshot(&[
            ("n1", NodeReading::Ids(ids(&[0, 1, 2, 3]))),
            ("n2", NodeReading::Ids(ids(&[0, 1]))),
            ("n3", NodeReading::Unreadable("down".into())),
        ]);
        let div = snap.divergence();
        assert_eq!(div[&NodeId::from("n2")], ids(&[2, 3]));
        // Unreadable nodes are omitted, not reported as missing-everything.
        assert!(!div.contains_key(&NodeId::from("n3")));
    }

    #[test]
    fn convergence_over_readable_nodes_only() {
        let converged = snapshot(&[
            ("n1", NodeReading::Ids(ids(&[0, 1]))),
            ("n2", NodeReading::Ids(ids(&[0, 1]))),
            ("n3", NodeReading::Unreadable("down".into())),
        ]);
        assert!(converged.is_converged());

        let diverged = snapshot(&[
            ("n1", NodeReading::Ids(ids(&[0, 1]))),
            ("n2", NodeReading::Ids(ids(&[0]))),
        ]);
        assert!(!diverged.is_converged());

        let nothing_readable = snapshot(&[("n1", NodeReading::Unreadable("down".into()))]);
        assert!(nothing_readable.is_converged());
    }

    #[test]
    fn scenario_result_round_trips_through_json() {
        let result = ScenarioResult {
            scenario: "failover".into(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            records: vec![WriteRecord {
                seq: 0,
                issued_at: Utc::now(),
                outcome: WriteOutcome::failed(FailureKind::Timeout, true),
                latency: Duration::from_millis(3000),
            }],
            leadership: vec![LeadershipEvent {
                at: Utc::now(),
                primary: Some(NodeId::from("n1")),
            }],
            snapshots: vec![],
            metrics: ScenarioMetrics::default(),
            unmet_expectations: vec!["no new primary within 60s".into()],
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ScenarioResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
