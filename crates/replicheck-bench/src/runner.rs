//! The benchmark driver.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use replicheck_client::{StoreConnector, StoreSession, Timeouts};
use replicheck_types::{AckLevel, ClusterEndpoint, NodeId, Role};

/// Role and reachability of one member at benchmark time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberOverview {
    pub node: NodeId,
    pub role: Role,
    pub reachable: bool,
}

/// Cluster context for interpreting benchmark numbers: a majority-ack
/// number means something different on a 3-member cluster than on a
/// 5-member one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOverview {
    pub members: Vec<MemberOverview>,
    /// Configured member count, i.e. how many copies a fully replicated
    /// write ends up with.
    pub replication_factor: usize,
}

impl ClusterOverview {
    pub fn reachable_count(&self) -> usize {
        self.members.iter().filter(|m| m.reachable).count()
    }
}

/// Issues back-to-back writes at each requested acknowledgment level and
/// collects per-level latency statistics.
///
/// Levels run sequentially in the order given; ids are unique across the
/// whole run so levels never collide in the target collection.
pub struct BenchmarkRunner {
    collection: String,
    next_id: u64,
}

impl BenchmarkRunner {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            next_id: 0,
        }
    }

    /// Runs `runs_per_level` writes at every level in `levels` through
    /// `session`, returning one [`LatencySummary`](crate::LatencySummary)
    /// per level.
    ///
    /// A failed write is counted in `errors` and logged; it never enters
    /// the latency sample. The run itself never fails: a level where every
    /// write failed reports zero samples.
    pub async fn run(
        &mut self,
        session: &dyn StoreSession,
        levels: &[AckLevel],
        runs_per_level: usize,
    ) -> BTreeMap<AckLevel, crate::LatencySummary> {
        let mut results = BTreeMap::new();
        for &level in levels {
            let mut tracker = crate::LatencyTracker::new();
            tracing::info!(level = %level, runs = runs_per_level, "benchmark level starting");
            for _ in 0..runs_per_level {
                let id = self.next_id;
                self.next_id += 1;

                let started = Instant::now();
                let outcome = session.insert(&self.collection, id, level).await;
                let elapsed = started.elapsed();

                if outcome.is_success() {
                    tracker.record(elapsed);
                } else {
                    tracker.record_error();
                    tracing::warn!(level = %level, id, ?outcome, "benchmark write failed");
                }
            }
            let summary = tracker.summary();
            tracing::info!(
                level = %level,
                samples = summary.samples,
                errors = summary.errors,
                mean_us = summary.mean.as_micros() as u64,
                "benchmark level complete"
            );
            results.insert(level, summary);
        }
        results
    }

    /// Probes every member once and reports roles, reachability, and the
    /// replication factor.
    pub async fn overview(
        connector: &dyn StoreConnector,
        members: &[ClusterEndpoint],
        timeouts: Timeouts,
    ) -> ClusterOverview {
        let mut overview = Vec::with_capacity(members.len());
        for endpoint in members {
            let (role, reachable) = match connector.connect(endpoint, timeouts).await {
                Ok(session) => (session.role().await.unwrap_or(Role::Unknown), true),
                Err(error) => {
                    tracing::warn!(node = %endpoint.node_id, %error, "member unreachable");
                    (Role::Unknown, false)
                }
            };
            overview.push(MemberOverview {
                node: endpoint.node_id.clone(),
                role,
                reachable,
            });
        }
        ClusterOverview {
            members: overview,
            replication_factor: members.len(),
        }
    }
}
