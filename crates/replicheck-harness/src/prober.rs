//! Per-node consistency probes and bounded convergence waits.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, sleep};

use replicheck_client::{NodeHandle, StoreConnector, Timeouts};
use replicheck_types::{ClusterEndpoint, ConsistencySnapshot, NodeId, NodeReading};

/// The set of per-member connections a prober reads through.
///
/// Opening never fails as a whole: a member that cannot be connected is
/// carried as unreadable (with the connect error as the reason) and
/// re-attempted on every probe, so a node that comes back mid-scenario is
/// picked up again — the probe-per-call reconnect the original read path
/// relied on.
pub struct ProbeSet<'a> {
    connector: &'a dyn StoreConnector,
    timeouts: Timeouts,
    members: Vec<Member>,
}

struct Member {
    endpoint: ClusterEndpoint,
    handle: Option<NodeHandle>,
    last_error: String,
}

impl<'a> ProbeSet<'a> {
    /// Attempts to open a handle per member endpoint.
    pub async fn open(
        connector: &'a dyn StoreConnector,
        endpoints: &[ClusterEndpoint],
        timeouts: Timeouts,
    ) -> ProbeSet<'a> {
        let mut members = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let (handle, last_error) =
                match NodeHandle::open(connector, endpoint.clone(), timeouts).await {
                    Ok(handle) => (Some(handle), String::new()),
                    Err(err) => {
                        tracing::warn!(node = %endpoint.node_id, %err, "probe member unreachable at open");
                        (None, err.to_string())
                    }
                };
            members.push(Member {
                endpoint: endpoint.clone(),
                handle,
                last_error,
            });
        }
        ProbeSet {
            connector,
            timeouts,
            members,
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    async fn read_member(&mut self, index: usize, collection: &str) -> (NodeId, NodeReading) {
        let member = &mut self.members[index];
        let node_id = member.endpoint.node_id.clone();

        if member.handle.is_none() {
            match NodeHandle::open(self.connector, member.endpoint.clone(), self.timeouts).await {
                Ok(handle) => member.handle = Some(handle),
                Err(err) => {
                    member.last_error = err.to_string();
                    return (node_id, NodeReading::Unreadable(member.last_error.clone()));
                }
            }
        }

        let handle = member.handle.as_mut().expect("handle just ensured");
        match handle.read_ids(collection).await {
            Ok(ids) => (node_id, NodeReading::Ids(ids)),
            Err(err) => {
                // Drop the session so the next probe reconnects from scratch.
                member.handle = None;
                member.last_error = err.to_string();
                (node_id, NodeReading::Unreadable(member.last_error.clone()))
            }
        }
    }
}

/// Result of a bounded convergence wait: every snapshot taken, in order.
/// Always contains at least one snapshot.
#[derive(Debug, Clone)]
pub struct ConvergenceWait {
    pub snapshots: Vec<ConsistencySnapshot>,
    pub converged: bool,
}

impl ConvergenceWait {
    /// The last snapshot taken — the final word either way.
    pub fn last(&self) -> &ConsistencySnapshot {
        self.snapshots.last().expect("at least one snapshot is always taken")
    }
}

/// Reads the current id set from every node and computes convergence.
pub struct ConsistencyProber {
    collection: String,
}

impl ConsistencyProber {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    /// Takes one snapshot: the full id set from every reachable member,
    /// an explicit unreadable marker for the rest. One node's failure
    /// never hides another node's state.
    pub async fn snapshot(&self, probes: &mut ProbeSet<'_>) -> ConsistencySnapshot {
        let taken_at = Utc::now();
        let mut readings = BTreeMap::new();
        for index in 0..probes.member_count() {
            let (node, reading) = probes.read_member(index, &self.collection).await;
            readings.insert(node, reading);
        }
        ConsistencySnapshot::new(taken_at, readings)
    }

    /// Ids in `a` that are missing from `b`.
    pub fn diff(a: &BTreeSet<u64>, b: &BTreeSet<u64>) -> BTreeSet<u64> {
        a.difference(b).copied().collect()
    }

    /// Repeats snapshot + diff until all readable nodes agree or `deadline`
    /// elapses. Returns every snapshot taken either way — convergence is
    /// not guaranteed, it is what is measured. Idempotent: on an already
    /// converged cluster the first snapshot ends the wait.
    pub async fn wait_for_convergence(
        &self,
        probes: &mut ProbeSet<'_>,
        deadline: Duration,
        poll_interval: Duration,
    ) -> ConvergenceWait {
        let until = Instant::now() + deadline;
        let mut snapshots = Vec::new();

        loop {
            let snapshot = self.snapshot(probes).await;
            let converged = snapshot.is_converged();
            tracing::debug!(
                readable = snapshot.readable_count(),
                converged,
                "convergence probe"
            );
            snapshots.push(snapshot);

            if converged {
                return ConvergenceWait {
                    snapshots,
                    converged: true,
                };
            }
            if Instant::now() + poll_interval > until {
                return ConvergenceWait {
                    snapshots,
                    converged: false,
                };
            }
            sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_is_set_difference() {
        let a: BTreeSet<u64> = [0, 1, 2, 3].into_iter().collect();
        let b: BTreeSet<u64> = [0, 2].into_iter().collect();
        assert_eq!(
            ConsistencyProber::diff(&a, &b),
            [1, 3].into_iter().collect::<BTreeSet<u64>>()
        );
        assert!(ConsistencyProber::diff(&b, &a).is_empty());
    }
}
