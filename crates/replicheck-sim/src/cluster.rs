//! The simulated cluster state machine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use replicheck_types::{ClusterEndpoint, NodeId, Role};

/// Tunable behavior of the simulated cluster.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Number of members.
    pub nodes: usize,
    /// Delay before a write accepted by the primary is visible on a
    /// secondary.
    pub replication_delay: Duration,
    /// How long the cluster runs without a primary after the primary is
    /// paused, before the lowest-indexed unpaused member takes over.
    pub election_delay: Duration,
    /// Added write latency per required acknowledgment.
    pub ack_delay: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: 3,
            replication_delay: Duration::from_millis(200),
            election_delay: Duration::from_millis(300),
            ack_delay: Duration::from_millis(2),
        }
    }
}

pub(crate) struct NodeState {
    pub paused: bool,
    /// Visible data per collection.
    pub committed: BTreeMap<String, BTreeSet<u64>>,
    /// Replicated-but-not-yet-visible writes: (visible_at, collection, id).
    pub pending: Vec<(Instant, String, u64)>,
}

impl NodeState {
    fn new() -> Self {
        Self {
            paused: false,
            committed: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// Moves matured pending writes into the visible set.
    pub fn apply_pending(&mut self, now: Instant) {
        let mut remaining = Vec::with_capacity(self.pending.len());
        for (visible_at, collection, id) in self.pending.drain(..) {
            if visible_at <= now {
                self.committed.entry(collection).or_default().insert(id);
            } else {
                remaining.push((visible_at, collection, id));
            }
        }
        self.pending = remaining;
    }
}

pub(crate) struct Shared {
    pub config: SimConfig,
    pub node_ids: Vec<NodeId>,
    pub nodes: Vec<NodeState>,
    /// Index of the current primary, if any.
    pub primary: Option<usize>,
    /// When the cluster lost its primary; drives the lazy election.
    pub primary_lost_at: Option<Instant>,
}

impl Shared {
    /// Runs the lazy election: once the cluster has been without a primary
    /// for `election_delay`, the lowest-indexed unpaused member takes over.
    pub fn maybe_elect(&mut self, now: Instant) {
        if self.primary.is_some() {
            return;
        }
        let Some(lost_at) = self.primary_lost_at else {
            return;
        };
        if now.duration_since(lost_at) < self.config.election_delay {
            return;
        }
        if let Some(index) = self.nodes.iter().position(|n| !n.paused) {
            self.primary = Some(index);
            self.primary_lost_at = None;
            tracing::debug!(primary = %self.node_ids[index], "sim: new primary elected");
        }
    }

    pub fn unpaused_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.paused).count()
    }
}

/// An in-memory replicated cluster. Cheap to clone; all clones share the
/// same state.
#[derive(Clone)]
pub struct SimCluster {
    pub(crate) shared: Arc<Mutex<Shared>>,
}

impl SimCluster {
    pub fn new(config: SimConfig) -> Self {
        assert!(config.nodes >= 1, "sim cluster needs at least one node");
        let node_ids = (1..=config.nodes)
            .map(|i| NodeId::new(format!("node{i}")))
            .collect();
        let nodes = (0..config.nodes).map(|_| NodeState::new()).collect();
        Self {
            shared: Arc::new(Mutex::new(Shared {
                config,
                node_ids,
                nodes,
                primary: Some(0),
                primary_lost_at: None,
            })),
        }
    }

    /// The cluster-aware entry point endpoint.
    pub fn seed_endpoint(&self) -> ClusterEndpoint {
        ClusterEndpoint::seed("cluster", "sim://cluster")
    }

    /// One direct endpoint per member.
    pub fn member_endpoints(&self) -> Vec<ClusterEndpoint> {
        let shared = self.lock();
        shared
            .node_ids
            .iter()
            .map(|id| ClusterEndpoint::direct(id.as_str(), format!("sim://{id}")))
            .collect()
    }

    /// Role of `node` as the sim itself sees it (test assertions only;
    /// the harness goes through sessions).
    pub fn role_of(&self, node: &NodeId) -> Role {
        let mut shared = self.lock();
        shared.maybe_elect(Instant::now());
        let Some(index) = shared.node_ids.iter().position(|n| n == node) else {
            return Role::Unknown;
        };
        if shared.nodes[index].paused {
            Role::Unknown
        } else if shared.primary == Some(index) {
            Role::Primary
        } else {
            Role::Secondary
        }
    }

    /// Current primary, if any (test assertions only).
    pub fn current_primary(&self) -> Option<NodeId> {
        let mut shared = self.lock();
        shared.maybe_elect(Instant::now());
        shared.primary.map(|i| shared.node_ids[i].clone())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("sim cluster lock poisoned")
    }

    pub(crate) fn index_of(&self, node: &NodeId) -> Option<usize> {
        self.lock().node_ids.iter().position(|n| n == node)
    }
}
