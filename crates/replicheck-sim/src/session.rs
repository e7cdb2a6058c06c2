//! Client-trait and injector implementations backed by [`SimCluster`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use replicheck_chaos::{FaultInjector, InjectionError};
use replicheck_client::{ConnectError, ReadError, StoreConnector, StoreSession, Timeouts};
use replicheck_types::{
    AckLevel, ClusterEndpoint, EndpointMode, FailureKind, NodeId, Role, WriteOutcome,
};

use crate::cluster::SimCluster;

// ============================================================================
// Connector
// ============================================================================

/// Opens sim sessions. The seed endpoint always connects; a direct endpoint
/// connects only while its node is unpaused.
#[derive(Clone)]
pub struct SimConnector {
    cluster: SimCluster,
}

impl SimConnector {
    pub fn new(cluster: SimCluster) -> Self {
        Self { cluster }
    }
}

#[async_trait]
impl StoreConnector for SimConnector {
    async fn connect(
        &self,
        endpoint: &ClusterEndpoint,
        _timeouts: Timeouts,
    ) -> Result<Box<dyn StoreSession>, ConnectError> {
        let target = match endpoint.mode {
            EndpointMode::Seed => Target::Seed,
            EndpointMode::Direct => {
                let Some(index) = self.cluster.index_of(&endpoint.node_id) else {
                    return Err(ConnectError {
                        node: endpoint.node_id.clone(),
                        address: endpoint.address.clone(),
                        reason: "unknown member".to_string(),
                    });
                };
                if self.cluster.lock().nodes[index].paused {
                    return Err(ConnectError {
                        node: endpoint.node_id.clone(),
                        address: endpoint.address.clone(),
                        reason: "connection refused (node paused)".to_string(),
                    });
                }
                Target::Node(index)
            }
        };
        Ok(Box::new(SimSession {
            cluster: self.cluster.clone(),
            node_id: endpoint.node_id.clone(),
            target,
        }))
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Clone, Copy)]
enum Target {
    /// Cluster-aware session: writes go to whoever is primary.
    Seed,
    /// Pinned to one member.
    Node(usize),
}

struct SimSession {
    cluster: SimCluster,
    node_id: NodeId,
    target: Target,
}

impl SimSession {
    /// Resolves the member this session reads from right now, or an error
    /// if it is paused (or, for the seed, if there is no primary).
    fn resolve(&self) -> Result<usize, ReadError> {
        let mut shared = self.cluster.lock();
        shared.maybe_elect(Instant::now());
        match self.target {
            Target::Seed => shared
                .primary
                .ok_or_else(|| ReadError::new(self.node_id.clone(), "no primary available")),
            Target::Node(index) => {
                if shared.nodes[index].paused {
                    Err(ReadError::new(self.node_id.clone(), "node is paused"))
                } else {
                    Ok(index)
                }
            }
        }
    }
}

#[async_trait]
impl StoreSession for SimSession {
    async fn ping(&self) -> bool {
        self.resolve().is_ok()
    }

    async fn insert(&self, collection: &str, id: u64, ack: AckLevel) -> WriteOutcome {
        // Each required acknowledgment is one replication round-trip.
        let (required, ack_delay) = {
            let shared = self.cluster.lock();
            (
                ack.required_acks(shared.nodes.len()),
                shared.config.ack_delay,
            )
        };
        if required > 0 {
            sleep(ack_delay * u32::try_from(required).unwrap_or(u32::MAX)).await;
        }

        let now = Instant::now();
        let mut shared = self.cluster.lock();
        shared.maybe_elect(now);

        let primary = match self.target {
            Target::Seed => match shared.primary {
                Some(index) => index,
                // Nothing to send the write to: the client gives up
                // without ever dispatching it.
                None => return WriteOutcome::failed(FailureKind::Timeout, false),
            },
            Target::Node(index) => {
                if shared.nodes[index].paused {
                    return WriteOutcome::failed(FailureKind::Disconnect, false);
                }
                if shared.primary != Some(index) {
                    return WriteOutcome::failed(FailureKind::NotPrimary, true);
                }
                index
            }
        };

        // The primary always applies the write. A member that contributed
        // an acknowledgment has the write applied at ack time; everyone
        // else receives it after the replication delay.
        let replication_delay = shared.config.replication_delay;
        let satisfiable = required <= shared.unpaused_count();
        shared.nodes[primary]
            .committed
            .entry(collection.to_string())
            .or_default()
            .insert(id);
        let mut acked = 1;
        for (index, node) in shared.nodes.iter_mut().enumerate() {
            if index == primary {
                continue;
            }
            if !node.paused && acked < required {
                node.committed
                    .entry(collection.to_string())
                    .or_default()
                    .insert(id);
                acked += 1;
            } else {
                node.pending
                    .push((now + replication_delay, collection.to_string(), id));
            }
        }

        if satisfiable {
            WriteOutcome::Success
        } else {
            WriteOutcome::failed(FailureKind::WriteConcernUnsatisfied, true)
        }
    }

    async fn read_ids(&self, collection: &str) -> Result<BTreeSet<u64>, ReadError> {
        let index = self.resolve()?;
        let now = Instant::now();
        let mut shared = self.cluster.lock();
        shared.nodes[index].apply_pending(now);
        Ok(shared.nodes[index]
            .committed
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn role(&self) -> Result<Role, ReadError> {
        let index = self.resolve()?;
        let shared = self.cluster.lock();
        if shared.primary == Some(index) {
            Ok(Role::Primary)
        } else {
            Ok(Role::Secondary)
        }
    }
}

// ============================================================================
// Injector
// ============================================================================

/// Pauses and resumes sim members. Pausing the primary vacates the
/// leadership and starts the election clock.
#[derive(Clone)]
pub struct SimInjector {
    cluster: SimCluster,
}

impl SimInjector {
    pub fn new(cluster: SimCluster) -> Self {
        Self { cluster }
    }

    fn index_of(&self, node: &NodeId, command: &str) -> Result<usize, InjectionError> {
        self.cluster
            .index_of(node)
            .ok_or_else(|| InjectionError::ControllerFailed {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("no such member: {node}"),
            })
    }
}

#[async_trait]
impl FaultInjector for SimInjector {
    async fn pause(&mut self, node: &NodeId) -> Result<(), InjectionError> {
        let index = self.index_of(node, &format!("sim pause {node}"))?;
        let mut shared = self.cluster.lock();
        shared.nodes[index].paused = true;
        if shared.primary == Some(index) {
            shared.primary = None;
            shared.primary_lost_at = Some(Instant::now());
            tracing::debug!(%node, "sim: primary paused, leadership vacated");
        }
        Ok(())
    }

    async fn resume(&mut self, node: &NodeId) -> Result<(), InjectionError> {
        let index = self.index_of(node, &format!("sim resume {node}"))?;
        let mut shared = self.cluster.lock();
        shared.nodes[index].paused = false;
        tracing::debug!(%node, "sim: node resumed");
        Ok(())
    }
}
