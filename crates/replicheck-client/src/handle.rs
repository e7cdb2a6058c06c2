//! A single owned connection to one cluster member.

use std::collections::BTreeSet;

use tokio::time::timeout;

use replicheck_types::{
    AckLevel, ClusterEndpoint, FailureKind, NodeId, Reachability, Role, WriteOutcome,
};

use crate::driver::{StoreConnector, StoreSession, Timeouts};
use crate::error::{ConnectError, ReadError};

/// One live connection to one cluster member.
///
/// A handle is owned by exactly one component for the duration of a
/// scenario; handles are never shared across concurrently-running
/// scenarios. Every operation is clamped by the handle's [`Timeouts`] in
/// addition to whatever the underlying driver enforces.
pub struct NodeHandle {
    endpoint: ClusterEndpoint,
    session: Box<dyn StoreSession>,
    timeouts: Timeouts,
    reachability: Reachability,
    last_role: Role,
}

impl NodeHandle {
    /// Opens a handle to `endpoint`. The connect itself is bounded by
    /// `timeouts.connect`.
    pub async fn open(
        connector: &dyn StoreConnector,
        endpoint: ClusterEndpoint,
        timeouts: Timeouts,
    ) -> Result<Self, ConnectError> {
        let session = timeout(timeouts.connect, connector.connect(&endpoint, timeouts))
            .await
            .map_err(|_| ConnectError {
                node: endpoint.node_id.clone(),
                address: endpoint.address.clone(),
                reason: "connect timed out".to_string(),
            })??;

        Ok(Self {
            endpoint,
            session,
            timeouts,
            reachability: Reachability::Reachable,
            last_role: Role::Unknown,
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.endpoint.node_id
    }

    pub fn endpoint(&self) -> &ClusterEndpoint {
        &self.endpoint
    }

    /// Reachability as of the last operation.
    pub fn reachability(&self) -> Reachability {
        self.reachability
    }

    /// Role as of the last [`Self::observe_role`] call.
    pub fn last_role(&self) -> Role {
        self.last_role
    }

    /// Liveness check, bounded by the operation timeout.
    pub async fn ping(&mut self) -> bool {
        let alive = matches!(
            timeout(self.timeouts.operation, self.session.ping()).await,
            Ok(true)
        );
        self.note_reachable(alive);
        alive
    }

    /// Attempts one write. Never fails: every failure mode is classified
    /// into the returned outcome. A timeout at this layer means the write
    /// was handed to the driver but no acknowledgment arrived in time, so
    /// it is recorded as dispatched.
    pub async fn write(&mut self, collection: &str, id: u64, ack: AckLevel) -> WriteOutcome {
        let outcome = match timeout(
            self.timeouts.operation,
            self.session.insert(collection, id, ack),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => WriteOutcome::failed(FailureKind::Timeout, true),
        };
        self.note_reachable(outcome.is_success());
        outcome
    }

    /// Reads the full id set, bounded by the operation timeout.
    pub async fn read_ids(&mut self, collection: &str) -> Result<BTreeSet<u64>, ReadError> {
        let result = match timeout(self.timeouts.operation, self.session.read_ids(collection))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ReadError::timeout(self.node_id().clone())),
        };
        self.note_reachable(result.is_ok());
        result
    }

    /// Polls this member for its role. Errors and timeouts degrade to
    /// [`Role::Unknown`] — role observation is best-effort by design.
    pub async fn observe_role(&mut self) -> Role {
        let role = match timeout(self.timeouts.operation, self.session.role()).await {
            Ok(Ok(role)) => role,
            Ok(Err(err)) => {
                tracing::debug!(node = %self.node_id(), %err, "role probe failed");
                Role::Unknown
            }
            Err(_) => {
                tracing::debug!(node = %self.node_id(), "role probe timed out");
                Role::Unknown
            }
        };
        self.note_reachable(role != Role::Unknown);
        self.last_role = role;
        role
    }

    fn note_reachable(&mut self, ok: bool) {
        self.reachability = if ok {
            Reachability::Reachable
        } else {
            Reachability::Unreachable
        };
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("endpoint", &self.endpoint)
            .field("reachability", &self.reachability)
            .field("last_role", &self.last_role)
            .finish_non_exhaustive()
    }
}
