//! The store-driver interface the harness consumes.
//!
//! This is deliberately the smallest capability set the scenarios need:
//! connect, ping, insert-with-ack-level, read the full id set, and report
//! the member's own role. A driver for a concrete store implements these
//! two traits; the harness never sees anything store-specific.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use replicheck_types::{AckLevel, ClusterEndpoint, Role, WriteOutcome};

use crate::error::{ConnectError, ReadError};

/// Mandatory per-operation time bounds. An unbounded call is a defect, so
/// every session operation is clamped with these regardless of what the
/// underlying driver does internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Bound on establishing a session.
    pub connect: Duration,
    /// Bound on any single session operation.
    pub operation: Duration,
}

impl Timeouts {
    pub fn new(connect: Duration, operation: Duration) -> Self {
        Self { connect, operation }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        // Matches the 3s server-selection / socket timeouts the probe
        // connections historically used.
        Self {
            connect: Duration::from_secs(3),
            operation: Duration::from_secs(3),
        }
    }
}

/// Opens sessions against cluster endpoints.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Establishes a live session to `endpoint`, verifying liveness (e.g.
    /// with a ping) before returning.
    async fn connect(
        &self,
        endpoint: &ClusterEndpoint,
        timeouts: Timeouts,
    ) -> Result<Box<dyn StoreSession>, ConnectError>;
}

/// A live session to one endpoint. Network I/O only; no local caching.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Liveness check. `false` on any failure.
    async fn ping(&self) -> bool;

    /// Inserts the document identified by `id` into `collection` at the
    /// given acknowledgment level. Failures are classified into the
    /// outcome, never raised.
    async fn insert(&self, collection: &str, id: u64, ack: AckLevel) -> WriteOutcome;

    /// Reads the full ordered id set of `collection`.
    async fn read_ids(&self, collection: &str) -> Result<BTreeSet<u64>, ReadError>;

    /// The role this member currently reports for itself.
    async fn role(&self) -> Result<Role, ReadError>;
}
