//! Polling-based view of cluster leadership.

use std::time::Duration;

use tokio::time::{Instant, sleep};

use replicheck_types::{ClusterEndpoint, NodeId, Role};

use crate::driver::{StoreConnector, Timeouts};
use crate::error::{ConnectError, NoPrimaryError};
use crate::handle::NodeHandle;

/// Tracks which member is currently primary, refreshed by polling.
///
/// The view reports only what it last observed; the real cluster may
/// disagree transiently. Each refresh is a fresh poll of every handle, so
/// there is no shared mutable state beyond the last observed primary.
pub struct ClusterView {
    handles: Vec<NodeHandle>,
    last_primary: Option<NodeId>,
}

impl ClusterView {
    /// Opens a handle per endpoint. Individual connect failures are logged
    /// and tolerated; failing to open *any* handle is fatal, since a view
    /// with no members cannot observe anything.
    pub async fn open(
        connector: &dyn StoreConnector,
        endpoints: &[ClusterEndpoint],
        timeouts: Timeouts,
    ) -> Result<Self, ConnectError> {
        let mut handles = Vec::with_capacity(endpoints.len());
        let mut last_err = None;

        for endpoint in endpoints {
            match NodeHandle::open(connector, endpoint.clone(), timeouts).await {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::warn!(node = %endpoint.node_id, %err, "view member unreachable at open");
                    last_err = Some(err);
                }
            }
        }

        match (handles.is_empty(), last_err) {
            (true, Some(err)) => Err(err),
            _ => Ok(Self {
                handles,
                last_primary: None,
            }),
        }
    }

    /// Polls every member and returns the one reporting a primary role.
    ///
    /// If more than one member claims primary (possible during an election),
    /// the first claimer in endpoint order is reported and the conflict is
    /// logged; the view flags exactly one primary at a time.
    pub async fn refresh(&mut self) -> Result<NodeId, NoPrimaryError> {
        let mut primary: Option<NodeId> = None;
        let mut polled = 0usize;

        for handle in &mut self.handles {
            let role = handle.observe_role().await;
            if role != Role::Unknown {
                polled += 1;
            }
            if role == Role::Primary {
                match &primary {
                    None => primary = Some(handle.node_id().clone()),
                    Some(first) => {
                        tracing::warn!(
                            first = %first,
                            also = %handle.node_id(),
                            "multiple members claim primary; keeping first"
                        );
                    }
                }
            }
        }

        match primary {
            Some(node) => {
                self.last_primary = Some(node.clone());
                Ok(node)
            }
            None => Err(NoPrimaryError { polled }),
        }
    }

    /// Polls at `poll_interval` until a primary different from `previous`
    /// is observed or `deadline` elapses. `None` means "not observed within
    /// deadline" — a valid outcome, not an error.
    pub async fn watch_for_primary_change(
        &mut self,
        previous: Option<&NodeId>,
        deadline: Duration,
        poll_interval: Duration,
    ) -> Option<NodeId> {
        let until = Instant::now() + deadline;

        loop {
            if let Ok(primary) = self.refresh().await {
                if previous != Some(&primary) {
                    tracing::info!(new_primary = %primary, "primary change observed");
                    return Some(primary);
                }
            }
            if Instant::now() + poll_interval > until {
                return None;
            }
            sleep(poll_interval).await;
        }
    }

    /// Last primary this view observed, if any.
    pub fn last_primary(&self) -> Option<&NodeId> {
        self.last_primary.as_ref()
    }

    /// Number of members this view holds handles for.
    pub fn member_count(&self) -> usize {
        self.handles.len()
    }
}
