//! Local pause-state tracking around any injector.

use std::collections::BTreeSet;

use async_trait::async_trait;
use replicheck_types::NodeId;

use crate::{FaultInjector, InjectionError};

/// Wraps a [`FaultInjector`] and tracks which nodes it has paused.
///
/// The controller is an external shared resource, so pause/resume pairs
/// must be serialized per node: pausing an already-paused node or resuming
/// a node that is not paused is rejected here, before the controller is
/// ever invoked. The guard also lets scenario teardown resume anything
/// still paused.
pub struct InjectorGuard<I> {
    inner: I,
    paused: BTreeSet<NodeId>,
}

impl<I: FaultInjector> InjectorGuard<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            paused: BTreeSet::new(),
        }
    }

    /// Nodes currently held paused by this guard.
    pub fn paused(&self) -> impl Iterator<Item = &NodeId> {
        self.paused.iter()
    }

    pub fn is_paused(&self, node: &NodeId) -> bool {
        self.paused.contains(node)
    }

    /// Resumes every node still paused. Used on scenario teardown so a
    /// failed run does not leave the cluster degraded. Errors are logged
    /// and collected, not short-circuited: one stuck node must not prevent
    /// resuming the others.
    pub async fn resume_all(&mut self) -> Vec<InjectionError> {
        let nodes: Vec<NodeId> = self.paused.iter().cloned().collect();
        let mut errors = Vec::new();
        for node in nodes {
            if let Err(err) = self.resume(&node).await {
                tracing::warn!(node = %node, %err, "failed to resume during teardown");
                errors.push(err);
            }
        }
        errors
    }
}

#[async_trait]
impl<I: FaultInjector> FaultInjector for InjectorGuard<I> {
    async fn pause(&mut self, node: &NodeId) -> Result<(), InjectionError> {
        if self.paused.contains(node) {
            return Err(InjectionError::AlreadyPaused(node.clone()));
        }
        self.inner.pause(node).await?;
        self.paused.insert(node.clone());
        tracing::info!(node = %node, "fault injected: node paused");
        Ok(())
    }

    async fn resume(&mut self, node: &NodeId) -> Result<(), InjectionError> {
        if !self.paused.contains(node) {
            return Err(InjectionError::NotPaused(node.clone()));
        }
        self.inner.resume(node).await?;
        self.paused.remove(node);
        tracing::info!(node = %node, "fault removed: node resumed");
        Ok(())
    }
}
