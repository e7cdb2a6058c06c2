//! Error types for client operations.

use replicheck_types::NodeId;
use thiserror::Error;

/// A node handle could not be established.
///
/// Fatal to the scenario step that needed the handle; other already-open
/// handles remain usable.
#[derive(Debug, Clone, Error)]
#[error("cannot connect to {node} at {address}: {reason}")]
pub struct ConnectError {
    pub node: NodeId,
    pub address: String,
    pub reason: String,
}

/// A single node could not be read during a probe.
///
/// Recorded as "unreadable" in the snapshot; never aborts probing other
/// nodes.
#[derive(Debug, Clone, Error)]
#[error("read from {node} failed: {reason}")]
pub struct ReadError {
    pub node: NodeId,
    pub reason: String,
}

impl ReadError {
    pub fn new(node: NodeId, reason: impl Into<String>) -> Self {
        Self {
            node,
            reason: reason.into(),
        }
    }

    pub fn timeout(node: NodeId) -> Self {
        Self::new(node, "operation timed out")
    }
}

/// No member reported a primary role during a refresh.
///
/// A valid (if undesirable) observation, not a defect: scenarios record it
/// and continue.
#[derive(Debug, Clone, Error)]
#[error("no primary observed among {polled} polled member(s)")]
pub struct NoPrimaryError {
    /// How many members answered the poll at all.
    pub polled: usize,
}
