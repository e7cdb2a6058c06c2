//! Error types for fault injection.

use replicheck_types::NodeId;
use thiserror::Error;

/// A fault could not be applied or removed.
///
/// Fatal to the current scenario: a failover test whose fault was never
/// injected measures nothing, so the scenario aborts (reporting whatever
/// partial results it collected).
#[derive(Debug, Error)]
pub enum InjectionError {
    /// Pause requested for a node the guard already holds paused.
    #[error("node {0} is already paused")]
    AlreadyPaused(NodeId),

    /// Resume requested for a node the guard does not hold paused.
    #[error("node {0} is not paused")]
    NotPaused(NodeId),

    /// The controller process could not be spawned at all.
    #[error("failed to spawn controller command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The controller ran but reported failure.
    #[error("controller command `{command}` failed with {status}: {stderr}")]
    ControllerFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The controller did not confirm within the configured bound.
    #[error("controller command `{command}` did not complete within {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
}
