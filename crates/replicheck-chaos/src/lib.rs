//! Fault injection for the replicheck harness.
//!
//! The harness never implements a pause mechanism itself — it sequences
//! calls to an external node-lifecycle controller through the
//! [`FaultInjector`] trait and waits for synchronous confirmation before
//! proceeding. Failure to apply or remove a fault invalidates the
//! experiment's premise, so it is fatal to the running scenario, never
//! silently ignored.
//!
//! - [`FaultInjector`]: the pause/resume capability
//! - [`InjectorGuard`]: serializes pause/resume pairs per node
//! - [`CommandInjector`]: shells out to an operator-configured controller

pub mod command;
pub mod error;
pub mod guard;

pub use command::CommandInjector;
pub use error::InjectionError;
pub use guard::InjectorGuard;

use async_trait::async_trait;
use replicheck_types::NodeId;

/// Pause/resume capability over an external node-lifecycle controller
/// (container or process manager). Both calls are synchronous from the
/// caller's perspective: they return only once the controller has
/// confirmed the operation or failed.
#[async_trait]
pub trait FaultInjector: Send + Sync {
    /// Suspends the node, simulating a crash or partition-like failure.
    async fn pause(&mut self, node: &NodeId) -> Result<(), InjectionError>;

    /// Brings the node back.
    async fn resume(&mut self, node: &NodeId) -> Result<(), InjectionError>;
}
