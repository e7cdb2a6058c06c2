//! Deterministic in-memory replicated store for harness tests.
//!
//! [`SimCluster`] models just enough of a replicated sequence store to
//! exercise every harness scenario end-to-end in-process:
//! - a designated primary accepting writes through the seed endpoint
//! - per-node replication lag: a member that contributed an acknowledgment
//!   has the write at ack time; every other member sees it
//!   `replication_delay` after it was accepted
//! - pause/resume faults: a paused node refuses connections, reads, and
//!   role probes; it catches up after resuming (pause models a
//!   partition-like stall, not data loss)
//! - lazy elections: once the primary has been paused for
//!   `election_delay`, the lowest-indexed unpaused node takes over
//! - acknowledgment enforcement: a write requiring more acks than there
//!   are unpaused members fails with write-concern-unsatisfied, and each
//!   required ack adds `ack_delay` of latency (so ack-level ordering is
//!   observable)
//!
//! The cluster implements the client traits and [`FaultInjector`], so the
//! same scenario code that drives a real deployment drives the sim.

pub mod cluster;
pub mod session;

pub use cluster::{SimCluster, SimConfig};
pub use session::{SimConnector, SimInjector};
