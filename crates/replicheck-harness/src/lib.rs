//! Scenario orchestration for replicheck.
//!
//! This crate composes the client, chaos, and reporting layers into
//! runnable consistency experiments:
//! - [`WriteDriver`]: a background, sequence-numbered write stream with an
//!   append-only, concurrently-readable record log
//! - [`ConsistencyProber`] / [`ProbeSet`]: per-node id-set snapshots and
//!   bounded convergence waits
//! - [`scenario`]: the failover, majority-durability, and staleness
//!   scenarios, each emitting a [`replicheck_types::ScenarioResult`]
//! - [`HarnessConfig`]: the full configuration surface, toml-loadable
//!
//! Every blocking wait in this crate takes an explicit deadline and
//! returns a "not observed" result instead of blocking indefinitely.

pub mod config;
pub mod error;
pub mod prober;
pub mod report;
pub mod scenario;
pub mod writer;

pub use config::{ConfigError, HarnessConfig};
pub use error::ScenarioError;
pub use prober::{ConsistencyProber, ConvergenceWait, ProbeSet};
pub use scenario::{run_durability, run_failover, run_staleness};
pub use writer::WriteDriver;
