//! Write-latency benchmarks across acknowledgment levels.
//!
//! Answers the operator question "what does each acknowledgment level cost
//! me?": [`BenchmarkRunner`] issues back-to-back writes at each requested
//! [`AckLevel`](replicheck_types::AckLevel) through one session and reports
//! per-level latency statistics, plus an overview of the cluster (member
//! roles and the observed replication factor) so the numbers can be read in
//! context.
//!
//! Failed writes never contaminate the latency sample; they are counted
//! separately and logged.

pub mod latency;
pub mod runner;

pub use latency::{LatencySummary, LatencyTracker};
pub use runner::{BenchmarkRunner, ClusterOverview, MemberOverview};
