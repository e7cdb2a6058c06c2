//! Scenario orchestrators.
//!
//! Each scenario composes the write driver, fault injector, cluster view,
//! and consistency prober into one experiment and produces a
//! [`replicheck_types::ScenarioResult`]. A scenario always reaches its
//! terminal state with a result: sub-steps that did not observe their
//! expected condition are listed as unmet expectations, never raised as
//! errors that would discard the collected data.

pub mod durability;
pub mod failover;
pub mod staleness;

pub use durability::run_durability;
pub use failover::run_failover;
pub use staleness::run_staleness;

use std::fmt::{self, Display};
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Poll cadence for scanning the growing write-record log. Record scans
/// are cheap (a lock and a clone), so this is finer than the cluster
/// poll interval.
pub(crate) const RECORD_POLL: Duration = Duration::from_millis(100);

/// Polls `check` until it yields a value or `deadline` elapses.
/// `None` means "not observed within deadline".
pub(crate) async fn poll_until<T, F>(deadline: Duration, poll: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let until = Instant::now() + deadline;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if Instant::now() + poll > until {
            return None;
        }
        sleep(poll).await;
    }
}

/// Scenario phases. Used for structured progress logging; the transitions
/// are documented on [`run_failover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    WriterRunning,
    FaultInjected,
    AwaitingFailureSignal,
    AwaitingNewPrimary,
    AwaitingRecoveryWrite,
    FaultResumed,
    Stabilizing,
    DrainingWriter,
    Reporting,
    Done,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::WriterRunning => "writer-running",
            Phase::FaultInjected => "fault-injected",
            Phase::AwaitingFailureSignal => "awaiting-failure-signal",
            Phase::AwaitingNewPrimary => "awaiting-new-primary",
            Phase::AwaitingRecoveryWrite => "awaiting-recovery-write",
            Phase::FaultResumed => "fault-resumed",
            Phase::Stabilizing => "stabilizing",
            Phase::DrainingWriter => "draining-writer",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
