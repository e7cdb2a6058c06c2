//! Replication-staleness scenario.

use chrono::Utc;
use tokio::time::sleep;

use replicheck_client::{ClusterView, NodeHandle, StoreConnector};
use replicheck_types::{LeadershipEvent, ScenarioResult};

use crate::config::HarnessConfig;
use crate::error::ScenarioError;
use crate::prober::{ConsistencyProber, ProbeSet};
use crate::report;
use crate::scenario::{RECORD_POLL, poll_until};
use crate::writer::WriteDriver;

const SCENARIO: &str = "staleness";

/// Measures how stale secondaries are at a given acknowledgment level.
///
/// Writes the whole batch at `config.ack_level`, snapshots every member
/// immediately (replication lag shows up as per-node missing ids), waits
/// the settle delay, and then waits for convergence. Under a strong level
/// (majority/all) the immediate snapshot is expected to be near-converged;
/// under a weak level the immediate divergence and its decay are the
/// measurement. No fault is injected.
pub async fn run_staleness(
    connector: &dyn StoreConnector,
    config: &HarnessConfig,
) -> Result<ScenarioResult, ScenarioError> {
    config.validate()?;

    let started_at = Utc::now();
    let mut unmet: Vec<String> = Vec::new();
    let mut leadership: Vec<LeadershipEvent> = Vec::new();

    // Record who is primary; the scenario observes leadership but never
    // changes it.
    if let Ok(mut view) = ClusterView::open(connector, &config.members, config.timeouts).await {
        leadership.push(LeadershipEvent {
            at: Utc::now(),
            primary: view.refresh().await.ok(),
        });
    }

    let writer_handle =
        match NodeHandle::open(connector, config.seed.clone(), config.timeouts).await {
            Ok(handle) => handle,
            Err(source) => {
                let partial = report::assemble(
                    SCENARIO,
                    started_at,
                    Vec::new(),
                    leadership,
                    Vec::new(),
                    None,
                    vec!["could not open the write stream connection".to_string()],
                );
                return Err(ScenarioError::Connect {
                    source,
                    partial: Box::new(partial),
                });
            }
        };
    let mut driver = WriteDriver::start(
        writer_handle,
        &config.collection,
        config.total_writes,
        config.write_interval,
        config.ack_level,
    );
    let total = config.total_writes;
    let finished = poll_until(config.drain_deadline, RECORD_POLL, || {
        (driver.attempted() >= total).then_some(())
    })
    .await;
    if finished.is_none() {
        unmet.push("batch did not finish within the drain deadline".into());
    }
    driver.stop();
    if !driver.join(config.join_timeout).await {
        unmet.push("writer did not terminate within the join timeout".into());
    }
    let records = driver.records();
    tracing::info!(
        level = %config.ack_level,
        attempted = records.len(),
        "staleness batch complete"
    );

    // Immediate probe: what does each member see right now?
    let prober = ConsistencyProber::new(&config.collection);
    let mut probes = ProbeSet::open(connector, &config.members, config.timeouts).await;
    let immediate = prober.snapshot(&mut probes).await;
    let immediate_missing = immediate.divergence();
    tracing::info!(
        diverged_members = immediate_missing.values().filter(|m| !m.is_empty()).count(),
        "immediate snapshot taken"
    );

    // Settle, then measure convergence.
    sleep(config.settle_delay).await;
    let wait = prober
        .wait_for_convergence(&mut probes, config.convergence_deadline, config.poll_interval)
        .await;
    if !wait.converged {
        unmet.push("members did not converge within the convergence deadline".into());
    }

    let mut snapshots = vec![immediate];
    snapshots.extend(wait.snapshots);

    Ok(report::assemble(
        SCENARIO,
        started_at,
        records,
        leadership,
        snapshots,
        None,
        unmet,
    ))
}
