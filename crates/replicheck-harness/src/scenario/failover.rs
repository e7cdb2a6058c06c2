//! Kill-the-leader failover scenario.

use chrono::Utc;
use tokio::time::sleep;

use replicheck_chaos::FaultInjector;
use replicheck_client::{ClusterView, NodeHandle, StoreConnector};
use replicheck_types::{LeadershipEvent, ScenarioResult, WriteRecord};

use crate::config::HarnessConfig;
use crate::error::ScenarioError;
use crate::prober::{ConsistencyProber, ProbeSet};
use crate::report;
use crate::scenario::{Phase, RECORD_POLL, poll_until};
use crate::writer::WriteDriver;

const SCENARIO: &str = "failover";

/// Runs the failover experiment: start a continuous write stream, pause
/// the primary mid-stream, observe the failure signal, the election, and
/// the recovery write, then resume the node and verify convergence.
///
/// Phase sequence:
/// `idle → writer-running → fault-injected → awaiting-failure-signal →
/// awaiting-new-primary → awaiting-recovery-write → fault-resumed →
/// stabilizing → draining-writer → reporting → done`.
///
/// Always emits a [`ScenarioResult`]; expected conditions that were not
/// observed within their deadlines are listed in `unmet_expectations`.
/// Only configuration problems, a dead cluster, and injection failures
/// abort — and the latter two attach the partial result.
pub async fn run_failover(
    connector: &dyn StoreConnector,
    injector: &mut dyn FaultInjector,
    config: &HarnessConfig,
) -> Result<ScenarioResult, ScenarioError> {
    config.validate()?;

    let started_at = Utc::now();
    let mut leadership: Vec<LeadershipEvent> = Vec::new();
    let mut unmet: Vec<String> = Vec::new();
    enter(Phase::Idle);

    // Who is primary before the experiment.
    let mut view = match ClusterView::open(connector, &config.members, config.timeouts).await {
        Ok(view) => view,
        Err(source) => {
            let partial = report::assemble(
                SCENARIO,
                started_at,
                Vec::new(),
                leadership,
                Vec::new(),
                None,
                vec!["could not open any member connection".to_string()],
            );
            return Err(ScenarioError::Connect {
                source,
                partial: Box::new(partial),
            });
        }
    };

    let primary_before = view.refresh().await.ok();
    leadership.push(LeadershipEvent {
        at: Utc::now(),
        primary: primary_before.clone(),
    });
    tracing::info!(primary = ?primary_before, "primary before experiment");

    let Some(fault_target) = config.fault_target.clone().or_else(|| primary_before.clone())
    else {
        let partial = report::assemble(
            SCENARIO,
            started_at,
            Vec::new(),
            leadership,
            Vec::new(),
            None,
            vec!["no primary observed at start".to_string()],
        );
        return Err(ScenarioError::NoFaultTarget {
            partial: Box::new(partial),
        });
    };

    // Continuous write stream against the seed endpoint.
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
    enter(Phase::WriterRunning);

    // Wait for the fault threshold.
    let threshold = config.writes_before_fault;
    let reached = poll_until(config.threshold_deadline(), RECORD_POLL, || {
        (driver.attempted() >= threshold).then_some(())
    })
    .await;
    if reached.is_none() {
        unmet.push(format!(
            "write stream did not reach {threshold} attempts within the threshold deadline"
        ));
    }

    // Inject the fault. Failure here invalidates the experiment.
    enter(Phase::FaultInjected);
    if let Err(source) = injector.pause(&fault_target).await {
        let records = drain(&mut driver, config).await;
        let partial = report::assemble(
            SCENARIO,
            started_at,
            records,
            leadership,
            Vec::new(),
            None,
            with(unmet, "fault was not injected"),
        );
        return Err(ScenarioError::Injection {
            stage: "pause",
            source,
            partial: Box::new(partial),
        });
    }

    // First failure recorded by the writer.
    enter(Phase::AwaitingFailureSignal);
    let first_failure = poll_until(config.failure_signal_deadline, RECORD_POLL, || {
        report::first_failure(&driver.records())
    })
    .await;
    match first_failure {
        Some(at) => tracing::info!(%at, "first write failure observed"),
        None => unmet.push("no write failure observed within the failure-signal deadline".into()),
    }

    // Election of a new primary.
    enter(Phase::AwaitingNewPrimary);
    let new_primary = view
        .watch_for_primary_change(
            primary_before.as_ref(),
            config.election_deadline,
            config.poll_interval,
        )
        .await;
    match &new_primary {
        Some(primary) => leadership.push(LeadershipEvent {
            at: Utc::now(),
            primary: Some(primary.clone()),
        }),
        None => unmet.push("no new primary observed within the election deadline".into()),
    }

    // First success strictly after the first failure.
    enter(Phase::AwaitingRecoveryWrite);
    if let Some(failed_at) = first_failure {
        let recovered = poll_until(config.recovery_deadline, RECORD_POLL, || {
            report::first_success_after(&driver.records(), failed_at)
        })
        .await;
        match recovered {
            Some(at) => tracing::info!(%at, "first post-failure success observed"),
            None => {
                unmet.push("no successful write observed within the recovery deadline".into());
            }
        }
    }

    // Hold the fault, then remove it.
    sleep(config.fault_hold).await;
    enter(Phase::FaultResumed);
    if let Err(source) = injector.resume(&fault_target).await {
        let records = drain(&mut driver, config).await;
        let partial = report::assemble(
            SCENARIO,
            started_at,
            records,
            leadership,
            Vec::new(),
            new_primary,
            with(unmet, "fault was not removed"),
        );
        return Err(ScenarioError::Injection {
            stage: "resume",
            source,
            partial: Box::new(partial),
        });
    }

    enter(Phase::Stabilizing);
    sleep(config.settle_delay).await;

    // Let the writer finish its remaining writes, then stop it.
    enter(Phase::DrainingWriter);
    let total = config.total_writes;
    let drained = poll_until(config.drain_deadline, RECORD_POLL, || {
        (driver.attempted() >= total).then_some(())
    })
    .await;
    if drained.is_none() {
        unmet.push("writer did not finish its remaining writes within the drain deadline".into());
    }
    driver.stop();
    if !driver.join(config.join_timeout).await {
        unmet.push("writer did not terminate within the join timeout".into());
    }
    let records = driver.records();

    // Final convergence check across all members.
    enter(Phase::Reporting);
    let prober = ConsistencyProber::new(&config.collection);
    let mut probes = ProbeSet::open(connector, &config.members, config.timeouts).await;
    let wait = prober
        .wait_for_convergence(&mut probes, config.convergence_deadline, config.poll_interval)
        .await;
    if !wait.converged {
        unmet.push("members did not converge within the convergence deadline".into());
    }

    enter(Phase::Done);
    Ok(report::assemble(
        SCENARIO,
        started_at,
        records,
        leadership,
        wait.snapshots,
        new_primary,
        unmet,
    ))
}

fn enter(phase: Phase) {
    tracing::info!(%phase, "scenario phase");
}

fn with(mut unmet: Vec<String>, reason: &str) -> Vec<String> {
    unmet.push(reason.to_string());
    unmet
}

/// Stops the writer and collects its log; used on abort paths so the
/// partial report still carries every record.
async fn drain(driver: &mut WriteDriver, config: &HarnessConfig) -> Vec<WriteRecord> {
    driver.stop();
    let _ = driver.join(config.join_timeout).await;
    driver.records()
}
