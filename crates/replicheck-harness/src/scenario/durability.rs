//! Majority-durability scenario.

use std::collections::BTreeSet;

use chrono::Utc;
use tokio::time::sleep;

use replicheck_chaos::FaultInjector;
use replicheck_client::{ClusterView, NodeHandle, StoreConnector};
use replicheck_types::{AckLevel, LeadershipEvent, ScenarioResult};

use crate::config::HarnessConfig;
use crate::error::ScenarioError;
use crate::prober::{ConsistencyProber, ProbeSet};
use crate::report;
use crate::scenario::{RECORD_POLL, poll_until};
use crate::writer::WriteDriver;

const SCENARIO: &str = "majority-durability";

/// Verifies that majority-acknowledged writes survive losing the primary.
///
/// Writes `total_writes` ids at [`AckLevel::Majority`] (back-to-back at
/// the configured interval), pauses the primary, holds the fault, resumes,
/// settles, and then checks that every id acknowledged before the fault is
/// present on every readable member. Any acknowledged-but-missing id is an
/// unmet expectation — that is precisely the durability violation this
/// scenario exists to catch.
pub async fn run_durability(
    connector: &dyn StoreConnector,
    injector: &mut dyn FaultInjector,
    config: &HarnessConfig,
) -> Result<ScenarioResult, ScenarioError> {
    config.validate()?;

    let started_at = Utc::now();
    let mut leadership: Vec<LeadershipEvent> = Vec::new();
    let mut unmet: Vec<String> = Vec::new();

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

    // The whole batch lands before the fault: majority-acked writes are
    // the precondition, not the observable.
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
        AckLevel::Majority,
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

    let acknowledged: BTreeSet<u64> = records
        .iter()
        .filter(|r| r.outcome.is_success())
        .map(|r| r.seq)
        .collect();
    tracing::info!(
        acknowledged = acknowledged.len(),
        attempted = records.len(),
        "majority batch complete"
    );

    // Lose the primary, bring it back, settle.
    if let Err(source) = injector.pause(&fault_target).await {
        let partial = report::assemble(
            SCENARIO,
            started_at,
            records,
            leadership,
            Vec::new(),
            None,
            {
                let mut u = unmet;
                u.push("fault was not injected".to_string());
                u
            },
        );
        return Err(ScenarioError::Injection {
            stage: "pause",
            source,
            partial: Box::new(partial),
        });
    }
    sleep(config.fault_hold).await;

    if let Err(source) = injector.resume(&fault_target).await {
        let partial = report::assemble(
            SCENARIO,
            started_at,
            records,
            leadership,
            Vec::new(),
            None,
            {
                let mut u = unmet;
                u.push("fault was not removed".to_string());
                u
            },
        );
        return Err(ScenarioError::Injection {
            stage: "resume",
            source,
            partial: Box::new(partial),
        });
    }
    sleep(config.settle_delay).await;

    // Every acknowledged id must be present on every readable member.
    let prober = ConsistencyProber::new(&config.collection);
    let mut probes = ProbeSet::open(connector, &config.members, config.timeouts).await;
    let wait = prober
        .wait_for_convergence(&mut probes, config.convergence_deadline, config.poll_interval)
        .await;
    if !wait.converged {
        unmet.push("members did not converge within the convergence deadline".into());
    }

    let last = wait.last();
    for (node, reading) in &last.readings {
        match reading.ids() {
            Some(ids) => {
                let lost = ConsistencyProber::diff(&acknowledged, ids);
                if !lost.is_empty() {
                    unmet.push(format!(
                        "acknowledged id(s) missing on {node} after recovery: {lost:?}"
                    ));
                }
            }
            // An unreadable member is unverified, not verified. Say so.
            None => unmet.push(format!(
                "{node} was unreadable after recovery; acknowledged writes could not be verified there"
            )),
        }
    }

    // A post-recovery leadership observation closes the timeline.
    let primary_after = view.refresh().await.ok();
    leadership.push(LeadershipEvent {
        at: Utc::now(),
        primary: primary_after.clone(),
    });
    let new_primary = primary_after.filter(|p| Some(p) != primary_before.as_ref());

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
