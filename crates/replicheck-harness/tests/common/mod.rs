//! Shared setup for the sim-backed scenario tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::sync::Once;
use std::time::Duration;

use replicheck_harness::HarnessConfig;
use replicheck_sim::{SimCluster, SimConfig, SimConnector, SimInjector};

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber once per binary, honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A 3-node sim cluster with visible replication lag and a fast election.
pub fn sim_cluster() -> SimCluster {
    SimCluster::new(SimConfig {
        nodes: 3,
        replication_delay: Duration::from_millis(200),
        election_delay: Duration::from_millis(300),
        ack_delay: Duration::from_millis(2),
    })
}

pub fn connector(cluster: &SimCluster) -> SimConnector {
    SimConnector::new(cluster.clone())
}

pub fn injector(cluster: &SimCluster) -> SimInjector {
    SimInjector::new(cluster.clone())
}

/// The standard 3-node config, with every delay and deadline shrunk so a
/// whole scenario fits in a few virtual minutes.
pub fn sim_config() -> HarnessConfig {
    let mut config = HarnessConfig::three_node_local("sim://node");
    config.write_interval = Duration::from_millis(200);
    config.fault_hold = Duration::from_secs(2);
    config.settle_delay = Duration::from_secs(1);
    config.failure_signal_deadline = Duration::from_secs(10);
    config.election_deadline = Duration::from_secs(10);
    config.recovery_deadline = Duration::from_secs(10);
    config.drain_deadline = Duration::from_secs(60);
    config.convergence_deadline = Duration::from_secs(10);
    config.poll_interval = Duration::from_millis(100);
    config.join_timeout = Duration::from_secs(2);
    config
}
