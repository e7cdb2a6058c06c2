//! Harness configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use replicheck_client::Timeouts;
use replicheck_types::{AckLevel, ClusterEndpoint, EndpointMode, NodeId};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A recognized option has an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The full configuration surface of a scenario run.
///
/// All options are plain values. The only defaults are the documented
/// local 3-node topology from [`HarnessConfig::three_node_local`]; nothing
/// hidden changes correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Cluster-aware entry point the write stream targets.
    pub seed: ClusterEndpoint,
    /// Direct per-member endpoints, used for role polling and probes.
    pub members: Vec<ClusterEndpoint>,
    /// Collection/key-space the scenarios write into.
    pub collection: String,

    /// Total writes the driver attempts.
    pub total_writes: u64,
    /// Attempts to wait for before injecting the fault.
    pub writes_before_fault: u64,
    /// Cadence of the write stream.
    pub write_interval: Duration,
    /// Acknowledgment level for the write stream.
    pub ack_level: AckLevel,

    /// Node to fault; `None` targets whichever member is primary at
    /// scenario start.
    pub fault_target: Option<NodeId>,
    /// How long the fault is held after the post-injection observations.
    pub fault_hold: Duration,
    /// Settle delay after the fault is removed, before final probing.
    pub settle_delay: Duration,

    /// Deadline for observing the first write failure after injection.
    pub failure_signal_deadline: Duration,
    /// Deadline for observing a new primary.
    pub election_deadline: Duration,
    /// Deadline for observing the first success after the first failure.
    pub recovery_deadline: Duration,
    /// Deadline for the writer to finish its remaining writes.
    pub drain_deadline: Duration,
    /// Deadline for final convergence.
    pub convergence_deadline: Duration,

    /// Interval between polls in every polling loop.
    pub poll_interval: Duration,
    /// Bound on waiting for the writer task to terminate after stop.
    pub join_timeout: Duration,
    /// Per-operation time bounds for every connection.
    pub timeouts: Timeouts,
}

impl HarnessConfig {
    /// The documented 3-node local topology with the experiment parameters
    /// the harness was built around: 40 writes at 1s cadence, fault after
    /// 10 attempts, 6s hold, 6s settle, 30s/60s/60s/15s observation
    /// deadlines, 0.5s polls.
    pub fn three_node_local(base_address: &str) -> Self {
        let members: Vec<ClusterEndpoint> = (1..=3)
            .map(|i| ClusterEndpoint::direct(format!("node{i}"), format!("{base_address}{i}")))
            .collect();
        Self {
            seed: ClusterEndpoint::seed("cluster", base_address),
            members,
            collection: "writer_docs".to_string(),
            total_writes: 40,
            writes_before_fault: 10,
            write_interval: Duration::from_secs(1),
            ack_level: AckLevel::One,
            fault_target: None,
            fault_hold: Duration::from_secs(6),
            settle_delay: Duration::from_secs(6),
            failure_signal_deadline: Duration::from_secs(30),
            election_deadline: Duration::from_secs(60),
            recovery_deadline: Duration::from_secs(60),
            drain_deadline: Duration::from_secs(120),
            convergence_deadline: Duration::from_secs(15),
            poll_interval: Duration::from_millis(500),
            join_timeout: Duration::from_secs(5),
            timeouts: Timeouts::default(),
        }
    }

    /// Checks the recognized options for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.members.is_empty() {
            return Err(ConfigError::Invalid("no member endpoints".into()));
        }
        if self.seed.mode != EndpointMode::Seed {
            return Err(ConfigError::Invalid(
                "seed endpoint must have mode = Seed".into(),
            ));
        }
        if let Some(direct) = self
            .members
            .iter()
            .find(|m| m.mode != EndpointMode::Direct)
        {
            return Err(ConfigError::Invalid(format!(
                "member endpoint {} must have mode = Direct",
                direct.node_id
            )));
        }
        if self.total_writes == 0 {
            return Err(ConfigError::Invalid("total_writes must be >= 1".into()));
        }
        if self.writes_before_fault > self.total_writes {
            return Err(ConfigError::Invalid(
                "writes_before_fault exceeds total_writes".into(),
            ));
        }
        if let Some(target) = &self.fault_target {
            if !self.members.iter().any(|m| &m.node_id == target) {
                return Err(ConfigError::Invalid(format!(
                    "fault_target {target} is not a configured member"
                )));
            }
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be > 0".into()));
        }
        Ok(())
    }

    /// Loads configuration from a toml file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a toml file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Bound on waiting for the write stream to reach the fault threshold:
    /// the time the attempts should take at the configured cadence, plus
    /// one operation timeout per attempt, plus the poll interval as grace.
    pub fn threshold_deadline(&self) -> Duration {
        let per_attempt = self.write_interval + self.timeouts.operation;
        let attempts = u32::try_from(self.writes_before_fault)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        per_attempt
            .saturating_mul(attempts)
            .saturating_add(self.poll_interval)
    }
}
