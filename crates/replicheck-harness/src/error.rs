//! Scenario-level errors.
//!
//! Component-local failures (one write, one read) are absorbed into the
//! collected data and never surface here. A [`ScenarioError`] means the
//! experiment itself could not proceed — and even then, every variant that
//! can carry a partial [`ScenarioResult`] does, so collected observations
//! are never discarded.

use thiserror::Error;

use replicheck_chaos::InjectionError;
use replicheck_client::ConnectError;
use replicheck_types::ScenarioResult;

use crate::config::ConfigError;

/// Why a scenario aborted.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A connection the scenario cannot run without could not be opened.
    #[error("cannot establish a required connection: {source}")]
    Connect {
        #[source]
        source: ConnectError,
        /// Everything collected before the abort.
        partial: Box<ScenarioResult>,
    },

    /// No primary was observed at scenario start and no explicit fault
    /// target was configured, so there is nothing to fault.
    #[error("no primary observed at scenario start and no fault_target configured")]
    NoFaultTarget {
        /// Everything collected before the abort.
        partial: Box<ScenarioResult>,
    },

    /// The fault could not be applied or removed. Continuing would
    /// invalidate the experiment's premise.
    #[error("fault injection failed during {stage}: {source}")]
    Injection {
        /// Which step failed: "pause" or "resume".
        stage: &'static str,
        #[source]
        source: InjectionError,
        /// Everything collected before the abort.
        partial: Box<ScenarioResult>,
    },
}

impl ScenarioError {
    /// The partial result collected before the abort, when one exists.
    pub fn partial_result(&self) -> Option<&ScenarioResult> {
        match self {
            ScenarioError::NoFaultTarget { partial }
            | ScenarioError::Injection { partial, .. }
            | ScenarioError::Connect { partial, .. } => Some(partial),
            ScenarioError::Config(_) => None,
        }
    }
}
