//! Command-backed fault injector.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use replicheck_types::NodeId;

use crate::{FaultInjector, InjectionError};

/// Drives any node-lifecycle controller that is invocable as
/// `<program> <verb> <node-id>` (e.g. `docker pause mongo1`,
/// `systemctl stop store@n2`). The program and verbs are configuration;
/// no specific process manager is hard-coded.
///
/// Success is the controller exiting with status 0 within the bound;
/// anything else is an [`InjectionError`].
pub struct CommandInjector {
    program: String,
    pause_verb: String,
    resume_verb: String,
    timeout: Duration,
}

impl CommandInjector {
    pub fn new(
        program: impl Into<String>,
        pause_verb: impl Into<String>,
        resume_verb: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            pause_verb: pause_verb.into(),
            resume_verb: resume_verb.into(),
            timeout,
        }
    }

    /// `docker pause` / `docker unpause` with a 30s confirmation bound.
    pub fn docker() -> Self {
        Self::new("docker", "pause", "unpause", Duration::from_secs(30))
    }

    async fn run(&self, verb: &str, node: &NodeId) -> Result<(), InjectionError> {
        let rendered = format!("{} {} {}", self.program, verb, node);
        tracing::debug!(command = %rendered, "invoking node controller");

        let child = Command::new(&self.program)
            .arg(verb)
            .arg(node.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A controller that blows the confirmation bound must not get
            // to apply the fault later, behind the harness's back.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InjectionError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| InjectionError::Timeout {
                command: rendered.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|source| InjectionError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(InjectionError::ControllerFailed {
                command: rendered,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl FaultInjector for CommandInjector {
    async fn pause(&mut self, node: &NodeId) -> Result<(), InjectionError> {
        let verb = self.pause_verb.clone();
        self.run(&verb, node).await
    }

    async fn resume(&mut self, node: &NodeId) -> Result<(), InjectionError> {
        let verb = self.resume_verb.clone();
        self.run(&verb, node).await
    }
}
