/// Workload runners - execute the payload of an assigned job

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::process::Command;

use crate::config::WorkloadConfig;
use crate::node::jobs::AssignedJob;

/// Runs a job's payload to completion
#[allow(async_fn_in_trait)]
pub trait WorkloadRunner {
    async fn execute(&self, job: &AssignedJob) -> Result<()>;
}

/// Stand-in workload that only waits
#[derive(Debug, Clone)]
pub struct SimulatedWorkload {
    duration: Duration,
}

impl SimulatedWorkload {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl WorkloadRunner for SimulatedWorkload {
    async fn execute(&self, job: &AssignedJob) -> Result<()> {
        log::info!("Executing job {} (simulated, {}s): {}", job.id, self.duration.as_secs(), job.args);
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// Spawns an external program; the job args are passed as its last argument
#[derive(Debug, Clone)]
pub struct CommandWorkload {
    program: String,
    args: Vec<String>,
}

impl CommandWorkload {
    /// Parse a whitespace-separated command line
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("Workload command is empty");
        };
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl WorkloadRunner for CommandWorkload {
    async fn execute(&self, job: &AssignedJob) -> Result<()> {
        log::info!("Executing job {} with {}", job.id, self.program);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&job.args)
            .env("LUMINO_JOB_ID", job.id.to_string())
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// Runner selected by the `[workload]` config section
#[derive(Debug, Clone)]
pub enum ConfiguredWorkload {
    Simulated(SimulatedWorkload),
    Command(CommandWorkload),
}

impl ConfiguredWorkload {
    pub fn from_config(config: &WorkloadConfig) -> Result<Self> {
        match config.command.as_deref() {
            Some(command) => Ok(Self::Command(CommandWorkload::parse(command)?)),
            None => Ok(Self::Simulated(SimulatedWorkload::new(Duration::from_secs(
                config.simulated_duration_secs,
            )))),
        }
    }
}

impl WorkloadRunner for ConfiguredWorkload {
    async fn execute(&self, job: &AssignedJob) -> Result<()> {
        match self {
            Self::Simulated(runner) => runner.execute(job).await,
            Self::Command(runner) => runner.execute(job).await,
        }
    }
}
