/// Job Lifecycle Tracker - confirm, execute and complete the jobs assigned to this node

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::chain::{ChainClient, ChainError, NodeId};
use crate::decoder::ContractErrorDecoder;
use crate::workload::WorkloadRunner;

/// Ledger-side job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    New,
    Assigned,
    Confirmed,
    Complete,
}

impl JobStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(JobStatus::New),
            1 => Some(JobStatus::Assigned),
            2 => Some(JobStatus::Confirmed),
            3 => Some(JobStatus::Complete),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JobStatus::New => "NEW",
            JobStatus::Assigned => "ASSIGNED",
            JobStatus::Confirmed => "CONFIRMED",
            JobStatus::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A job the ledger assigned to this node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedJob {
    pub id: u64,
    pub args: String,
    pub status: JobStatus,
}

/// Step of the per-job pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Confirm,
    Execute,
    Complete,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStage::Confirm => f.write_str("confirm"),
            JobStage::Execute => f.write_str("execute"),
            JobStage::Complete => f.write_str("complete"),
        }
    }
}

/// Local view of one job after processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: u64,
    /// Last status this node moved the job to
    pub status: JobStatus,
    pub failed_at: Option<JobStage>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobBatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl JobBatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed_at.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

pub struct JobTracker<W> {
    node_id: NodeId,
    runner: W,
    decoder: Arc<ContractErrorDecoder>,
}

impl<W: WorkloadRunner> JobTracker<W> {
    pub fn new(node_id: NodeId, runner: W, decoder: Arc<ContractErrorDecoder>) -> Self {
        Self { node_id, runner, decoder }
    }

    /// Fetch this node's jobs and run each one through confirm, execute and complete.
    /// A failing job is recorded and skipped; the rest of the batch still runs.
    pub async fn process_assigned<C: ChainClient>(&self, chain: &C) -> Result<JobBatchReport, ChainError> {
        let jobs = chain.get_jobs_assigned_to(self.node_id).await?;
        if jobs.is_empty() {
            log::info!("No jobs assigned to node {}", self.node_id);
            return Ok(JobBatchReport::default());
        }
        log::info!("Processing {} assigned job(s) for node {}", jobs.len(), self.node_id);

        let mut report = JobBatchReport::default();
        for job in jobs {
            let outcome = self.process_job(chain, job).await;
            match (&outcome.failed_at, &outcome.error) {
                (Some(stage), Some(error)) => {
                    log::error!("Job {} failed at {}: {}", outcome.job_id, stage, error)
                }
                _ => log::info!("Job {} completed", outcome.job_id),
            }
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    async fn process_job<C: ChainClient>(&self, chain: &C, mut job: AssignedJob) -> JobOutcome {
        if let Err(e) = chain.confirm_job(job.id).await {
            return self.chain_failure(&job, JobStage::Confirm, &e);
        }
        job.status = JobStatus::Confirmed;
        log::info!("Confirmed job {}", job.id);

        if let Err(e) = self.runner.execute(&job).await {
            return failed(&job, JobStage::Execute, format!("{:#}", e));
        }

        if let Err(e) = chain.complete_job(job.id).await {
            return self.chain_failure(&job, JobStage::Complete, &e);
        }
        job.status = JobStatus::Complete;

        JobOutcome {
            job_id: job.id,
            status: job.status,
            failed_at: None,
            error: None,
        }
    }

    fn chain_failure(&self, job: &AssignedJob, stage: JobStage, error: &ChainError) -> JobOutcome {
        failed(job, stage, self.decoder.describe(error))
    }
}

fn failed(job: &AssignedJob, stage: JobStage, error: String) -> JobOutcome {
    JobOutcome {
        job_id: job.id,
        status: job.status,
        failed_at: Some(stage),
        error: Some(error),
    }
}
