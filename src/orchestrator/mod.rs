/// Epoch Orchestrator - Drives the node through the ledger's epoch cycle
///
/// The ledger owns the epoch state; this loop only reacts to it:
/// 1. Poll the phase and time remaining every tick
/// 2. Run exactly one handler when a new phase is entered
/// 3. Stay idle until a DISPUTE has been seen, so a node joining mid-cycle
///    starts from a fresh COMMIT
/// 4. Log failed actions and keep going; nothing is retried inside a phase

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

use crate::chain::{ChainClient, ChainError, LedgerEvent, NodeId};
use crate::decoder::{format_token_amount, ContractErrorDecoder};
use crate::node::{JobTracker, LeaderCoordinator, RevealOutcome, SecretLifecycle};
use crate::workload::WorkloadRunner;

mod epoch_monitor;
mod stats;
pub use self::epoch_monitor::{EpochState, Phase, PhaseMonitor};
pub use self::stats::{NodeStatistics, StatsCollector};

/// Timing of the orchestration loop
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Longest sleep between two ticks
    pub poll_ceiling: Duration,
    /// Pause after a failed tick
    pub error_backoff: Duration,
    /// How often the status report is logged
    pub status_interval: Duration,
    /// Wait before the final event poll when a bounded run stops
    pub settle_delay: Duration,
    /// Stop after one processed epoch and surface handler errors
    pub bounded: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_ceiling: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
            status_interval: Duration::from_secs(300),
            settle_delay: Duration::from_secs(10),
            bounded: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The epoch state could not be read
    #[error("tick failed: {0}")]
    Tick(ChainError),
    /// A phase handler failed in bounded mode
    #[error("{phase} phase failed: {message}")]
    Phase { phase: Phase, message: String },
}

/// What one tick observed and did
#[derive(Debug, Clone)]
pub struct TickReport {
    pub state: EpochState,
    pub phase_changed: bool,
    /// Phase whose handler ran this tick
    pub dispatched: Option<Phase>,
    /// Bounded run is done
    pub finished: bool,
    /// Sleep before the next tick
    pub pause: Duration,
}

/// Main orchestrator coordinating all node duties
pub struct EpochOrchestrator<C, W> {
    chain: C,
    node_id: NodeId,
    config: OrchestratorConfig,
    decoder: Arc<ContractErrorDecoder>,
    monitor: PhaseMonitor,
    /// Set once the first DISPUTE phase has been observed
    can_begin: bool,
    epochs_processed: u64,
    secrets: SecretLifecycle,
    leader: LeaderCoordinator,
    jobs: JobTracker<W>,
    stats: StatsCollector,
    last_status_report: Instant,
}

impl<C: ChainClient, W: WorkloadRunner> EpochOrchestrator<C, W> {
    pub fn new(
        chain: C,
        node_id: NodeId,
        runner: W,
        decoder: Arc<ContractErrorDecoder>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            chain,
            node_id,
            config,
            monitor: PhaseMonitor::new(),
            can_begin: false,
            epochs_processed: 0,
            secrets: SecretLifecycle::new(node_id),
            leader: LeaderCoordinator::new(node_id, decoder.clone()),
            jobs: JobTracker::new(node_id, runner, decoder.clone()),
            decoder,
            stats: StatsCollector::new(),
            last_status_report: Instant::now(),
        }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn can_begin(&self) -> bool {
        self.can_begin
    }

    pub fn epochs_processed(&self) -> u64 {
        self.epochs_processed
    }

    pub fn is_leader(&self) -> bool {
        self.leader.is_leader()
    }

    pub fn has_secret(&self) -> bool {
        self.secrets.has_secret()
    }

    pub fn statistics(&self) -> NodeStatistics {
        self.stats.get_stats()
    }

    /// Main run loop. Returns only when a bounded run finishes or fails.
    pub async fn run(&mut self) -> Result<(), OrchestratorError> {
        log::info!("Starting orchestrator for node {}", self.node_id);

        loop {
            match self.tick().await {
                Ok(report) if report.finished => {
                    log::info!("Test cycle complete ({} epoch processed)", self.epochs_processed);
                    self.settle().await;
                    return Ok(());
                }
                Ok(report) => sleep(report.pause).await,
                Err(OrchestratorError::Tick(e)) => {
                    log::error!("Critical error in main loop: {}", self.decoder.describe(&e));
                    self.log_node_state();
                    sleep(self.config.error_backoff).await;
                }
                Err(e) => {
                    self.settle().await;
                    return Err(e);
                }
            }
        }
    }

    /// One pass of the loop: status, events, phase reading and at most one handler
    pub async fn tick(&mut self) -> Result<TickReport, OrchestratorError> {
        self.report_status_if_due().await;
        self.process_events().await;

        let state = match self.chain.get_epoch_state().await {
            Ok(state) => state,
            Err(e) => {
                self.stats.tick_failed(self.decoder.describe(&e));
                return Err(OrchestratorError::Tick(e));
            }
        };

        let phase_changed = self.monitor.observe(&state);
        if phase_changed {
            self.stats.phase_observed(state.phase);
        }
        log::debug!(
            "Can begin: {}, phase changed: {}, remaining: {}s",
            self.can_begin,
            phase_changed,
            state.time_remaining.as_secs()
        );

        let mut dispatched = None;
        let mut failure = None;
        if self.can_begin && phase_changed {
            dispatched = Some(state.phase);
            self.stats.action_dispatched();
            if let Err(e) = self.dispatch(state.phase).await {
                let message = self.failure_context(state.phase, &e);
                log::error!("{}", message);
                self.stats.action_failed(message.clone());
                if self.config.bounded {
                    failure = Some(OrchestratorError::Phase {
                        phase: state.phase,
                        message,
                    });
                }
            }
        }

        let finished = self.config.bounded && self.epochs_processed >= 1;

        if state.phase == Phase::Dispute && !self.can_begin {
            log::info!("Observed DISPUTE phase, node will act from the next COMMIT");
            self.can_begin = true;
        }

        if let Some(error) = failure {
            return Err(error);
        }

        Ok(TickReport {
            state,
            phase_changed,
            dispatched,
            finished,
            pause: state.time_remaining.min(self.config.poll_ceiling),
        })
    }

    async fn dispatch(&mut self, phase: Phase) -> Result<(), ChainError> {
        match phase {
            Phase::Commit => {
                log::info!("Preparing to submit commitment...");
                self.secrets.commit(&self.chain).await?;
                self.stats.commit_submitted();
            }
            Phase::Reveal => {
                if let RevealOutcome::Revealed { .. } = self.secrets.reveal(&self.chain).await? {
                    self.stats.secret_revealed();
                }
            }
            Phase::Elect => {
                let receipt = self.chain.elect_leader().await?;
                log::info!("Leader election triggered ({})", receipt.tx_hash);
            }
            Phase::Execute => {
                let evaluation = self.leader.evaluate(&self.chain).await?;
                log::info!(
                    "Current role: {}",
                    if evaluation.status.is_leader { "Leader" } else { "Not leader" }
                );
            }
            Phase::Confirm => {
                let report = self.jobs.process_assigned(&self.chain).await?;
                self.stats.jobs_processed(report.completed(), report.failed());
            }
            Phase::Dispute => {
                let receipt = self.chain.process_epoch_settlement().await?;
                self.epochs_processed += 1;
                self.stats.epoch_processed();
                log::info!("Incentive cycle complete ({})", receipt.tx_hash);
            }
            Phase::Paused => {
                log::warn!("Ledger is paused, waiting for the next phase");
            }
        }
        Ok(())
    }

    fn failure_context(&self, phase: Phase, error: &ChainError) -> String {
        format!(
            "Error in {} phase (node {}, leader: {}, secret held: {}): {}",
            phase,
            self.node_id,
            self.leader.is_leader(),
            self.secrets.has_secret(),
            self.decoder.describe(error)
        )
    }

    fn log_node_state(&self) {
        let phase = self
            .monitor
            .last_phase()
            .map(Phase::name)
            .unwrap_or("Unknown");
        log::error!("=== Node State at Error ===");
        log::error!("Current phase: {}", phase);
        log::error!("Time in phase: {:.1}s", self.monitor.elapsed().as_secs_f64());
        log::error!("Is leader: {}", self.leader.is_leader());
        log::error!("Has current secret: {}", self.secrets.has_secret());
        log::error!("===========================");
    }

    async fn report_status_if_due(&mut self) {
        if self.last_status_report.elapsed() < self.config.status_interval {
            return;
        }
        self.last_status_report = Instant::now();

        match self.chain.get_node_status(self.node_id).await {
            Ok(status) => {
                let stats = self.stats.get_stats();
                log::info!("=== Node Status Update ===");
                log::info!("Current epoch: {}", status.epoch);
                log::info!("Stake balance: {} LUM", format_token_amount(status.stake_balance));
                log::info!("Token balance: {} LUM", format_token_amount(status.token_balance));
                log::info!(
                    "Leader status: {}",
                    if self.leader.is_leader() { "Leader" } else { "Regular node" }
                );
                log::info!(
                    "Epochs processed: {}, actions: {} ({} failed), jobs: {} completed / {} failed",
                    stats.epochs_processed,
                    stats.actions_dispatched,
                    stats.action_failures,
                    stats.jobs_completed,
                    stats.jobs_failed
                );
                log::info!("==========================");
            }
            Err(e) => log::warn!("Failed to gather node status: {}", self.decoder.describe(&e)),
        }
    }

    async fn process_events(&self) {
        match self.chain.poll_events().await {
            Ok(events) => {
                for event in events {
                    log::info!("{}", event_line(&event));
                }
            }
            Err(e) => log::warn!("Failed to poll ledger events: {}", e),
        }
    }

    async fn settle(&self) {
        sleep(self.config.settle_delay).await;
        self.process_events().await;
    }
}

/// One log line per ledger event; named events carry their rendered arguments
fn event_line(event: &LedgerEvent) -> String {
    let block = event.block_number.map(|b| b.to_string()).unwrap_or_else(|| "pending".to_string());
    let tx = event.tx_hash.map(|h| h.to_string()).unwrap_or_else(|| "-".to_string());
    match &event.decoded {
        Some(decoded) => format!("Event {} from {} (block {}, tx {})", decoded, event.contract, block, tx),
        None => format!(
            "Event from {}: topic {} (block {}, tx {})",
            event.contract,
            event.topic.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
            block,
            tx
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{DecodedEvent, EventArg};
    use crate::node::jobs::{AssignedJob, JobStatus};
    use crate::testing::{MockCall, MockChain, MockOp, RecordingWorkload};
    use alloy_primitives::{keccak256, B256};
    use super::Phase::{Commit, Confirm, Dispute, Elect, Execute, Reveal};

    const NODE: NodeId = 4;

    fn fast_config(bounded: bool) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_ceiling: Duration::ZERO,
            error_backoff: Duration::ZERO,
            status_interval: Duration::from_secs(3600),
            settle_delay: Duration::ZERO,
            bounded,
        }
    }

    fn orchestrator(chain: MockChain, bounded: bool) -> EpochOrchestrator<MockChain, RecordingWorkload> {
        EpochOrchestrator::new(
            chain,
            NODE,
            RecordingWorkload::new(),
            Arc::new(ContractErrorDecoder::new().unwrap()),
            fast_config(bounded),
        )
    }

    fn job(id: u64) -> AssignedJob {
        AssignedJob {
            id,
            args: String::new(),
            status: JobStatus::Assigned,
        }
    }

    #[tokio::test]
    async fn test_waits_for_dispute_before_acting() {
        let chain = MockChain::new().with_phases(&[Commit, Commit, Reveal, Elect, Execute, Confirm, Dispute, Commit]);
        let mut node = orchestrator(chain.clone(), false);

        let mut dispatched = Vec::new();
        for _ in 0..8 {
            dispatched.push(node.tick().await.unwrap().dispatched);
        }

        assert_eq!(dispatched[..7], [None; 7]);
        assert_eq!(dispatched[7], Some(Commit));
        assert!(node.can_begin());
        assert_eq!(chain.count(MockOp::SubmitCommitment), 1);
        assert_eq!(chain.count(MockOp::RevealSecret), 0);
        assert_eq!(chain.count(MockOp::ElectLeader), 0);
        assert_eq!(chain.count(MockOp::ProcessEpochSettlement), 0);
    }

    #[tokio::test]
    async fn test_handlers_fire_once_per_phase_change() {
        let chain = MockChain::new().with_phases(&[Dispute, Commit, Commit, Commit, Reveal, Reveal]);
        let mut node = orchestrator(chain.clone(), false);

        for _ in 0..6 {
            node.tick().await.unwrap();
        }

        assert_eq!(chain.count(MockOp::SubmitCommitment), 1);
        assert_eq!(chain.count(MockOp::RevealSecret), 1);
        assert_eq!(node.statistics().actions_dispatched, 2);
    }

    #[tokio::test]
    async fn test_bounded_run_completes_one_epoch() {
        let chain = MockChain::new()
            .with_phases(&[Dispute, Commit, Reveal, Elect, Execute, Confirm, Dispute])
            .with_leader(NODE)
            .with_jobs(vec![job(1), job(2)]);
        let mut node = orchestrator(chain.clone(), true);

        node.run().await.unwrap();

        assert_eq!(node.epochs_processed(), 1);
        assert!(node.is_leader());

        let calls = chain.calls();
        let commitment = calls.iter().find_map(|c| match c {
            MockCall::SubmitCommitment(NODE, c) => Some(*c),
            _ => None,
        });
        let secret = calls.iter().find_map(|c| match c {
            MockCall::RevealSecret(NODE, s) => Some(*s),
            _ => None,
        });
        assert_eq!(Some(keccak256(secret.unwrap())), commitment);

        assert_eq!(chain.count(MockOp::ElectLeader), 1);
        assert_eq!(chain.count(MockOp::StartAssignmentRound), 1);
        assert!(calls.contains(&MockCall::CompleteJob(1)));
        assert!(calls.contains(&MockCall::CompleteJob(2)));
        assert_eq!(chain.count(MockOp::ProcessEpochSettlement), 1);

        let stats = node.statistics();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.reveals, 1);
        assert_eq!(stats.jobs_completed, 2);
        assert_eq!(stats.epochs_processed, 1);
    }

    #[tokio::test]
    async fn test_bounded_run_surfaces_handler_error() {
        let chain = MockChain::new()
            .with_phases(&[Dispute, Commit])
            .failing(MockOp::SubmitCommitment, ChainError::Reverted { data: "0x".to_string() });
        let mut node = orchestrator(chain.clone(), true);

        let err = node.run().await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Phase { phase: Commit, .. }));
        assert!(err.to_string().contains("reverted without reason data"));
        assert_eq!(chain.count(MockOp::SubmitCommitment), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_contained() {
        let chain = MockChain::new()
            .with_phases(&[Dispute, Commit, Reveal])
            .failing(MockOp::SubmitCommitment, ChainError::Connectivity("refused".to_string()));
        let mut node = orchestrator(chain.clone(), false);

        node.tick().await.unwrap();
        let report = node.tick().await.unwrap();
        assert_eq!(report.dispatched, Some(Commit));

        // Failed commit leaves nothing to reveal
        let report = node.tick().await.unwrap();
        assert_eq!(report.dispatched, Some(Reveal));
        assert_eq!(chain.count(MockOp::RevealSecret), 0);

        let stats = node.statistics();
        assert_eq!(stats.action_failures, 1);
        assert!(stats.last_error.unwrap().contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_epoch_read_failure_is_tick_failure() {
        let chain = MockChain::new();
        let mut node = orchestrator(chain, false);

        let err = node.tick().await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Tick(ChainError::Connectivity(_))));
        assert_eq!(node.statistics().tick_failures, 1);
        assert!(!node.can_begin());
    }

    #[tokio::test]
    async fn test_pause_is_capped() {
        let chain = MockChain::new().with_states(vec![
            EpochState::new(Commit, Duration::from_secs(40)),
            EpochState::new(Commit, Duration::from_millis(300)),
        ]);
        let mut node = EpochOrchestrator::new(
            chain,
            NODE,
            RecordingWorkload::new(),
            Arc::new(ContractErrorDecoder::new().unwrap()),
            OrchestratorConfig {
                poll_ceiling: Duration::from_secs(2),
                ..fast_config(false)
            },
        );

        assert_eq!(node.tick().await.unwrap().pause, Duration::from_secs(2));
        assert_eq!(node.tick().await.unwrap().pause, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_status_report_and_events() {
        let event = LedgerEvent {
            contract: "JobManager".to_string(),
            topic: None,
            block_number: Some(9),
            tx_hash: None,
            decoded: None,
        };
        let chain = MockChain::new()
            .with_phases(&[Commit])
            .with_events(vec![event])
            .failing(MockOp::GetNodeStatus, ChainError::Timeout("slow".to_string()));
        let mut node = EpochOrchestrator::new(
            chain.clone(),
            NODE,
            RecordingWorkload::new(),
            Arc::new(ContractErrorDecoder::new().unwrap()),
            OrchestratorConfig {
                status_interval: Duration::ZERO,
                ..fast_config(false)
            },
        );

        // A failing status report does not fail the tick
        assert!(node.tick().await.is_ok());
        assert_eq!(chain.count(MockOp::GetNodeStatus), 1);
        assert_eq!(chain.count(MockOp::PollEvents), 1);
    }

    #[test]
    fn test_event_lines() {
        let mut event = LedgerEvent {
            contract: "NodeEscrow".to_string(),
            topic: Some(B256::repeat_byte(0x99)),
            block_number: None,
            tx_hash: None,
            decoded: None,
        };
        let raw = event_line(&event);
        assert!(raw.starts_with("Event from NodeEscrow: topic 0x9999"));
        assert!(raw.contains("block pending"));

        event.block_number = Some(12);
        event.decoded = Some(DecodedEvent {
            name: "Deposited",
            args: vec![EventArg { name: "amount", value: "5 LUM".to_string() }],
        });
        assert_eq!(
            event_line(&event),
            "Event Deposited(amount: 5 LUM) from NodeEscrow (block 12, tx -)"
        );
    }
}
