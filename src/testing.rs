//! Scripted ledger and workload doubles shared by the unit tests

use alloy_primitives::{B256, U256};
use anyhow::{bail, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chain::{ChainClient, ChainError, LedgerEvent, NodeId, NodeStatus, TxReceipt};
use crate::node::jobs::AssignedJob;
use crate::orchestrator::{EpochState, Phase};
use crate::workload::WorkloadRunner;

/// Kind of ledger operation, ignoring arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    GetEpochState,
    GetCurrentEpoch,
    SubmitCommitment,
    RevealSecret,
    ElectLeader,
    GetCurrentLeader,
    StartAssignmentRound,
    GetJobsAssignedTo,
    ConfirmJob,
    CompleteJob,
    ProcessEpochSettlement,
    GetNodeStatus,
    GetStakeBalance,
    ApproveStake,
    DepositStake,
    RegisterNode,
    PollEvents,
}

/// A recorded ledger call with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GetEpochState,
    GetCurrentEpoch,
    SubmitCommitment(NodeId, B256),
    RevealSecret(NodeId, B256),
    ElectLeader,
    GetCurrentLeader,
    StartAssignmentRound,
    GetJobsAssignedTo(NodeId),
    ConfirmJob(u64),
    CompleteJob(u64),
    ProcessEpochSettlement,
    GetNodeStatus(NodeId),
    GetStakeBalance,
    ApproveStake(U256),
    DepositStake(U256),
    RegisterNode(u64),
    PollEvents,
}

impl MockCall {
    pub fn op(&self) -> MockOp {
        match self {
            MockCall::GetEpochState => MockOp::GetEpochState,
            MockCall::GetCurrentEpoch => MockOp::GetCurrentEpoch,
            MockCall::SubmitCommitment(..) => MockOp::SubmitCommitment,
            MockCall::RevealSecret(..) => MockOp::RevealSecret,
            MockCall::ElectLeader => MockOp::ElectLeader,
            MockCall::GetCurrentLeader => MockOp::GetCurrentLeader,
            MockCall::StartAssignmentRound => MockOp::StartAssignmentRound,
            MockCall::GetJobsAssignedTo(_) => MockOp::GetJobsAssignedTo,
            MockCall::ConfirmJob(_) => MockOp::ConfirmJob,
            MockCall::CompleteJob(_) => MockOp::CompleteJob,
            MockCall::ProcessEpochSettlement => MockOp::ProcessEpochSettlement,
            MockCall::GetNodeStatus(_) => MockOp::GetNodeStatus,
            MockCall::GetStakeBalance => MockOp::GetStakeBalance,
            MockCall::ApproveStake(_) => MockOp::ApproveStake,
            MockCall::DepositStake(_) => MockOp::DepositStake,
            MockCall::RegisterNode(_) => MockOp::RegisterNode,
            MockCall::PollEvents => MockOp::PollEvents,
        }
    }
}

enum Failure {
    Op(MockOp),
    Call(MockCall),
}

impl Failure {
    fn matches(&self, call: &MockCall) -> bool {
        match self {
            Failure::Op(op) => call.op() == *op,
            Failure::Call(expected) => expected == call,
        }
    }
}

#[derive(Default)]
struct Inner {
    states: VecDeque<EpochState>,
    epoch: u64,
    leader: NodeId,
    jobs: Vec<AssignedJob>,
    stake: U256,
    registered_id: NodeId,
    events: Vec<LedgerEvent>,
    failures: Vec<(Failure, ChainError)>,
    calls: Vec<MockCall>,
    sent: u8,
}

/// In-memory ledger. Epoch states are served from a script; once it runs
/// out every read fails with a connectivity error.
#[derive(Clone, Default)]
pub struct MockChain {
    inner: Arc<Mutex<Inner>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(self, states: Vec<EpochState>) -> Self {
        self.inner.lock().unwrap().states.extend(states);
        self
    }

    pub fn with_phases(self, phases: &[Phase]) -> Self {
        let states = phases
            .iter()
            .map(|p| EpochState::new(*p, Duration::from_secs(30)))
            .collect();
        self.with_states(states)
    }

    pub fn with_epoch(self, epoch: u64) -> Self {
        self.inner.lock().unwrap().epoch = epoch;
        self
    }

    pub fn with_leader(self, leader: NodeId) -> Self {
        self.inner.lock().unwrap().leader = leader;
        self
    }

    pub fn with_jobs(self, jobs: Vec<AssignedJob>) -> Self {
        self.inner.lock().unwrap().jobs = jobs;
        self
    }

    pub fn with_stake(self, stake: U256) -> Self {
        self.inner.lock().unwrap().stake = stake;
        self
    }

    /// Id handed out by `register_node`
    pub fn with_registered_id(self, node_id: NodeId) -> Self {
        self.inner.lock().unwrap().registered_id = node_id;
        self
    }

    pub fn with_events(self, events: Vec<LedgerEvent>) -> Self {
        self.inner.lock().unwrap().events = events;
        self
    }

    /// Fail every call of this kind
    pub fn failing(self, op: MockOp, error: ChainError) -> Self {
        self.inner.lock().unwrap().failures.push((Failure::Op(op), error));
        self
    }

    /// Fail only this exact call
    pub fn failing_job(self, call: MockCall, error: ChainError) -> Self {
        self.inner.lock().unwrap().failures.push((Failure::Call(call), error));
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: MockOp) -> usize {
        self.inner.lock().unwrap().calls.iter().filter(|c| c.op() == op).count()
    }

    fn record(&self, call: MockCall) -> Result<(), ChainError> {
        let mut inner = self.inner.lock().unwrap();
        let failure = inner
            .failures
            .iter()
            .find(|(f, _)| f.matches(&call))
            .map(|(_, e)| e.clone());
        inner.calls.push(call);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn submit(&self, call: MockCall) -> Result<TxReceipt, ChainError> {
        self.record(call)?;
        let mut inner = self.inner.lock().unwrap();
        inner.sent = inner.sent.wrapping_add(1);
        Ok(TxReceipt {
            tx_hash: B256::with_last_byte(inner.sent),
            block_number: Some(inner.sent as u64),
        })
    }
}

impl ChainClient for MockChain {
    async fn get_epoch_state(&self) -> Result<EpochState, ChainError> {
        self.record(MockCall::GetEpochState)?;
        self.inner
            .lock()
            .unwrap()
            .states
            .pop_front()
            .ok_or_else(|| ChainError::Connectivity("script exhausted".to_string()))
    }

    async fn get_current_epoch(&self) -> Result<u64, ChainError> {
        self.record(MockCall::GetCurrentEpoch)?;
        Ok(self.inner.lock().unwrap().epoch)
    }

    async fn submit_commitment(&self, node_id: NodeId, commitment: B256) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::SubmitCommitment(node_id, commitment))
    }

    async fn reveal_secret(&self, node_id: NodeId, secret: B256) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::RevealSecret(node_id, secret))
    }

    async fn elect_leader(&self) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::ElectLeader)
    }

    async fn get_current_leader(&self) -> Result<NodeId, ChainError> {
        self.record(MockCall::GetCurrentLeader)?;
        Ok(self.inner.lock().unwrap().leader)
    }

    async fn start_assignment_round(&self) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::StartAssignmentRound)
    }

    async fn get_jobs_assigned_to(&self, node_id: NodeId) -> Result<Vec<AssignedJob>, ChainError> {
        self.record(MockCall::GetJobsAssignedTo(node_id))?;
        Ok(self.inner.lock().unwrap().jobs.clone())
    }

    async fn confirm_job(&self, job_id: u64) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::ConfirmJob(job_id))
    }

    async fn complete_job(&self, job_id: u64) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::CompleteJob(job_id))
    }

    async fn process_epoch_settlement(&self) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::ProcessEpochSettlement)
    }

    async fn get_node_status(&self, node_id: NodeId) -> Result<NodeStatus, ChainError> {
        self.record(MockCall::GetNodeStatus(node_id))?;
        let inner = self.inner.lock().unwrap();
        Ok(NodeStatus {
            epoch: inner.epoch,
            stake_balance: inner.stake,
            token_balance: U256::ZERO,
        })
    }

    async fn get_stake_balance(&self) -> Result<U256, ChainError> {
        self.record(MockCall::GetStakeBalance)?;
        Ok(self.inner.lock().unwrap().stake)
    }

    async fn approve_stake(&self, amount: U256) -> Result<TxReceipt, ChainError> {
        self.submit(MockCall::ApproveStake(amount))
    }

    async fn deposit_stake(&self, amount: U256) -> Result<TxReceipt, ChainError> {
        let receipt = self.submit(MockCall::DepositStake(amount))?;
        self.inner.lock().unwrap().stake += amount;
        Ok(receipt)
    }

    async fn register_node(&self, compute_rating: u64) -> Result<NodeId, ChainError> {
        self.record(MockCall::RegisterNode(compute_rating))?;
        Ok(self.inner.lock().unwrap().registered_id)
    }

    async fn poll_events(&self) -> Result<Vec<LedgerEvent>, ChainError> {
        self.record(MockCall::PollEvents)?;
        Ok(std::mem::take(&mut self.inner.lock().unwrap().events))
    }
}

/// Workload that records executed job ids and fails on request
#[derive(Clone, Default)]
pub struct RecordingWorkload {
    executed: Arc<Mutex<Vec<u64>>>,
    failing: HashSet<u64>,
}

impl RecordingWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, job_id: u64) -> Self {
        self.failing.insert(job_id);
        self
    }

    pub fn executed(&self) -> Vec<u64> {
        self.executed.lock().unwrap().clone()
    }
}

impl WorkloadRunner for RecordingWorkload {
    async fn execute(&self, job: &AssignedJob) -> Result<()> {
        self.executed.lock().unwrap().push(job.id);
        if self.failing.contains(&job.id) {
            bail!("workload for job {} crashed", job.id);
        }
        Ok(())
    }
}
