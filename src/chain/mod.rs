pub mod client;
pub mod contracts;
pub mod events;
pub mod rlp;
pub mod rpc;
pub mod signer;

use alloy_primitives::{B256, U256};
use thiserror::Error;

use crate::node::jobs::AssignedJob;
use crate::orchestrator::EpochState;

pub use client::{ClientConfig, LedgerClient};
pub use contracts::ContractAddresses;
pub use events::{DecodedEvent, EventArg};
pub use signer::{LegacyTransaction, LocalSigner, SignerError};

/// Ledger-assigned node identifier
pub type NodeId = u64;

/// Failure of a ledger read or submission
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("connection failed: {0}")]
    Connectivity(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("execution reverted: {data}")]
    Reverted { data: String },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

impl ChainError {
    pub fn is_revert(&self) -> bool {
        matches!(self, ChainError::Reverted { .. })
    }

    /// Raw revert payload, if the ledger rejected the call
    pub fn revert_data(&self) -> Option<&str> {
        match self {
            ChainError::Reverted { data } => Some(data),
            _ => None,
        }
    }
}

impl From<SignerError> for ChainError {
    fn from(e: SignerError) -> Self {
        ChainError::Signing(e.to_string())
    }
}

/// Outcome of a mined submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Balances reported in the periodic status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub epoch: u64,
    pub stake_balance: U256,
    pub token_balance: U256,
}

/// Log entry emitted by one of the ledger contracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    pub contract: String,
    pub topic: Option<B256>,
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
    /// Set when the topic matches a known event
    pub decoded: Option<DecodedEvent>,
}

/// Request/response access to the ledger
///
/// Calls are awaited one at a time by the orchestrator, so implementations
/// only need shared access.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    async fn get_epoch_state(&self) -> Result<EpochState, ChainError>;

    async fn get_current_epoch(&self) -> Result<u64, ChainError>;

    async fn submit_commitment(&self, node_id: NodeId, commitment: B256) -> Result<TxReceipt, ChainError>;

    async fn reveal_secret(&self, node_id: NodeId, secret: B256) -> Result<TxReceipt, ChainError>;

    async fn elect_leader(&self) -> Result<TxReceipt, ChainError>;

    async fn get_current_leader(&self) -> Result<NodeId, ChainError>;

    async fn start_assignment_round(&self) -> Result<TxReceipt, ChainError>;

    async fn get_jobs_assigned_to(&self, node_id: NodeId) -> Result<Vec<AssignedJob>, ChainError>;

    async fn confirm_job(&self, job_id: u64) -> Result<TxReceipt, ChainError>;

    async fn complete_job(&self, job_id: u64) -> Result<TxReceipt, ChainError>;

    async fn process_epoch_settlement(&self) -> Result<TxReceipt, ChainError>;

    async fn get_node_status(&self, node_id: NodeId) -> Result<NodeStatus, ChainError>;

    /// Stake held in escrow for the node account
    async fn get_stake_balance(&self) -> Result<U256, ChainError>;

    /// Allow the escrow to pull `amount` tokens from the node account
    async fn approve_stake(&self, amount: U256) -> Result<TxReceipt, ChainError>;

    async fn deposit_stake(&self, amount: U256) -> Result<TxReceipt, ChainError>;

    /// Register the node account, returning the id announced by the ledger
    async fn register_node(&self, compute_rating: u64) -> Result<NodeId, ChainError>;

    /// Ledger events emitted since the previous poll
    async fn poll_events(&self) -> Result<Vec<LedgerEvent>, ChainError> {
        Ok(Vec::new())
    }
}
