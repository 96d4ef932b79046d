/// Leader Duty Coordinator - recomputes leadership each EXECUTE phase

use std::sync::Arc;

use crate::chain::{ChainClient, ChainError, NodeId};
use crate::decoder::ContractErrorDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadershipStatus {
    pub is_leader: bool,
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderEvaluation {
    pub status: LeadershipStatus,
    /// Whether this node's assignment round transaction went through
    pub round_started: bool,
}

pub struct LeaderCoordinator {
    status: LeadershipStatus,
    decoder: Arc<ContractErrorDecoder>,
}

impl LeaderCoordinator {
    pub fn new(node_id: NodeId, decoder: Arc<ContractErrorDecoder>) -> Self {
        Self {
            status: LeadershipStatus { is_leader: false, node_id },
            decoder,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.status.is_leader
    }

    pub fn status(&self) -> LeadershipStatus {
        self.status
    }

    /// Read the elected leader and, if it is us, start the assignment round.
    /// A failed assignment round is logged and does not fail the evaluation.
    pub async fn evaluate<C: ChainClient>(&mut self, chain: &C) -> Result<LeaderEvaluation, ChainError> {
        let leader = chain.get_current_leader().await?;
        let is_leader = leader == self.status.node_id;

        if is_leader != self.status.is_leader {
            if is_leader {
                log::info!("Node {} is now the leader", self.status.node_id);
            } else {
                log::info!("Node {} is no longer the leader (leader is {})", self.status.node_id, leader);
            }
        }
        self.status.is_leader = is_leader;

        let mut round_started = false;
        if is_leader {
            match chain.start_assignment_round().await {
                Ok(receipt) => {
                    log::info!("Started job assignment round ({})", receipt.tx_hash);
                    round_started = true;
                }
                Err(e) => {
                    log::error!("Failed to start assignment round: {}", self.decoder.describe(&e));
                }
            }
        } else {
            log::debug!("Not the leader this epoch (leader is {})", leader);
        }

        Ok(LeaderEvaluation {
            status: self.status,
            round_started,
        })
    }
}
