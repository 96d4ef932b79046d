/// Node registration: stake top-up, registerNode, identity persistence

use alloy_primitives::U256;
use anyhow::{Context, Result};

use super::identity::{NodeData, NodeStore};
use crate::chain::{ChainClient, NodeId};
use crate::decoder::format_token_amount;

/// Stake the escrow must hold for a compute rating: one whole token per unit
pub fn required_stake(compute_rating: u64) -> U256 {
    U256::from(compute_rating) * U256::from(10u64).pow(U256::from(18u64))
}

/// Register the node account and persist the id the ledger announces.
/// Any shortfall against the required stake is approved and deposited first.
pub async fn register<C: ChainClient>(chain: &C, compute_rating: u64, store: &NodeStore) -> Result<NodeId> {
    let required = required_stake(compute_rating);
    let current = chain
        .get_stake_balance()
        .await
        .context("Failed to read stake balance")?;

    if current < required {
        let shortfall = required - current;
        log::info!(
            "Insufficient stake ({} of {} LUM), depositing {} LUM",
            format_token_amount(current),
            format_token_amount(required),
            format_token_amount(shortfall)
        );
        chain
            .approve_stake(shortfall)
            .await
            .context("Failed to approve stake transfer")?;
        chain
            .deposit_stake(shortfall)
            .await
            .context("Failed to deposit stake")?;
        log::info!("Staked {} LUM", format_token_amount(shortfall));
    }

    let node_id = chain
        .register_node(compute_rating)
        .await
        .with_context(|| format!("Failed to register node with compute rating {}", compute_rating))?;

    store.save(&NodeData { node_id: Some(node_id) })?;
    log::info!("Node registered with ID: {} (saved to {})", node_id, store.path().display());
    Ok(node_id)
}
