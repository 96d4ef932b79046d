/// Commit-reveal secret lifecycle
///
/// A fresh 32-byte secret is drawn at every COMMIT entry and only its keccak256
/// commitment is published. The secret itself stays in process memory until the
/// next commit replaces it and is wiped on drop.

use alloy_primitives::{keccak256, B256};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::chain::{ChainClient, ChainError, NodeId};

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    value: [u8; 32],
    #[zeroize(skip)]
    commitment: B256,
    #[zeroize(skip)]
    epoch: u64,
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("commitment", &self.commitment)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl Secret {
    /// Draw a new secret from the operating system CSPRNG
    pub fn generate(epoch: u64) -> Self {
        let mut value = [0u8; 32];
        OsRng.fill_bytes(&mut value);
        Self::from_value(value, epoch)
    }

    pub fn from_value(value: [u8; 32], epoch: u64) -> Self {
        Self {
            commitment: compute_commitment(&value),
            value,
            epoch,
        }
    }

    pub fn value(&self) -> B256 {
        B256::from(self.value)
    }

    pub fn commitment(&self) -> B256 {
        self.commitment
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// keccak256 over the raw 32 bytes, as the ledger computes it for a bytes32 reveal
pub fn compute_commitment(value: &[u8; 32]) -> B256 {
    keccak256(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Revealed { epoch: u64 },
    NoSecret,
}

/// Holds at most one secret for this node
#[derive(Debug)]
pub struct SecretLifecycle {
    node_id: NodeId,
    held: Option<Secret>,
}

impl SecretLifecycle {
    pub fn new(node_id: NodeId) -> Self {
        Self { node_id, held: None }
    }

    pub fn has_secret(&self) -> bool {
        self.held.is_some()
    }

    pub fn held(&self) -> Option<&Secret> {
        self.held.as_ref()
    }

    /// Publish a commitment to a fresh secret for the current epoch.
    /// The secret is kept only once the ledger accepted the commitment.
    pub async fn commit<C: ChainClient>(&mut self, chain: &C) -> Result<B256, ChainError> {
        self.held = None;

        let epoch = chain.get_current_epoch().await?;
        let secret = Secret::generate(epoch);
        let commitment = secret.commitment();

        chain.submit_commitment(self.node_id, commitment).await?;
        log::info!("Submitted commitment {} for epoch {}", commitment, epoch);

        self.held = Some(secret);
        Ok(commitment)
    }

    /// Disclose the held secret. Without one this is a no-op.
    /// The epoch is only compared for the log; the reveal goes out regardless.
    pub async fn reveal<C: ChainClient>(&mut self, chain: &C) -> Result<RevealOutcome, ChainError> {
        let Some(secret) = self.held.as_ref() else {
            log::warn!("No secret held for node {}, skipping reveal", self.node_id);
            return Ok(RevealOutcome::NoSecret);
        };

        match chain.get_current_epoch().await {
            Ok(epoch) if epoch != secret.epoch() => log::warn!(
                "Revealing secret committed in epoch {} during epoch {}",
                secret.epoch(),
                epoch
            ),
            Ok(_) => {}
            Err(e) => log::warn!("Could not read current epoch before reveal: {}", e),
        }

        chain.reveal_secret(self.node_id, secret.value()).await?;
        log::info!("Revealed secret for epoch {}", secret.epoch());
        Ok(RevealOutcome::Revealed { epoch: secret.epoch() })
    }
}
