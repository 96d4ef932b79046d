// Library exports for lumino_node

pub mod chain;
pub mod config;
pub mod decoder;
pub mod node;
pub mod orchestrator;
pub mod workload;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use chain::{ChainClient, ChainError, ContractAddresses, LedgerClient, LocalSigner};
pub use decoder::ContractErrorDecoder;
pub use orchestrator::{EpochOrchestrator, OrchestratorConfig, Phase};
