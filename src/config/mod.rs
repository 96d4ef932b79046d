use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::chain::ClientConfig;
use crate::orchestrator::OrchestratorConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub workload: WorkloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_gas_adjustment")]
    pub gas_adjustment: f64,
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval")]
    pub receipt_poll_interval_ms: u64,
}

/// Deployed contract addresses; all are required
// Note: the signing key is never read from this file, use NODE_PRIVATE_KEY
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub epoch_manager: String,
    pub leader_manager: String,
    pub job_manager: String,
    pub incentive_manager: String,
    pub node_manager: String,
    pub node_escrow: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<u64>,
    pub data_dir: String,
    /// Compute rating declared when the node registers itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_rating: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    pub poll_ceiling_secs: u64,
    pub error_backoff_secs: u64,
    pub status_interval_secs: u64,
    pub settle_delay_secs: u64,
    /// Stop after one processed epoch
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// External program run per job; simulated when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_simulated_duration")]
    pub simulated_duration_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_gas_adjustment() -> f64 {
    1.2
}

fn default_receipt_timeout() -> u64 {
    120
}

fn default_receipt_poll_interval() -> u64 {
    500
}

fn default_simulated_duration() -> u64 {
    10
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            request_timeout_secs: default_request_timeout(),
            gas_adjustment: default_gas_adjustment(),
            receipt_timeout_secs: default_receipt_timeout(),
            receipt_poll_interval_ms: default_receipt_poll_interval(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            data_dir: "node_data".to_string(),
            compute_rating: None,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_ceiling_secs: 2,
            error_backoff_secs: 5,
            status_interval_secs: 300,
            settle_delay_secs: 10,
            test_mode: false,
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            command: None,
            simulated_duration_secs: default_simulated_duration(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ChainConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            rpc_url: self.rpc_url.clone(),
            chain_id: self.chain_id,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            gas_adjustment: self.gas_adjustment,
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
        }
    }
}

impl OrchestratorSettings {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_ceiling: Duration::from_secs(self.poll_ceiling_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            status_interval: Duration::from_secs(self.status_interval_secs),
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            bounded: self.test_mode,
        }
    }
}
