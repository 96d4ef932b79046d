/// Ledger contract bindings and the configured deployment addresses

use alloy_primitives::Address;
use alloy_sol_types::sol;
use anyhow::{anyhow, Context, Result};

use crate::config::ContractsConfig;

sol! {
    // EpochManager
    function getEpochState() external view returns (uint8 state, uint256 timeLeft);
    function getCurrentEpoch() external view returns (uint256);

    // LeaderManager
    function submitCommitment(uint256 nodeId, bytes32 commitment) external;
    function revealSecret(uint256 nodeId, bytes32 secret) external;
    function electLeader() external;
    function getCurrentLeader() external view returns (uint256);

    // JobManager
    function startAssignmentRound() external;
    function getJobsDetailsByNode(uint256 nodeId) external view returns (uint256[] jobIds, string[] jobArgs);
    function confirmJob(uint256 jobId) external;
    function completeJob(uint256 jobId) external;

    // IncentiveManager
    function processAll() external;

    // NodeManager
    function registerNode(uint256 computeRating) external;

    // NodeEscrow
    function getBalance(address account) external view returns (uint256);
    function deposit(uint256 amount) external;

    // LuminoToken
    function balanceOf(address account) external view returns (uint256);
    function approve(address spender, uint256 amount) external returns (bool);
}

/// Deployed addresses of the contracts the node talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub epoch_manager: Address,
    pub leader_manager: Address,
    pub job_manager: Address,
    pub incentive_manager: Address,
    pub node_manager: Address,
    pub node_escrow: Address,
    pub token: Address,
}

impl ContractAddresses {
    /// Parse and validate every configured address
    pub fn from_config(config: &ContractsConfig) -> Result<Self> {
        Ok(Self {
            epoch_manager: parse_address("epoch_manager", &config.epoch_manager)?,
            leader_manager: parse_address("leader_manager", &config.leader_manager)?,
            job_manager: parse_address("job_manager", &config.job_manager)?,
            incentive_manager: parse_address("incentive_manager", &config.incentive_manager)?,
            node_manager: parse_address("node_manager", &config.node_manager)?,
            node_escrow: parse_address("node_escrow", &config.node_escrow)?,
            token: parse_address("token", &config.token)?,
        })
    }

    /// All addresses with their contract names
    pub fn all(&self) -> [(&'static str, Address); 7] {
        [
            ("EpochManager", self.epoch_manager),
            ("LeaderManager", self.leader_manager),
            ("JobManager", self.job_manager),
            ("IncentiveManager", self.incentive_manager),
            ("NodeManager", self.node_manager),
            ("NodeEscrow", self.node_escrow),
            ("LuminoToken", self.token),
        ]
    }

    pub fn name_of(&self, address: Address) -> Option<&'static str> {
        self.all().into_iter().find(|(_, a)| *a == address).map(|(name, _)| name)
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    let value = value.trim();
    if value.is_empty() {
        return Err(anyhow!("Missing contract address: contracts.{}", field));
    }
    let address: Address = value
        .parse()
        .with_context(|| format!("Invalid contract address for contracts.{}: {}", field, value))?;
    if address == Address::ZERO {
        return Err(anyhow!("Contract address for contracts.{} is the zero address", field));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;

    fn config() -> ContractsConfig {
        ContractsConfig {
            epoch_manager: "0x0000000000000000000000000000000000000001".to_string(),
            leader_manager: "0x0000000000000000000000000000000000000002".to_string(),
            job_manager: "0x0000000000000000000000000000000000000003".to_string(),
            incentive_manager: "0x0000000000000000000000000000000000000004".to_string(),
            node_manager: "0x0000000000000000000000000000000000000007".to_string(),
            node_escrow: "0x0000000000000000000000000000000000000005".to_string(),
            token: "0x0000000000000000000000000000000000000006".to_string(),
        }
    }

    #[test]
    fn test_from_config() {
        let addresses = ContractAddresses::from_config(&config()).unwrap();
        assert_eq!(addresses.name_of(addresses.job_manager), Some("JobManager"));
        assert_eq!(addresses.name_of(addresses.node_manager), Some("NodeManager"));
        assert_eq!(addresses.name_of(Address::repeat_byte(0x99)), None);
    }

    #[test]
    fn test_missing_and_invalid_addresses() {
        let mut missing = config();
        missing.token = String::new();
        let err = ContractAddresses::from_config(&missing).unwrap_err();
        assert!(err.to_string().contains("contracts.token"));

        let mut invalid = config();
        invalid.job_manager = "0x1234".to_string();
        let err = ContractAddresses::from_config(&invalid).unwrap_err();
        assert!(err.to_string().contains("contracts.job_manager"));
    }

    #[test]
    fn test_call_selectors() {
        assert_eq!(electLeaderCall::SIGNATURE, "electLeader()");
        assert_eq!(
            submitCommitmentCall::SIGNATURE,
            "submitCommitment(uint256,bytes32)"
        );
        assert_eq!(getEpochStateCall::SIGNATURE, "getEpochState()");
        assert_eq!(registerNodeCall::SIGNATURE, "registerNode(uint256)");
        assert_eq!(approveCall::SIGNATURE, "approve(address,uint256)");
    }
}
