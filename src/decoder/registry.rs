/// Static table of the ledger's custom errors
///
/// Each entry carries the error name, its ordered parameter types and a pure
/// formatter. Selectors are derived from the entries, never written by hand.

use alloy_primitives::{keccak256, U256};

use super::abi::AbiType::{Address, Bytes32, String as Str, Uint256, Uint8};
use super::abi::{AbiType, AbiValue};
use crate::node::jobs::JobStatus;
use crate::orchestrator::Phase;

/// Number of decimals used by the ledger's token amounts
pub const TOKEN_DECIMALS: usize = 18;

/// A known custom error
#[derive(Debug)]
pub struct ErrorDefinition {
    pub name: &'static str,
    pub params: &'static [AbiType],
    pub format: fn(&[AbiValue]) -> String,
}

impl ErrorDefinition {
    /// Canonical signature, e.g. `InsufficientStake(address,uint256)`
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.canonical()).collect();
        format!("{}({})", self.name, params.join(","))
    }

    /// First four bytes of keccak256 over the canonical signature
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);
        selector
    }
}

/// Render a raw token amount with 18 decimals, trimming trailing zeros
pub fn format_token_amount(amount: U256) -> String {
    let scale = U256::from(10u64).pow(U256::from(TOKEN_DECIMALS));
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == U256::ZERO {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = TOKEN_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

fn tokens(value: &AbiValue) -> String {
    match value.as_uint() {
        Some(amount) => format_token_amount(amount),
        None => value.to_string(),
    }
}

fn job_status(value: &AbiValue) -> &'static str {
    value
        .as_u64()
        .and_then(|c| u8::try_from(c).ok())
        .and_then(JobStatus::from_code)
        .map(JobStatus::name)
        .unwrap_or("Unknown")
}

fn epoch_state(value: &AbiValue) -> &'static str {
    value
        .as_u64()
        .and_then(|c| u8::try_from(c).ok())
        .and_then(Phase::from_code)
        .map(Phase::name)
        .unwrap_or("Unknown")
}

fn panic_reason(value: &AbiValue) -> &'static str {
    match value.as_u64() {
        Some(0x00) => "generic compiler panic",
        Some(0x01) => "assertion failed",
        Some(0x11) => "arithmetic overflow or underflow",
        Some(0x12) => "division or modulo by zero",
        Some(0x21) => "invalid enum conversion",
        Some(0x22) => "corrupted storage byte array",
        Some(0x31) => "pop on empty array",
        Some(0x32) => "array index out of bounds",
        Some(0x41) => "out of memory",
        Some(0x51) => "call to zero-initialized function",
        _ => "unknown panic code",
    }
}

pub static ERROR_DEFINITIONS: &[ErrorDefinition] = &[
    // Solidity built-ins
    ErrorDefinition {
        name: "Error",
        params: &[Str],
        format: |a| format!("Reverted: {}", a[0]),
    },
    ErrorDefinition {
        name: "Panic",
        params: &[Uint256],
        format: |a| match a[0].as_u64() {
            Some(code) => format!("Panic 0x{:02x}: {}", code, panic_reason(&a[0])),
            None => format!("Panic {}: {}", a[0], panic_reason(&a[0])),
        },
    },
    // AccessManager
    ErrorDefinition {
        name: "RoleManagerUnauthorized",
        params: &[Address],
        format: |a| format!("Account {} is not authorized for this role", a[0]),
    },
    ErrorDefinition {
        name: "InvalidRole",
        params: &[Bytes32],
        format: |a| format!("Invalid role: {}", a[0]),
    },
    ErrorDefinition {
        name: "CannotRevokeAdmin",
        params: &[],
        format: |_| "Cannot revoke the last admin role".to_string(),
    },
    ErrorDefinition {
        name: "MustConfirmRenounce",
        params: &[Address],
        format: |a| format!("Account {} must confirm renounce", a[0]),
    },
    // EpochManager
    ErrorDefinition {
        name: "InvalidState",
        params: &[Uint8],
        format: |a| format!("Invalid epoch state: {}", epoch_state(&a[0])),
    },
    // Escrows
    ErrorDefinition {
        name: "BelowMinimumDeposit",
        params: &[Uint256, Uint256],
        format: |a| {
            format!(
                "Deposit amount {} is below minimum required {}",
                tokens(&a[0]),
                tokens(&a[1])
            )
        },
    },
    ErrorDefinition {
        name: "InsufficientBalance",
        params: &[Address, Uint256, Uint256],
        format: |a| {
            format!(
                "Insufficient balance for {}: requested {}, available {}",
                a[0],
                tokens(&a[1]),
                tokens(&a[2])
            )
        },
    },
    ErrorDefinition {
        name: "ExistingWithdrawRequest",
        params: &[Address],
        format: |a| format!("Active withdrawal request already exists for {}", a[0]),
    },
    ErrorDefinition {
        name: "NoWithdrawRequest",
        params: &[Address],
        format: |a| format!("No active withdrawal request found for {}", a[0]),
    },
    ErrorDefinition {
        name: "LockPeriodActive",
        params: &[Address, Uint256],
        format: |a| format!("Lock period still active for {}, {} seconds remaining", a[0], a[1]),
    },
    ErrorDefinition {
        name: "TransferFailed",
        params: &[],
        format: |_| "Token transfer failed".to_string(),
    },
    ErrorDefinition {
        name: "InsufficientContractBalance",
        params: &[Uint256, Uint256],
        format: |a| {
            format!(
                "Contract balance insufficient: requested {}, available {}",
                tokens(&a[0]),
                tokens(&a[1])
            )
        },
    },
    // JobManager
    ErrorDefinition {
        name: "InvalidJobStatus",
        params: &[Uint256, Uint8, Uint8],
        format: |a| {
            format!(
                "Invalid job status for job {}: current {}, attempted {}",
                a[0],
                job_status(&a[1]),
                job_status(&a[2])
            )
        },
    },
    ErrorDefinition {
        name: "InvalidStatusTransition",
        params: &[Uint8, Uint8],
        format: |a| {
            format!(
                "Invalid job status transition from {} to {}",
                job_status(&a[0]),
                job_status(&a[1])
            )
        },
    },
    ErrorDefinition {
        name: "JobAlreadyProcessed",
        params: &[Uint256],
        format: |a| format!("Job {} has already been processed", a[0]),
    },
    ErrorDefinition {
        name: "JobNotComplete",
        params: &[Uint256],
        format: |a| format!("Job {} is not in completed state", a[0]),
    },
    ErrorDefinition {
        name: "InvalidModelName",
        params: &[Str],
        format: |a| format!("Invalid model name: {}", a[0]),
    },
    // LeaderManager
    ErrorDefinition {
        name: "NoCommitmentFound",
        params: &[Uint256, Uint256],
        format: |a| format!("No commitment found for epoch {}, node {}", a[0], a[1]),
    },
    ErrorDefinition {
        name: "InvalidSecret",
        params: &[Uint256],
        format: |a| format!("Invalid secret revealed for node {}", a[0]),
    },
    ErrorDefinition {
        name: "NoRevealsSubmitted",
        params: &[Uint256],
        format: |a| format!("No secrets revealed for epoch {}", a[0]),
    },
    ErrorDefinition {
        name: "MissingReveal",
        params: &[Uint256],
        format: |a| format!("Missing secret reveal from node {}", a[0]),
    },
    ErrorDefinition {
        name: "NotCurrentLeader",
        params: &[Address, Address],
        format: |a| format!("Account {} is not the current leader (leader is {})", a[0], a[1]),
    },
    ErrorDefinition {
        name: "NoRandomValueForEpoch",
        params: &[Uint256],
        format: |a| format!("No random value available for epoch {}", a[0]),
    },
    ErrorDefinition {
        name: "LeaderAlreadyElected",
        params: &[Uint256],
        format: |a| format!("Leader already elected for epoch {}", a[0]),
    },
    // NodeManager
    ErrorDefinition {
        name: "NodeNotFound",
        params: &[Uint256],
        format: |a| format!("Node {} not found", a[0]),
    },
    ErrorDefinition {
        name: "NodeNotActive",
        params: &[Uint256],
        format: |a| format!("Node {} is not active", a[0]),
    },
    ErrorDefinition {
        name: "InsufficientStake",
        params: &[Address, Uint256],
        format: |a| format!("Insufficient stake for {} with compute rating {}", a[0], a[1]),
    },
    ErrorDefinition {
        name: "InvalidNodeOwner",
        params: &[Uint256, Address],
        format: |a| format!("Invalid node owner: {} does not own node {}", a[1], a[0]),
    },
    // WhitelistManager
    ErrorDefinition {
        name: "AlreadyWhitelisted",
        params: &[Address],
        format: |a| format!("Computing provider {} is already whitelisted", a[0]),
    },
    ErrorDefinition {
        name: "CooldownActive",
        params: &[Address, Uint256],
        format: |a| format!("Cooldown period active for {}, {} seconds remaining", a[0], a[1]),
    },
    ErrorDefinition {
        name: "NotWhitelisted",
        params: &[Address],
        format: |a| format!("Computing provider {} is not whitelisted", a[0]),
    },
    // IncentiveManager
    ErrorDefinition {
        name: "EpochAlreadyProcessed",
        params: &[Uint256],
        format: |a| format!("Epoch incentives has already been processed, got epoch {}", a[0]),
    },
];
