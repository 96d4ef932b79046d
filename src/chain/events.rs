/// Ledger events the node can name and render
///
/// Logs whose topic matches none of these, or whose payload does not decode,
/// are still reported with their raw topic.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use std::fmt;

use crate::decoder::format_token_amount;

sol! {
    // NodeManager
    event NodeRegistered(uint256 indexed nodeId, address indexed owner, uint256 computeRating);
    event NodeUnregistered(uint256 indexed nodeId, address indexed owner);

    // LeaderManager
    event CommitSubmitted(uint256 indexed epoch, uint256 indexed nodeId);
    event SecretRevealed(uint256 indexed epoch, uint256 indexed nodeId, bytes32 secret);
    event LeaderElected(uint256 indexed epoch, uint256 indexed nodeId);

    // JobManager
    event AssignmentRoundStarted(uint256 indexed epoch);
    event JobAssigned(uint256 indexed jobId, uint256 indexed nodeId);
    event JobConfirmed(uint256 indexed jobId, uint256 indexed nodeId);
    event JobCompleted(uint256 indexed jobId, uint256 indexed nodeId);
    event JobRejected(uint256 indexed jobId, uint256 indexed nodeId, string reason);

    // NodeEscrow
    event Deposited(address indexed user, uint256 amount, uint256 totalBalance);
    event Withdrawn(address indexed user, uint256 amount, uint256 remainingBalance);
    event PenaltyApplied(address indexed account, uint256 amount, string reason);
    event SlashApplied(address indexed account, uint256 amount, string reason);
    event RewardApplied(address indexed account, uint256 amount, string reason);

    // LuminoToken
    event Transfer(address indexed from, address indexed to, uint256 value);
    event Approval(address indexed owner, address indexed spender, uint256 value);
}

/// Argument name suffixes that carry token amounts
const TOKEN_FIELDS: [&str; 3] = ["amount", "balance", "stake"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArg {
    pub name: &'static str,
    pub value: String,
}

/// A log matched against a known event signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub name: &'static str,
    pub args: Vec<EventArg>,
}

impl DecodedEvent {
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }
}

impl fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", arg.name, arg.value)?;
        }
        f.write_str(")")
    }
}

fn uint(name: &'static str, value: U256) -> EventArg {
    let lower = name.to_ascii_lowercase();
    let value = if TOKEN_FIELDS.iter().any(|suffix| lower.ends_with(suffix)) {
        format!("{} LUM", format_token_amount(value))
    } else {
        value.to_string()
    };
    EventArg { name, value }
}

fn address(name: &'static str, value: Address) -> EventArg {
    EventArg { name, value: value.to_string() }
}

fn text(name: &'static str, value: impl fmt::Display) -> EventArg {
    EventArg { name, value: value.to_string() }
}

fn decode_as<E: SolEvent>(topics: &[B256], data: &[u8]) -> Option<E> {
    if topics.first() != Some(&E::SIGNATURE_HASH) {
        return None;
    }
    match E::decode_raw_log(topics.iter().copied(), data, true) {
        Ok(event) => Some(event),
        Err(e) => {
            log::debug!("Log matches {} but does not decode: {}", E::SIGNATURE, e);
            None
        }
    }
}

fn render<E: SolEvent>(
    topics: &[B256],
    data: &[u8],
    args: impl FnOnce(E) -> Vec<EventArg>,
) -> Option<DecodedEvent> {
    let event = decode_as::<E>(topics, data)?;
    let name = E::SIGNATURE.split('(').next().unwrap_or(E::SIGNATURE);
    Some(DecodedEvent { name, args: args(event) })
}

/// Name and render a raw log
pub fn decode_event(topics: &[B256], data: &[u8]) -> Option<DecodedEvent> {
    render::<NodeRegistered>(topics, data, |e| {
        vec![uint("nodeId", e.nodeId), address("owner", e.owner), uint("computeRating", e.computeRating)]
    })
    .or_else(|| {
        render::<NodeUnregistered>(topics, data, |e| vec![uint("nodeId", e.nodeId), address("owner", e.owner)])
    })
    .or_else(|| {
        render::<CommitSubmitted>(topics, data, |e| vec![uint("epoch", e.epoch), uint("nodeId", e.nodeId)])
    })
    .or_else(|| {
        render::<SecretRevealed>(topics, data, |e| {
            vec![uint("epoch", e.epoch), uint("nodeId", e.nodeId), text("secret", e.secret)]
        })
    })
    .or_else(|| {
        render::<LeaderElected>(topics, data, |e| vec![uint("epoch", e.epoch), uint("nodeId", e.nodeId)])
    })
    .or_else(|| render::<AssignmentRoundStarted>(topics, data, |e| vec![uint("epoch", e.epoch)]))
    .or_else(|| render::<JobAssigned>(topics, data, |e| vec![uint("jobId", e.jobId), uint("nodeId", e.nodeId)]))
    .or_else(|| render::<JobConfirmed>(topics, data, |e| vec![uint("jobId", e.jobId), uint("nodeId", e.nodeId)]))
    .or_else(|| render::<JobCompleted>(topics, data, |e| vec![uint("jobId", e.jobId), uint("nodeId", e.nodeId)]))
    .or_else(|| {
        render::<JobRejected>(topics, data, |e| {
            vec![uint("jobId", e.jobId), uint("nodeId", e.nodeId), text("reason", e.reason)]
        })
    })
    .or_else(|| {
        render::<Deposited>(topics, data, |e| {
            vec![address("user", e.user), uint("amount", e.amount), uint("totalBalance", e.totalBalance)]
        })
    })
    .or_else(|| {
        render::<Withdrawn>(topics, data, |e| {
            vec![address("user", e.user), uint("amount", e.amount), uint("remainingBalance", e.remainingBalance)]
        })
    })
    .or_else(|| {
        render::<PenaltyApplied>(topics, data, |e| {
            vec![address("account", e.account), uint("amount", e.amount), text("reason", e.reason)]
        })
    })
    .or_else(|| {
        render::<SlashApplied>(topics, data, |e| {
            vec![address("account", e.account), uint("amount", e.amount), text("reason", e.reason)]
        })
    })
    .or_else(|| {
        render::<RewardApplied>(topics, data, |e| {
            vec![address("account", e.account), uint("amount", e.amount), text("reason", e.reason)]
        })
    })
    .or_else(|| {
        render::<Transfer>(topics, data, |e| {
            vec![address("from", e.from), address("to", e.to), uint("value", e.value)]
        })
    })
    .or_else(|| {
        render::<Approval>(topics, data, |e| {
            vec![address("owner", e.owner), address("spender", e.spender), uint("value", e.value)]
        })
    })
}

/// Node id announced by a `NodeRegistered` log
pub fn registered_node_id(topics: &[B256], data: &[u8]) -> Option<U256> {
    decode_as::<NodeRegistered>(topics, data).map(|e| e.nodeId)
}
