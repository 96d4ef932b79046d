/// Ledger client - contract reads over eth_call, locally signed submissions

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::contracts::{self, ContractAddresses};
use super::events;
use super::rpc::{self, RpcTransport};
use super::signer::{LegacyTransaction, LocalSigner};
use super::{ChainClient, ChainError, LedgerEvent, NodeId, NodeStatus, TxReceipt};
use crate::decoder::abi::u256_to_u64;
use crate::node::jobs::{AssignedJob, JobStatus};
use crate::orchestrator::{EpochState, Phase};

/// Configuration for the JSON-RPC ledger client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP JSON-RPC endpoint
    pub rpc_url: String,
    /// Expected chain id, checked on connect
    pub chain_id: u64,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Multiplier applied to the node's gas estimate
    pub gas_adjustment: f64,
    /// How long to wait for a submission to be mined
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            request_timeout: Duration::from_secs(30),
            gas_adjustment: 1.2,
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    transaction_hash: Option<String>,
}

impl RawLog {
    fn emitter(&self) -> Option<Address> {
        self.address.parse().ok()
    }

    fn topic_words(&self) -> Vec<B256> {
        self.topics.iter().filter_map(|t| t.parse().ok()).collect()
    }

    fn payload(&self) -> Vec<u8> {
        self.data
            .as_deref()
            .and_then(|d| decode_hex(d).ok())
            .unwrap_or_default()
    }
}

/// A mined transaction together with the logs it emitted
struct Mined {
    receipt: TxReceipt,
    logs: Vec<RawLog>,
}

/// JSON-RPC implementation of the ledger interface
pub struct LedgerClient {
    config: ClientConfig,
    rpc: RpcTransport,
    contracts: ContractAddresses,
    signer: LocalSigner,
    /// First block not yet scanned for events
    event_cursor: AtomicU64,
}

impl LedgerClient {
    pub fn new(
        config: ClientConfig,
        contracts: ContractAddresses,
        signer: LocalSigner,
    ) -> Result<Self, ChainError> {
        let rpc = RpcTransport::new(config.rpc_url.clone(), config.request_timeout)?;
        Ok(Self {
            config,
            rpc,
            contracts,
            signer,
            event_cursor: AtomicU64::new(0),
        })
    }

    /// Verify the endpoint serves the expected chain and start the event cursor at its head
    pub async fn connect(&self) -> Result<(), ChainError> {
        let chain_id: String = self.rpc.request("eth_chainId", json!([])).await?;
        let chain_id = rpc::parse_quantity_u64(&chain_id)?;
        if chain_id != self.config.chain_id {
            return Err(ChainError::InvalidResponse(format!(
                "endpoint serves chain {}, expected {}",
                chain_id, self.config.chain_id
            )));
        }

        let head = self.block_number().await?;
        self.event_cursor.store(head, Ordering::Relaxed);
        log::info!(
            "Connected to {} (chain id {}, block {}) as {}",
            self.rpc.url(),
            chain_id,
            head,
            self.signer.address()
        );
        Ok(())
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let number: String = self.rpc.request("eth_blockNumber", json!([])).await?;
        rpc::parse_quantity_u64(&number)
    }

    /// Read-only contract call
    async fn call<T: SolCall>(&self, to: Address, call: T) -> Result<T::Return, ChainError> {
        let params = json!([{ "to": hex_prefixed(to.as_slice()), "data": hex_prefixed(&call.abi_encode()) }, "latest"]);
        let output: String = self.rpc.request("eth_call", params).await?;
        let bytes = decode_hex(&output)?;
        T::abi_decode_returns(&bytes, true)
            .map_err(|e| ChainError::InvalidResponse(format!("{}: {}", T::SIGNATURE, e)))
    }

    async fn transact<T: SolCall>(&self, to: Address, call: T) -> Result<TxReceipt, ChainError> {
        self.submit(to, call).await.map(|mined| mined.receipt)
    }

    /// Sign, send and wait for a contract transaction.
    /// Reverts surface as `ChainError::Reverted` carrying the raw payload; nothing is retried.
    async fn submit<T: SolCall>(&self, to: Address, call: T) -> Result<Mined, ChainError> {
        let data = call.abi_encode();
        let from = hex_prefixed(self.signer.address().as_slice());
        let request = json!({
            "from": from,
            "to": hex_prefixed(to.as_slice()),
            "data": hex_prefixed(&data),
        });

        // Simulates the call; a revert is reported here with its data
        let estimate: String = self.rpc.request("eth_estimateGas", json!([request])).await?;
        let estimate = rpc::parse_quantity_u64(&estimate)?;
        let gas_limit = (estimate as f64 * self.config.gas_adjustment).ceil() as u64;

        let nonce: String = self.rpc.request("eth_getTransactionCount", json!([from, "pending"])).await?;
        let gas_price: String = self.rpc.request("eth_gasPrice", json!([])).await?;

        let tx = LegacyTransaction {
            nonce: rpc::parse_quantity_u64(&nonce)?,
            gas_price: rpc::parse_quantity_u128(&gas_price)?,
            gas_limit,
            to,
            value: 0,
            data,
            chain_id: self.config.chain_id,
        };
        let raw = self.signer.sign_legacy(&tx)?;

        let tx_hash: String = self
            .rpc
            .request("eth_sendRawTransaction", json!([hex_prefixed(&raw)]))
            .await?;
        let tx_hash: B256 = tx_hash
            .parse()
            .map_err(|_| ChainError::InvalidResponse(format!("bad transaction hash {}", tx_hash)))?;
        log::debug!("{} sent as {} (nonce {}, gas {})", T::SIGNATURE, tx_hash, tx.nonce, gas_limit);

        self.wait_for_receipt(tx_hash, &request).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256, request: &Value) -> Result<Mined, ChainError> {
        let deadline = Instant::now() + self.config.receipt_timeout;
        let hash = hex_prefixed(tx_hash.as_slice());

        loop {
            let receipt: Option<RawReceipt> = self
                .rpc
                .request("eth_getTransactionReceipt", json!([hash]))
                .await?;

            if let Some(receipt) = receipt {
                let block_number = receipt
                    .block_number
                    .as_deref()
                    .map(rpc::parse_quantity_u64)
                    .transpose()?;

                if receipt.status.as_deref() == Some("0x0") {
                    return Err(self.replay_revert(request, block_number).await);
                }
                return Ok(Mined {
                    receipt: TxReceipt { tx_hash, block_number },
                    logs: receipt.logs,
                });
            }

            if Instant::now() >= deadline {
                return Err(ChainError::Timeout(format!("no receipt for {} after {:?}", hash, self.config.receipt_timeout)));
            }
            sleep(self.config.receipt_poll_interval).await;
        }
    }

    /// Re-run a failed transaction as a call to recover its revert data
    async fn replay_revert(&self, request: &Value, block_number: Option<u64>) -> ChainError {
        let block = block_number
            .map(|b| rpc::to_quantity(b as u128))
            .unwrap_or_else(|| "latest".to_string());
        match self.rpc.request::<String>("eth_call", json!([request, block])).await {
            Err(e) if e.is_revert() => e,
            _ => ChainError::Reverted { data: "0x".to_string() },
        }
    }

    fn ledger_event(&self, entry: RawLog) -> LedgerEvent {
        let topics = entry.topic_words();
        let decoded = events::decode_event(&topics, &entry.payload());
        let contract = entry
            .emitter()
            .and_then(|a| self.contracts.name_of(a))
            .map(str::to_string)
            .unwrap_or_else(|| entry.address.clone());
        LedgerEvent {
            contract,
            topic: topics.first().copied(),
            block_number: entry
                .block_number
                .as_deref()
                .and_then(|b| rpc::parse_quantity_u64(b).ok()),
            tx_hash: entry.transaction_hash.as_deref().and_then(|h| h.parse().ok()),
            decoded,
        }
    }
}

impl ChainClient for LedgerClient {
    async fn get_epoch_state(&self) -> Result<EpochState, ChainError> {
        let state = self
            .call(self.contracts.epoch_manager, contracts::getEpochStateCall {})
            .await?;
        let phase = Phase::from_code(state.state)
            .ok_or_else(|| ChainError::InvalidResponse(format!("unknown epoch state {}", state.state)))?;
        let seconds = u256_to_u64(state.timeLeft).unwrap_or(u64::MAX);
        Ok(EpochState::new(phase, Duration::from_secs(seconds)))
    }

    async fn get_current_epoch(&self) -> Result<u64, ChainError> {
        let epoch = self
            .call(self.contracts.epoch_manager, contracts::getCurrentEpochCall {})
            .await?;
        to_u64(epoch._0, "epoch")
    }

    async fn submit_commitment(&self, node_id: NodeId, commitment: B256) -> Result<TxReceipt, ChainError> {
        let call = contracts::submitCommitmentCall {
            nodeId: U256::from(node_id),
            commitment,
        };
        self.transact(self.contracts.leader_manager, call).await
    }

    async fn reveal_secret(&self, node_id: NodeId, secret: B256) -> Result<TxReceipt, ChainError> {
        let call = contracts::revealSecretCall {
            nodeId: U256::from(node_id),
            secret,
        };
        self.transact(self.contracts.leader_manager, call).await
    }

    async fn elect_leader(&self) -> Result<TxReceipt, ChainError> {
        self.transact(self.contracts.leader_manager, contracts::electLeaderCall {})
            .await
    }

    async fn get_current_leader(&self) -> Result<NodeId, ChainError> {
        let leader = self
            .call(self.contracts.leader_manager, contracts::getCurrentLeaderCall {})
            .await?;
        to_u64(leader._0, "leader id")
    }

    async fn start_assignment_round(&self) -> Result<TxReceipt, ChainError> {
        self.transact(self.contracts.job_manager, contracts::startAssignmentRoundCall {})
            .await
    }

    async fn get_jobs_assigned_to(&self, node_id: NodeId) -> Result<Vec<AssignedJob>, ChainError> {
        let call = contracts::getJobsDetailsByNodeCall {
            nodeId: U256::from(node_id),
        };
        let details = self.call(self.contracts.job_manager, call).await?;
        if details.jobIds.len() != details.jobArgs.len() {
            return Err(ChainError::InvalidResponse(format!(
                "{} job ids but {} job args",
                details.jobIds.len(),
                details.jobArgs.len()
            )));
        }

        details
            .jobIds
            .into_iter()
            .zip(details.jobArgs)
            .map(|(id, args)| {
                Ok(AssignedJob {
                    id: to_u64(id, "job id")?,
                    args,
                    status: JobStatus::Assigned,
                })
            })
            .collect()
    }

    async fn confirm_job(&self, job_id: u64) -> Result<TxReceipt, ChainError> {
        let call = contracts::confirmJobCall {
            jobId: U256::from(job_id),
        };
        self.transact(self.contracts.job_manager, call).await
    }

    async fn complete_job(&self, job_id: u64) -> Result<TxReceipt, ChainError> {
        let call = contracts::completeJobCall {
            jobId: U256::from(job_id),
        };
        self.transact(self.contracts.job_manager, call).await
    }

    async fn process_epoch_settlement(&self) -> Result<TxReceipt, ChainError> {
        self.transact(self.contracts.incentive_manager, contracts::processAllCall {})
            .await
    }

    async fn get_node_status(&self, _node_id: NodeId) -> Result<NodeStatus, ChainError> {
        let account = self.signer.address();
        let epoch = self.get_current_epoch().await?;
        let stake_balance = self.get_stake_balance().await?;
        let tokens = self
            .call(self.contracts.token, contracts::balanceOfCall { account })
            .await?;
        Ok(NodeStatus {
            epoch,
            stake_balance,
            token_balance: tokens._0,
        })
    }

    async fn get_stake_balance(&self) -> Result<U256, ChainError> {
        let account = self.signer.address();
        let stake = self
            .call(self.contracts.node_escrow, contracts::getBalanceCall { account })
            .await?;
        Ok(stake._0)
    }

    async fn approve_stake(&self, amount: U256) -> Result<TxReceipt, ChainError> {
        let call = contracts::approveCall {
            spender: self.contracts.node_escrow,
            amount,
        };
        self.transact(self.contracts.token, call).await
    }

    async fn deposit_stake(&self, amount: U256) -> Result<TxReceipt, ChainError> {
        self.transact(self.contracts.node_escrow, contracts::depositCall { amount })
            .await
    }

    async fn register_node(&self, compute_rating: u64) -> Result<NodeId, ChainError> {
        let call = contracts::registerNodeCall {
            computeRating: U256::from(compute_rating),
        };
        let mined = self.submit(self.contracts.node_manager, call).await?;
        let node_id = mined
            .logs
            .iter()
            .filter(|entry| entry.emitter() == Some(self.contracts.node_manager))
            .find_map(|entry| events::registered_node_id(&entry.topic_words(), &entry.payload()))
            .ok_or_else(|| {
                ChainError::InvalidResponse(format!(
                    "no NodeRegistered event in {}",
                    mined.receipt.tx_hash
                ))
            })?;
        to_u64(node_id, "node id")
    }

    async fn poll_events(&self) -> Result<Vec<LedgerEvent>, ChainError> {
        let head = self.block_number().await?;
        let from = self.event_cursor.load(Ordering::Relaxed);
        if from > head {
            return Ok(Vec::new());
        }

        let addresses: Vec<String> = self
            .contracts
            .all()
            .iter()
            .map(|(_, a)| hex_prefixed(a.as_slice()))
            .collect();
        let filter = json!({
            "fromBlock": rpc::to_quantity(from as u128),
            "toBlock": rpc::to_quantity(head as u128),
            "address": addresses,
        });
        let logs: Vec<RawLog> = self.rpc.request("eth_getLogs", json!([filter])).await?;
        self.event_cursor.store(head + 1, Ordering::Relaxed);

        let events = logs.into_iter().map(|entry| self.ledger_event(entry)).collect();
        Ok(events)
    }
}

fn hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, ChainError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| ChainError::InvalidResponse(format!("bad hex {}: {}", value, e)))
}

fn to_u64(value: U256, what: &str) -> Result<u64, ChainError> {
    u256_to_u64(value).ok_or_else(|| ChainError::InvalidResponse(format!("{} {} exceeds u64", what, value)))
}
