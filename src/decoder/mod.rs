/// Contract Failure Decoder - turns opaque revert payloads into readable diagnostics
///
/// The selector table is derived from `registry::ERROR_DEFINITIONS` once at
/// startup and rejected if two errors hash to the same selector. Decoding never
/// fails: every input produces a message, falling back to a description of the
/// decode problem that embeds the original payload.

use std::collections::HashMap;
use thiserror::Error;

use crate::chain::ChainError;

pub mod abi;
pub mod registry;

pub use abi::{decode_params, AbiDecodeError, AbiType, AbiValue};
pub use registry::{format_token_amount, ErrorDefinition, ERROR_DEFINITIONS};

/// Prefix some nodes put in front of the revert data
const REVERT_PREFIX: &str = "execution reverted: ";

/// Message of a revert that carried no data
const BARE_REVERT: &str = "execution reverted";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("selector collision 0x{selector}: {first} and {second}")]
    SelectorCollision {
        selector: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error)]
enum DecodeError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("payload has {0} bytes, a selector needs 4")]
    TruncatedSelector(usize),
    #[error(transparent)]
    Abi(#[from] AbiDecodeError),
}

pub struct ContractErrorDecoder {
    selectors: HashMap<[u8; 4], &'static ErrorDefinition>,
}

impl ContractErrorDecoder {
    /// Build the decoder over the ledger's error registry
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_definitions(ERROR_DEFINITIONS)
    }

    pub fn with_definitions(definitions: &'static [ErrorDefinition]) -> Result<Self, RegistryError> {
        let mut selectors: HashMap<[u8; 4], &'static ErrorDefinition> = HashMap::new();
        for definition in definitions {
            let selector = definition.selector();
            if let Some(existing) = selectors.insert(selector, definition) {
                return Err(RegistryError::SelectorCollision {
                    selector: hex::encode(selector),
                    first: existing.signature(),
                    second: definition.signature(),
                });
            }
        }
        log::debug!("Error registry built with {} selectors", selectors.len());
        Ok(Self { selectors })
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn lookup(&self, selector: [u8; 4]) -> Option<&'static ErrorDefinition> {
        self.selectors.get(&selector).copied()
    }

    /// Registered errors ordered by signature
    pub fn definitions(&self) -> Vec<([u8; 4], &'static ErrorDefinition)> {
        let mut entries: Vec<_> = self.selectors.iter().map(|(s, d)| (*s, *d)).collect();
        entries.sort_by_key(|(_, d)| d.signature());
        entries
    }

    /// Decode a textual revert payload (hex, optionally prefixed)
    pub fn decode(&self, raw: &str) -> String {
        let payload = raw.trim();
        let payload = payload.strip_prefix(REVERT_PREFIX).unwrap_or(payload).trim();
        let payload = if payload == BARE_REVERT { "" } else { payload };
        let payload = payload
            .strip_prefix("0x")
            .or_else(|| payload.strip_prefix("0X"))
            .unwrap_or(payload);

        let result = hex::decode(payload)
            .map_err(DecodeError::from)
            .and_then(|bytes| self.decode_payload(&bytes));
        match result {
            Ok(message) => message,
            Err(e) => format!("Error decoding custom error: {} (Decoder error: {})", raw, e),
        }
    }

    /// Decode a binary revert payload
    pub fn decode_bytes(&self, data: &[u8]) -> String {
        match self.decode_payload(data) {
            Ok(message) => message,
            Err(e) => format!(
                "Error decoding custom error: 0x{} (Decoder error: {})",
                hex::encode(data),
                e
            ),
        }
    }

    /// Human-readable rendering of any chain failure
    pub fn describe(&self, error: &ChainError) -> String {
        match error.revert_data() {
            Some(data) => format!("Contract error: {}", self.decode(data)),
            None => error.to_string(),
        }
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        if bytes.is_empty() {
            return Ok("Transaction reverted without reason data".to_string());
        }
        if bytes.len() < 4 {
            return Err(DecodeError::TruncatedSelector(bytes.len()));
        }

        let mut selector = [0u8; 4];
        selector.copy_from_slice(&bytes[..4]);
        let Some(definition) = self.lookup(selector) else {
            return Ok(format!("Unknown error selector: 0x{}", hex::encode(selector)));
        };

        if definition.params.is_empty() {
            return Ok((definition.format)(&[]));
        }
        let values = decode_params(definition.params, &bytes[4..])?;
        Ok((definition.format)(&values))
    }
}
