/// JSON-RPC transport for the ledger node

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ChainError;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

pub struct RpcTransport {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Connectivity(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request and deserialize its result
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        log::trace!("rpc -> {} {}", method, params);

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChainError::Connectivity(format!("{} returned {} {}", method, status, text)));
        }

        let response: RpcResponse = resp.json().await.map_err(transport_error)?;
        if let Some(error) = response.error {
            return Err(classify_error(error));
        }
        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| ChainError::InvalidResponse(format!("{}: {}", method, e)))
    }
}

fn transport_error(e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout(e.to_string())
    } else if e.is_decode() {
        ChainError::InvalidResponse(e.to_string())
    } else {
        ChainError::Connectivity(e.to_string())
    }
}

/// Map a JSON-RPC error object to a chain error, extracting revert data when present
pub fn classify_error(error: RpcErrorObject) -> ChainError {
    if let Some(data) = error.data.as_ref().and_then(revert_hex) {
        return ChainError::Reverted { data };
    }
    if error.message.contains("execution reverted") {
        // Nodes that omit the data field sometimes append the payload to the message
        let data = error
            .message
            .split_whitespace()
            .find(|word| word.starts_with("0x"))
            .unwrap_or("0x");
        if data == "0x" {
            log::debug!("Revert reported without data: {}", error.message);
        }
        return ChainError::Reverted { data: data.to_string() };
    }
    ChainError::Rpc {
        code: error.code,
        message: error.message,
    }
}

/// Revert payload from the error's data field; some nodes nest it one level down
fn revert_hex(data: &Value) -> Option<String> {
    match data {
        Value::String(s) if s.starts_with("0x") => Some(s.clone()),
        Value::Object(map) => map.get("data").and_then(revert_hex),
        _ => None,
    }
}

pub fn parse_quantity_u64(value: &str) -> Result<u64, ChainError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity {}: {}", value, e)))
}

pub fn parse_quantity_u128(value: &str) -> Result<u128, ChainError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity {}: {}", value, e)))
}

pub fn to_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str, data: Option<Value>) -> RpcErrorObject {
        RpcErrorObject {
            code: 3,
            message: message.to_string(),
            data,
        }
    }

    #[test]
    fn test_revert_data_is_extracted() {
        let err = classify_error(error("execution reverted", Some(json!("0xdeadbeef"))));
        assert_eq!(err.revert_data(), Some("0xdeadbeef"));

        let nested = classify_error(error("reverted", Some(json!({ "data": "0x12345678" }))));
        assert_eq!(nested.revert_data(), Some("0x12345678"));
    }

    #[test]
    fn test_revert_payload_in_message() {
        let err = classify_error(error("execution reverted: 0x08c379a0", None));
        assert!(err.is_revert());
        assert_eq!(err.revert_data(), Some("0x08c379a0"));
    }

    #[test]
    fn test_bare_revert_has_empty_payload() {
        let err = classify_error(error("execution reverted", None));
        assert_eq!(err.revert_data(), Some("0x"));

        let decoder = crate::decoder::ContractErrorDecoder::new().unwrap();
        assert_eq!(
            decoder.describe(&err),
            "Contract error: Transaction reverted without reason data"
        );
    }

    #[test]
    fn test_other_errors_are_rpc() {
        let err = classify_error(RpcErrorObject {
            code: -32000,
            message: "nonce too low".to_string(),
            data: None,
        });
        assert!(matches!(err, ChainError::Rpc { code: -32000, .. }));
    }

    #[test]
    fn test_quantities() {
        assert_eq!(parse_quantity_u64("0x0").unwrap(), 0);
        assert_eq!(parse_quantity_u64("0x7a69").unwrap(), 31337);
        assert_eq!(parse_quantity_u128("0x3b9aca00").unwrap(), 1_000_000_000);
        assert!(parse_quantity_u64("0xzz").is_err());
        assert_eq!(to_quantity(255), "0xff");
        assert_eq!(to_quantity(0), "0x0");
    }
}
