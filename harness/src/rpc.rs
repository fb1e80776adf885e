//! JSON-RPC transport
//!
//! ## Architecture
//!
//! ```text
//! ContractBinding / EvmClient
//!     │ method + params
//!     ▼
//! RpcTransport (this module)
//!     │ HTTP POST, JSON-RPC 2.0
//!     ▼
//! Node EVM RPC endpoint
//! ```
//!
//! Node errors are classified here once: reverts become
//! [`HarnessError::ExecutionReverted`], everything else
//! [`HarnessError::Rpc`]. Transport failures become
//! [`HarnessError::NodeUnreachable`].

use alloy::dyn_abi::DynSolType;
use alloy::primitives::Bytes;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};

/// Selector of Solidity's `Error(string)`
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Sends one JSON-RPC request and returns its `result`
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// HTTP JSON-RPC transport
pub struct HttpTransport {
    client: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Create a new transport
    ///
    /// # Arguments
    /// * `rpc_url` - Node JSON-RPC endpoint
    /// * `timeout` - Upper bound for a single HTTP round trip
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HarnessError::NodeUnreachable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        debug!("RPC request #{} {}: {}", id, method, truncate(&request["params"].to_string(), 200));

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| HarnessError::NodeUnreachable(format!("{} ({})", e, self.rpc_url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HarnessError::NodeUnreachable(format!("failed to read RPC response: {e}")))?;

        debug!("RPC response #{}: {}", id, truncate(&body, 500));

        let parsed: RpcResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                HarnessError::decode(method, format!("invalid JSON-RPC envelope: {e}"))
            } else {
                HarnessError::NodeUnreachable(format!("RPC returned status {}: {}", status, truncate(&body, 200)))
            }
        })?;

        if let Some(error) = parsed.error {
            return Err(classify_rpc_error(error.code, &error.message, error.data.as_ref()));
        }

        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

/// Map a JSON-RPC error object onto the harness taxonomy
pub fn classify_rpc_error(code: i64, message: &str, data: Option<&Value>) -> HarnessError {
    let is_revert = code == 3 || message.to_ascii_lowercase().contains("revert");
    if !is_revert {
        warn!("Node rejected request ({}): {}", code, message);
        return HarnessError::Rpc {
            code,
            message: message.to_string(),
        };
    }

    let revert_data = data
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Bytes>().ok());

    let reason = revert_data
        .as_ref()
        .and_then(|data| decode_revert_reason(data))
        .or_else(|| {
            message
                .split_once("execution reverted:")
                .map(|(_, r)| r.trim().to_string())
                .filter(|r| !r.is_empty())
        });

    HarnessError::ExecutionReverted {
        reason,
        tx_hash: None,
    }
}

/// Decode the message of an `Error(string)` revert payload
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(ERROR_STRING_SELECTOR.as_slice())?;
    DynSolType::String
        .abi_decode(payload)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
