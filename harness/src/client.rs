use alloy::consensus::TxLegacy;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256, U64};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{Config, PollSettings};
use crate::error::{HarnessError, Result};
use crate::rpc::{HttpTransport, RpcTransport};
use crate::signer::{sign_legacy, Signer};
use crate::tx::{PendingTx, RpcReceipt, TransactionReceipt};

/// Parameters of `eth_call`, `eth_estimateGas` and `eth_sendTransaction`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, alias = "input")]
    pub data: Bytes,
}

/// EVM JSON-RPC client shared by all bindings of a suite
pub struct EvmClient {
    transport: Arc<dyn RpcTransport>,
    poll: PollSettings,
    gas_buffer_percent: u64,
    chain_id: OnceCell<u64>,
}

impl EvmClient {
    pub fn new(transport: Arc<dyn RpcTransport>, poll: PollSettings, gas_buffer_percent: u64) -> Self {
        Self {
            transport,
            poll,
            gas_buffer_percent,
            chain_id: OnceCell::new(),
        }
    }

    /// HTTP client for the configured node
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.rpc_url, config.rpc_request_timeout())?;
        let client = Self::new(Arc::new(transport), config.poll_settings(), config.gas_buffer_percent);
        Ok(match config.chain_id {
            Some(id) => client.with_chain_id(id),
            None => client,
        })
    }

    /// Skip the `eth_chainId` lookup
    pub fn with_chain_id(self, chain_id: u64) -> Self {
        Self {
            chain_id: OnceCell::new_with(Some(chain_id)),
            ..self
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.transport.request(method, params).await?;
        serde_json::from_value(result).map_err(|e| HarnessError::decode(method, e.to_string()))
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let id = self
            .chain_id
            .get_or_try_init(|| async {
                let id: U64 = self.rpc("eth_chainId", json!([])).await?;
                Ok::<_, HarnessError>(id.to::<u64>())
            })
            .await?;
        Ok(*id)
    }

    /// Accounts unlocked on the node
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.rpc("eth_accounts", json!([])).await
    }

    pub async fn balance(&self, address: Address) -> Result<U256> {
        self.rpc("eth_getBalance", json!([address, "latest"])).await
    }

    pub async fn nonce(&self, address: Address) -> Result<u64> {
        let nonce: U64 = self
            .rpc("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(nonce.to::<u64>())
    }

    pub async fn gas_price(&self) -> Result<u128> {
        let price: U256 = self.rpc("eth_gasPrice", json!([])).await?;
        u128::try_from(price)
            .map_err(|_| HarnessError::decode("eth_gasPrice", format!("gas price {price} overflows u128")))
    }

    /// Read-only call against the latest state
    pub async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        self.rpc("eth_call", json!([request, "latest"])).await
    }

    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        let gas: U64 = self.rpc("eth_estimateGas", json!([request])).await?;
        Ok(gas.to::<u64>())
    }

    /// Estimated gas plus the configured buffer
    pub fn padded_gas(&self, estimate: u64) -> u64 {
        estimate.saturating_add(estimate.saturating_mul(self.gas_buffer_percent) / 100)
    }

    /// Broadcast a transaction as `signer`; `request.gas` must already be set
    pub async fn send(&self, signer: &Signer, request: &CallRequest) -> Result<B256> {
        match signer {
            Signer::Node(address) => {
                let request = CallRequest {
                    from: Some(*address),
                    ..request.clone()
                };
                self.rpc("eth_sendTransaction", json!([request])).await
            }
            Signer::Local(key) => {
                let nonce = self.nonce(key.address()).await?;
                let gas_price = self.gas_price().await?;
                let chain_id = self.chain_id().await?;
                let gas_limit = request
                    .gas
                    .map(|g| g.to::<u64>())
                    .ok_or_else(|| HarnessError::encoding("send", "gas limit not set"))?;

                let tx = TxLegacy {
                    chain_id: Some(chain_id),
                    nonce,
                    gas_price,
                    gas_limit,
                    to: TxKind::Call(request.to),
                    value: request.value.unwrap_or_default(),
                    input: request.data.clone(),
                };

                let raw = sign_legacy(key, tx)?;
                debug!("Signed tx {} (nonce={}, chain_id={})", raw.hash, nonce, chain_id);

                let hash: B256 = self
                    .rpc("eth_sendRawTransaction", json!([Bytes::from(raw.encoded)]))
                    .await?;
                Ok(hash)
            }
        }
    }

    /// Receipt of a mined transaction, `None` while pending
    pub async fn receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        let raw: Option<RpcReceipt> = self
            .rpc("eth_getTransactionReceipt", json!([hash]))
            .await?;
        raw.map(TransactionReceipt::try_from).transpose()
    }

    /// Plain native-currency transfer
    pub async fn send_value(self: &Arc<Self>, signer: &Signer, to: Address, value: U256) -> Result<PendingTx> {
        let mut request = CallRequest {
            from: Some(signer.address()),
            to,
            gas: None,
            value: Some(value),
            data: Bytes::new(),
        };

        let estimate = self.estimate_gas(&request).await?;
        request.gas = Some(U64::from(self.padded_gas(estimate)));

        info!("Sending {} wei from {} to {}", value, signer.address(), to);
        let hash = self.send(signer, &request).await?;
        Ok(PendingTx::submitted(Arc::clone(self), hash, "native transfer".to_string(), None, None))
    }
}
