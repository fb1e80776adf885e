//! Pending transactions and receipts
//!
//! State machine per transaction:
//!
//! ```text
//! submit ──ok──► Submitted ──wait──► Mined(Success)
//!    │                           └──► Mined(Failure)
//!    └──err──► rejected: ExecutionReverted (no tx hash) or Rpc
//! ```
//!
//! A transaction only exists as a [`PendingTx`] once the node accepted it,
//! so the created and rejected states are the two sides of the `Result`
//! returned by submission rather than values of [`TxState`]. Once broadcast
//! a transaction cannot be withdrawn; `wait_timeout` only stops waiting for
//! it.

use alloy::primitives::{Address, Bytes, B256, U64};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::EvmClient;
use crate::error::{HarnessError, Result};
use crate::value::TypedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
}

/// Where a broadcast transaction stands on the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Submitted,
    Mined(ReceiptStatus),
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Mined(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

/// `eth_getTransactionReceipt` result as sent by the node
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    block_number: Option<U64>,
    #[serde(default)]
    gas_used: Option<U64>,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<Log>,
}

/// Outcome of a mined transaction
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: ReceiptStatus,
    pub logs: Vec<Log>,
    /// Raw return data observed when the call was simulated before broadcast
    pub return_data: Option<Bytes>,
    /// `return_data` decoded against the method's outputs
    pub return_value: Option<TypedValue>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    pub fn state(&self) -> TxState {
        TxState::Mined(self.status)
    }

    /// Logs emitted by `address`
    pub fn logs_from(&self, address: Address) -> impl Iterator<Item = &Log> {
        self.logs.iter().filter(move |log| log.address == address)
    }
}

impl TryFrom<RpcReceipt> for TransactionReceipt {
    type Error = HarnessError;

    fn try_from(raw: RpcReceipt) -> Result<Self> {
        let status = match raw.status.map(|s| s.to::<u64>()) {
            Some(1) => ReceiptStatus::Success,
            Some(0) => ReceiptStatus::Failure,
            Some(other) => {
                return Err(HarnessError::decode(
                    "eth_getTransactionReceipt",
                    format!("unknown receipt status {other}"),
                ))
            }
            None => {
                return Err(HarnessError::decode(
                    "eth_getTransactionReceipt",
                    format!("receipt for {} has no status", raw.transaction_hash),
                ))
            }
        };

        Ok(Self {
            transaction_hash: raw.transaction_hash,
            block_number: raw.block_number.map(|n| n.to::<u64>()),
            gas_used: raw.gas_used.map(|g| g.to::<u64>()),
            status,
            logs: raw.logs,
            return_data: None,
            return_value: None,
        })
    }
}

/// A broadcast transaction whose receipt has not been read yet
#[must_use = "a submitted transaction must be awaited with `wait`"]
pub struct PendingTx {
    client: Arc<EvmClient>,
    hash: B256,
    label: String,
    return_data: Option<Bytes>,
    return_value: Option<TypedValue>,
}

impl std::fmt::Debug for PendingTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTx")
            .field("hash", &self.hash)
            .field("label", &self.label)
            .finish()
    }
}

impl PendingTx {
    pub(crate) fn submitted(
        client: Arc<EvmClient>,
        hash: B256,
        label: String,
        return_data: Option<Bytes>,
        return_value: Option<TypedValue>,
    ) -> Self {
        info!("📡 Submitted {}: {}", label, hash);
        Self {
            client,
            hash,
            label,
            return_data,
            return_value,
        }
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Ask the node once where the transaction stands, without waiting
    pub async fn state(&self) -> Result<TxState> {
        Ok(match self.client.receipt(self.hash).await? {
            Some(receipt) => receipt.state(),
            None => TxState::Submitted,
        })
    }

    /// Wait until the node reports the transaction mined
    ///
    /// Polls with exponential backoff and imposes no deadline of its own.
    /// A mined-but-reverted transaction fails with
    /// [`HarnessError::ExecutionReverted`].
    pub async fn wait(self) -> Result<TransactionReceipt> {
        let poll = self.client.poll_settings();
        let mut delay = poll.initial;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.client.receipt(self.hash).await? {
                Some(mut receipt) => {
                    receipt.return_data = self.return_data;
                    receipt.return_value = self.return_value;

                    return match receipt.status {
                        ReceiptStatus::Success => {
                            info!(
                                "✅ {} mined in block {:?} after {} polls",
                                self.label, receipt.block_number, attempts
                            );
                            Ok(receipt)
                        }
                        ReceiptStatus::Failure => {
                            warn!("❌ {} reverted in block {:?}: {}", self.label, receipt.block_number, self.hash);
                            Err(HarnessError::ExecutionReverted {
                                reason: None,
                                tx_hash: Some(self.hash),
                            })
                        }
                    };
                }
                None => {
                    debug!("{} not mined yet (poll #{}), retrying in {:?}", self.hash, attempts, delay);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(poll.max);
                }
            }
        }
    }

    /// Like [`PendingTx::wait`] but gives up waiting after `timeout`
    ///
    /// The transaction stays in the node's pool; only the wait is cancelled.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<TransactionReceipt> {
        let hash = self.hash;
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| HarnessError::WaitTimedOut(hash))?
    }
}
