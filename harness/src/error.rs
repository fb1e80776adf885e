//! Error taxonomy for the harness
//!
//! Every failure a scenario can observe surfaces as a [`HarnessError`]. The
//! harness never retries; a scenario either expects a given failure or
//! propagates it.

use alloy::primitives::B256;
use std::path::PathBuf;

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("fixture not found: {}", .0.display())]
    FixtureNotFound(PathBuf),

    #[error("failed to read fixture {}: {source}", .path.display())]
    FixtureUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed fixture {name}: {reason}")]
    FixtureMalformed { name: String, reason: String },

    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid ABI: {0}")]
    InvalidAbi(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("cannot encode call to {method}: {reason}")]
    Encoding { method: String, reason: String },

    #[error("cannot decode result of {method}: {reason}")]
    Decode { method: String, reason: String },

    #[error("execution reverted{}{}",
        .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default(),
        .tx_hash.map(|h| format!(" (tx {h})")).unwrap_or_default())]
    ExecutionReverted {
        reason: Option<String>,
        tx_hash: Option<B256>,
    },

    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    #[error("node rejected request ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("signer error: {0}")]
    Signer(String),

    #[error("stopped waiting for receipt of {0}")]
    WaitTimedOut(B256),

    #[error("expected a revert but transaction {0} succeeded")]
    UnexpectedSuccess(B256),
}

impl HarnessError {
    pub(crate) fn encoding(method: &str, reason: impl Into<String>) -> Self {
        HarnessError::Encoding {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(method: &str, reason: impl Into<String>) -> Self {
        HarnessError::Decode {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// True for a revert observed at any stage (simulation, estimation or mining)
    pub fn is_revert(&self) -> bool {
        matches!(self, HarnessError::ExecutionReverted { .. })
    }
}
