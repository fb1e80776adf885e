use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::error::{HarnessError, Result};

/// Account a binding sends transactions as
#[derive(Debug, Clone)]
pub enum Signer {
    /// Key held by the harness; transactions are signed locally and sent raw
    Local(PrivateKeySigner),
    /// Account unlocked on the node; sent with `eth_sendTransaction`
    Node(Address),
}

impl Signer {
    pub fn from_private_key(key: &str) -> Result<Self> {
        let key = key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| HarnessError::Signer(format!("invalid private key: {e}")))?;
        Ok(Signer::Local(key))
    }

    pub fn address(&self) -> Address {
        match self {
            Signer::Local(key) => key.address(),
            Signer::Node(address) => *address,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Signer::Local(_))
    }
}

impl From<PrivateKeySigner> for Signer {
    fn from(key: PrivateKeySigner) -> Self {
        Signer::Local(key)
    }
}

/// EIP-2718 encoded signed transaction
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub hash: B256,
    pub encoded: Vec<u8>,
}

/// Sign an EIP-155 legacy transaction
pub fn sign_legacy(key: &PrivateKeySigner, tx: TxLegacy) -> Result<RawTransaction> {
    let signature = key
        .sign_hash_sync(&tx.signature_hash())
        .map_err(|e| HarnessError::Signer(e.to_string()))?;

    let signed = tx.into_signed(signature);
    let hash = *signed.hash();
    let envelope = TxEnvelope::from(signed);

    Ok(RawTransaction {
        hash,
        encoded: envelope.encoded_2718(),
    })
}
