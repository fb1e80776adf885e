//! Messages exchanged with wasm contracts through the wasmd precompile
//!
//! Wasm messages travel as UTF-8 JSON bytes. The one message flowing the
//! other way, `call_evm`, carries EVM calldata as standard base64.

use alloy::primitives::{Address, U256};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::binding::ContractBinding;
use crate::error::{HarnessError, Result};
use crate::value::{parse_address, TypedValue};

/// A native coin amount as wasm contracts see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

/// Serialize a wasm message to the bytes the precompile expects
pub fn json_msg<T: Serialize + ?Sized>(msg: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(msg).map_err(|e| HarnessError::encoding("wasm message", e.to_string()))
}

/// Coin list argument; an empty slice encodes as `[]`
pub fn coins_bytes(coins: &[Coin]) -> Result<Vec<u8>> {
    json_msg(coins)
}

/// Parse a wasm query reply
///
/// Replies are JSON bytes. A reply rendered as a `0x`-prefixed hex string
/// of JSON is accepted too.
pub fn parse_reply<T: DeserializeOwned>(reply: &[u8]) -> Result<T> {
    match serde_json::from_slice(reply) {
        Ok(value) => Ok(value),
        Err(json_err) => {
            let hex_reply = std::str::from_utf8(reply)
                .ok()
                .and_then(|s| s.trim().strip_prefix("0x"))
                .and_then(|s| hex::decode(s).ok());
            match hex_reply {
                Some(bytes) => serde_json::from_slice(&bytes)
                    .map_err(|e| HarnessError::decode("wasm query", e.to_string())),
                None => Err(HarnessError::decode("wasm query", json_err.to_string())),
            }
        }
    }
}

/// One entry of an `execute_batch` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteMsg {
    pub contract_address: String,
    pub msg: Vec<u8>,
    pub coins: Vec<u8>,
}

impl ExecuteMsg {
    pub fn new<T: Serialize + ?Sized>(contract_address: &str, msg: &T, coins: &[Coin]) -> Result<Self> {
        Ok(Self {
            contract_address: contract_address.to_string(),
            msg: json_msg(msg)?,
            coins: coins_bytes(coins)?,
        })
    }

    pub(crate) fn to_typed(&self) -> TypedValue {
        TypedValue::Struct(vec![
            ("contractAddress".to_string(), self.contract_address.as_str().into()),
            ("msg".to_string(), self.msg.clone().into()),
            ("coins".to_string(), self.coins.clone().into()),
        ])
    }
}

/// Request from a wasm contract to call an EVM contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvmMsg {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct CallEvmEnvelope {
    call_evm: CallEvmWire,
}

#[derive(Serialize, Deserialize)]
struct CallEvmWire {
    to: String,
    value: String,
    data: String,
}

impl CallEvmMsg {
    /// Encode `method(args)` against `binding` as a `call_evm` request
    pub fn from_binding(binding: &ContractBinding, method: &str, args: &[TypedValue], value: U256) -> Result<Self> {
        Ok(Self {
            to: binding.address(),
            value,
            data: binding.encode_call(method, args)?,
        })
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        json_msg(&CallEvmEnvelope {
            call_evm: CallEvmWire {
                to: self.to.to_checksum(None),
                value: self.value.to_string(),
                data: STANDARD.encode(&self.data),
            },
        })
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: CallEvmEnvelope =
            serde_json::from_slice(bytes).map_err(|e| HarnessError::decode("call_evm", e.to_string()))?;
        let wire = envelope.call_evm;

        let value = if wire.value.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(&wire.value, 10)
                .map_err(|e| HarnessError::decode("call_evm", format!("value {:?}: {e}", wire.value)))?
        };
        let data = STANDARD
            .decode(&wire.data)
            .map_err(|e| HarnessError::decode("call_evm", format!("data is not base64: {e}")))?;

        Ok(Self {
            to: parse_address(&wire.to)?,
            value,
            data,
        })
    }
}
