//! Typed facades over the precompiles the suite exercises
//!
//! Each facade is a thin wrapper around a [`ContractBinding`]; anything the
//! facade does not cover is reachable through [`binding`](Erc20::binding).

use alloy::primitives::{Address, U256};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::abi::{AbiDescriptor, MethodTable, Precompile};
use crate::binding::ContractBinding;
use crate::client::EvmClient;
use crate::error::{HarnessError, Result};
use crate::signer::Signer;
use crate::tx::PendingTx;
use crate::value::{parse_address, TypedValue};
use crate::wasm::{coins_bytes, json_msg, parse_reply, Coin, ExecuteMsg};

fn bind_precompile(
    client: Arc<EvmClient>,
    precompile: Precompile,
    address: Address,
    abi_dir: Option<&Path>,
    signer: Signer,
) -> Result<ContractBinding> {
    let abi = AbiDescriptor::for_precompile(precompile, abi_dir)?;
    Ok(ContractBinding::at(client, address, MethodTable::from_abi(&abi)?, signer))
}

/// ERC20 pointer contract of a bank denom
#[derive(Debug, Clone)]
pub struct Erc20 {
    binding: ContractBinding,
}

impl Erc20 {
    pub fn new(client: Arc<EvmClient>, address: &str, abi_dir: Option<&Path>, signer: Signer) -> Result<Self> {
        let address = parse_address(address)?;
        Ok(Self {
            binding: bind_precompile(client, Precompile::Erc20, address, abi_dir, signer)?,
        })
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    /// Act as another account
    pub fn connect(&self, signer: Signer) -> Self {
        Self {
            binding: self.binding.connect(signer),
        }
    }

    pub async fn name(&self) -> Result<String> {
        Ok(self.binding.query("name", &[]).await?.as_str()?.to_string())
    }

    pub async fn symbol(&self) -> Result<String> {
        Ok(self.binding.query("symbol", &[]).await?.as_str()?.to_string())
    }

    pub async fn decimals(&self) -> Result<u8> {
        let decimals = self.binding.query("decimals", &[]).await?.as_u64()?;
        u8::try_from(decimals).map_err(|_| HarnessError::decode("decimals", format!("{decimals} exceeds uint8")))
    }

    pub async fn total_supply(&self) -> Result<U256> {
        self.binding.query("totalSupply", &[]).await?.as_u256()
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.binding.query("balanceOf", &[owner.into()]).await?.as_u256()
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.binding
            .query("allowance", &[owner.into(), spender.into()])
            .await?
            .as_u256()
    }

    pub async fn transfer(&self, to: Address, amount: U256) -> Result<PendingTx> {
        self.binding.submit("transfer", &[to.into(), amount.into()]).await
    }

    pub async fn approve(&self, spender: Address, amount: U256) -> Result<PendingTx> {
        self.binding.submit("approve", &[spender.into(), amount.into()]).await
    }

    pub async fn transfer_from(&self, from: Address, to: Address, amount: U256) -> Result<PendingTx> {
        self.binding
            .submit("transferFrom", &[from.into(), to.into(), amount.into()])
            .await
    }
}

/// Governance precompile
#[derive(Debug, Clone)]
pub struct Gov {
    binding: ContractBinding,
}

impl Gov {
    pub fn new(client: Arc<EvmClient>, abi_dir: Option<&Path>, signer: Signer) -> Result<Self> {
        Ok(Self {
            binding: bind_precompile(client, Precompile::Gov, crate::abi::GOV_PRECOMPILE, abi_dir, signer)?,
        })
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    /// Deposit `amount` (wei) on a proposal
    pub async fn deposit(&self, proposal_id: u64, amount: U256) -> Result<PendingTx> {
        self.binding
            .submit_with_value("deposit", &[proposal_id.into()], amount)
            .await
    }

    /// Vote; `option` uses the chain's numeric vote options (1 = yes, 2 = abstain, 3 = no, 4 = veto)
    pub async fn vote(&self, proposal_id: u64, option: i32) -> Result<PendingTx> {
        self.binding.submit("vote", &[proposal_id.into(), option.into()]).await
    }
}

#[derive(Debug, Clone)]
pub struct Distribution {
    binding: ContractBinding,
}

impl Distribution {
    pub fn new(client: Arc<EvmClient>, abi_dir: Option<&Path>, signer: Signer) -> Result<Self> {
        Ok(Self {
            binding: bind_precompile(
                client,
                Precompile::Distribution,
                crate::abi::DISTRIBUTION_PRECOMPILE,
                abi_dir,
                signer,
            )?,
        })
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    pub async fn set_withdraw_address(&self, withdraw_addr: Address) -> Result<PendingTx> {
        self.binding.submit("setWithdrawAddress", &[withdraw_addr.into()]).await
    }

    pub async fn withdraw_delegation_rewards(&self, validator: &str) -> Result<PendingTx> {
        self.binding
            .submit("withdrawDelegationRewards", &[validator.into()])
            .await
    }
}

#[derive(Debug, Clone)]
pub struct Staking {
    binding: ContractBinding,
}

impl Staking {
    pub fn new(client: Arc<EvmClient>, abi_dir: Option<&Path>, signer: Signer) -> Result<Self> {
        Ok(Self {
            binding: bind_precompile(client, Precompile::Staking, crate::abi::STAKING_PRECOMPILE, abi_dir, signer)?,
        })
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    /// Delegate the attached `amount` (wei) to `validator`
    pub async fn delegate(&self, validator: &str, amount: U256) -> Result<PendingTx> {
        self.binding
            .submit_with_value("delegate", &[validator.into()], amount)
            .await
    }

    pub async fn redelegate(&self, src_validator: &str, dst_validator: &str, amount: U256) -> Result<PendingTx> {
        self.binding
            .submit(
                "redelegate",
                &[src_validator.into(), dst_validator.into(), amount.into()],
            )
            .await
    }

    pub async fn undelegate(&self, validator: &str, amount: U256) -> Result<PendingTx> {
        self.binding
            .submit("undelegate", &[validator.into(), amount.into()])
            .await
    }
}

/// Exchange rate of one denom as reported by the oracle precompile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenomExchangeRate {
    pub denom: String,
    pub exchange_rate: String,
    pub last_update: String,
    pub last_update_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleTwap {
    pub denom: String,
    pub twap: String,
    pub lookback_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct Oracle {
    binding: ContractBinding,
}

impl Oracle {
    pub fn new(client: Arc<EvmClient>, abi_dir: Option<&Path>, signer: Signer) -> Result<Self> {
        Ok(Self {
            binding: bind_precompile(client, Precompile::Oracle, crate::abi::ORACLE_PRECOMPILE, abi_dir, signer)?,
        })
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    pub async fn get_exchange_rates(&self) -> Result<Vec<DenomExchangeRate>> {
        let pairs = self.binding.query("getExchangeRates", &[]).await?;
        pairs
            .as_slice()?
            .iter()
            .map(|pair| {
                let rate = pair.field("oracleExchangeRateVal")?;
                Ok(DenomExchangeRate {
                    denom: pair.field("denom")?.as_str()?.to_string(),
                    exchange_rate: rate.field("exchangeRate")?.as_str()?.to_string(),
                    last_update: rate.field("lastUpdate")?.as_str()?.to_string(),
                    last_update_timestamp: rate.field("lastUpdateTimestamp")?.as_i64()?,
                })
            })
            .collect()
    }

    pub async fn get_oracle_twaps(&self, lookback_seconds: u64) -> Result<Vec<OracleTwap>> {
        let twaps = self
            .binding
            .query("getOracleTwaps", &[lookback_seconds.into()])
            .await?;
        twaps
            .as_slice()?
            .iter()
            .map(|twap| {
                Ok(OracleTwap {
                    denom: twap.field("denom")?.as_str()?.to_string(),
                    twap: twap.field("twap")?.as_str()?.to_string(),
                    lookback_seconds: twap.field("lookbackSeconds")?.as_i64()?,
                })
            })
            .collect()
    }
}

/// Bridge to wasm contracts
#[derive(Debug, Clone)]
pub struct Wasmd {
    binding: ContractBinding,
}

impl Wasmd {
    pub fn new(client: Arc<EvmClient>, abi_dir: Option<&Path>, signer: Signer) -> Result<Self> {
        Ok(Self {
            binding: bind_precompile(client, Precompile::Wasmd, crate::abi::WASMD_PRECOMPILE, abi_dir, signer)?,
        })
    }

    pub fn binding(&self) -> &ContractBinding {
        &self.binding
    }

    /// Instantiate `code_id`; the new contract address is the `contractAddr`
    /// field of the receipt's `return_value`
    pub async fn instantiate<T: Serialize + ?Sized>(
        &self,
        code_id: u64,
        admin: &str,
        msg: &T,
        label: &str,
        coins: &[Coin],
    ) -> Result<PendingTx> {
        let args: [TypedValue; 5] = [
            code_id.into(),
            admin.into(),
            json_msg(msg)?.into(),
            label.into(),
            coins_bytes(coins)?.into(),
        ];
        self.binding.submit("instantiate", &args).await
    }

    pub async fn execute<T: Serialize + ?Sized>(&self, contract: &str, msg: &T, coins: &[Coin]) -> Result<PendingTx> {
        let args: [TypedValue; 3] = [contract.into(), json_msg(msg)?.into(), coins_bytes(coins)?.into()];
        self.binding.submit("execute", &args).await
    }

    /// All messages execute in one transaction; any failure reverts them all
    pub async fn execute_batch(&self, msgs: &[ExecuteMsg]) -> Result<PendingTx> {
        let batch = TypedValue::Sequence(msgs.iter().map(ExecuteMsg::to_typed).collect());
        self.binding.submit("execute_batch", &[batch]).await
    }

    /// Smart query, reply parsed as JSON
    pub async fn query<T: Serialize + ?Sized>(&self, contract: &str, msg: &T) -> Result<Value> {
        self.query_as(contract, msg).await
    }

    pub async fn query_as<R: DeserializeOwned, T: Serialize + ?Sized>(&self, contract: &str, msg: &T) -> Result<R> {
        let reply = self
            .binding
            .query("query", &[contract.into(), json_msg(msg)?.into()])
            .await?;
        parse_reply(reply.as_bytes()?)
    }
}
