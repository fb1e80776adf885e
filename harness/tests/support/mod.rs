//! In-memory EVM node for harness tests
//!
//! Serves the JSON-RPC methods the harness uses against a tiny chain: an
//! ERC20 ledger at [`ERC20_ADDR`] and the wasmd precompile fronting counter
//! contracts. Every transaction executes on a copy of the state that is only
//! committed when all of it succeeds.

#![allow(dead_code)]

use alloy::consensus::TxEnvelope;
use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::eips::eip2718::Decodable2718;
use alloy::json_abi::{Function, JsonAbi, StateMutability};
use alloy::primitives::{address, keccak256, Address, Bytes, TxKind, B256, I256, U256};
use async_trait::async_trait;
use precompile_harness::abi::{
    DISTRIBUTION_PRECOMPILE, GOV_PRECOMPILE, ORACLE_PRECOMPILE, STAKING_PRECOMPILE, WASMD_PRECOMPILE,
};
use precompile_harness::rpc::{classify_rpc_error, RpcTransport};
use precompile_harness::{AbiDescriptor, CallRequest, EvmClient, HarnessError, PollSettings, Precompile};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ERC20_ADDR: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
pub const COUNTER_CONTRACT: &str = "sei1counter";
pub const CHAIN_ID: u64 = 713_715;
pub const INITIAL_TOKENS: u64 = 1_000_000;
pub const INITIAL_NATIVE: u128 = 1_000_000_000_000_000_000_000;

/// Hardhat's first dev key and its address
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEV_ADDR: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

pub const ALICE: Address = address!("1000000000000000000000000000000000000001");
pub const BOB: Address = address!("2000000000000000000000000000000000000002");
pub const CAROL: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");

#[derive(Debug, Clone, Default)]
struct Chain {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    native: HashMap<Address, U256>,
    counters: HashMap<String, i64>,
    nonces: HashMap<Address, u64>,
    // (method signature, attached value) of gov/staking/distribution calls
    module_calls: Vec<(String, U256)>,
}

#[derive(Default)]
struct NodeState {
    chain: Chain,
    // hash -> (polls left before the receipt shows up, receipt)
    receipts: HashMap<B256, (u32, Value)>,
    mined: u64,
}

pub struct MockNode {
    state: Mutex<NodeState>,
    accounts: Vec<Address>,
    erc20_abi: JsonAbi,
    wasmd_abi: JsonAbi,
    oracle_abi: JsonAbi,
    module_abis: HashMap<Address, JsonAbi>,
    pending_polls: u32,
    fail_next_on_chain: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockNode {
    /// `accounts[0]` holds all tokens; every account gets native balance
    pub fn new(accounts: Vec<Address>) -> Self {
        let mut chain = Chain::default();
        if let Some(first) = accounts.first() {
            chain.balances.insert(*first, U256::from(INITIAL_TOKENS));
        }
        for account in &accounts {
            chain.native.insert(*account, U256::from(INITIAL_NATIVE));
        }
        chain.counters.insert(COUNTER_CONTRACT.to_string(), 0);

        let abi = |p| AbiDescriptor::bundled(p).unwrap().json_abi().clone();
        Self {
            state: Mutex::new(NodeState {
                chain,
                ..Default::default()
            }),
            accounts,
            erc20_abi: abi(Precompile::Erc20),
            wasmd_abi: abi(Precompile::Wasmd),
            oracle_abi: abi(Precompile::Oracle),
            module_abis: HashMap::from([
                (GOV_PRECOMPILE, abi(Precompile::Gov)),
                (STAKING_PRECOMPILE, abi(Precompile::Staking)),
                (DISTRIBUTION_PRECOMPILE, abi(Precompile::Distribution)),
            ]),
            pending_polls: 0,
            fail_next_on_chain: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Receipts stay unavailable for `polls` lookups after mining
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Mine the next transaction as failed, as if state changed after simulation
    pub fn fail_next_on_chain(&self) {
        self.fail_next_on_chain.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    pub fn token_balance(&self, owner: Address) -> U256 {
        let state = self.state.lock().unwrap();
        state.chain.balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn native_balance(&self, owner: Address) -> U256 {
        let state = self.state.lock().unwrap();
        state.chain.native.get(&owner).copied().unwrap_or_default()
    }

    pub fn counter(&self, contract: &str) -> Option<i64> {
        let state = self.state.lock().unwrap();
        state.chain.counters.get(contract).copied()
    }

    /// Gov, staking and distribution calls that were mined successfully
    pub fn module_calls(&self) -> Vec<(String, U256)> {
        self.state.lock().unwrap().chain.module_calls.clone()
    }

    pub fn nonce(&self, owner: Address) -> u64 {
        let state = self.state.lock().unwrap();
        state.chain.nonces.get(&owner).copied().unwrap_or_default()
    }

    fn mine(&self, from: Address, to: Address, value: U256, data: &[u8]) -> B256 {
        let mut state = self.state.lock().unwrap();
        state.mined += 1;
        let block = state.mined;
        let hash = keccak256(block.to_be_bytes());
        *state.chain.nonces.entry(from).or_default() += 1;

        let success = if self.fail_next_on_chain.swap(false, Ordering::SeqCst) {
            false
        } else {
            let mut chain = state.chain.clone();
            match self.execute(&mut chain, from, to, value, data) {
                Ok(_) => {
                    state.chain = chain;
                    true
                }
                Err(_) => false,
            }
        };

        let status = if success { "0x1" } else { "0x0" };
        let receipt = json!({
            "transactionHash": hash,
            "blockNumber": format!("{block:#x}"),
            "gasUsed": "0xc350",
            "status": status,
            "logs": []
        });
        state.receipts.insert(hash, (self.pending_polls, receipt));
        hash
    }

    fn simulate(&self, request: &CallRequest) -> Result<Vec<u8>, HarnessError> {
        let mut chain = self.state.lock().unwrap().chain.clone();
        let from = request.from.unwrap_or_default();
        let value = request.value.unwrap_or_default();
        self.execute(&mut chain, from, request.to, value, &request.data)
            .map_err(|reason| revert(&reason))
    }

    fn execute(&self, chain: &mut Chain, from: Address, to: Address, value: U256, data: &[u8]) -> Result<Vec<u8>, String> {
        if to == ERC20_ADDR {
            let (function, args) = decode_call(&self.erc20_abi, data)?;
            return erc20(chain, from, function, &args).map(encode_outputs);
        }
        if to == WASMD_PRECOMPILE {
            let (function, args) = decode_call(&self.wasmd_abi, data)?;
            return wasmd(chain, function, &args).map(encode_outputs);
        }
        if to == ORACLE_PRECOMPILE {
            let (function, args) = decode_call(&self.oracle_abi, data)?;
            return oracle(function, &args).map(encode_outputs);
        }
        if let Some(abi) = self.module_abis.get(&to) {
            let (function, _) = decode_call(abi, data)?;
            if !value.is_zero() && function.state_mutability != StateMutability::Payable {
                return Err(format!("{} is not payable", function.name));
            }
            chain.module_calls.push((function.signature(), value));
            return Ok(encode_outputs(vec![DynSolValue::Bool(true)]));
        }
        if !data.is_empty() {
            return Err(format!("no contract at {to}"));
        }

        let sender = chain.native.entry(from).or_default();
        if *sender < value {
            return Err("insufficient funds for transfer".to_string());
        }
        *sender -= value;
        *chain.native.entry(to).or_default() += value;
        Ok(Vec::new())
    }

    fn send_raw(&self, raw: &Bytes) -> Result<B256, HarnessError> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).map_err(|e| rejected(&e.to_string()))?;
        let TxEnvelope::Legacy(signed) = envelope else {
            return Err(rejected("only legacy transactions are accepted"));
        };

        let from = signed
            .signature()
            .recover_address_from_prehash(&signed.signature_hash())
            .map_err(|e| rejected(&e.to_string()))?;
        let tx = signed.tx();

        if tx.chain_id != Some(CHAIN_ID) {
            return Err(rejected("invalid chain id"));
        }
        if tx.nonce != self.nonce(from) {
            return Err(rejected("invalid nonce"));
        }
        let TxKind::Call(to) = tx.to else {
            return Err(rejected("contract creation is not supported"));
        };

        Ok(self.mine(from, to, tx.value, &tx.input))
    }
}

#[async_trait]
impl RpcTransport for MockNode {
    async fn request(&self, method: &str, params: Value) -> Result<Value, HarnessError> {
        self.calls.lock().unwrap().push(method.to_string());

        match method {
            "eth_chainId" => Ok(json!(format!("{CHAIN_ID:#x}"))),
            "eth_accounts" => Ok(json!(self.accounts)),
            "eth_gasPrice" => Ok(json!("0x3b9aca00")),
            "eth_getBalance" => {
                let owner: Address = param(&params, 0)?;
                Ok(json!(self.native_balance(owner)))
            }
            "eth_getTransactionCount" => {
                let owner: Address = param(&params, 0)?;
                Ok(json!(format!("{:#x}", self.nonce(owner))))
            }
            "eth_call" => {
                let request: CallRequest = param(&params, 0)?;
                Ok(json!(Bytes::from(self.simulate(&request)?)))
            }
            "eth_estimateGas" => {
                let request: CallRequest = param(&params, 0)?;
                self.simulate(&request)?;
                Ok(json!("0xc350"))
            }
            "eth_sendTransaction" => {
                let request: CallRequest = param(&params, 0)?;
                let from = request.from.unwrap_or_default();
                if !self.accounts.contains(&from) {
                    return Err(rejected("unknown account"));
                }
                let hash = self.mine(from, request.to, request.value.unwrap_or_default(), &request.data);
                Ok(json!(hash))
            }
            "eth_sendRawTransaction" => {
                let raw: Bytes = param(&params, 0)?;
                Ok(json!(self.send_raw(&raw)?))
            }
            "eth_getTransactionReceipt" => {
                let hash: B256 = param(&params, 0)?;
                let mut state = self.state.lock().unwrap();
                match state.receipts.get_mut(&hash) {
                    Some((polls, _)) if *polls > 0 => {
                        *polls -= 1;
                        Ok(Value::Null)
                    }
                    Some((_, receipt)) => Ok(receipt.clone()),
                    None => Ok(Value::Null),
                }
            }
            other => Err(classify_rpc_error(-32601, &format!("the method {other} does not exist"), None)),
        }
    }
}

/// Client over `node` with millisecond polling
pub fn client(node: Arc<MockNode>) -> Arc<EvmClient> {
    let poll = PollSettings {
        initial: Duration::from_millis(1),
        max: Duration::from_millis(4),
    };
    Arc::new(EvmClient::new(node, poll, 20))
}

fn param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<T, HarnessError> {
    serde_json::from_value(params[index].clone()).map_err(|e| HarnessError::Rpc {
        code: -32602,
        message: e.to_string(),
    })
}

fn rejected(message: &str) -> HarnessError {
    classify_rpc_error(-32000, message, None)
}

fn revert(reason: &str) -> HarnessError {
    let mut payload = vec![0x08, 0xc3, 0x79, 0xa0];
    payload.extend(DynSolValue::String(reason.to_string()).abi_encode());
    let data = json!(format!("0x{}", hex::encode(payload)));
    classify_rpc_error(3, "execution reverted", Some(&data))
}

fn decode_call<'a>(abi: &'a JsonAbi, data: &[u8]) -> Result<(&'a Function, Vec<DynSolValue>), String> {
    if data.len() < 4 {
        return Err("calldata shorter than a selector".to_string());
    }
    let function = abi
        .functions()
        .find(|f| f.selector().as_slice() == &data[..4])
        .ok_or_else(|| format!("unknown selector 0x{}", hex::encode(&data[..4])))?;

    let types = function
        .inputs
        .iter()
        .map(|p| p.resolve())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    match DynSolType::Tuple(types).abi_decode_params(&data[4..]) {
        Ok(DynSolValue::Tuple(args)) => Ok((function, args)),
        Ok(other) => Ok((function, vec![other])),
        Err(e) => Err(format!("bad arguments for {}: {e}", function.name)),
    }
}

fn encode_outputs(outputs: Vec<DynSolValue>) -> Vec<u8> {
    DynSolValue::Tuple(outputs).abi_encode_params()
}

fn arg_address(args: &[DynSolValue], i: usize) -> Result<Address, String> {
    args.get(i).and_then(DynSolValue::as_address).ok_or_else(|| format!("arg {i} is not an address"))
}

fn arg_uint(args: &[DynSolValue], i: usize) -> Result<U256, String> {
    args.get(i)
        .and_then(DynSolValue::as_uint)
        .map(|(v, _)| v)
        .ok_or_else(|| format!("arg {i} is not an integer"))
}

fn arg_str(args: &[DynSolValue], i: usize) -> Result<&str, String> {
    args.get(i).and_then(DynSolValue::as_str).ok_or_else(|| format!("arg {i} is not a string"))
}

fn arg_bytes(args: &[DynSolValue], i: usize) -> Result<&[u8], String> {
    args.get(i).and_then(DynSolValue::as_bytes).ok_or_else(|| format!("arg {i} is not bytes"))
}

fn erc20(chain: &mut Chain, sender: Address, function: &Function, args: &[DynSolValue]) -> Result<Vec<DynSolValue>, String> {
    let balance = |chain: &Chain, owner: Address| chain.balances.get(&owner).copied().unwrap_or_default();

    let move_tokens = |chain: &mut Chain, from: Address, to: Address, amount: U256| {
        let from_balance = balance(chain, from);
        if from_balance < amount {
            return Err("ERC20: transfer amount exceeds balance".to_string());
        }
        chain.balances.insert(from, from_balance - amount);
        *chain.balances.entry(to).or_default() += amount;
        Ok(())
    };

    match function.name.as_str() {
        "name" | "symbol" => Ok(vec![DynSolValue::String("UATOM".to_string())]),
        "decimals" => Ok(vec![DynSolValue::Uint(U256::from(6u8), 8)]),
        "totalSupply" => {
            let total = chain.balances.values().fold(U256::ZERO, |acc, b| acc + *b);
            Ok(vec![DynSolValue::Uint(total, 256)])
        }
        "balanceOf" => Ok(vec![DynSolValue::Uint(balance(chain, arg_address(args, 0)?), 256)]),
        "allowance" => {
            let key = (arg_address(args, 0)?, arg_address(args, 1)?);
            let allowance = chain.allowances.get(&key).copied().unwrap_or_default();
            Ok(vec![DynSolValue::Uint(allowance, 256)])
        }
        "transfer" => {
            move_tokens(chain, sender, arg_address(args, 0)?, arg_uint(args, 1)?)?;
            Ok(vec![DynSolValue::Bool(true)])
        }
        "approve" => {
            chain
                .allowances
                .insert((sender, arg_address(args, 0)?), arg_uint(args, 1)?);
            Ok(vec![DynSolValue::Bool(true)])
        }
        "transferFrom" => {
            let (from, to, amount) = (arg_address(args, 0)?, arg_address(args, 1)?, arg_uint(args, 2)?);
            let allowance = chain.allowances.get(&(from, sender)).copied().unwrap_or_default();
            if allowance < amount {
                return Err("ERC20: insufficient allowance".to_string());
            }
            move_tokens(chain, from, to, amount)?;
            chain.allowances.insert((from, sender), allowance - amount);
            Ok(vec![DynSolValue::Bool(true)])
        }
        other => Err(format!("{other} is not implemented")),
    }
}

fn wasmd(chain: &mut Chain, function: &Function, args: &[DynSolValue]) -> Result<Vec<DynSolValue>, String> {
    match function.name.as_str() {
        "instantiate" => {
            let msg: Value = serde_json::from_slice(arg_bytes(args, 2)?).map_err(|e| e.to_string())?;
            let count = msg["count"].as_i64().ok_or("instantiate message needs a count")?;
            let contract = format!("sei1contract{}", chain.counters.len());
            chain.counters.insert(contract.clone(), count);
            Ok(vec![DynSolValue::String(contract), DynSolValue::Bytes(Vec::new())])
        }
        "execute" => {
            apply_wasm_msg(chain, arg_str(args, 0)?, arg_bytes(args, 1)?)?;
            Ok(vec![DynSolValue::Bytes(Vec::new())])
        }
        "execute_batch" => {
            let msgs = args
                .first()
                .and_then(DynSolValue::as_array)
                .ok_or("executeMsgs is not an array")?;
            let mut responses = Vec::with_capacity(msgs.len());
            for msg in msgs {
                let fields = msg.as_tuple().ok_or("execute message is not a tuple")?;
                apply_wasm_msg(chain, arg_str(fields, 0)?, arg_bytes(fields, 1)?)?;
                responses.push(DynSolValue::Bytes(Vec::new()));
            }
            Ok(vec![DynSolValue::Array(responses)])
        }
        "query" => {
            let contract = arg_str(args, 0)?;
            let request: Value = serde_json::from_slice(arg_bytes(args, 1)?).map_err(|e| e.to_string())?;
            if request.get("get_count").is_none() {
                return Err(format!("unsupported query {request}"));
            }
            let count = chain
                .counters
                .get(contract)
                .ok_or_else(|| format!("contract {contract} not found"))?;
            let reply = serde_json::to_vec(&json!({ "count": count })).map_err(|e| e.to_string())?;
            Ok(vec![DynSolValue::Bytes(reply)])
        }
        other => Err(format!("{other} is not implemented")),
    }
}

/// Two denoms with fixed rates; twaps echo the requested lookback
fn oracle(function: &Function, args: &[DynSolValue]) -> Result<Vec<DynSolValue>, String> {
    let denoms = ["uatom", "ueth"];
    match function.name.as_str() {
        "getExchangeRates" => {
            let pairs = denoms
                .iter()
                .map(|denom| {
                    let updated = I256::try_from(1_700_000_000i64).map_err(|e| e.to_string())?;
                    Ok(DynSolValue::Tuple(vec![
                        DynSolValue::String(denom.to_string()),
                        DynSolValue::Tuple(vec![
                            DynSolValue::String("1.250000000000000000".to_string()),
                            DynSolValue::String("42".to_string()),
                            DynSolValue::Int(updated, 64),
                        ]),
                    ]))
                })
                .collect::<Result<Vec<_>, String>>()?;
            Ok(vec![DynSolValue::Array(pairs)])
        }
        "getOracleTwaps" => {
            let lookback = arg_uint(args, 0)?;
            let lookback = I256::try_from(lookback).map_err(|e| e.to_string())?;
            let twaps = denoms
                .iter()
                .map(|denom| {
                    DynSolValue::Tuple(vec![
                        DynSolValue::String(denom.to_string()),
                        DynSolValue::String("1.100000000000000000".to_string()),
                        DynSolValue::Int(lookback, 64),
                    ])
                })
                .collect();
            Ok(vec![DynSolValue::Array(twaps)])
        }
        other => Err(format!("{other} is not implemented")),
    }
}

fn apply_wasm_msg(chain: &mut Chain, contract: &str, msg: &[u8]) -> Result<(), String> {
    let msg: Value = serde_json::from_slice(msg).map_err(|e| e.to_string())?;
    let counter = chain
        .counters
        .get_mut(contract)
        .ok_or_else(|| format!("contract {contract} not found"))?;

    if msg.get("increment").is_some() {
        *counter += 1;
        Ok(())
    } else if let Some(count) = msg.get("reset").and_then(|r| r["count"].as_i64()) {
        *counter = count;
        Ok(())
    } else {
        Err(format!("unknown message {msg}"))
    }
}
