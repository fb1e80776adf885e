//! Contract bindings
//!
//! A [`ContractBinding`] pairs an address with a [`MethodTable`] and the
//! signer transactions are sent as. Reads go through `eth_call`; writes
//! go through the submission pipeline:
//!
//! ```text
//! encode ─► simulate (eth_call) ─► estimate gas ─► send ─► PendingTx
//!              │                        │
//!              └──── revert ────────────┴──► ExecutionReverted (nothing broadcast)
//! ```

use alloy::primitives::{Address, Bytes, U256, U64};
use std::sync::Arc;
use tracing::{debug, info};

use crate::abi::{AbiDescriptor, Method, MethodTable, Mutability};
use crate::client::{CallRequest, EvmClient};
use crate::error::{HarnessError, Result};
use crate::signer::Signer;
use crate::tx::PendingTx;
use crate::value::{parse_address, TypedValue};

/// Result of [`ContractBinding::call`]
#[derive(Debug)]
pub enum CallOutcome {
    /// A read-only method's decoded return value
    Value(TypedValue),
    /// A state-changing method's broadcast transaction
    Pending(PendingTx),
}

impl CallOutcome {
    pub fn into_value(self) -> Result<TypedValue> {
        match self {
            CallOutcome::Value(value) => Ok(value),
            CallOutcome::Pending(tx) => Err(HarnessError::decode(
                "call",
                format!("expected a query result, got pending transaction {}", tx.hash()),
            )),
        }
    }

    pub fn into_pending(self) -> Result<PendingTx> {
        match self {
            CallOutcome::Pending(tx) => Ok(tx),
            CallOutcome::Value(value) => Err(HarnessError::decode(
                "call",
                format!("expected a pending transaction, got a {} value", value.kind()),
            )),
        }
    }
}

/// A deployed contract seen through its ABI, acting as one signer
#[derive(Clone)]
pub struct ContractBinding {
    client: Arc<EvmClient>,
    address: Address,
    methods: Arc<MethodTable>,
    signer: Signer,
}

impl std::fmt::Debug for ContractBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractBinding")
            .field("address", &self.address)
            .field("signer", &self.signer.address())
            .finish()
    }
}

impl ContractBinding {
    /// Bind `abi` at `address`
    ///
    /// Fails with [`HarnessError::InvalidAddress`] for a malformed address and
    /// [`HarnessError::InvalidAbi`] when a declared type cannot be resolved.
    pub fn bind(client: Arc<EvmClient>, address: &str, abi: &AbiDescriptor, signer: Signer) -> Result<Self> {
        let address = parse_address(address)?;
        Ok(Self::at(client, address, MethodTable::from_abi(abi)?, signer))
    }

    pub fn at(client: Arc<EvmClient>, address: Address, methods: Arc<MethodTable>, signer: Signer) -> Self {
        Self {
            client,
            address,
            methods,
            signer,
        }
    }

    /// Same contract, different signer; the two bindings share no mutable state
    pub fn connect(&self, signer: Signer) -> Self {
        Self {
            client: Arc::clone(&self.client),
            address: self.address,
            methods: Arc::clone(&self.methods),
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn client(&self) -> &Arc<EvmClient> {
        &self.client
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Raw calldata for `method(args)`
    pub fn encode_call(&self, method: &str, args: &[TypedValue]) -> Result<Vec<u8>> {
        self.methods.resolve(method, args.len())?.encode(args)
    }

    /// Query read-only methods, submit state-changing ones
    pub async fn call(&self, method: &str, args: &[TypedValue]) -> Result<CallOutcome> {
        let resolved = self.methods.resolve(method, args.len())?;
        if resolved.is_read_only() {
            self.query_method(resolved, args).await.map(CallOutcome::Value)
        } else {
            self.submit_method(resolved, args, None).await.map(CallOutcome::Pending)
        }
    }

    /// Read-only call decoded against the method's outputs
    pub async fn query(&self, method: &str, args: &[TypedValue]) -> Result<TypedValue> {
        let resolved = self.methods.resolve(method, args.len())?;
        self.query_method(resolved, args).await
    }

    pub async fn submit(&self, method: &str, args: &[TypedValue]) -> Result<PendingTx> {
        let resolved = self.methods.resolve(method, args.len())?;
        self.submit_method(resolved, args, None).await
    }

    /// Submit with native value attached; the method must be payable
    pub async fn submit_with_value(&self, method: &str, args: &[TypedValue], value: U256) -> Result<PendingTx> {
        let resolved = self.methods.resolve(method, args.len())?;
        self.submit_method(resolved, args, Some(value)).await
    }

    async fn query_method(&self, method: &Method, args: &[TypedValue]) -> Result<TypedValue> {
        let request = CallRequest {
            from: Some(self.signer.address()),
            to: self.address,
            data: Bytes::from(method.encode(args)?),
            ..Default::default()
        };

        let output = self.client.call(&request).await?;
        debug!("{}.{} returned {} bytes", self.address, method.name(), output.len());
        method.decode_output(&output)
    }

    async fn submit_method(&self, method: &Method, args: &[TypedValue], value: Option<U256>) -> Result<PendingTx> {
        if value.is_some_and(|v| !v.is_zero()) && method.mutability() != Mutability::Payable {
            return Err(HarnessError::encoding(
                method.name(),
                "native value attached to a non-payable method",
            ));
        }

        let mut request = CallRequest {
            from: Some(self.signer.address()),
            to: self.address,
            gas: None,
            value,
            data: Bytes::from(method.encode(args)?),
        };

        let return_data = self.client.call(&request).await?;
        let return_value = match method.decode_output(&return_data) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring undecodable simulation result of {}: {}", method.name(), e);
                None
            }
        };

        let estimate = self.client.estimate_gas(&request).await?;
        let gas = self.client.padded_gas(estimate);
        request.gas = Some(U64::from(gas));

        let label = format!("{}.{}", self.address, method.signature());
        info!("Submitting {} as {} (gas={}, value={:?})", label, self.signer.address(), gas, value);

        let hash = self.client.send(&self.signer, &request).await?;
        Ok(PendingTx::submitted(
            Arc::clone(&self.client),
            hash,
            label,
            Some(return_data),
            return_value,
        ))
    }
}
