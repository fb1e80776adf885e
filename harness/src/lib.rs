//! On-chain test harness for EVM precompiles
//!
//! Loads deployment fixtures, binds precompile ABIs to addresses, submits
//! calls and transactions over JSON-RPC and decodes the results into
//! [`TypedValue`]s for assertions.

pub mod abi;
pub mod assert;
pub mod binding;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod fixtures;
pub mod precompiles;
pub mod rpc;
pub mod signer;
pub mod tx;
pub mod value;
pub mod wasm;

pub use abi::{AbiDescriptor, Method, MethodTable, Mutability, Precompile};
pub use assert::expect_revert;
pub use binding::{CallOutcome, ContractBinding};
pub use client::{CallRequest, EvmClient};
pub use config::{Config, PollSettings};
pub use context::SuiteContext;
pub use error::{HarnessError, Result};
pub use fixtures::{DeploymentFixtures, FixtureLoader};
pub use rpc::{HttpTransport, RpcTransport};
pub use signer::Signer;
pub use tx::{PendingTx, ReceiptStatus, TransactionReceipt, TxState};
pub use value::TypedValue;

/// Install the global `tracing` subscriber; `RUST_LOG` overrides the default filter
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "precompile_harness=info".into()),
        )
        .with_test_writer()
        .try_init();
}
