use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Harness configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Node
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub rpc_request_timeout_seconds: u64,

    // Deployment artifacts
    pub fixture_dir: PathBuf,
    // Node repository `precompiles/` directory; bundled ABIs are used when unset
    pub abi_dir: Option<PathBuf>,

    // Signers. Empty means "use the node's unlocked accounts"
    pub signer_keys: Vec<PrivateKeySigner>,

    // Transaction submission
    pub receipt_poll_interval_ms: u64,
    pub receipt_poll_max_interval_ms: u64,
    pub gas_buffer_percent: u64,
}

/// Receipt polling backoff window
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables (with defaults):
    /// - EVM_RPC_URL: Node JSON-RPC endpoint (default: http://127.0.0.1:8545)
    /// - CHAIN_ID: Chain id used for local signing (default: queried via eth_chainId)
    /// - RPC_REQUEST_TIMEOUT_SECONDS: Per-request HTTP timeout (default: 30)
    /// - FIXTURE_DIR: Directory holding deployment outputs (default: .)
    /// - ABI_DIR: Node `precompiles/` directory (default: bundled ABIs)
    /// - SIGNER_PRIVATE_KEYS: Comma-separated hex private keys (default: node accounts)
    /// - RECEIPT_POLL_INTERVAL_MS: First receipt poll delay (default: 250)
    /// - RECEIPT_POLL_MAX_INTERVAL_MS: Receipt poll backoff ceiling (default: 2000)
    /// - GAS_BUFFER_PERCENT: Padding added to estimated gas (default: 20)
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let rpc_url = env::var("EVM_RPC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());

        let chain_id = match env::var("CHAIN_ID") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .context("CHAIN_ID must be a valid number")?,
            ),
            Err(_) => None,
        };

        let rpc_request_timeout_seconds = env::var("RPC_REQUEST_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("RPC_REQUEST_TIMEOUT_SECONDS must be a valid number")?;

        let fixture_dir = PathBuf::from(env::var("FIXTURE_DIR").unwrap_or_else(|_| ".".to_string()));
        let abi_dir = env::var("ABI_DIR").ok().map(PathBuf::from);

        let signer_keys = parse_signer_keys(&env::var("SIGNER_PRIVATE_KEYS").unwrap_or_default())
            .context("Invalid SIGNER_PRIVATE_KEYS")?;

        let receipt_poll_interval_ms = env::var("RECEIPT_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "250".to_string())
            .parse::<u64>()
            .context("RECEIPT_POLL_INTERVAL_MS must be a valid number")?;

        let receipt_poll_max_interval_ms = env::var("RECEIPT_POLL_MAX_INTERVAL_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse::<u64>()
            .context("RECEIPT_POLL_MAX_INTERVAL_MS must be a valid number")?;

        let gas_buffer_percent = env::var("GAS_BUFFER_PERCENT")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<u64>()
            .context("GAS_BUFFER_PERCENT must be a valid number")?;

        Ok(Self {
            rpc_url,
            chain_id,
            rpc_request_timeout_seconds,
            fixture_dir,
            abi_dir,
            signer_keys,
            receipt_poll_interval_ms,
            receipt_poll_max_interval_ms,
            gas_buffer_percent,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            anyhow::bail!("EVM RPC URL cannot be empty");
        }

        reqwest::Url::parse(&self.rpc_url)
            .with_context(|| format!("EVM RPC URL is not a valid URL: {}", self.rpc_url))?;

        if self.rpc_request_timeout_seconds == 0 {
            anyhow::bail!("RPC request timeout must be at least 1 second");
        }

        if self.receipt_poll_interval_ms == 0 {
            anyhow::bail!("Receipt poll interval must be positive");
        }

        if self.receipt_poll_max_interval_ms < self.receipt_poll_interval_ms {
            anyhow::bail!(
                "Receipt poll ceiling ({} ms) must not be below the initial interval ({} ms)",
                self.receipt_poll_max_interval_ms,
                self.receipt_poll_interval_ms
            );
        }

        if self.gas_buffer_percent > 400 {
            anyhow::bail!("Gas buffer must be at most 400%");
        }

        if let Some(abi_dir) = &self.abi_dir {
            if !abi_dir.is_dir() {
                anyhow::bail!("ABI_DIR is not a directory: {}", abi_dir.display());
            }
        }

        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            initial: Duration::from_millis(self.receipt_poll_interval_ms),
            max: Duration::from_millis(self.receipt_poll_max_interval_ms),
        }
    }

    pub fn rpc_request_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_request_timeout_seconds)
    }
}

fn parse_signer_keys(raw: &str) -> Result<Vec<PrivateKeySigner>> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, key)| {
            key.parse::<PrivateKeySigner>()
                .with_context(|| format!("key #{} is not a valid secp256k1 private key", i))
        })
        .collect()
}
