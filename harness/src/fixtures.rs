//! Deployment fixture loading
//!
//! The deployment step writes its outputs (contract addresses, proposal ids,
//! oracle snapshots) as small files. Text fixtures are trimmed; JSON fixtures
//! decode into the schemas below. A missing file is always a hard error.

use alloy::primitives::Address;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{HarnessError, Result};

pub const ERC20_DEPLOY_ADDR: &str = "erc20_deploy_addr.txt";
pub const GOV_PROPOSAL: &str = "gov_proposal_output.txt";
pub const VALIDATOR_ADDRESS: &str = "validator_address.txt";
pub const ORACLE_EXCHANGE_RATES: &str = "oracle_exchange_rates.json";
pub const ORACLE_TWAPS: &str = "oracle_twaps.json";
pub const WASM_CONTRACT_ADDR: &str = "wasm_contract_addr.txt";
pub const WASM_CODE_ID: &str = "wasm_code_id.txt";

/// Everything the deployment step writes
pub const DEPLOYMENT_FIXTURES: [&str; 7] = [
    ERC20_DEPLOY_ADDR,
    GOV_PROPOSAL,
    VALIDATOR_ADDRESS,
    ORACLE_EXCHANGE_RATES,
    ORACLE_TWAPS,
    WASM_CONTRACT_ADDR,
    WASM_CODE_ID,
];

/// Reads fixtures relative to a root directory
#[derive(Debug, Clone)]
pub struct FixtureLoader {
    root: PathBuf,
}

impl FixtureLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    /// Load a text fixture, trimmed of surrounding whitespace
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.path_of(name);
        let content = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                HarnessError::FixtureNotFound(path.clone())
            } else {
                HarnessError::FixtureUnreadable {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        debug!("Loaded fixture {} ({} bytes)", path.display(), content.len());
        Ok(content.trim().to_string())
    }

    /// Load and decode a JSON fixture
    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let content = self.load(name)?;
        parse_json(name, &content)
    }

    /// Load a set of fixtures once into an immutable map
    ///
    /// Fails on the first missing or unreadable file.
    pub fn snapshot(&self, names: &[&str]) -> Result<Arc<DeploymentFixtures>> {
        let mut values = BTreeMap::new();
        for name in names {
            values.insert(name.to_string(), self.load(name)?);
        }
        Ok(Arc::new(DeploymentFixtures { values }))
    }
}

/// Fixture values captured at suite setup. Never mutated after construction.
#[derive(Debug)]
pub struct DeploymentFixtures {
    values: BTreeMap<String, String>,
}

impl DeploymentFixtures {
    pub fn get(&self, name: &str) -> Result<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| HarnessError::FixtureMalformed {
                name: name.to_string(),
                reason: "not part of this snapshot".to_string(),
            })
    }

    pub fn address(&self, name: &str) -> Result<Address> {
        let raw = self.get(name)?;
        raw.parse::<Address>()
            .map_err(|_| HarnessError::InvalidAddress(raw.to_string()))
    }

    pub fn u64(&self, name: &str) -> Result<u64> {
        let raw = self.get(name)?;
        raw.parse::<u64>().map_err(|e| HarnessError::FixtureMalformed {
            name: name.to_string(),
            reason: format!("expected an unsigned integer, got {raw:?}: {e}"),
        })
    }

    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        parse_json(name, self.get(name)?)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse_json<T: DeserializeOwned>(name: &str, content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| HarnessError::FixtureMalformed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Output of the node's `oracle exchange-rates` query
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRatesFixture {
    pub denom_oracle_exchange_rate_pairs: Vec<DenomExchangeRatePair>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DenomExchangeRatePair {
    pub denom: String,
    #[serde(default)]
    pub oracle_exchange_rate: ExchangeRateFixture,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeRateFixture {
    #[serde(default)]
    pub exchange_rate: String,
    #[serde(default)]
    pub last_update: String,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub last_update_timestamp: u64,
}

/// Output of the node's `oracle twaps` query
#[derive(Debug, Clone, Deserialize)]
pub struct TwapsFixture {
    pub oracle_twaps: Vec<OracleTwapFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleTwapFixture {
    pub denom: String,
    #[serde(default)]
    pub twap: String,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub lookback_seconds: u64,
}

// Cosmos CLI JSON renders 64-bit integers as strings
fn u64_from_str_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
    }
}
