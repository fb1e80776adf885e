//! Per-suite context
//!
//! Built once by suite setup and handed to every scenario. Owns the shared
//! client, the signer list and the deployment fixtures; bindings are created
//! per scenario from it.
//!
//! Deployment fixtures are read from disk on first use and then served from
//! an immutable snapshot, which can be handed to other contexts with
//! [`SuiteContext::with_deployment`].

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

use crate::client::EvmClient;
use crate::config::Config;
use crate::fixtures::{self, DeploymentFixtures, FixtureLoader};
use crate::precompiles::{Distribution, Erc20, Gov, Oracle, Staking, Wasmd};
use crate::signer::Signer;

/// Native amount (wei) the first signer sends to force association
pub const ASSOCIATION_FUNDING: u64 = 100_000_000_000_000;

// Pairs already associated by this process
static ASSOCIATED: Mutex<BTreeSet<(Address, Address)>> = Mutex::new(BTreeSet::new());

pub struct SuiteContext {
    config: Config,
    client: Arc<EvmClient>,
    signers: Vec<Signer>,
    fixtures: FixtureLoader,
    deployment: OnceLock<Arc<DeploymentFixtures>>,
}

impl SuiteContext {
    /// Load and validate configuration from the environment, then connect
    pub async fn from_env() -> Result<Self> {
        let config = Config::from_env()?;
        config.validate()?;
        Self::new(config).await
    }

    pub async fn new(config: Config) -> Result<Self> {
        let client = EvmClient::from_config(&config).context("Failed to create EVM client")?;
        Self::with_client(config, Arc::new(client)).await
    }

    /// Use an existing client, e.g. one over a custom transport
    pub async fn with_client(config: Config, client: Arc<EvmClient>) -> Result<Self> {
        let signers: Vec<Signer> = if config.signer_keys.is_empty() {
            client
                .accounts()
                .await
                .context("Failed to list node accounts")?
                .into_iter()
                .map(Signer::Node)
                .collect()
        } else {
            config.signer_keys.iter().cloned().map(Signer::Local).collect()
        };

        if signers.is_empty() {
            anyhow::bail!("No signers available: set SIGNER_PRIVATE_KEYS or unlock accounts on the node");
        }

        info!(
            "Suite context ready: {} signer(s), fixtures at {}",
            signers.len(),
            config.fixture_dir.display()
        );

        let fixtures = FixtureLoader::new(config.fixture_dir.clone());
        Ok(Self {
            config,
            client,
            signers,
            fixtures,
            deployment: OnceLock::new(),
        })
    }

    /// Serve deployment fixtures from an existing snapshot instead of disk
    pub fn with_deployment(mut self, deployment: Arc<DeploymentFixtures>) -> Self {
        self.deployment = OnceLock::from(deployment);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Arc<EvmClient> {
        &self.client
    }

    pub fn fixtures(&self) -> &FixtureLoader {
        &self.fixtures
    }

    /// Snapshot of every deployment fixture, loaded on first call
    ///
    /// Fails on the first missing or unreadable file and retries on the next
    /// call; once loaded the snapshot never changes.
    pub fn deployment(&self) -> Result<Arc<DeploymentFixtures>> {
        if let Some(deployment) = self.deployment.get() {
            return Ok(Arc::clone(deployment));
        }
        let snapshot = self
            .fixtures
            .snapshot(&fixtures::DEPLOYMENT_FIXTURES)
            .with_context(|| format!("Deployment fixtures incomplete under {}", self.fixtures.root().display()))?;
        debug!("Loaded {} deployment fixtures", snapshot.len());
        Ok(Arc::clone(self.deployment.get_or_init(|| snapshot)))
    }

    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }

    pub fn signer(&self, index: usize) -> Result<Signer> {
        self.signers.get(index).cloned().with_context(|| {
            format!(
                "Signer #{} requested but only {} available",
                index,
                self.signers.len()
            )
        })
    }

    fn abi_dir(&self) -> Option<&Path> {
        self.config.abi_dir.as_deref()
    }

    /// ERC20 pointer at the address from `erc20_deploy_addr.txt`
    pub fn erc20(&self, signer: Signer) -> Result<Erc20> {
        let deployment = self.deployment()?;
        let address = deployment.get(fixtures::ERC20_DEPLOY_ADDR)?;
        Ok(Erc20::new(Arc::clone(&self.client), address, self.abi_dir(), signer)?)
    }

    pub fn gov(&self, signer: Signer) -> Result<Gov> {
        Ok(Gov::new(Arc::clone(&self.client), self.abi_dir(), signer)?)
    }

    pub fn distribution(&self, signer: Signer) -> Result<Distribution> {
        Ok(Distribution::new(Arc::clone(&self.client), self.abi_dir(), signer)?)
    }

    pub fn staking(&self, signer: Signer) -> Result<Staking> {
        Ok(Staking::new(Arc::clone(&self.client), self.abi_dir(), signer)?)
    }

    pub fn oracle(&self, signer: Signer) -> Result<Oracle> {
        Ok(Oracle::new(Arc::clone(&self.client), self.abi_dir(), signer)?)
    }

    pub fn wasmd(&self, signer: Signer) -> Result<Wasmd> {
        Ok(Wasmd::new(Arc::clone(&self.client), self.abi_dir(), signer)?)
    }

    /// Make the node associate both accounts by having each sign a transfer
    pub async fn associate(&self, first: &Signer, second: &Signer) -> Result<()> {
        let funding = self
            .client
            .send_value(first, second.address(), U256::from(ASSOCIATION_FUNDING))
            .await
            .context("Failed to fund second signer")?;
        funding.wait().await?;

        let echo = self
            .client
            .send_value(second, first.address(), U256::from(1u64))
            .await
            .context("Failed to send from second signer")?;
        echo.wait().await?;

        info!("Associated {} and {}", first.address(), second.address());
        Ok(())
    }

    /// [`SuiteContext::associate`] unless this process already did it for
    /// the same pair
    pub async fn associate_once(&self, first: &Signer, second: &Signer) -> Result<()> {
        let pair = (first.address(), second.address());
        if ASSOCIATED.lock().map(|done| done.contains(&pair)).unwrap_or(false) {
            debug!("{} and {} already associated", pair.0, pair.1);
            return Ok(());
        }

        self.associate(first, second).await?;
        if let Ok(mut done) = ASSOCIATED.lock() {
            done.insert(pair);
        }
        Ok(())
    }
}
