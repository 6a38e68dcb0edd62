//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and apply command line overrides
//! - Validate the recipient and derive the sender key
//! - Wire client, executor and listener together and run them
//!
//! # Design Decisions
//! - Fail fast: every input is checked before the first network call
//! - Subsystems initialize in order, not concurrently
//! - The listener starts last

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::chain::wallet::check_phrase;
use crate::chain::{
    Address, ChainClient, ChainError, NodeClient, RecipientAllowList, ValidationError, Wallet,
};
use crate::config::{load_config, validate_config, ConfigError, SweeperConfig};
use crate::lifecycle::shutdown::Shutdown;
use crate::listener::{BlockListener, ListenerExit, ListenerSettings};
use crate::observability::LoggingError;
use crate::sweep::{SweepExecutor, SweepOptions, SweepSession};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("chain setup failed: {0}")]
    Chain(#[from] ChainError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),
}

/// Inputs gathered from the command line.
pub struct StartupArgs {
    pub network: String,
    pub mnemonic: Zeroizing<String>,
    pub recipient: String,
    pub config_path: Option<PathBuf>,
    pub node_url: Option<String>,
    pub ws_url: Option<String>,
}

impl std::fmt::Debug for StartupArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupArgs")
            .field("network", &self.network)
            .field("recipient", &self.recipient)
            .field("config_path", &self.config_path)
            .field("node_url", &self.node_url)
            .field("ws_url", &self.ws_url)
            .finish_non_exhaustive()
    }
}

/// Checks the recipient and phrase formats. Touches no file and no network.
pub fn check_inputs(args: &StartupArgs) -> Result<Address, StartupError> {
    let recipient = Address::parse(&args.recipient)?;
    check_phrase(&args.mnemonic)?;
    Ok(recipient)
}

/// Loads the config file (or defaults) and applies CLI overrides.
pub fn load_settings(args: &StartupArgs) -> Result<SweeperConfig, StartupError> {
    let mut config = match &args.config_path {
        Some(path) => load_config(path)?,
        None => SweeperConfig::default(),
    };

    config.network.name = args.network.clone();
    if let Some(url) = &args.node_url {
        config.network.node_url = Some(url.clone());
    }
    if let Some(url) = &args.ws_url {
        config.network.ws_url = Some(url.clone());
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Everything checked and derived; nothing connected yet.
#[derive(Debug)]
pub struct PreparedAgent {
    pub config: SweeperConfig,
    pub wallet: Wallet,
    pub recipient: Address,
}

/// Validates the recipient and derives the sender wallet.
pub fn prepare(config: SweeperConfig, args: &StartupArgs) -> Result<PreparedAgent, StartupError> {
    let recipient = check_inputs(args)?;
    let mut wallet = Wallet::from_mnemonic(&args.mnemonic, config.network.account_index)
        .map_err(|e| match e {
            ChainError::Validation(invalid) => StartupError::Validation(invalid),
            other => StartupError::Chain(other),
        })?;

    if wallet.address() == &recipient {
        return Err(ValidationError::Address {
            input: args.recipient.clone(),
            reason: "recipient is the sender account".to_string(),
        }
        .into());
    }
    if config.sweep.restrict_to_recipient {
        wallet = wallet.with_policy(Arc::new(RecipientAllowList::new([recipient.clone()])));
    }

    tracing::info!(
        network = %config.network.name,
        sender = %wallet.address(),
        recipient = %recipient,
        "Agent prepared"
    );
    Ok(PreparedAgent {
        config,
        wallet,
        recipient,
    })
}

/// Builds the executor against the configured node.
pub fn build_executor(prepared: &PreparedAgent) -> Result<SweepExecutor, StartupError> {
    let node = NodeClient::new(prepared.config.network.node_client_config())?
        .with_wallet(prepared.wallet.clone());
    let client: Arc<dyn ChainClient> = Arc::new(node);
    let session = SweepSession::new(
        client,
        prepared.wallet.address().clone(),
        prepared.recipient.clone(),
    );
    Ok(SweepExecutor::new(
        session,
        SweepOptions::from(&prepared.config.sweep),
    ))
}

/// Runs the listener, sweeping on every key block, until it returns.
pub async fn run_agent(
    config: &SweeperConfig,
    executor: Arc<SweepExecutor>,
    shutdown: &Shutdown,
) -> ListenerExit {
    let settings = ListenerSettings::from_config(config.network.ws_url(), &config.listener);
    let listener = BlockListener::new(settings, shutdown.subscribe());

    listener
        .run(|event| {
            let executor = Arc::clone(&executor);
            async move {
                let outcome = executor.on_block(&event).await;
                tracing::debug!(height = event.height, outcome = outcome.label(), "Block handled");
            }
        })
        .await
}
