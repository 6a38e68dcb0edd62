//! Command line interface.

use clap::Parser;
use std::path::PathBuf;
use zeroize::Zeroizing;

use crate::chain::wallet::MNEMONIC_ENV_VAR;
use crate::chain::ValidationError;
use crate::lifecycle::StartupArgs;

#[derive(Debug, Parser)]
#[command(name = "balance-sweeper")]
#[command(version, about = "Forwards an æternity account's balance to a fixed recipient on every key block", long_about = None)]
pub struct Cli {
    /// Network selector, e.g. testnet or mainnet
    pub network: String,

    /// `<MNEMONIC> <RECIPIENT>`, or only `<RECIPIENT>` when the phrase comes from --mnemonic
    #[arg(num_args = 1..=2, required = true, value_name = "ACCOUNT")]
    pub accounts: Vec<String>,

    /// Sender recovery phrase, used when only the recipient is positional
    #[arg(long, env = MNEMONIC_ENV_VAR, hide_env_values = true, value_name = "PHRASE")]
    pub mnemonic: Option<String>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Node HTTP endpoint, overrides the network default
    #[arg(long)]
    pub node_url: Option<String>,

    /// Middleware WebSocket endpoint, overrides the network default
    #[arg(long)]
    pub ws_url: Option<String>,
}

impl Cli {
    /// Resolves the phrase from the positional arguments or `--mnemonic`.
    pub fn into_startup_args(self) -> Result<StartupArgs, ValidationError> {
        let mut accounts = self.accounts.into_iter();
        let (mnemonic, recipient) = match (accounts.next(), accounts.next(), self.mnemonic) {
            (Some(phrase), Some(recipient), _) => (phrase, recipient),
            (Some(recipient), None, Some(phrase)) => (phrase, recipient),
            _ => {
                return Err(ValidationError::Mnemonic(format!(
                    "no recovery phrase given and {} is not set",
                    MNEMONIC_ENV_VAR
                )))
            }
        };

        Ok(StartupArgs {
            network: self.network,
            mnemonic: Zeroizing::new(mnemonic),
            recipient,
            config_path: self.config,
            node_url: self.node_url,
            ws_url: self.ws_url,
        })
    }
}
