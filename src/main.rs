//! bwtctl - Supervisor for the bwt wallet-tracking daemon
//!
//! This is the binary entry point. All logic lives in the library.

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bwtctl::cli::{config_get, config_list, config_set};
use bwtctl::HeadlessOptions;
use bwtctl_app::{SettingsStore, StandaloneHost};

/// bwtctl - Supervisor for the bwt wallet-tracking daemon
#[derive(Parser, Debug)]
#[command(name = "bwtctl")]
#[command(about = "Runs a bwt daemon for watch-only wallets and points the wallet at it", long_about = None)]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Supervise the daemon, printing JSON events on stdout
    Run {
        /// Chain of the wallets (mainnet, testnet, regtest)
        #[arg(long, default_value = "mainnet")]
        chain: String,

        /// TOML file with [[wallet]] entries
        #[arg(long, value_name = "FILE")]
        wallets: PathBuf,
    },

    /// Inspect or change the bwt settings
    Config {
        /// Chain used for default values
        #[arg(long, default_value = "mainnet")]
        chain: String,

        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show every setting
    List,
    /// Show one setting
    Get { key: String },
    /// Change one setting
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    bwtctl_core::logging::init()?;

    let args = Args::parse();

    match args.command {
        Command::Run { chain, wallets } => {
            let options = HeadlessOptions {
                chain,
                wallets_path: wallets,
                config_path: args.config,
            };
            bwtctl::run_headless(&options).await?;
        }
        Command::Config { chain, action } => {
            let store = match args.config {
                Some(path) => SettingsStore::new(path),
                None => SettingsStore::default_location()?,
            };
            let host = StandaloneHost::new(chain, store)?;
            let mut stdout = io::stdout().lock();
            match action {
                ConfigAction::List => config_list(&host, &mut stdout)?,
                ConfigAction::Get { key } => config_get(&host, &key, &mut stdout)?,
                ConfigAction::Set { key, value } => {
                    config_set(&host, &key, &value)?;
                    eprintln!("✅ {} updated", key);
                }
            }
        }
    }

    Ok(())
}
