use clap::{Parser, Subcommand, ValueEnum};
use presale_core::staking::Compounding;
use presale_core::InputAsset;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "presale")]
#[command(about = "Token sale purchase, burn and history from the command line")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PRESALE_CONFIG_PATH", default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Preview only, never submit a transaction
    #[arg(short, long)]
    pub dry_run: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Json,
    Table,
}

/// Asset to pay with
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum AssetArg {
    Native,
    Stable,
}

impl From<AssetArg> for InputAsset {
    fn from(arg: AssetArg) -> Self {
        match arg {
            AssetArg::Native => InputAsset::Native,
            AssetArg::Stable => InputAsset::Stable,
        }
    }
}

/// Staking compounding frequency
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum CompoundingArg {
    None,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl From<CompoundingArg> for Compounding {
    fn from(arg: CompoundingArg) -> Self {
        match arg {
            CompoundingArg::None => Compounding::None,
            CompoundingArg::Daily => Compounding::Daily,
            CompoundingArg::Weekly => Compounding::Weekly,
            CompoundingArg::Monthly => Compounding::Monthly,
            CompoundingArg::Quarterly => Compounding::Quarterly,
            CompoundingArg::Yearly => Compounding::Yearly,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration management commands
    Config { #[command(subcommand)] command: ConfigCommands },

    /// Show native, stable and sale-token balances of the wallet
    Balances,

    /// Preview a purchase: quote, spend cap, gas and supply checks
    Quote {
        #[arg(value_enum)]
        asset: AssetArg,
        amount: String,
        #[arg(short, long, default_value = "")]
        sponsor: String,
    },

    /// Buy sale tokens
    Buy {
        #[arg(value_enum)]
        asset: AssetArg,
        amount: String,
        #[arg(short, long, default_value = "")]
        sponsor: String,
    },

    /// Send sale tokens to the burn address
    Burn { amount: String },

    /// Recent confirmed transactions of the signed-in user
    History {
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// Referral uplines of an address (defaults to the wallet)
    Uplines { address: Option<String> },

    /// Users who registered with the signed-in user's invite link
    Referrals {
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// Estimate staking yield from an APR
    Staking {
        /// Annual percentage rate, e.g. 4.5
        #[arg(default_value = "4.0")]
        apr: String,
        #[arg(short, long, value_enum, default_value = "monthly")]
        compounding: CompoundingArg,
    },

    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Get configuration value
    Get { key: String },

    /// Set configuration value
    Set { key: String, value: String },

    /// Show configuration
    Show {
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// Print secrets instead of redacting them
        #[arg(short, long)]
        sensitive: bool,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Write a starter configuration file
    Init {
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}
