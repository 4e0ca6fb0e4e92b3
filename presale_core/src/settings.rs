use crate::error::CoreError;
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

/// Standard burn sink used when the config does not name one.
pub const DEAD_ADDRESS: &str = "0x000000000000000000000000000000000000dEaD";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    pub sale_address: String,
    pub stable_token_address: String,
    #[serde(default)]
    pub sale_token_address: Option<String>,
    #[serde(default = "default_burn_address")]
    pub burn_address: String,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    #[serde(default = "default_stable_symbol")]
    pub stable_symbol: String,
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,
    #[serde(default = "default_token_name")]
    pub token_name: String,
    #[serde(default = "default_decimals")]
    pub default_decimals: u32,
    #[serde(default = "default_native_spend_cap_pct")]
    pub native_spend_cap_pct: u64,
    #[serde(default = "default_stable_spend_cap_pct")]
    pub stable_spend_cap_pct: u64,
    #[serde(default = "default_gas_pad_pct")]
    pub gas_pad_pct: u64,
    #[serde(default = "default_gas_price_poll_secs")]
    pub gas_price_poll_secs: u64,
    #[serde(default = "default_receipt_poll_millis")]
    pub receipt_poll_millis: u64,
    #[serde(default = "default_recent_tx_limit")]
    pub recent_tx_limit: usize,
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: String,
    /// Signed-in identity that scopes ledger writes. No ledger writes happen without it.
    #[serde(default)]
    pub user_uid: Option<String>,
    #[serde(default)]
    pub wallet_private_key: Option<String>,
    #[serde(default = "default_explorer_tx_url")]
    pub explorer_tx_url: String,
}

/// Parsed contract addresses the flow talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub sale: Address,
    pub stable_token: Address,
    pub sale_token: Option<Address>,
    pub burn_sink: Address,
}

impl Settings {
    #[cfg(feature = "native")]
    pub fn from_file(path: &str) -> Result<Self, CoreError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PRESALE").try_parsing(true));
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    #[cfg(feature = "native")]
    pub fn save_to_file(&self, path: &str) -> Result<(), CoreError> {
        let toml_string = toml::to_string(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Parse settings from a TOML document without environment overrides.
    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        toml::from_str(s).map_err(|e| CoreError::Conversion(format!("Invalid settings: {}", e)))
    }

    /// Current value of a single setting, rendered for display.
    pub fn get_value(&self, key: &str) -> Result<Option<String>, CoreError> {
        let value = match key {
            "rpc_url" => Some(self.rpc_url.clone()),
            "chain_id" => Some(self.chain_id.to_string()),
            "sale_address" => Some(self.sale_address.clone()),
            "stable_token_address" => Some(self.stable_token_address.clone()),
            "sale_token_address" => self.sale_token_address.clone(),
            "burn_address" => Some(self.burn_address.clone()),
            "native_symbol" => Some(self.native_symbol.clone()),
            "stable_symbol" => Some(self.stable_symbol.clone()),
            "token_symbol" => Some(self.token_symbol.clone()),
            "token_name" => Some(self.token_name.clone()),
            "default_decimals" => Some(self.default_decimals.to_string()),
            "native_spend_cap_pct" => Some(self.native_spend_cap_pct.to_string()),
            "stable_spend_cap_pct" => Some(self.stable_spend_cap_pct.to_string()),
            "gas_pad_pct" => Some(self.gas_pad_pct.to_string()),
            "gas_price_poll_secs" => Some(self.gas_price_poll_secs.to_string()),
            "receipt_poll_millis" => Some(self.receipt_poll_millis.to_string()),
            "recent_tx_limit" => Some(self.recent_tx_limit.to_string()),
            "ledger_dir" => Some(self.ledger_dir.clone()),
            "user_uid" => self.user_uid.clone(),
            "wallet_private_key" => self.wallet_private_key.clone(),
            "explorer_tx_url" => Some(self.explorer_tx_url.clone()),
            _ => return Err(CoreError::NotFound(format!("Unknown setting: {}", key))),
        };
        Ok(value)
    }

    /// Update a single setting from its textual form. An empty value clears optional settings.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let value = value.trim();
        let optional = |v: &str| if v.is_empty() { None } else { Some(v.to_string()) };
        match key {
            "rpc_url" => self.rpc_url = value.to_string(),
            "chain_id" => self.chain_id = parse_number(key, value)?,
            "sale_address" => self.sale_address = value.to_string(),
            "stable_token_address" => self.stable_token_address = value.to_string(),
            "sale_token_address" => self.sale_token_address = optional(value),
            "burn_address" => self.burn_address = value.to_string(),
            "native_symbol" => self.native_symbol = value.to_string(),
            "stable_symbol" => self.stable_symbol = value.to_string(),
            "token_symbol" => self.token_symbol = value.to_string(),
            "token_name" => self.token_name = value.to_string(),
            "default_decimals" => self.default_decimals = parse_number(key, value)?,
            "native_spend_cap_pct" => self.native_spend_cap_pct = parse_number(key, value)?,
            "stable_spend_cap_pct" => self.stable_spend_cap_pct = parse_number(key, value)?,
            "gas_pad_pct" => self.gas_pad_pct = parse_number(key, value)?,
            "gas_price_poll_secs" => self.gas_price_poll_secs = parse_number(key, value)?,
            "receipt_poll_millis" => self.receipt_poll_millis = parse_number(key, value)?,
            "recent_tx_limit" => self.recent_tx_limit = parse_number(key, value)?,
            "ledger_dir" => self.ledger_dir = value.to_string(),
            "user_uid" => self.user_uid = optional(value),
            "wallet_private_key" => self.wallet_private_key = optional(value),
            "explorer_tx_url" => self.explorer_tx_url = value.to_string(),
            _ => return Err(CoreError::NotFound(format!("Unknown setting: {}", key))),
        }
        Ok(())
    }

    /// Validate settings ranges and constraints
    pub fn validate(&self) -> Result<(), CoreError> {
        url::Url::parse(&self.rpc_url)
            .map_err(|e| CoreError::Validation(format!("rpc_url is not a valid URL: {}", e)))?;
        self.addresses()?;
        if self.native_spend_cap_pct == 0 || self.native_spend_cap_pct > 100 {
            return Err(CoreError::Validation("native_spend_cap_pct must be in 1..=100".to_string()));
        }
        if self.stable_spend_cap_pct == 0 || self.stable_spend_cap_pct > 100 {
            return Err(CoreError::Validation("stable_spend_cap_pct must be in 1..=100".to_string()));
        }
        if self.gas_pad_pct > 1_000 {
            return Err(CoreError::Validation("gas_pad_pct must be <= 1000".to_string()));
        }
        if self.gas_price_poll_secs == 0 {
            return Err(CoreError::Validation("gas_price_poll_secs must be > 0".to_string()));
        }
        if self.receipt_poll_millis == 0 {
            return Err(CoreError::Validation("receipt_poll_millis must be > 0".to_string()));
        }
        if self.default_decimals > 77 {
            return Err(CoreError::Validation("default_decimals must be <= 77".to_string()));
        }
        if self.recent_tx_limit == 0 {
            return Err(CoreError::Validation("recent_tx_limit must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn addresses(&self) -> Result<ContractAddresses, CoreError> {
        Ok(ContractAddresses {
            sale: parse_address("sale_address", &self.sale_address)?,
            stable_token: parse_address("stable_token_address", &self.stable_token_address)?,
            sale_token: self
                .sale_token_address
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_address("sale_token_address", s))
                .transpose()?,
            burn_sink: parse_address("burn_address", &self.burn_address)?,
        })
    }

    pub fn tx_url(&self, hash: &H256) -> String {
        format!("{}{:?}", self.explorer_tx_url, hash)
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, CoreError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| CoreError::Validation(format!("{} is not a valid address ({}): {}", field, value, e)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CoreError> {
    value
        .parse()
        .map_err(|_| CoreError::InvalidInput(format!("{} expects a whole number, got '{}'", key, value)))
}

fn default_chain_id() -> u64 { 56 }
fn default_burn_address() -> String { DEAD_ADDRESS.to_string() }
fn default_native_symbol() -> String { "BNB".to_string() }
fn default_stable_symbol() -> String { "USDT".to_string() }
fn default_token_symbol() -> String { "CXG+".to_string() }
fn default_token_name() -> String { "Token for Gold".to_string() }
fn default_decimals() -> u32 { 18 }
fn default_native_spend_cap_pct() -> u64 { 80 }
fn default_stable_spend_cap_pct() -> u64 { 100 }
fn default_gas_pad_pct() -> u64 { 20 }
fn default_gas_price_poll_secs() -> u64 { 15 }
fn default_receipt_poll_millis() -> u64 { 4_000 }
fn default_recent_tx_limit() -> usize { 10 }
fn default_ledger_dir() -> String { "ledger".to_string() }
fn default_explorer_tx_url() -> String { "https://bscscan.com/tx/".to_string() }
