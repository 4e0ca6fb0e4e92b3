use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[cfg(feature = "native")]
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid wallet key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Wrong network: expected chain {expected}, connected to {actual}")]
    WrongNetwork { expected: u64, actual: u64 },
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err.to_string())
    }
}

#[cfg(feature = "native")]
impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CoreError {
    fn from(err: toml::ser::Error) -> Self {
        CoreError::TomlSerialization(err.to_string())
    }
}

/// Shown when a submission failure carries no usable text at all.
pub const TX_FAILED_FALLBACK: &str = "Transaction failed";

/// A failed submission (wallet rejection, simulated revert, RPC error),
/// kept in the shape wallet libraries report it so the short form can be
/// picked out for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxFailure {
    pub short_message: Option<String>,
    pub details: Option<String>,
    pub message: Option<String>,
}

impl TxFailure {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_short_message(mut self, short: impl Into<String>) -> Self {
        self.short_message = Some(short.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Short message, then details, then message, then the fixed fallback.
    /// Blank fields are skipped.
    pub fn summary(&self) -> String {
        [&self.short_message, &self.details, &self.message]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(TX_FAILED_FALLBACK)
            .to_string()
    }
}

impl fmt::Display for TxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for TxFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prefers_short_message() {
        let failure = TxFailure::from_message("long provider text")
            .with_details("rpc details")
            .with_short_message("User rejected the request.");
        assert_eq!(failure.summary(), "User rejected the request.");
    }

    #[test]
    fn summary_falls_through_blank_fields() {
        let failure = TxFailure {
            short_message: Some("  ".to_string()),
            details: None,
            message: Some("execution reverted".to_string()),
        };
        assert_eq!(failure.summary(), "execution reverted");

        let details_only = TxFailure::default().with_details("nonce too low");
        assert_eq!(details_only.summary(), "nonce too low");
    }

    #[test]
    fn summary_uses_fallback_when_empty() {
        assert_eq!(TxFailure::default().summary(), TX_FAILED_FALLBACK);
        assert_eq!(TxFailure::from_message("").to_string(), "Transaction failed");
    }
}
