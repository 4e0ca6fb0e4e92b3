use crate::amount::{format_amount, parse_amount_or_zero};
use crate::referral::SponsorInput;
use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Asset the buyer pays with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputAsset {
    /// Chain native coin, sent as transaction value.
    Native,
    /// ERC-20 stablecoin, approved then pulled by the sale contract.
    Stable,
}

/// What the user typed into an amount field, resolved to on-chain units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseIntent {
    pub asset: InputAsset,
    pub raw_input: String,
    pub amount: U256,
    pub decimals: u32,
    pub sponsor: SponsorInput,
}

impl PurchaseIntent {
    /// Never fails: malformed amounts become zero, malformed sponsors become "no sponsor".
    pub fn new(asset: InputAsset, raw_input: &str, decimals: u32, sponsor_raw: &str) -> Self {
        Self {
            asset,
            raw_input: raw_input.to_string(),
            amount: parse_amount_or_zero(raw_input, decimals),
            decimals,
            sponsor: SponsorInput::parse(sponsor_raw),
        }
    }

    pub fn sponsor_address(&self) -> Address {
        self.sponsor.address()
    }

    pub fn is_actionable(&self) -> bool {
        !self.amount.is_zero()
    }
}

/// Advisory quote. The purchase re-derives amounts on-chain at execution
/// time, so the numbers here may differ from what is finally credited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub gross: U256,
    pub net: U256,
    pub tier1: U256,
    pub tier2: U256,
    pub tier3: U256,
}

impl Quote {
    pub fn referral_splits(&self) -> [U256; 3] {
        [self.tier1, self.tier2, self.tier3]
    }
}

/// Gas figures for one pending action. Any unknown input leaves the
/// derived cost unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasEstimate {
    pub gas_price: Option<U256>,
    pub gas_units: Option<U256>,
    pub padded_cost: Option<U256>,
}

/// Receipt of a mined transaction, trimmed to what the ledger keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedReceipt {
    pub hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub effective_gas_price: Option<U256>,
    /// False when the transaction was mined but reverted.
    pub succeeded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    BuyNative,
    BuyStable,
    Burn,
}

impl From<InputAsset> for TxKind {
    fn from(asset: InputAsset) -> Self {
        match asset {
            InputAsset::Native => TxKind::BuyNative,
            InputAsset::Stable => TxKind::BuyStable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
}

/// One confirmed transaction in the user's ledger. Amounts are decimal
/// strings at the token's scale; block metadata is stringified like the
/// rest of the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub wallet_address: String,
    pub input_currency: String,
    pub input_amount: String,
    pub quoted_net_output: Option<String>,
    pub quoted_gross: Option<String>,
    pub referral_splits: [Option<String>; 3],
    pub hash: String,
    pub status: TxStatus,
    pub block_number: Option<String>,
    pub gas_used: Option<String>,
    pub effective_gas_price: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build the record for a confirmed transaction. Zero quote fields are
    /// stored as absent, matching a quote that was never available.
    pub fn confirmed(
        kind: TxKind,
        wallet: Address,
        input_currency: &str,
        input_amount: &str,
        quote: Option<&Quote>,
        token_decimals: u32,
        receipt: &ConfirmedReceipt,
    ) -> Self {
        let fmt = |v: U256| if v.is_zero() { None } else { Some(format_amount(v, token_decimals)) };
        let hash = format!("{:?}", receipt.hash);
        Self {
            id: hash.clone(),
            kind,
            wallet_address: format!("{:?}", wallet),
            input_currency: input_currency.to_string(),
            input_amount: input_amount.trim().to_string(),
            quoted_net_output: quote.and_then(|q| fmt(q.net)),
            quoted_gross: quote.and_then(|q| fmt(q.gross)),
            referral_splits: match quote {
                Some(q) => q.referral_splits().map(fmt),
                None => [None, None, None],
            },
            hash,
            status: TxStatus::Success,
            block_number: receipt.block_number.map(|b| b.to_string()),
            gas_used: receipt.gas_used.map(|g| g.to_string()),
            effective_gas_price: receipt.effective_gas_price.map(|g| g.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Balances of the connected account, each independently unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalancesSnapshot {
    pub native: Option<U256>,
    pub stable: Option<U256>,
    pub sale_token: Option<U256>,
    pub available_supply: Option<U256>,
}

impl BalancesSnapshot {
    pub fn of(&self, asset: InputAsset) -> Option<U256> {
        match asset {
            InputAsset::Native => self.native,
            InputAsset::Stable => self.stable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_normalises_bad_input() {
        let intent = PurchaseIntent::new(InputAsset::Native, "abc", 18, "nope");
        assert!(intent.amount.is_zero());
        assert!(!intent.is_actionable());
        assert_eq!(intent.sponsor_address(), Address::zero());
        assert!(intent.sponsor.is_rejected());
    }

    #[test]
    fn record_serialises_with_document_field_names() {
        let receipt = ConfirmedReceipt {
            hash: H256::repeat_byte(1),
            block_number: Some(42),
            gas_used: Some(U256::from(21_000u64)),
            effective_gas_price: Some(U256::from(3_000_000_000u64)),
            succeeded: true,
        };
        let quote = Quote {
            gross: U256::from(100u64) * U256::exp10(18),
            net: U256::from(90u64) * U256::exp10(18),
            tier1: U256::from(5u64) * U256::exp10(18),
            tier2: U256::from(3u64) * U256::exp10(18),
            tier3: U256::zero(),
        };
        let rec = TransactionRecord::confirmed(
            TxKind::BuyNative,
            Address::repeat_byte(2),
            "BNB",
            "0.1",
            Some(&quote),
            18,
            &receipt,
        );
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "BUY_NATIVE");
        assert_eq!(json["status"], "success");
        assert_eq!(json["quotedNetOutput"], "90");
        assert_eq!(json["quotedGross"], "100");
        assert_eq!(json["referralSplits"][0], "5");
        assert!(json["referralSplits"][2].is_null());
        assert_eq!(json["blockNumber"], "42");
        assert_eq!(json["id"], json["hash"]);
    }
}
