// Quote resolution against the sale contract
// Every read here is advisory: the purchase re-prices on-chain at execution
// time and nothing bounds the difference.

use crate::chain_client::ChainClient;
use crate::models::{InputAsset, Quote};
use ethers::types::{Address, U256};
use log::{debug, warn};

/// Resolve gross output then its referral split for `amount` of `asset`.
///
/// * zero amount: `Some(Quote::default())` without touching the chain
/// * zero gross: the split call is skipped, all fields zero
/// * any failed read: `None` ("unavailable")
pub async fn resolve_quote<C: ChainClient + ?Sized>(client: &C, asset: InputAsset, amount: U256) -> Option<Quote> {
    if amount.is_zero() {
        return Some(Quote::default());
    }

    let gross = match client.quote_gross(asset, amount).await {
        Ok(g) => g,
        Err(e) => {
            warn!("Gross quote unavailable for {} {:?}: {}", amount, asset, e);
            return None;
        }
    };
    if gross.is_zero() {
        debug!("Sale contract quoted zero for {} {:?}", amount, asset);
        return Some(Quote::default());
    }

    match client.quote_referral_split(gross).await {
        Ok(split) => Some(Quote {
            gross,
            net: split.net,
            tier1: split.tier1,
            tier2: split.tier2,
            tier3: split.tier3,
        }),
        Err(e) => {
            warn!("Referral split unavailable for gross {}: {}", gross, e);
            None
        }
    }
}

/// Gross output for exactly one whole unit of `asset` (`10^decimals`).
pub async fn quote_per_unit<C: ChainClient + ?Sized>(client: &C, asset: InputAsset, decimals: u32) -> Option<U256> {
    let one = U256::exp10(decimals as usize);
    match client.quote_gross(asset, one).await {
        Ok(q) => Some(q),
        Err(e) => {
            debug!("Per-unit quote unavailable for {:?}: {}", asset, e);
            None
        }
    }
}

/// Tokens the sale can still hand out: its own sale-token balance when
/// readable and non-zero, otherwise the token's total supply.
pub async fn available_supply<C: ChainClient + ?Sized>(client: &C, sale_token: Option<Address>, sale: Address) -> Option<U256> {
    let token = sale_token?;
    match client.token_balance(token, sale).await {
        Ok(held) if !held.is_zero() => return Some(held),
        Ok(_) => debug!("Sale contract holds no sale tokens, falling back to totalSupply"),
        Err(e) => debug!("Sale token balance of sale contract unavailable: {}", e),
    }
    match client.token_total_supply(token).await {
        Ok(total) => Some(total),
        Err(e) => {
            warn!("Available supply unknown: {}", e);
            None
        }
    }
}
