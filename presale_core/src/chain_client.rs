// Chain read abstraction - lets the flow run against a live node or a test double

use crate::error::CoreError;
use crate::models::{ConfirmedReceipt, InputAsset};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, CoreError>;

/// `quoteReferralSplit` output: purchaser's share plus three referral tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferralSplit {
    pub net: U256,
    pub tier1: U256,
    pub tier2: U256,
    pub tier3: U256,
}

/// A state-changing call the wallet can sign, described independently of
/// any binding so it can be estimated, simulated and submitted alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCall {
    /// `buyWithBNB(sponsor)` with `value` attached.
    PurchaseWithNative { sale: Address, sponsor: Address, value: U256 },
    /// `buyWithUSDT(amount, sponsor)`; needs a prior allowance.
    PurchaseWithToken { sale: Address, amount: U256, sponsor: Address },
    /// ERC-20 `approve(spender, amount)` on `token`.
    Approve { token: Address, spender: Address, amount: U256 },
    /// ERC-20 `transfer(to, amount)` on `token`; used for burns.
    Transfer { token: Address, to: Address, amount: U256 },
}

impl PendingCall {
    pub fn label(&self) -> &'static str {
        match self {
            PendingCall::PurchaseWithNative { .. } => "purchase_native",
            PendingCall::PurchaseWithToken { .. } => "purchase_token",
            PendingCall::Approve { .. } => "approve",
            PendingCall::Transfer { .. } => "transfer",
        }
    }

    /// Contract the call is sent to.
    pub fn target(&self) -> Address {
        match self {
            PendingCall::PurchaseWithNative { sale, .. } | PendingCall::PurchaseWithToken { sale, .. } => *sale,
            PendingCall::Approve { token, .. } | PendingCall::Transfer { token, .. } => *token,
        }
    }

    /// Native value attached to the transaction.
    pub fn value(&self) -> U256 {
        match self {
            PendingCall::PurchaseWithNative { value, .. } => *value,
            _ => U256::zero(),
        }
    }
}

/// Read-only view of the chain: sale quotes, token state, gas, receipts.
/// Implementations: native (ethers HTTP provider) and test doubles.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id the provider is connected to
    async fn chain_id(&self) -> RpcResult<u64>;

    /// Current network gas price in wei
    async fn gas_price(&self) -> RpcResult<U256>;

    /// Native coin balance
    async fn native_balance(&self, owner: Address) -> RpcResult<U256>;

    /// ERC-20 `balanceOf`
    async fn token_balance(&self, token: Address, owner: Address) -> RpcResult<U256>;

    /// ERC-20 `totalSupply`
    async fn token_total_supply(&self, token: Address) -> RpcResult<U256>;

    /// ERC-20 `decimals`
    async fn token_decimals(&self, token: Address) -> RpcResult<u8>;

    /// Sale contract gross token output for `amount` of `asset`
    async fn quote_gross(&self, asset: InputAsset, amount: U256) -> RpcResult<U256>;

    /// Sale contract split of a gross amount into net and referral tiers
    async fn quote_referral_split(&self, gross: U256) -> RpcResult<ReferralSplit>;

    /// Sale contract referral uplines (l1, l2, l3) of `account`
    async fn uplines(&self, account: Address) -> RpcResult<[Address; 3]>;

    /// Gas units `call` would use when sent from `from`
    async fn estimate_gas(&self, from: Address, call: &PendingCall) -> RpcResult<U256>;

    /// Receipt of a mined transaction, `None` while still pending
    async fn transaction_receipt(&self, hash: H256) -> RpcResult<Option<ConfirmedReceipt>>;
}

/// Fail with `WrongNetwork` unless the provider is on `expected`.
pub async fn ensure_chain<C: ChainClient + ?Sized>(client: &C, expected: u64) -> RpcResult<()> {
    let actual = client.chain_id().await?;
    if actual != expected {
        return Err(CoreError::WrongNetwork { expected, actual });
    }
    Ok(())
}

/// Token decimals, or `fallback` when the read fails.
pub async fn decimals_or<C: ChainClient + ?Sized>(client: &C, token: Address, fallback: u32) -> u32 {
    match client.token_decimals(token).await {
        Ok(d) => d as u32,
        Err(e) => {
            log::debug!("decimals() unavailable for {:?}, using {}: {}", token, fallback, e);
            fallback
        }
    }
}
