// High-level purchase service coordinating quote, guards, gas, sequencing
// and ledger writes. Chain, wallet and store are injected capabilities.

use crate::amount::{parse_amount_or_zero, DEFAULT_DECIMALS};
use crate::chain_client::{decimals_or, ensure_chain, ChainClient, PendingCall, RpcResult};
use crate::error::CoreError;
use crate::gas::{estimate_call, estimate_token_path};
use crate::guards::{exceeds_supply, has_enough_for_gas, max_spend_by_supply, spend_cap, GuardViolation, SpendCap};
use crate::ledger::{LedgerWriter, RecordOutcome};
use crate::models::{BalancesSnapshot, GasEstimate, InputAsset, PurchaseIntent, Quote, TransactionRecord, TxKind};
use crate::quote::{available_supply, quote_per_unit, resolve_quote};
use crate::referral::fetch_uplines;
use crate::sequencer::{FlowOutcome, FlowPlan, FlowRunner, FlowState};
use crate::session::SessionHandle;
use crate::settings::{ContractAddresses, Settings};
use crate::wallet::WalletSigner;
use ethers::types::{Address, U256};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub type PurchaseServiceResult<T> = Result<T, CoreError>;

/// Everything a front-end shows before the user confirms a purchase.
#[derive(Debug, Clone)]
pub struct PurchasePreview {
    pub intent: PurchaseIntent,
    /// `None` when the sale contract could not be read
    pub quote: Option<Quote>,
    pub balances: BalancesSnapshot,
    /// `None` while the balance of the input asset is unknown
    pub spend_cap: Option<SpendCap>,
    pub gas: GasEstimate,
    pub max_spend_by_supply: Option<U256>,
    pub violations: Vec<GuardViolation>,
}

impl PurchasePreview {
    /// The action is offered only for a positive amount with no guard violation.
    pub fn can_submit(&self) -> bool {
        self.intent.is_actionable() && self.violations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BurnPreview {
    pub amount: U256,
    pub decimals: u32,
    pub balance: Option<U256>,
    pub gas: GasEstimate,
    pub violations: Vec<GuardViolation>,
}

impl BurnPreview {
    pub fn can_submit(&self) -> bool {
        !self.amount.is_zero() && self.violations.is_empty()
    }
}

/// Result of running a purchase or burn flow.
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub outcome: FlowOutcome,
    /// Present only when the final transaction confirmed successfully
    pub record: Option<TransactionRecord>,
    pub ledger: Option<RecordOutcome>,
}

impl FlowReport {
    pub fn final_state(&self) -> &FlowState {
        self.outcome.sequencer().state()
    }
}

pub struct PurchaseService {
    chain: Arc<dyn ChainClient>,
    wallet: Arc<dyn WalletSigner>,
    ledger: Arc<LedgerWriter>,
    settings: Settings,
    addresses: ContractAddresses,
    observer: Option<mpsc::UnboundedSender<FlowState>>,
}

impl PurchaseService {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wallet: Arc<dyn WalletSigner>,
        ledger: Arc<LedgerWriter>,
        settings: Settings,
    ) -> PurchaseServiceResult<Self> {
        settings.validate()?;
        let addresses = settings.addresses()?;
        Ok(Self { chain, wallet, ledger, settings, addresses, observer: None })
    }

    /// Forward every flow state change to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<FlowState>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn account(&self) -> Address {
        self.wallet.address()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ledger(&self) -> &Arc<LedgerWriter> {
        &self.ledger
    }

    pub fn symbol(&self, asset: InputAsset) -> &str {
        match asset {
            InputAsset::Native => &self.settings.native_symbol,
            InputAsset::Stable => &self.settings.stable_symbol,
        }
    }

    fn spend_cap_pct(&self, asset: InputAsset) -> u64 {
        match asset {
            InputAsset::Native => self.settings.native_spend_cap_pct,
            InputAsset::Stable => self.settings.stable_spend_cap_pct,
        }
    }

    /// Decimal scale of the input asset. The native coin is always 18.
    pub async fn asset_decimals(&self, asset: InputAsset) -> u32 {
        match asset {
            InputAsset::Native => DEFAULT_DECIMALS,
            InputAsset::Stable => decimals_or(&*self.chain, self.addresses.stable_token, self.settings.default_decimals).await,
        }
    }

    pub async fn token_decimals(&self) -> u32 {
        match self.addresses.sale_token {
            Some(token) => decimals_or(&*self.chain, token, self.settings.default_decimals).await,
            None => self.settings.default_decimals,
        }
    }

    /// Resolve user input against the asset's on-chain scale.
    pub async fn intent(&self, asset: InputAsset, raw_amount: &str, raw_sponsor: &str) -> PurchaseIntent {
        let decimals = self.asset_decimals(asset).await;
        PurchaseIntent::new(asset, raw_amount, decimals, raw_sponsor)
    }

    /// Fail unless the wallet is usable and the provider is on the configured chain.
    pub async fn ensure_network(&self) -> RpcResult<()> {
        if !self.wallet.is_ready().await {
            return Err(CoreError::Rpc("wallet is not connected".to_string()));
        }
        ensure_chain(&*self.chain, self.settings.chain_id).await
    }

    /// Balances of the connected account; each read degrades independently.
    pub async fn balances(&self) -> BalancesSnapshot {
        let account = self.account();
        let native = self.chain.native_balance(account).await;
        let stable = self.chain.token_balance(self.addresses.stable_token, account).await;
        let sale_token = match self.addresses.sale_token {
            Some(token) => self.chain.token_balance(token, account).await.map(Some),
            None => Ok(None),
        };

        let snapshot = BalancesSnapshot {
            native: native.map_err(|e| warn!("Native balance unavailable: {}", e)).ok(),
            stable: stable.map_err(|e| warn!("Stable balance unavailable: {}", e)).ok(),
            sale_token: sale_token.map_err(|e| warn!("Sale token balance unavailable: {}", e)).ok().flatten(),
            available_supply: available_supply(&*self.chain, self.addresses.sale_token, self.addresses.sale).await,
        };
        debug!("Balances for {:?}: {:?}", account, snapshot);
        snapshot
    }

    pub async fn uplines(&self, account: Address) -> RpcResult<[Address; 3]> {
        fetch_uplines(account, &*self.chain).await
    }

    /// The calls a purchase of `intent` will submit.
    pub fn plan(&self, intent: &PurchaseIntent) -> FlowPlan {
        let sale = self.addresses.sale;
        let sponsor = intent.sponsor_address();
        match intent.asset {
            InputAsset::Native => FlowPlan::native_purchase(PendingCall::PurchaseWithNative { sale, sponsor, value: intent.amount }),
            InputAsset::Stable => FlowPlan::token_purchase(
                PendingCall::Approve { token: self.addresses.stable_token, spender: sale, amount: intent.amount },
                PendingCall::PurchaseWithToken { sale, amount: intent.amount, sponsor },
            ),
        }
    }

    async fn estimate_plan(&self, plan: &FlowPlan, gas_price: Option<U256>) -> GasEstimate {
        let from = self.account();
        let pad = self.settings.gas_pad_pct;
        match &plan.approve {
            Some(approve) => estimate_token_path(&*self.chain, from, approve, &plan.main, gas_price, pad).await,
            None => estimate_call(&*self.chain, from, &plan.main, gas_price, pad).await,
        }
    }

    /// Quote, balances, gas and guard evaluation for `intent`. `gas_price`
    /// is the poller's latest value, `None` when unknown.
    pub async fn preview(&self, intent: &PurchaseIntent, gas_price: Option<U256>) -> PurchasePreview {
        let balances = self.balances().await;
        let quote = resolve_quote(&*self.chain, intent.asset, intent.amount).await;

        // Nothing else touches the sale contract for an empty amount
        let (gas, max_by_supply) = if intent.is_actionable() {
            let per_unit = quote_per_unit(&*self.chain, intent.asset, intent.decimals).await;
            let one = U256::exp10(intent.decimals as usize);
            (
                self.estimate_plan(&self.plan(intent), gas_price).await,
                max_spend_by_supply(balances.available_supply, per_unit, one),
            )
        } else {
            (GasEstimate { gas_price, ..GasEstimate::default() }, None)
        };

        let mut violations = Vec::new();
        let cap = balances.of(intent.asset).map(|balance| {
            let cap = spend_cap(balance, self.spend_cap_pct(intent.asset), intent.amount);
            if intent.amount > balance {
                violations.push(GuardViolation::InsufficientBalance { balance });
            } else if cap.over_cap {
                violations.push(GuardViolation::OverSpendCap { cap: cap.cap });
            }
            cap
        });

        // Native purchases keep gas money through the spend cap; the token
        // path needs native balance for two transactions on top.
        if intent.asset == InputAsset::Stable && intent.is_actionable() {
            if let (Some(native), Some(required)) = (balances.native, gas.padded_cost) {
                if !has_enough_for_gas(native, Some(required)) {
                    violations.push(GuardViolation::InsufficientGas { required });
                }
            }
        }

        if let (Some(q), Some(available)) = (quote, balances.available_supply) {
            if exceeds_supply(q.net, Some(available)) {
                violations.push(GuardViolation::ExceedsSupply { available });
            }
        }

        PurchasePreview {
            intent: intent.clone(),
            quote,
            balances,
            spend_cap: cap,
            gas,
            max_spend_by_supply: max_by_supply,
            violations,
        }
    }

    fn runner(&self, session: SessionHandle) -> FlowRunner<'_> {
        let runner = FlowRunner::new(
            &*self.chain,
            &*self.wallet,
            Duration::from_millis(self.settings.receipt_poll_millis),
            session,
        );
        match &self.observer {
            Some(observer) => runner.with_observer(observer.clone()),
            None => runner,
        }
    }

    /// Run the purchase flow for `intent` and record it once confirmed.
    ///
    /// Guards are not re-checked here; the sale contract decides. The quote
    /// stored with the record is the one resolved just before submission.
    pub async fn purchase(&self, intent: &PurchaseIntent, session: SessionHandle) -> PurchaseServiceResult<FlowReport> {
        if !intent.is_actionable() {
            return Err(CoreError::InvalidInput("amount must be greater than zero".to_string()));
        }
        self.ensure_network().await?;

        let quote = resolve_quote(&*self.chain, intent.asset, intent.amount).await;
        let plan = self.plan(intent);
        info!(
            "Starting {:?} purchase of {} {} (sponsor {:?})",
            intent.asset,
            intent.raw_input.trim(),
            self.symbol(intent.asset),
            intent.sponsor_address()
        );
        let outcome = self.runner(session.clone()).run(&plan).await?;

        let receipt = match outcome.sequencer().final_receipt() {
            Some(r) if !outcome.is_disconnected() => r.clone(),
            _ => return Ok(FlowReport { outcome, record: None, ledger: None }),
        };

        let token_decimals = self.token_decimals().await;
        if session.is_disconnected() {
            info!("Session ended before {:?} was recorded", receipt.hash);
            return Ok(FlowReport { outcome, record: None, ledger: None });
        }
        let record = TransactionRecord::confirmed(
            TxKind::from(intent.asset),
            self.account(),
            self.symbol(intent.asset),
            &intent.raw_input,
            quote.as_ref(),
            token_decimals,
            &receipt,
        );
        let ledger = self.ledger.record_confirmed(record.clone()).await;
        Ok(FlowReport { outcome, record: Some(record), ledger: Some(ledger) })
    }

    fn burn_call(&self, amount: U256) -> PurchaseServiceResult<PendingCall> {
        let token = self
            .addresses
            .sale_token
            .ok_or_else(|| CoreError::Validation("sale_token_address is not configured".to_string()))?;
        Ok(PendingCall::Transfer { token, to: self.addresses.burn_sink, amount })
    }

    pub async fn burn_preview(&self, raw_amount: &str, gas_price: Option<U256>) -> PurchaseServiceResult<BurnPreview> {
        let decimals = self.token_decimals().await;
        let amount = parse_amount_or_zero(raw_amount, decimals);
        let call = self.burn_call(amount)?;

        let balance = match self.chain.token_balance(call.target(), self.account()).await {
            Ok(b) => Some(b),
            Err(e) => {
                warn!("Sale token balance unavailable: {}", e);
                None
            }
        };
        let gas = if amount.is_zero() {
            GasEstimate { gas_price, ..GasEstimate::default() }
        } else {
            estimate_call(&*self.chain, self.account(), &call, gas_price, self.settings.gas_pad_pct).await
        };

        let mut violations = Vec::new();
        if let Some(balance) = balance {
            if amount > balance {
                violations.push(GuardViolation::InsufficientBalance { balance });
            }
        }
        Ok(BurnPreview { amount, decimals, balance, gas, violations })
    }

    /// Transfer `raw_amount` sale tokens to the burn sink and record it.
    pub async fn burn(&self, raw_amount: &str, session: SessionHandle) -> PurchaseServiceResult<FlowReport> {
        let decimals = self.token_decimals().await;
        let amount = parse_amount_or_zero(raw_amount, decimals);
        if amount.is_zero() {
            return Err(CoreError::InvalidInput("amount must be greater than zero".to_string()));
        }
        self.ensure_network().await?;

        let plan = FlowPlan::burn(self.burn_call(amount)?);
        info!("Starting burn of {} {}", raw_amount.trim(), self.settings.token_symbol);
        let outcome = self.runner(session.clone()).run(&plan).await?;

        let receipt = match outcome.sequencer().final_receipt() {
            Some(r) if !outcome.is_disconnected() && !session.is_disconnected() => r.clone(),
            _ => return Ok(FlowReport { outcome, record: None, ledger: None }),
        };
        let record = TransactionRecord::confirmed(
            TxKind::Burn,
            self.account(),
            &self.settings.token_symbol,
            raw_amount,
            None,
            decimals,
            &receipt,
        );
        let ledger = self.ledger.record_confirmed(record.clone()).await;
        Ok(FlowReport { outcome, record: Some(record), ledger: Some(ledger) })
    }

    pub async fn recent_transactions(&self) -> PurchaseServiceResult<Vec<TransactionRecord>> {
        self.ledger.recent(self.settings.recent_tx_limit).await
    }
}
