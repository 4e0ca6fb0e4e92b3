// Scripted chain and wallet doubles sharing one event log

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use presale_core::{
    ChainClient, ConfirmedReceipt, CoreError, InputAsset, LedgerWriter, MemoryDocumentStore, PendingCall,
    PurchaseService, ReferralSplit, RpcResult, Settings, SubmitResult, TxFailure, WalletSigner,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SETTINGS_TOML: &str = r#"
rpc_url = "http://127.0.0.1:8545"
chain_id = 56
sale_address = "0x02b0364a53f2D82d8EcBB4ccF058A44784f0dc3c"
stable_token_address = "0x55d398326f99059fF775485246999027B3197955"
sale_token_address = "0x1111111111111111111111111111111111111111"
receipt_poll_millis = 5
user_uid = "uid-test"
"#;

pub fn settings() -> Settings {
    toml::from_str(SETTINGS_TOML).unwrap()
}

pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn wallet_address() -> Address {
    Address::repeat_byte(0x42)
}

/// Ordered record of everything observable that happened during a flow.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == event)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Knobs of the mock chain. `None` makes the corresponding read fail.
pub struct ChainState {
    pub chain_id: u64,
    pub gas_price: Option<U256>,
    pub native_balance: Option<U256>,
    pub stable_balance: Option<U256>,
    pub sale_token_balance: Option<U256>,
    pub sale_held_supply: Option<U256>,
    pub total_supply: Option<U256>,
    /// Tokens per whole unit of input, per asset
    pub native_rate: Option<U256>,
    pub stable_rate: Option<U256>,
    pub split_available: bool,
    /// Gas units per call label; missing label means the estimate fails
    pub estimates: HashMap<&'static str, U256>,
    pub uplines: [Address; 3],
    /// Receipt polls a transaction stays pending for
    pub pending_polls: usize,
    /// Added latency of the sale-token decimals read
    pub decimals_delay: Option<Duration>,
}

impl Default for ChainState {
    fn default() -> Self {
        let mut estimates = HashMap::new();
        estimates.insert("purchase_native", U256::from(120_000u64));
        estimates.insert("approve", U256::from(46_000u64));
        estimates.insert("purchase_token", U256::from(180_000u64));
        estimates.insert("transfer", U256::from(52_000u64));
        Self {
            chain_id: 56,
            gas_price: Some(U256::from(3_000_000_000u64)),
            native_balance: Some(units(1)),
            stable_balance: Some(units(1_000)),
            sale_token_balance: Some(units(500)),
            sale_held_supply: Some(units(1_000_000)),
            total_supply: Some(units(10_000_000)),
            native_rate: Some(units(2_500)),
            stable_rate: Some(units(4)),
            split_available: true,
            estimates,
            uplines: [Address::repeat_byte(0xa1), Address::zero(), Address::zero()],
            pending_polls: 0,
            decimals_delay: None,
        }
    }
}

pub struct MockChain {
    pub state: Mutex<ChainState>,
    pub log: EventLog,
    pub quote_calls: AtomicUsize,
    pub gas_price_calls: AtomicUsize,
    pub receipt_polls: AtomicUsize,
    mined: Mutex<HashMap<H256, (ConfirmedReceipt, usize)>>,
}

fn unavailable(what: &str) -> CoreError {
    CoreError::Rpc(format!("{} unavailable", what))
}

impl MockChain {
    pub fn new(log: EventLog) -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            log,
            quote_calls: AtomicUsize::new(0),
            gas_price_calls: AtomicUsize::new(0),
            receipt_polls: AtomicUsize::new(0),
            mined: Mutex::new(HashMap::new()),
        }
    }

    /// Make `hash` minable; it becomes visible after the configured pending polls.
    pub fn include(&self, hash: H256, succeeded: bool) {
        let receipt = ConfirmedReceipt {
            hash,
            block_number: Some(40_000_000),
            gas_used: Some(U256::from(100_000u64)),
            effective_gas_price: Some(U256::from(3_000_000_000u64)),
            succeeded,
        };
        let wait = self.state.lock().unwrap().pending_polls;
        self.mined.lock().unwrap().insert(hash, (receipt, wait));
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> RpcResult<u64> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn gas_price(&self) -> RpcResult<U256> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().gas_price.ok_or_else(|| unavailable("gas price"))
    }

    async fn native_balance(&self, _owner: Address) -> RpcResult<U256> {
        self.state.lock().unwrap().native_balance.ok_or_else(|| unavailable("native balance"))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> RpcResult<U256> {
        let s = settings().addresses().unwrap();
        let state = self.state.lock().unwrap();
        let value = if Some(token) == s.sale_token && owner == s.sale {
            state.sale_held_supply
        } else if Some(token) == s.sale_token {
            state.sale_token_balance
        } else {
            state.stable_balance
        };
        value.ok_or_else(|| unavailable("token balance"))
    }

    async fn token_total_supply(&self, _token: Address) -> RpcResult<U256> {
        self.state.lock().unwrap().total_supply.ok_or_else(|| unavailable("total supply"))
    }

    async fn token_decimals(&self, _token: Address) -> RpcResult<u8> {
        let delay = self.state.lock().unwrap().decimals_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(18)
    }

    async fn quote_gross(&self, asset: InputAsset, amount: U256) -> RpcResult<U256> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let rate = match asset {
            InputAsset::Native => state.native_rate,
            InputAsset::Stable => state.stable_rate,
        };
        let rate = rate.ok_or_else(|| unavailable("quote"))?;
        Ok(amount * rate / U256::exp10(18))
    }

    async fn quote_referral_split(&self, gross: U256) -> RpcResult<ReferralSplit> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if !self.state.lock().unwrap().split_available {
            return Err(unavailable("referral split"));
        }
        let pct = |p: u64| gross * U256::from(p) / U256::from(100u64);
        Ok(ReferralSplit { net: pct(90), tier1: pct(5), tier2: pct(3), tier3: pct(2) })
    }

    async fn uplines(&self, _account: Address) -> RpcResult<[Address; 3]> {
        Ok(self.state.lock().unwrap().uplines)
    }

    async fn estimate_gas(&self, _from: Address, call: &PendingCall) -> RpcResult<U256> {
        self.state
            .lock()
            .unwrap()
            .estimates
            .get(call.label())
            .copied()
            .ok_or_else(|| unavailable("estimate"))
    }

    async fn transaction_receipt(&self, hash: H256) -> RpcResult<Option<ConfirmedReceipt>> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        let mut mined = self.mined.lock().unwrap();
        match mined.get_mut(&hash) {
            Some((receipt, wait)) if *wait == 0 => {
                self.log.push(format!("confirmed:{:?}", hash));
                Ok(Some(receipt.clone()))
            }
            Some((_, wait)) => {
                *wait -= 1;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

pub struct MockWallet {
    chain: Arc<MockChain>,
    log: EventLog,
    counter: AtomicU64,
    /// Labels whose submission fails with the given failure
    pub reject: Mutex<HashMap<&'static str, TxFailure>>,
    /// Labels that are accepted but revert when mined
    pub revert: Mutex<HashSet<&'static str>>,
    /// Labels that are accepted but never mined
    pub stall: Mutex<HashSet<&'static str>>,
    pub submitted: Mutex<Vec<PendingCall>>,
}

impl MockWallet {
    pub fn new(chain: Arc<MockChain>, log: EventLog) -> Self {
        Self {
            chain,
            log,
            counter: AtomicU64::new(1),
            reject: Mutex::new(HashMap::new()),
            revert: Mutex::new(HashSet::new()),
            stall: Mutex::new(HashSet::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn hash_of(n: u64) -> H256 {
        H256::from_low_u64_be(n)
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn address(&self) -> Address {
        wallet_address()
    }

    async fn submit(&self, call: &PendingCall) -> SubmitResult<H256> {
        let label = call.label();
        self.log.push(format!("submit:{}", label));
        if let Some(failure) = self.reject.lock().unwrap().get(label).cloned() {
            self.log.push(format!("rejected:{}", label));
            return Err(failure);
        }
        let hash = Self::hash_of(self.counter.fetch_add(1, Ordering::SeqCst));
        self.submitted.lock().unwrap().push(call.clone());
        self.log.push(format!("submitted:{}:{:?}", label, hash));
        if !self.stall.lock().unwrap().contains(label) {
            let succeeded = !self.revert.lock().unwrap().contains(label);
            self.chain.include(hash, succeeded);
        }
        Ok(hash)
    }

    async fn is_ready(&self) -> bool {
        true
    }
}

/// A wired service over fresh mocks and an in-memory store.
pub struct Harness {
    pub log: EventLog,
    pub chain: Arc<MockChain>,
    pub wallet: Arc<MockWallet>,
    pub store: Arc<MemoryDocumentStore>,
    pub ledger: Arc<LedgerWriter>,
}

impl Harness {
    pub fn new() -> Self {
        let log = EventLog::default();
        let chain = Arc::new(MockChain::new(log.clone()));
        let wallet = Arc::new(MockWallet::new(chain.clone(), log.clone()));
        let store = Arc::new(MemoryDocumentStore::new());
        let ledger = Arc::new(LedgerWriter::new(store.clone(), Some("uid-test".to_string())));
        Self { log, chain, wallet, store, ledger }
    }

    pub fn service(&self) -> PurchaseService {
        PurchaseService::new(self.chain.clone(), self.wallet.clone(), self.ledger.clone(), settings()).unwrap()
    }
}
