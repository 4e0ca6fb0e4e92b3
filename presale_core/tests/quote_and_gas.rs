mod common;

use common::{units, wallet_address, EventLog, Harness, MockChain};
use ethers::types::{Address, U256};
use presale_core::gas::{estimate_token_path, GasPricePoller, PollerState};
use presale_core::guards::GuardViolation;
use presale_core::quote::{available_supply, resolve_quote};
use presale_core::{ChainClient, InputAsset, PendingCall, Quote, Session};
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn zero_amount_issues_no_quote_call() {
    let chain = MockChain::new(EventLog::default());
    let quote = resolve_quote(&chain, InputAsset::Native, U256::zero()).await;
    assert_eq!(quote, Some(Quote::default()));
    assert_eq!(chain.quote_calls.load(Ordering::SeqCst), 0);

    let h = Harness::new();
    let service = h.service();
    for raw in ["", "abc", "-1.2.3", "0"] {
        let intent = service.intent(InputAsset::Stable, raw, "").await;
        let preview = service.preview(&intent, None).await;
        assert_eq!(preview.quote, Some(Quote::default()));
        assert!(!preview.can_submit());
    }
    assert_eq!(h.chain.quote_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn quote_chains_gross_into_split() {
    let chain = MockChain::new(EventLog::default());
    let quote = resolve_quote(&chain, InputAsset::Stable, units(100)).await.unwrap();
    assert_eq!(quote.gross, units(400));
    assert_eq!(quote.net, units(360));
    assert_eq!(quote.referral_splits(), [units(20), units(12), units(8)]);
}

#[tokio::test]
async fn failed_quote_reads_are_unavailable_not_errors() {
    let chain = MockChain::new(EventLog::default());
    chain.state.lock().unwrap().split_available = false;
    assert_eq!(resolve_quote(&chain, InputAsset::Native, units(1)).await, None);

    chain.state.lock().unwrap().native_rate = None;
    assert_eq!(resolve_quote(&chain, InputAsset::Native, units(1)).await, None);

    // The action is still offered; the quote is only advisory
    let h = Harness::new();
    h.chain.state.lock().unwrap().native_rate = None;
    let service = h.service();
    let intent = service.intent(InputAsset::Native, "0.1", "").await;
    let preview = service.preview(&intent, Some(U256::from(3_000_000_000u64))).await;
    assert_eq!(preview.quote, None);
    assert!(preview.can_submit());
}

#[tokio::test]
async fn native_point_one_of_one_is_within_cap() {
    let h = Harness::new();
    let service = h.service();
    let intent = service.intent(InputAsset::Native, "0.1", "").await;
    let preview = service.preview(&intent, Some(U256::from(3_000_000_000u64))).await;

    let cap = preview.spend_cap.unwrap();
    assert_eq!(cap.cap, U256::from(8u64) * U256::exp10(17));
    assert!(!cap.over_cap);
    assert!(preview.violations.is_empty());
    assert!(preview.can_submit());
}

#[tokio::test]
async fn native_above_cap_is_flagged() {
    let h = Harness::new();
    let service = h.service();

    let intent = service.intent(InputAsset::Native, "0.9", "").await;
    let preview = service.preview(&intent, None).await;
    assert_eq!(preview.violations, vec![GuardViolation::OverSpendCap { cap: U256::from(8u64) * U256::exp10(17) }]);
    assert!(!preview.can_submit());

    let intent = service.intent(InputAsset::Native, "2", "").await;
    let preview = service.preview(&intent, None).await;
    assert_eq!(preview.violations, vec![GuardViolation::InsufficientBalance { balance: units(1) }]);
}

#[tokio::test]
async fn gas_price_failure_leaves_estimate_unknown_and_purchase_enabled() {
    let h = Harness::new();
    h.chain.state.lock().unwrap().gas_price = None;
    let session = Session::new();
    let poller = GasPricePoller::start(h.chain.clone(), Duration::from_millis(10), session.handle());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.chain.gas_price_calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(poller.latest(), None);

    let service = h.service();
    let intent = service.intent(InputAsset::Stable, "100", "").await;
    let preview = service.preview(&intent, poller.latest()).await;
    assert_eq!(preview.gas.gas_price, None);
    assert_eq!(preview.gas.padded_cost, None);
    assert!(preview.gas.gas_units.is_some());
    assert!(preview.can_submit());
}

#[tokio::test]
async fn poller_publishes_price_and_stops_on_disconnect() {
    let h = Harness::new();
    let session = Session::new();
    let poller = GasPricePoller::start(h.chain.clone(), Duration::from_millis(10), session.handle());
    let mut updates = poller.subscribe();

    tokio::time::timeout(Duration::from_secs(1), updates.wait_for(|p| p.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(poller.latest(), Some(U256::from(3_000_000_000u64)));
    assert_eq!(poller.state(), PollerState::Polling);

    // A later failure resets the price to unknown
    h.chain.state.lock().unwrap().gas_price = None;
    tokio::time::timeout(Duration::from_secs(1), updates.wait_for(|p| p.is_none()))
        .await
        .unwrap()
        .unwrap();

    session.disconnect();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(poller.state(), PollerState::Idle);
    let calls = h.chain.gas_price_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.chain.gas_price_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn token_path_total_needs_both_estimates() {
    let chain = MockChain::new(EventLog::default());
    let sale = Address::repeat_byte(1);
    let usdt = Address::repeat_byte(2);
    let approve = PendingCall::Approve { token: usdt, spender: sale, amount: units(100) };
    let buy = PendingCall::PurchaseWithToken { sale, amount: units(100), sponsor: Address::zero() };
    let price = Some(U256::from(1_000_000_000u64));

    let est = estimate_token_path(&chain, wallet_address(), &approve, &buy, price, 20).await;
    assert_eq!(est.gas_units, Some(U256::from(226_000u64)));
    // 226_000 gwei padded by 20%
    assert_eq!(est.padded_cost, Some(U256::from(271_200u64) * U256::exp10(9)));

    chain.state.lock().unwrap().estimates.remove("purchase_token");
    let est = estimate_token_path(&chain, wallet_address(), &approve, &buy, price, 20).await;
    assert_eq!(est.gas_units, None);
    assert_eq!(est.padded_cost, None);
}

#[tokio::test]
async fn token_path_flags_missing_gas_money() {
    let h = Harness::new();
    h.chain.state.lock().unwrap().native_balance = Some(U256::from(1_000u64));
    let service = h.service();
    let intent = service.intent(InputAsset::Stable, "100", "").await;
    let preview = service.preview(&intent, Some(U256::from(3_000_000_000u64))).await;

    let required = preview.gas.padded_cost.unwrap();
    assert_eq!(preview.violations, vec![GuardViolation::InsufficientGas { required }]);
    assert!(!preview.can_submit());
}

#[tokio::test]
async fn supply_falls_back_to_total_and_caps_spend() {
    let chain = MockChain::new(EventLog::default());
    let token = Some(Address::repeat_byte(0x11));
    let sale: Address = common::settings().addresses().unwrap().sale;

    assert_eq!(available_supply(&chain, token, sale).await, Some(units(1_000_000)));
    chain.state.lock().unwrap().sale_held_supply = Some(U256::zero());
    assert_eq!(available_supply(&chain, token, sale).await, Some(units(10_000_000)));
    chain.state.lock().unwrap().total_supply = None;
    assert_eq!(available_supply(&chain, token, sale).await, None);
    assert_eq!(available_supply(&chain, None, sale).await, None);

    // 1000 tokens left at 4 tokens per USDT: 250 USDT at most, 300 exceeds
    let h = Harness::new();
    h.chain.state.lock().unwrap().sale_held_supply = Some(units(1_000));
    let service = h.service();
    let intent = service.intent(InputAsset::Stable, "300", "").await;
    let preview = service.preview(&intent, None).await;
    assert_eq!(preview.max_spend_by_supply, Some(units(250)));
    assert_eq!(preview.violations, vec![GuardViolation::ExceedsSupply { available: units(1_000) }]);
}

#[tokio::test]
async fn uplines_come_from_the_sale_contract() {
    let h = Harness::new();
    let service = h.service();
    let uplines = service.uplines(wallet_address()).await.unwrap();
    assert_eq!(uplines[0], Address::repeat_byte(0xa1));
    assert_eq!(h.chain.uplines(wallet_address()).await.unwrap(), uplines);
}
