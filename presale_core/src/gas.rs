// Gas estimation: network gas price polling and per-call unit estimates
// Estimates are informational. A failure leaves the figure unknown and
// never blocks a purchase.

use crate::chain_client::{ChainClient, PendingCall};
use crate::guards::mul_div;
use crate::models::GasEstimate;
use crate::session::SessionHandle;
use ethers::types::{Address, U256};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// `floor(raw * (100 + pad_pct) / 100)`
pub fn padded_cost(raw: U256, pad_pct: u64) -> U256 {
    mul_div(raw, 100u64.saturating_add(pad_pct), 100)
}

/// Combine a gas price and a unit count into an estimate. The cost stays
/// unknown unless both inputs are known.
pub fn combine(gas_price: Option<U256>, gas_units: Option<U256>, pad_pct: u64) -> GasEstimate {
    let padded = match (gas_price, gas_units) {
        (Some(price), Some(units)) => Some(padded_cost(price.saturating_mul(units), pad_pct)),
        _ => None,
    };
    GasEstimate {
        gas_price,
        gas_units,
        padded_cost: padded,
    }
}

/// Gas units for `call` from `from`, `None` when the node refuses to
/// estimate (typically because the call would revert).
pub async fn estimate_units<C: ChainClient + ?Sized>(client: &C, from: Address, call: &PendingCall) -> Option<U256> {
    match client.estimate_gas(from, call).await {
        Ok(units) => {
            debug!("Estimated {} gas for {}", units, call.label());
            Some(units)
        }
        Err(e) => {
            warn!("Gas estimate for {} unavailable: {}", call.label(), e);
            None
        }
    }
}

/// Estimate for a single-transaction path (native purchase, burn).
pub async fn estimate_call<C: ChainClient + ?Sized>(
    client: &C,
    from: Address,
    call: &PendingCall,
    gas_price: Option<U256>,
    pad_pct: u64,
) -> GasEstimate {
    let units = estimate_units(client, from, call).await;
    combine(gas_price, units, pad_pct)
}

/// Estimate for approve + purchase. The two estimates are independent and
/// the total is only known when both are.
pub async fn estimate_token_path<C: ChainClient + ?Sized>(
    client: &C,
    from: Address,
    approve: &PendingCall,
    purchase: &PendingCall,
    gas_price: Option<U256>,
    pad_pct: u64,
) -> GasEstimate {
    let approve_units = estimate_units(client, from, approve).await;
    let purchase_units = estimate_units(client, from, purchase).await;
    let total = match (approve_units, purchase_units) {
        (Some(a), Some(b)) => Some(a.saturating_add(b)),
        _ => None,
    };
    combine(gas_price, total, pad_pct)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
}

/// Background gas price poller. Publishes the latest price (or `None`
/// after a failed poll) on a watch channel while the session is connected.
pub struct GasPricePoller {
    rx: watch::Receiver<Option<U256>>,
    handle: Option<JoinHandle<()>>,
}

impl GasPricePoller {
    /// A poller that never ran; the price stays unknown.
    pub fn idle() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx, handle: None }
    }

    /// Poll immediately, then every `interval`, until `session` ends.
    pub fn start(client: Arc<dyn ChainClient>, interval: Duration, mut session: SessionHandle) -> Self {
        let (tx, rx) = watch::channel(None);
        info!("Starting gas price polling every {:?}", interval);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = session.disconnected() => break,
                    _ = ticker.tick() => {}
                }
                let polled = tokio::select! {
                    biased;
                    _ = session.disconnected() => break,
                    res = client.gas_price() => res,
                };
                let price = match polled {
                    Ok(price) => {
                        debug!("Gas price: {} wei", price);
                        Some(price)
                    }
                    Err(e) => {
                        warn!("Gas price poll failed: {}", e);
                        None
                    }
                };
                if session.is_disconnected() || tx.send(price).is_err() {
                    break;
                }
            }
            debug!("Gas price polling stopped");
        });

        Self { rx, handle: Some(handle) }
    }

    pub fn state(&self) -> PollerState {
        match &self.handle {
            Some(h) if !h.is_finished() => PollerState::Polling,
            _ => PollerState::Idle,
        }
    }

    pub fn latest(&self) -> Option<U256> {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<U256>> {
        self.rx.clone()
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for GasPricePoller {
    fn drop(&mut self) {
        self.stop();
    }
}
