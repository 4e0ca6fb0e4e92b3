// Native transaction signer using a local private key

use crate::chain_client::PendingCall;
use crate::contracts::{transaction_request, SaleInterface};
use crate::error::{CoreError, TxFailure};
use crate::wallet::{SubmitResult, WalletSigner};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, MiddlewareError, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256};
use log::debug;

/// Normalise a middleware error into the short/details/message shape.
/// The node's JSON-RPC error message (e.g. "execution reverted: sold out")
/// is the short form; its `data` payload is the detail.
pub fn failure_from_middleware<E: MiddlewareError>(err: &E) -> TxFailure {
    let mut failure = TxFailure::from_message(err.to_string());
    if let Some(rpc) = err.as_error_response() {
        failure = failure.with_short_message(rpc.message.clone());
        if let Some(data) = &rpc.data {
            let details = match data.as_str() {
                Some(s) => s.to_string(),
                None => data.to_string(),
            };
            failure = failure.with_details(details);
        }
    }
    failure
}

pub struct LocalWalletSigner {
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
    sale: SaleInterface,
}

impl LocalWalletSigner {
    /// Hex private key (with or without `0x`) bound to `chain_id`
    pub fn new(provider: Provider<Http>, private_key: &str, chain_id: u64) -> Result<Self, CoreError> {
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let wallet: LocalWallet = key
            .parse()
            .map_err(|e| CoreError::InvalidKey(format!("Failed to parse private key: {}", e)))?;
        let wallet = wallet.with_chain_id(chain_id);
        Ok(Self {
            client: SignerMiddleware::new(provider, wallet),
            sale: SaleInterface::new()?,
        })
    }
}

#[async_trait]
impl WalletSigner for LocalWalletSigner {
    fn address(&self) -> Address {
        self.client.address()
    }

    async fn submit(&self, call: &PendingCall) -> SubmitResult<H256> {
        let tx = transaction_request(&self.sale, self.address(), call).map_err(|e| TxFailure::from_message(e.to_string()))?;

        // Simulate first so a revert surfaces with its reason instead of a
        // mined failure
        self.client
            .call(&tx, None)
            .await
            .map_err(|e| failure_from_middleware(&e))?;
        debug!("Simulation of {} passed", call.label());

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| failure_from_middleware(&e))?;
        Ok(pending.tx_hash())
    }

    async fn is_ready(&self) -> bool {
        self.client.get_chainid().await.is_ok()
    }
}
