// Native chain client wrapping an ethers HTTP provider

use crate::chain_client::{ChainClient, PendingCall, ReferralSplit, RpcResult};
use crate::contracts::{read_request, transaction_request, SaleInterface, IERC20};
use crate::error::CoreError;
use crate::models::{ConfirmedReceipt, InputAsset};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use log::debug;
use std::sync::Arc;

fn rpc_err(context: &str, e: impl std::fmt::Display) -> CoreError {
    CoreError::Rpc(format!("{} failed: {}", context, e))
}

/// Chain client for an EVM JSON-RPC endpoint
pub struct EthersChainClient {
    provider: Arc<Provider<Http>>,
    sale_address: Address,
    sale: SaleInterface,
}

impl EthersChainClient {
    /// Create a client for `rpc_url` quoting against the sale at `sale_address`
    pub fn new(rpc_url: &str, sale_address: Address) -> Result<Self, CoreError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| CoreError::Rpc(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;
        Self::from_provider(Arc::new(provider), sale_address)
    }

    pub fn from_provider(provider: Arc<Provider<Http>>, sale_address: Address) -> Result<Self, CoreError> {
        Ok(Self {
            provider,
            sale_address,
            sale: SaleInterface::new()?,
        })
    }

    /// Get reference to the underlying provider
    pub fn provider(&self) -> &Arc<Provider<Http>> {
        &self.provider
    }

    fn erc20(&self, token: Address) -> IERC20<Provider<Http>> {
        IERC20::new(token, self.provider.clone())
    }

    async fn sale_call(&self, data: Bytes, context: &str) -> RpcResult<Bytes> {
        self.provider
            .call(&read_request(self.sale_address, data), None)
            .await
            .map_err(|e| rpc_err(context, e))
    }
}

fn to_receipt(receipt: TransactionReceipt) -> ConfirmedReceipt {
    ConfirmedReceipt {
        hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|b| b.as_u64()),
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
        // Pre-Byzantium receipts carry no status; treat them as mined fine
        succeeded: receipt.status.map_or(true, |s| !s.is_zero()),
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    async fn chain_id(&self) -> RpcResult<u64> {
        let id = self.provider.get_chainid().await.map_err(|e| rpc_err("eth_chainId", e))?;
        Ok(id.as_u64())
    }

    async fn gas_price(&self) -> RpcResult<U256> {
        self.provider.get_gas_price().await.map_err(|e| rpc_err("eth_gasPrice", e))
    }

    async fn native_balance(&self, owner: Address) -> RpcResult<U256> {
        self.provider.get_balance(owner, None).await.map_err(|e| rpc_err("eth_getBalance", e))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> RpcResult<U256> {
        self.erc20(token).balance_of(owner).call().await.map_err(|e| rpc_err("balanceOf", e))
    }

    async fn token_total_supply(&self, token: Address) -> RpcResult<U256> {
        self.erc20(token).total_supply().call().await.map_err(|e| rpc_err("totalSupply", e))
    }

    async fn token_decimals(&self, token: Address) -> RpcResult<u8> {
        self.erc20(token).decimals().call().await.map_err(|e| rpc_err("decimals", e))
    }

    async fn quote_gross(&self, asset: InputAsset, amount: U256) -> RpcResult<U256> {
        debug!("Quoting {} {:?} against sale {:?}", amount, asset, self.sale_address);
        let output = self.sale_call(self.sale.encode_quote(asset, amount)?, "quote").await?;
        self.sale.decode_quote(asset, &output)
    }

    async fn quote_referral_split(&self, gross: U256) -> RpcResult<ReferralSplit> {
        let output = self.sale_call(self.sale.encode_referral_split(gross)?, "quoteReferralSplit").await?;
        self.sale.decode_referral_split(&output)
    }

    async fn uplines(&self, account: Address) -> RpcResult<[Address; 3]> {
        let output = self.sale_call(self.sale.encode_uplines(account)?, "getUplines").await?;
        self.sale.decode_uplines(&output)
    }

    async fn estimate_gas(&self, from: Address, call: &PendingCall) -> RpcResult<U256> {
        let tx = transaction_request(&self.sale, from, call)?;
        self.provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| rpc_err("eth_estimateGas", e))
    }

    async fn transaction_receipt(&self, hash: H256) -> RpcResult<Option<ConfirmedReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| rpc_err("eth_getTransactionReceipt", e))?;
        Ok(receipt.map(to_receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U64;

    #[test]
    fn rejects_malformed_rpc_url() {
        assert!(EthersChainClient::new("not a url", Address::zero()).is_err());
        assert!(EthersChainClient::new("https://bsc-dataseed.binance.org/", Address::zero()).is_ok());
    }

    #[test]
    fn receipt_status_maps_to_success() {
        let mut raw = TransactionReceipt {
            transaction_hash: H256::repeat_byte(1),
            block_number: Some(U64::from(77u64)),
            gas_used: Some(U256::from(21_000u64)),
            status: Some(U64::from(1u64)),
            ..Default::default()
        };
        let ok = to_receipt(raw.clone());
        assert!(ok.succeeded);
        assert_eq!(ok.block_number, Some(77));

        raw.status = Some(U64::zero());
        assert!(!to_receipt(raw).succeeded);
    }
}
