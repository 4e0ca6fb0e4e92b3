// Platform-agnostic signing abstraction
// The connected account and its ability to submit transactions, injected
// into the flow instead of read from a global wallet context.

use crate::chain_client::PendingCall;
use crate::error::TxFailure;
use async_trait::async_trait;
use ethers::types::{Address, H256};

pub type SubmitResult<T> = Result<T, TxFailure>;

/// Implementations exist for:
/// - Native: local private key behind an ethers `SignerMiddleware`
/// - Tests: scripted wallets that record submissions
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Address of the connected account
    fn address(&self) -> Address;

    /// Simulate `call`, then sign and broadcast it. Returns the transaction
    /// hash as soon as the node accepts it; confirmation is tracked separately.
    async fn submit(&self, call: &PendingCall) -> SubmitResult<H256>;

    /// Check if this signer is ready to sign
    async fn is_ready(&self) -> bool;
}
