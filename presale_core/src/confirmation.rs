// Receipt polling for a submitted transaction
// There is no timeout: a stuck transaction keeps polling until the
// session ends.

use crate::chain_client::ChainClient;
use crate::models::ConfirmedReceipt;
use crate::session::SessionHandle;
use ethers::types::H256;
use log::{debug, info, warn};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Mined(ConfirmedReceipt),
    /// Session ended first; the watcher was released without a result.
    Disconnected,
}

/// Poll `transaction_receipt(hash)` every `poll` until the transaction is
/// mined. RPC errors are logged and polling continues.
pub async fn wait_for_confirmation<C: ChainClient + ?Sized>(
    client: &C,
    hash: H256,
    poll: Duration,
    session: &mut SessionHandle,
) -> WaitOutcome {
    let mut attempts: u64 = 0;
    loop {
        attempts += 1;
        let polled = tokio::select! {
            biased;
            _ = session.disconnected() => {
                debug!("Stopped watching {:?} after {} polls: session ended", hash, attempts - 1);
                return WaitOutcome::Disconnected;
            }
            res = client.transaction_receipt(hash) => res,
        };

        match polled {
            Ok(Some(receipt)) => {
                info!(
                    "Transaction {:?} mined in block {:?} (status {})",
                    hash,
                    receipt.block_number,
                    if receipt.succeeded { "ok" } else { "reverted" }
                );
                return WaitOutcome::Mined(receipt);
            }
            Ok(None) => debug!("Transaction {:?} still pending (poll {})", hash, attempts),
            Err(e) => warn!("Receipt poll for {:?} failed (poll {}), retrying: {}", hash, attempts, e),
        }

        tokio::select! {
            biased;
            _ = session.disconnected() => {
                debug!("Stopped watching {:?}: session ended", hash);
                return WaitOutcome::Disconnected;
            }
            _ = tokio::time::sleep(poll) => {}
        }
    }
}
