//! Contract interfaces the purchase flow talks to, and the translation of a
//! [`PendingCall`] into a raw transaction request.
pub mod erc20;
pub mod sale;

pub use erc20::IERC20;
pub use sale::SaleInterface;

use crate::chain_client::PendingCall;
use crate::error::CoreError;
use ethers::abi::AbiEncode;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest};

/// ABI-encoded calldata for `call`.
pub fn encode_call(sale: &SaleInterface, call: &PendingCall) -> Result<Bytes, CoreError> {
    match call {
        PendingCall::PurchaseWithNative { sponsor, .. } => sale.encode_buy_native(*sponsor),
        PendingCall::PurchaseWithToken { amount, sponsor, .. } => sale.encode_buy_stable(*amount, *sponsor),
        PendingCall::Approve { spender, amount, .. } => {
            Ok(erc20::ApproveCall { spender: *spender, amount: *amount }.encode().into())
        }
        PendingCall::Transfer { to, amount, .. } => Ok(erc20::TransferCall { to: *to, amount: *amount }.encode().into()),
    }
}

/// Unsigned legacy transaction for `call` sent from `from`. Gas, gas price
/// and nonce are left for the node or the signer to fill in.
pub fn transaction_request(sale: &SaleInterface, from: Address, call: &PendingCall) -> Result<TypedTransaction, CoreError> {
    let data = encode_call(sale, call)?;
    let mut tx = TransactionRequest::new().from(from).to(call.target()).data(data);
    if !call.value().is_zero() {
        tx = tx.value(call.value());
    }
    Ok(tx.into())
}

/// Read-only `eth_call` request against `to`.
pub fn read_request(to: Address, data: Bytes) -> TypedTransaction {
    TransactionRequest::new().to(to).data(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{NameOrAddress, U256};

    #[test]
    fn request_carries_target_value_and_data() {
        let sale = SaleInterface::new().unwrap();
        let from = Address::repeat_byte(1);
        let sale_addr = Address::repeat_byte(2);
        let call = PendingCall::PurchaseWithNative { sale: sale_addr, sponsor: Address::zero(), value: U256::from(10u64) };

        let tx = transaction_request(&sale, from, &call).unwrap();
        assert_eq!(tx.from(), Some(&from));
        assert_eq!(tx.to(), Some(&NameOrAddress::Address(sale_addr)));
        assert_eq!(tx.value(), Some(&U256::from(10u64)));
        assert_eq!(tx.data().map(|d| d.len()), Some(4 + 32));
    }

    #[test]
    fn token_calls_target_the_token() {
        let sale = SaleInterface::new().unwrap();
        let token = Address::repeat_byte(3);
        let call = PendingCall::Approve { token, spender: Address::repeat_byte(4), amount: U256::from(1u64) };
        let tx = transaction_request(&sale, Address::repeat_byte(1), &call).unwrap();
        assert_eq!(tx.to(), Some(&NameOrAddress::Address(token)));
        assert_eq!(tx.value(), None);
    }
}
