//! Token sale contract interface
//! Calls are encoded and decoded by their on-chain names, the sale is
//! addressed through raw `eth_call`/`eth_sendTransaction` requests.
use crate::chain_client::ReferralSplit;
use crate::error::CoreError;
use crate::models::InputAsset;
use ethers::abi::{parse_abi, AbiError};
use ethers::contract::BaseContract;
use ethers::types::{Address, Bytes, U256};

pub const SALE_ABI: &[&str] = &[
    "function buyWithBNB(address sponsor) external payable",
    "function buyWithUSDT(uint256 usdtAmount, address sponsor) external",
    "function quoteTokensForBNB(uint256 amount) external view returns (uint256)",
    "function quoteTokensForUSDT(uint256 usdtAmount) external view returns (uint256)",
    "function quoteReferralSplit(uint256 grossTokens) external view returns (uint256, uint256, uint256, uint256)",
    "function getUplines(address user) external view returns (address, address, address)",
];

fn abi_err(e: AbiError) -> CoreError {
    CoreError::Conversion(format!("sale contract ABI: {}", e))
}

fn quote_method(asset: InputAsset) -> &'static str {
    match asset {
        InputAsset::Native => "quoteTokensForBNB",
        InputAsset::Stable => "quoteTokensForUSDT",
    }
}

/// Encoder/decoder for the sale contract's functions.
#[derive(Debug, Clone)]
pub struct SaleInterface {
    abi: BaseContract,
}

impl SaleInterface {
    pub fn new() -> Result<Self, CoreError> {
        let abi = parse_abi(SALE_ABI).map_err(|e| CoreError::Conversion(format!("sale contract ABI: {}", e)))?;
        Ok(Self { abi: BaseContract::from(abi) })
    }

    pub fn encode_buy_native(&self, sponsor: Address) -> Result<Bytes, CoreError> {
        self.abi.encode("buyWithBNB", sponsor).map_err(abi_err)
    }

    pub fn encode_buy_stable(&self, amount: U256, sponsor: Address) -> Result<Bytes, CoreError> {
        self.abi.encode("buyWithUSDT", (amount, sponsor)).map_err(abi_err)
    }

    pub fn encode_quote(&self, asset: InputAsset, amount: U256) -> Result<Bytes, CoreError> {
        self.abi.encode(quote_method(asset), amount).map_err(abi_err)
    }

    pub fn decode_quote(&self, asset: InputAsset, output: &[u8]) -> Result<U256, CoreError> {
        self.abi.decode_output(quote_method(asset), output).map_err(abi_err)
    }

    pub fn encode_referral_split(&self, gross: U256) -> Result<Bytes, CoreError> {
        self.abi.encode("quoteReferralSplit", gross).map_err(abi_err)
    }

    pub fn decode_referral_split(&self, output: &[u8]) -> Result<ReferralSplit, CoreError> {
        let (net, tier1, tier2, tier3): (U256, U256, U256, U256) =
            self.abi.decode_output("quoteReferralSplit", output).map_err(abi_err)?;
        Ok(ReferralSplit { net, tier1, tier2, tier3 })
    }

    pub fn encode_uplines(&self, account: Address) -> Result<Bytes, CoreError> {
        self.abi.encode("getUplines", account).map_err(abi_err)
    }

    pub fn decode_uplines(&self, output: &[u8]) -> Result<[Address; 3], CoreError> {
        let (l1, l2, l3): (Address, Address, Address) = self.abi.decode_output("getUplines", output).map_err(abi_err)?;
        Ok([l1, l2, l3])
    }
}
