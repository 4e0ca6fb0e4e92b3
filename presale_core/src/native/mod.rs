// Native implementations

pub mod rpc_impl;
pub mod storage_impl;
pub mod wallet_impl;

pub use rpc_impl::EthersChainClient;
pub use storage_impl::FileDocumentStore;
pub use wallet_impl::LocalWalletSigner;
