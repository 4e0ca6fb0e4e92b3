// Presale Core Library
// Purchase-flow orchestration for a token sale: amounts, quotes, guards,
// gas, transaction sequencing and the confirmed-transaction ledger

pub mod amount;
pub mod chain_client;
pub mod confirmation;
pub mod contracts;
pub mod document_store;
pub mod error;
pub mod gas;
pub mod guards;
pub mod ledger;
pub mod models;
pub mod purchase_service;
pub mod quote;
pub mod referral;
pub mod sequencer;
pub mod session;
pub mod settings;
pub mod staking;
pub mod wallet;

#[cfg(feature = "native")]
pub mod native;

// Re-exports
pub use chain_client::*;
pub use document_store::{DocumentStore, MemoryDocumentStore, StoreResult};
pub use error::{CoreError, TxFailure};
pub use ledger::{LedgerWriter, RecordOutcome};
pub use models::*;
pub use purchase_service::*;
pub use sequencer::{FlowKind, FlowOutcome, FlowPlan, FlowRunner, FlowState, Sequencer, Stage};
pub use session::{Session, SessionHandle};
pub use settings::Settings;
pub use wallet::*;
