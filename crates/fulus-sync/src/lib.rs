//! Offline transaction sync engine: hash chain and signature primitives,
//! nonce registry, payload codec, chain state, ledger, validator, conflict
//! store, and the sync orchestrator that composes them.

pub mod chain_state_store;
pub mod conflict_store;
pub mod hash_chain;
pub mod ledger;
pub mod nonce_registry;
pub mod offline_tx_store;
pub mod orchestrator;
pub mod payload_codec;
pub mod signature;
pub mod validator;

pub use orchestrator::SyncOrchestrator;
