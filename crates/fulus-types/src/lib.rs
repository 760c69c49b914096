//! Wire types and persistent data model for the Fulus mobile-money core.
//!
//! This crate holds no behavior beyond construction, validation of basic
//! invariants, and (de)serialization. The sync engine (`fulus-sync`) and the
//! chat/function-calling layer (`fulus-chat`) build their logic on top of
//! these types.

pub mod chain_state;
pub mod conflict;
pub mod conversation;
pub mod hexbytes;
pub mod ledger;
pub mod nonce;
pub mod offline_tx;
pub mod sync_result;

pub use chain_state::ChainState;
pub use conflict::{ConflictStatus, ConflictType, SyncConflict};
pub use conversation::{Conversation, Message, MessageRole};
pub use hexbytes::{Base64Blob, HexHash, GENESIS_HASH};
pub use ledger::{LedgerEntryType, LedgerTransaction};
pub use nonce::UsedNonce;
pub use offline_tx::{OfflineTx, TxStatus};
pub use sync_result::{SyncOutcome, SyncResult};
