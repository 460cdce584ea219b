//! Cambio Ledger Engine
//!
//! Double-entry conversion ledger: per-owner currency wallets, an
//! append-only journal, and the engine that converts funds between the two
//! supported currencies with all-or-nothing balance mutation.

pub mod engine;
pub mod error;
pub mod journal;
pub mod reference;
pub mod transaction;
pub mod wallet;

pub use engine::{EngineConfig, LedgerEngine};
pub use error::{LedgerError, LedgerResult};
pub use journal::{EntryType, JournalEntry, JournalStore};
pub use reference::ReferenceGenerator;
pub use transaction::{ConversionDirection, ConversionTransaction, TransactionStatus};
pub use wallet::{Wallet, WalletStore, WalletStoreConfig};
