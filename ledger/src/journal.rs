//! Journal entries and the append-only journal store.

use cambio_common::{
    now, JournalEntryId, OwnerId, Timestamp, TransactionId, TransactionRef, WalletId,
};
use dashmap::DashSet;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::transaction::ConversionTransaction;

/// Type of journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Funds leaving a wallet.
    Debit,
    /// Funds entering a wallet.
    Credit,
}

/// A single immutable movement against a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID.
    pub id: JournalEntryId,
    /// Append ordinal assigned by the store; the id-range key for
    /// collaborator queries.
    pub sequence: u64,
    /// Wallet affected.
    pub wallet_id: WalletId,
    /// Conversion this entry settles, if any. Deposits carry `None`.
    pub transaction_id: Option<TransactionId>,
    /// Entry type (debit or credit).
    pub entry_type: EntryType,
    /// Amount moved.
    pub amount: Decimal,
    /// Wallet balance after this movement committed.
    pub balance_after: Decimal,
    /// Value date of the movement.
    pub value_date: Timestamp,
    /// Free-form description ("deposit" for owner deposits).
    pub description: Option<String>,
    /// When this entry was recorded.
    pub recorded_at: Timestamp,
}

impl JournalEntry {
    /// Create a debit entry.
    pub fn debit(
        wallet_id: WalletId,
        transaction_id: Option<TransactionId>,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self::new(wallet_id, transaction_id, EntryType::Debit, amount, balance_after)
    }

    /// Create a credit entry.
    pub fn credit(
        wallet_id: WalletId,
        transaction_id: Option<TransactionId>,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self::new(wallet_id, transaction_id, EntryType::Credit, amount, balance_after)
    }

    fn new(
        wallet_id: WalletId,
        transaction_id: Option<TransactionId>,
        entry_type: EntryType,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        let timestamp = now();
        Self {
            id: JournalEntryId::new(),
            sequence: 0,
            wallet_id,
            transaction_id,
            entry_type,
            amount,
            balance_after,
            value_date: timestamp,
            description: None,
            recorded_at: timestamp,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Default)]
struct JournalInner {
    entries: Vec<JournalEntry>,
    transactions: Vec<ConversionTransaction>,
}

/// Append-only store of journal lines and conversion-transaction records.
///
/// The public surface exposes no update or delete. A conversion commits its
/// transaction record and both journal lines under one write lock, so a
/// reader can never observe one line of a conversion without the other.
#[derive(Default)]
pub struct JournalStore {
    inner: RwLock<JournalInner>,
    references: DashSet<TransactionRef>,
}

impl JournalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserve a reference code. Returns false if it is already
    /// taken, in which case the caller must generate a fresh code.
    pub fn reserve_reference(&self, reference: &TransactionRef) -> bool {
        self.references.insert(reference.clone())
    }

    /// Check whether a reference code is in use.
    pub fn contains_reference(&self, reference: &TransactionRef) -> bool {
        self.references.contains(reference)
    }

    /// Append a standalone entry (deposits).
    pub fn append_entry(&self, mut entry: JournalEntry) -> JournalEntry {
        let mut inner = self.inner.write();
        entry.sequence = inner.entries.len() as u64;
        inner.entries.push(entry.clone());

        debug!(
            entry = %entry.id,
            wallet = %entry.wallet_id,
            amount = %entry.amount,
            "Appended journal entry"
        );

        entry
    }

    /// Commit a conversion: the transaction record plus its debit and credit
    /// lines, as one boundary.
    pub fn commit(
        &self,
        transaction: ConversionTransaction,
        mut debit: JournalEntry,
        mut credit: JournalEntry,
    ) -> (ConversionTransaction, JournalEntry, JournalEntry) {
        let mut inner = self.inner.write();

        debit.sequence = inner.entries.len() as u64;
        credit.sequence = debit.sequence + 1;

        inner.entries.push(debit.clone());
        inner.entries.push(credit.clone());
        inner.transactions.push(transaction.clone());

        info!(
            transaction = %transaction.id,
            reference = %transaction.reference,
            "Committed conversion to journal"
        );

        (transaction, debit, credit)
    }

    /// Entries recorded against one wallet, oldest first.
    pub fn entries_for_wallet(&self, wallet_id: WalletId) -> Vec<JournalEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .cloned()
            .collect()
    }

    /// Entries settling one transaction.
    pub fn entries_for_transaction(&self, transaction_id: TransactionId) -> Vec<JournalEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| e.transaction_id == Some(transaction_id))
            .cloned()
            .collect()
    }

    /// Entries whose sequence falls in `[start, end)`.
    pub fn entries_in_range(&self, start: u64, end: u64) -> Vec<JournalEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| e.sequence >= start && e.sequence < end)
            .cloned()
            .collect()
    }

    /// Transactions executed for one owner, oldest first.
    pub fn transactions_for_owner(&self, owner_id: &OwnerId) -> Vec<ConversionTransaction> {
        self.inner
            .read()
            .transactions
            .iter()
            .filter(|t| &t.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// Look up a transaction by ID.
    pub fn transaction(&self, transaction_id: TransactionId) -> Option<ConversionTransaction> {
        self.inner
            .read()
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .cloned()
    }

    /// Look up a transaction by reference code.
    pub fn transaction_by_reference(
        &self,
        reference: &TransactionRef,
    ) -> Option<ConversionTransaction> {
        self.inner
            .read()
            .transactions
            .iter()
            .find(|t| &t.reference == reference)
            .cloned()
    }

    /// Total number of journal entries.
    pub fn entry_count(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Total number of transaction records.
    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }
}
