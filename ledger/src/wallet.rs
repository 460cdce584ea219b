//! Wallet state and the per-wallet locking store.

use std::sync::Arc;
use std::time::Duration;

use cambio_common::{now, Currency, OwnerId, Timestamp, WalletId};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::journal::{JournalEntry, JournalStore};

/// A per-owner, per-currency balance account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet ID; also the global lock-ordering key.
    pub id: WalletId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Wallet currency.
    pub currency: Currency,
    /// Human-readable account number.
    pub account_number: String,
    /// Current balance. Never negative.
    pub balance: Decimal,
    /// Bumped on every committed mutation.
    pub version: u64,
    /// When the wallet state last changed.
    pub last_sync: Timestamp,
}

impl Wallet {
    /// Create a new zero-balance wallet.
    pub fn new(owner_id: OwnerId, currency: Currency) -> Self {
        let account_number = format!("WALLET-{}-{}", currency.code(), owner_id);
        Self {
            id: WalletId::new(),
            owner_id,
            currency,
            account_number,
            balance: Decimal::ZERO,
            version: 0,
            last_sync: now(),
        }
    }

    /// Check the wallet can cover a debit of `amount`.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Shared handle to one wallet's lockable state.
#[derive(Clone)]
struct WalletHandle {
    id: WalletId,
    state: Arc<Mutex<Wallet>>,
}

/// Configuration for the wallet store.
#[derive(Debug, Clone)]
pub struct WalletStoreConfig {
    /// Bound on waiting for a wallet lock before surfacing `Conflict`.
    pub lock_timeout: Duration,
}

impl Default for WalletStoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Owns per-wallet balance state.
///
/// Every balance-affecting operation runs under that wallet's exclusive
/// mutex, held for the whole read-check-mutate-write span. Wallets are
/// created at first use and never removed.
pub struct WalletStore {
    wallets: DashMap<WalletId, Arc<Mutex<Wallet>>>,
    index: DashMap<(OwnerId, Currency), WalletHandle>,
    config: WalletStoreConfig,
}

impl WalletStore {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(WalletStoreConfig::default())
    }

    /// Create a store with custom configuration.
    pub fn with_config(config: WalletStoreConfig) -> Self {
        Self {
            wallets: DashMap::new(),
            index: DashMap::new(),
            config,
        }
    }

    /// Get the owner's wallet in `currency`, creating it at zero balance if
    /// this is the first use.
    pub fn get_or_create(&self, owner_id: &OwnerId, currency: &Currency) -> Wallet {
        let handle = self
            .index
            .entry((owner_id.clone(), currency.clone()))
            .or_insert_with(|| {
                let wallet = Wallet::new(owner_id.clone(), currency.clone());
                let handle = WalletHandle {
                    id: wallet.id,
                    state: Arc::new(Mutex::new(wallet)),
                };
                self.wallets.insert(handle.id, handle.state.clone());

                info!(
                    wallet = %handle.id,
                    owner = %owner_id,
                    currency = %currency,
                    "Created wallet"
                );

                handle
            })
            .clone();

        let wallet = handle.state.lock().clone();
        wallet
    }

    /// Look up the owner's wallet ID in `currency`.
    pub fn find(&self, owner_id: &OwnerId, currency: &Currency) -> Option<WalletId> {
        self.index
            .get(&(owner_id.clone(), currency.clone()))
            .map(|h| h.id)
    }

    /// Snapshot one wallet by ID.
    pub fn get(&self, wallet_id: WalletId) -> Option<Wallet> {
        self.wallets.get(&wallet_id).map(|s| s.lock().clone())
    }

    /// Snapshot all wallets belonging to an owner, ordered by currency code.
    pub fn list_by_owner(&self, owner_id: &OwnerId) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self
            .index
            .iter()
            .filter(|entry| &entry.key().0 == owner_id)
            .map(|entry| entry.value().state.lock().clone())
            .collect();
        wallets.sort_by(|a, b| a.currency.code().cmp(b.currency.code()));
        wallets
    }

    /// Deposit into the owner's wallet, appending the credit journal line
    /// under the wallet lock.
    pub fn deposit(
        &self,
        journal: &JournalStore,
        owner_id: &OwnerId,
        currency: &Currency,
        amount: Decimal,
    ) -> LedgerResult<JournalEntry> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let handle = self.handle(owner_id, currency)?;
        let mut wallet = self.lock_bounded(&handle)?;

        wallet.balance += amount;
        wallet.version += 1;
        wallet.last_sync = now();

        let entry = JournalEntry::credit(wallet.id, None, amount, wallet.balance)
            .with_description("deposit");
        let entry = journal.append_entry(entry);

        info!(
            wallet = %wallet.id,
            amount = %amount,
            balance = %wallet.balance,
            "Deposit committed"
        );

        Ok(entry)
    }

    /// Run `f` with both wallets locked.
    ///
    /// Locks are always acquired in ascending `WalletId` order regardless of
    /// which wallet is debited, so opposite-direction conversions cannot
    /// deadlock; `f` still receives the guards in the caller's order. Both
    /// wallets must be distinct.
    pub fn with_pair<R>(
        &self,
        owner_id: &OwnerId,
        first: &Currency,
        second: &Currency,
        f: impl FnOnce(&mut Wallet, &mut Wallet) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        let first_handle = self.handle(owner_id, first)?;
        let second_handle = self.handle(owner_id, second)?;

        let (lo, hi) = if first_handle.id < second_handle.id {
            (&first_handle, &second_handle)
        } else {
            (&second_handle, &first_handle)
        };

        let mut lo_guard = self.lock_bounded(lo)?;
        let mut hi_guard = self.lock_bounded(hi)?;

        if first_handle.id < second_handle.id {
            f(&mut lo_guard, &mut hi_guard)
        } else {
            f(&mut hi_guard, &mut lo_guard)
        }
    }

    fn handle(&self, owner_id: &OwnerId, currency: &Currency) -> LedgerResult<WalletHandle> {
        self.index
            .get(&(owner_id.clone(), currency.clone()))
            .map(|h| h.clone())
            .ok_or_else(|| LedgerError::WalletNotFound {
                owner: owner_id.clone(),
                currency: currency.clone(),
            })
    }

    fn lock_bounded<'a>(&self, handle: &'a WalletHandle) -> LedgerResult<MutexGuard<'a, Wallet>> {
        handle
            .state
            .try_lock_for(self.config.lock_timeout)
            .ok_or(LedgerError::Conflict(handle.id))
    }
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new()
    }
}
