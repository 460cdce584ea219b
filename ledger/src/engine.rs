//! Conversion engine orchestrating rates, wallets, and the journal.

use std::sync::Arc;

use cambio_common::{now, Currency, CurrencyPair, OwnerId, TransactionId, TransactionRef, WalletId};
use cambio_fx::RateOracle;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::error::{LedgerError, LedgerResult};
use crate::journal::{JournalEntry, JournalStore};
use crate::reference::ReferenceGenerator;
use crate::transaction::{settle, ConversionDirection, ConversionTransaction};
use crate::wallet::{Wallet, WalletStore};

/// Configuration for the ledger engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attempts at generating an unused reference before giving up.
    pub max_reference_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reference_attempts: 5,
        }
    }
}

/// The conversion engine.
///
/// Orchestrates one conversion end to end: rate acquisition, settlement
/// pricing, funds validation, and the atomic balance/journal commit. The
/// acting owner is always an explicit parameter; the engine reads no
/// ambient request state.
pub struct LedgerEngine {
    oracle: Arc<RateOracle>,
    wallets: Arc<WalletStore>,
    journal: Arc<JournalStore>,
    references: ReferenceGenerator,
    config: EngineConfig,
}

impl LedgerEngine {
    /// Create an engine with default configuration.
    pub fn new(
        oracle: Arc<RateOracle>,
        wallets: Arc<WalletStore>,
        journal: Arc<JournalStore>,
    ) -> Self {
        Self::with_config(oracle, wallets, journal, EngineConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(
        oracle: Arc<RateOracle>,
        wallets: Arc<WalletStore>,
        journal: Arc<JournalStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            oracle,
            wallets,
            journal,
            references: ReferenceGenerator::new(),
            config,
        }
    }

    /// The supported pair, base into quote.
    pub fn pair(&self) -> &CurrencyPair {
        self.oracle.configured_pair()
    }

    /// The rate oracle, exposing the read-only capture history.
    pub fn oracle(&self) -> &RateOracle {
        &self.oracle
    }

    /// Create the owner's two supported wallets at zero balance. Idempotent:
    /// existing wallets are returned untouched.
    #[instrument(skip(self), fields(owner = %owner_id))]
    pub fn onboard_owner(&self, owner_id: &OwnerId) -> (Wallet, Wallet) {
        let pair = self.pair().clone();
        let base = self.wallets.get_or_create(owner_id, &pair.base);
        let quote = self.wallets.get_or_create(owner_id, &pair.quote);
        (base, quote)
    }

    /// Convert funds between the owner's two wallets.
    ///
    /// The rate fetch happens strictly before any wallet lock. Once both
    /// locks are held the commit runs to completion; every failure path
    /// leaves wallet balances and the journal untouched.
    ///
    /// There is no idempotency key: retrying an identical call creates a
    /// new transaction with a new reference.
    #[instrument(skip(self), fields(owner = %owner_id, direction = ?direction, amount = %source_amount))]
    pub async fn convert(
        &self,
        owner_id: &OwnerId,
        direction: ConversionDirection,
        source_amount: Decimal,
    ) -> LedgerResult<ConversionTransaction> {
        if source_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(source_amount));
        }

        let (source_currency, dest_currency) = direction.currencies(self.pair());

        let rate = self
            .oracle
            .get_rate(&source_currency, &dest_currency)
            .await?;
        let settlement_amount = settle(direction, source_amount, &rate)?;

        let (transaction, _, _) =
            self.wallets
                .with_pair(owner_id, &source_currency, &dest_currency, |source, dest| {
                    if !source.has_sufficient_funds(source_amount) {
                        return Err(LedgerError::InsufficientFunds {
                            requested: source_amount,
                            available: source.balance,
                        });
                    }

                    let reference = self.reserve_reference()?;

                    source.balance -= source_amount;
                    source.version += 1;
                    source.last_sync = now();

                    dest.balance += settlement_amount;
                    dest.version += 1;
                    dest.last_sync = now();

                    let transaction = ConversionTransaction::completed(
                        reference,
                        owner_id.clone(),
                        direction,
                        source_amount,
                        &rate,
                        settlement_amount,
                    );

                    let debit = JournalEntry::debit(
                        source.id,
                        Some(transaction.id),
                        source_amount,
                        source.balance,
                    );
                    let credit = JournalEntry::credit(
                        dest.id,
                        Some(transaction.id),
                        settlement_amount,
                        dest.balance,
                    );

                    Ok(self.journal.commit(transaction, debit, credit))
                })?;

        info!(
            transaction = %transaction.id,
            reference = %transaction.reference,
            rate = %transaction.applied_rate,
            settlement = %transaction.settlement_amount,
            "Conversion completed"
        );

        Ok(transaction)
    }

    /// Deposit funds into the owner's wallet in `currency`.
    pub fn deposit(
        &self,
        owner_id: &OwnerId,
        currency: &Currency,
        amount: Decimal,
    ) -> LedgerResult<JournalEntry> {
        self.wallets.deposit(&self.journal, owner_id, currency, amount)
    }

    fn reserve_reference(&self) -> LedgerResult<TransactionRef> {
        for _ in 0..self.config.max_reference_attempts {
            let candidate = self.references.generate();
            if self.journal.reserve_reference(&candidate) {
                return Ok(candidate);
            }
            debug!(reference = %candidate, "Reference already taken, regenerating");
        }

        Err(LedgerError::ReferenceCollision)
    }

    // Read-only interfaces for reporting collaborators. None of these
    // mutate ledger state.

    /// Snapshot the owner's wallet in `currency`.
    pub fn wallet(&self, owner_id: &OwnerId, currency: &Currency) -> Option<Wallet> {
        self.wallets
            .find(owner_id, currency)
            .and_then(|id| self.wallets.get(id))
    }

    /// Snapshot all wallets belonging to an owner.
    pub fn wallets_for_owner(&self, owner_id: &OwnerId) -> Vec<Wallet> {
        self.wallets.list_by_owner(owner_id)
    }

    /// Transactions executed for an owner.
    pub fn transactions_for_owner(&self, owner_id: &OwnerId) -> Vec<ConversionTransaction> {
        self.journal.transactions_for_owner(owner_id)
    }

    /// Look up a transaction by ID.
    pub fn transaction(&self, transaction_id: TransactionId) -> Option<ConversionTransaction> {
        self.journal.transaction(transaction_id)
    }

    /// Look up a transaction by reference code.
    pub fn transaction_by_reference(
        &self,
        reference: &TransactionRef,
    ) -> Option<ConversionTransaction> {
        self.journal.transaction_by_reference(reference)
    }

    /// Journal entries recorded against one wallet.
    pub fn entries_for_wallet(&self, wallet_id: WalletId) -> Vec<JournalEntry> {
        self.journal.entries_for_wallet(wallet_id)
    }

    /// Journal entries settling one transaction.
    pub fn entries_for_transaction(&self, transaction_id: TransactionId) -> Vec<JournalEntry> {
        self.journal.entries_for_transaction(transaction_id)
    }

    /// Journal entries whose sequence falls in `[start, end)`.
    pub fn entries_in_range(&self, start: u64, end: u64) -> Vec<JournalEntry> {
        self.journal.entries_in_range(start, end)
    }

    /// All journal entries across the owner's wallets, in commit order.
    pub fn journal_for_owner(&self, owner_id: &OwnerId) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self
            .wallets
            .list_by_owner(owner_id)
            .into_iter()
            .flat_map(|wallet| self.journal.entries_for_wallet(wallet.id))
            .collect();
        entries.sort_by_key(|e| e.sequence);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::EntryType;
    use cambio_fx::{MockQuoteSource, OracleConfig};
    use rust_decimal_macros::dec;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();
    }

    fn amina() -> OwnerId {
        OwnerId::new("amina_k")
    }

    /// Engine over a mock source quoting USDMAD and USDRWF.
    fn setup_with_quotes(
        usd_mad: Decimal,
        usd_rwf: Decimal,
    ) -> (Arc<MockQuoteSource>, LedgerEngine) {
        let source = Arc::new(MockQuoteSource::new());
        source.set_quote("USDMAD", usd_mad);
        source.set_quote("USDRWF", usd_rwf);

        let oracle = Arc::new(RateOracle::new(source.clone(), OracleConfig::default()));
        let engine = LedgerEngine::new(
            oracle,
            Arc::new(WalletStore::new()),
            Arc::new(JournalStore::new()),
        );

        (source, engine)
    }

    /// Equal legs make both cross rates exactly 1.000000.
    fn setup_unit_rate() -> (Arc<MockQuoteSource>, LedgerEngine) {
        setup_with_quotes(dec!(100), dec!(100))
    }

    #[tokio::test]
    async fn test_base_to_quote_conversion() {
        init_tracing();
        // 74 / 10000 makes the RWF->MAD rate exactly 0.0074.
        let (_, engine) = setup_with_quotes(dec!(74), dec!(10000));
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::rwf(), dec!(100)).unwrap();

        let tx = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(100))
            .await
            .unwrap();

        assert_eq!(tx.status, crate::transaction::TransactionStatus::Completed);
        assert_eq!(tx.applied_rate, dec!(0.0074));
        assert_eq!(tx.settlement_amount, dec!(0.740000));
        assert!(tx.reference.is_valid());
        assert!(tx.completed_at.is_some());

        let rwf = engine.wallet(&amina(), &Currency::rwf()).unwrap();
        let mad = engine.wallet(&amina(), &Currency::mad()).unwrap();
        assert_eq!(rwf.balance, Decimal::ZERO);
        assert_eq!(mad.balance, dec!(0.74));
        assert_eq!(rwf.version, 2); // deposit + conversion
        assert_eq!(mad.version, 1);

        let entries = engine.entries_for_transaction(tx.id);
        assert_eq!(entries.len(), 2);

        let debit = entries.iter().find(|e| e.entry_type == EntryType::Debit).unwrap();
        let credit = entries.iter().find(|e| e.entry_type == EntryType::Credit).unwrap();
        assert_eq!(debit.wallet_id, rwf.id);
        assert_eq!(debit.amount, dec!(100));
        assert_eq!(debit.balance_after, rwf.balance);
        assert_eq!(credit.wallet_id, mad.id);
        assert_eq!(credit.amount, dec!(0.74));
        assert_eq!(credit.balance_after, mad.balance);
    }

    #[tokio::test]
    async fn test_quote_to_base_applies_flat_discount() {
        let (_, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::mad(), dec!(115)).unwrap();

        let tx = engine
            .convert(&amina(), ConversionDirection::QuoteToBase, dec!(115))
            .await
            .unwrap();

        assert_eq!(tx.applied_rate, dec!(1.000000));
        assert_eq!(tx.settlement_amount, dec!(100.000000));

        let mad = engine.wallet(&amina(), &Currency::mad()).unwrap();
        let rwf = engine.wallet(&amina(), &Currency::rwf()).unwrap();
        assert_eq!(mad.balance, Decimal::ZERO);
        assert_eq!(rwf.balance, dec!(100));
    }

    #[tokio::test]
    async fn test_settlement_below_zero_has_no_side_effects() {
        let (_, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::mad(), dec!(115)).unwrap();
        let entries_before = engine.entries_in_range(0, u64::MAX).len();

        // 10 * 1.00 - 15 settles negative.
        let result = engine
            .convert(&amina(), ConversionDirection::QuoteToBase, dec!(10))
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::SettlementBelowZero(v)) if v == dec!(-5)
        ));

        let mad = engine.wallet(&amina(), &Currency::mad()).unwrap();
        let rwf = engine.wallet(&amina(), &Currency::rwf()).unwrap();
        assert_eq!(mad.balance, dec!(115));
        assert_eq!(rwf.balance, Decimal::ZERO);
        assert_eq!(engine.entries_in_range(0, u64::MAX).len(), entries_before);
        assert!(engine.transactions_for_owner(&amina()).is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected_before_any_fetch() {
        let (_, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());

        let zero = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, Decimal::ZERO)
            .await;
        let negative = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(-10))
            .await;

        assert!(matches!(zero, Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(negative, Err(LedgerError::InvalidAmount(_))));
        // Validation happens before the oracle is consulted.
        assert!(engine.oracle().history().is_empty());
    }

    #[tokio::test]
    async fn test_missing_wallet() {
        let (_, engine) = setup_unit_rate();

        let result = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(10))
            .await;

        assert!(matches!(result, Err(LedgerError::WalletNotFound { .. })));
    }

    #[tokio::test]
    async fn test_insufficient_funds_has_no_side_effects() {
        let (_, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::rwf(), dec!(50)).unwrap();

        let result = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(100))
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { requested, available })
                if requested == dec!(100) && available == dec!(50)
        ));

        let rwf = engine.wallet(&amina(), &Currency::rwf()).unwrap();
        let mad = engine.wallet(&amina(), &Currency::mad()).unwrap();
        assert_eq!(rwf.balance, dec!(50));
        assert_eq!(mad.balance, Decimal::ZERO);
        assert!(engine.transactions_for_owner(&amina()).is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_has_no_side_effects() {
        let (source, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::rwf(), dec!(100)).unwrap();
        source.set_unavailable(true);

        let result = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(40))
            .await;

        assert!(matches!(result, Err(LedgerError::UpstreamUnavailable(_))));

        let rwf = engine.wallet(&amina(), &Currency::rwf()).unwrap();
        assert_eq!(rwf.balance, dec!(100));
        assert!(engine.oracle().history().is_empty());
        assert!(engine.transactions_for_owner(&amina()).is_empty());
    }

    #[tokio::test]
    async fn test_retried_call_creates_a_new_transaction() {
        let (_, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::rwf(), dec!(100)).unwrap();

        let first = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(25))
            .await
            .unwrap();
        let second = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(25))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_ne!(first.reference, second.reference);
        assert_eq!(engine.transactions_for_owner(&amina()).len(), 2);
    }

    #[tokio::test]
    async fn test_deposit_then_convert_everything_out() {
        let (_, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());
        let bystander = OwnerId::new("jean_bosco");
        engine.onboard_owner(&bystander);

        engine.deposit(&amina(), &Currency::rwf(), dec!(55)).unwrap();
        let tx = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(55))
            .await
            .unwrap();

        let entries = engine.entries_for_transaction(tx.id);
        let debit = entries.iter().find(|e| e.entry_type == EntryType::Debit).unwrap();
        assert_eq!(debit.amount, dec!(55));

        let rwf = engine.wallet(&amina(), &Currency::rwf()).unwrap();
        assert_eq!(rwf.balance, Decimal::ZERO);

        // Only the conversion's two wallets were touched.
        for wallet in engine.wallets_for_owner(&bystander) {
            assert_eq!(wallet.balance, Decimal::ZERO);
            assert!(engine.entries_for_wallet(wallet.id).is_empty());
        }
    }

    #[tokio::test]
    async fn test_read_interfaces_expose_committed_state() {
        let (_, engine) = setup_unit_rate();
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::rwf(), dec!(100)).unwrap();
        let tx = engine
            .convert(&amina(), ConversionDirection::BaseToQuote, dec!(30))
            .await
            .unwrap();

        assert_eq!(engine.wallets_for_owner(&amina()).len(), 2);
        assert_eq!(engine.transaction(tx.id).unwrap().id, tx.id);
        assert_eq!(
            engine.transaction_by_reference(&tx.reference).unwrap().id,
            tx.id
        );

        let journal = engine.journal_for_owner(&amina());
        assert_eq!(journal.len(), 3); // deposit + debit + credit
        assert!(journal.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conversions_never_overdraw() {
        init_tracing();
        let (_, engine) = setup_unit_rate();
        let engine = Arc::new(engine);
        engine.onboard_owner(&amina());
        engine.deposit(&amina(), &Currency::rwf(), dec!(100)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .convert(&amina(), ConversionDirection::BaseToQuote, dec!(30))
                    .await
            }));
        }

        let mut accepted = 0u32;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(LedgerError::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let rwf = engine.wallet(&amina(), &Currency::rwf()).unwrap();
        let mad = engine.wallet(&amina(), &Currency::mad()).unwrap();

        // Three 30-unit debits fit in 100; the rest must be rejected.
        assert_eq!(accepted, 3);
        assert_eq!(rwf.balance, dec!(10));
        assert_eq!(mad.balance, dec!(90));
        assert!(rwf.balance >= Decimal::ZERO);
        assert_eq!(
            Decimal::from(accepted) * dec!(30),
            dec!(100) - rwf.balance
        );
        assert_eq!(engine.transactions_for_owner(&amina()).len(), 3);
    }

    #[tokio::test]
    async fn test_onboarding_is_idempotent() {
        let (_, engine) = setup_unit_rate();

        let (base, quote) = engine.onboard_owner(&amina());
        let (base_again, quote_again) = engine.onboard_owner(&amina());

        assert_eq!(base.id, base_again.id);
        assert_eq!(quote.id, quote_again.id);
        assert_eq!(base.currency, Currency::rwf());
        assert_eq!(quote.currency, Currency::mad());
        assert_eq!(engine.wallets_for_owner(&amina()).len(), 2);
    }
}
