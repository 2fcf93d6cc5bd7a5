//! Main ledger orchestration layer
//!
//! Ties storage and metrics together into the atomic "apply ledger
//! entry" primitive every balance mutation funnels through.
//!
//! # Example
//!
//! ```no_run
//! use coin_ledger::{Config, CoinLedger, EntryDraft, EntryKind};
//! use uuid::Uuid;
//!
//! fn main() -> coin_ledger::Result<()> {
//!     let ledger = CoinLedger::open(Config::default())?;
//!
//!     let account = ledger.create_account(Uuid::new_v4())?;
//!     let draft = EntryDraft::new(account.account_id, EntryKind::AdminCredit, 100);
//!     let applied = ledger.apply(draft, None)?;
//!     assert_eq!(applied.account.coins, 100);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    metrics::Metrics,
    storage::{SideRecord, StorageStats},
    types::{
        Account, EntryDraft, EntryFilter, EntryKind, LedgerEntry, PurchaseRequest,
        WithdrawalRequest,
    },
    Config, Error, Result, Storage,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Outcome of a successful apply
#[derive(Debug, Clone)]
pub struct Applied {
    /// The immutable entry that was recorded
    pub entry: LedgerEntry,
    /// The account state after the delta
    pub account: Account,
}

/// Main ledger interface
///
/// All mutations of one account serialize on a per-account lock; the
/// storage layer's version guard backstops the invariant with a bounded
/// retry on `Conflict`.
pub struct CoinLedger {
    /// Storage backend
    storage: Arc<Storage>,

    /// Per-account mutation locks
    locks: DashMap<Uuid, Arc<Mutex<()>>>,

    /// Prometheus metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl CoinLedger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new().map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            storage,
            locks: DashMap::new(),
            metrics,
            config,
        })
    }

    fn lock_for(&self, account_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(account_id).or_default().clone()
    }

    // Account operations

    /// Create a fresh account
    ///
    /// Fails with `Conflict` if the account already exists.
    pub fn create_account(&self, account_id: Uuid) -> Result<Account> {
        let lock = self.lock_for(account_id);
        let _guard = lock.lock();

        if self.storage.account_exists(account_id)? {
            return Err(Error::Conflict(format!(
                "account {} already exists",
                account_id
            )));
        }

        let account = Account::new(account_id);
        self.storage.put_account(&account)?;

        tracing::info!(account_id = %account_id, "Account created");

        Ok(account)
    }

    /// Get account state
    pub fn get_account(&self, account_id: Uuid) -> Result<Account> {
        self.storage.get_account(account_id)
    }

    /// Atomically read-modify-write non-balance account state
    ///
    /// Used for the daily link-quota reset/increment and the completed-links
    /// counter; the closure runs under the account's mutation lock and may
    /// fail, in which case nothing is persisted. Balance fields must not be
    /// touched here - that is what [`CoinLedger::apply`] is for.
    pub fn update_account<E, F>(&self, account_id: Uuid, f: F) -> std::result::Result<Account, E>
    where
        E: From<Error>,
        F: FnOnce(&mut Account) -> std::result::Result<(), E>,
    {
        let lock = self.lock_for(account_id);
        let _guard = lock.lock();

        let mut account = self.storage.get_account(account_id)?;
        let coins_before = account.coins;

        f(&mut account)?;

        // The closure must not move money outside the ledger
        if account.coins != coins_before {
            return Err(
                Error::InvalidEntry("balance mutated outside apply".to_string()).into(),
            );
        }

        account.version += 1;
        account.updated_at = Utc::now();
        self.storage.put_account(&account)?;

        Ok(account)
    }

    // The apply primitive

    /// Apply a balance delta and record the matching ledger entry
    ///
    /// Computes `balance_before`/`balance_after` from the account's current
    /// state, enforces the min-balance floor and the (account, code)
    /// redemption uniqueness, updates the rolling earned/spent totals, and
    /// commits entry + account (+ optional side record) in one atomic batch.
    /// Version conflicts are retried a bounded number of times before
    /// surfacing.
    pub fn apply(&self, draft: EntryDraft, side: Option<SideRecord<'_>>) -> Result<Applied> {
        if draft.amount == 0 {
            return Err(Error::InvalidEntry("amount must be non-zero".to_string()));
        }
        if draft.kind == EntryKind::CodeRedeemed && draft.code.is_none() {
            return Err(Error::InvalidEntry(
                "CodeRedeemed entry requires a code".to_string(),
            ));
        }

        let lock = self.lock_for(draft.account_id);
        let _guard = lock.lock();

        let started = Instant::now();
        let mut attempts = 0;
        loop {
            match self.try_apply(&draft, side) {
                Ok(applied) => {
                    self.metrics.record_apply(started.elapsed().as_secs_f64());
                    return Ok(applied);
                }
                Err(Error::Conflict(msg)) => {
                    self.metrics.record_conflict();
                    attempts += 1;
                    if attempts >= self.config.max_apply_retries {
                        return Err(Error::Conflict(msg));
                    }
                    tracing::warn!(
                        account_id = %draft.account_id,
                        attempt = attempts,
                        "Version conflict on apply, retrying"
                    );
                }
                Err(e @ Error::InsufficientBalance { .. }) => {
                    self.metrics.record_rejected_debit();
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_apply(&self, draft: &EntryDraft, side: Option<SideRecord<'_>>) -> Result<Applied> {
        let mut account = self.storage.get_account(draft.account_id)?;

        // Check-then-append is safe here: the caller holds the account lock,
        // and the uniqueness key is written in the same batch as the entry.
        if draft.kind == EntryKind::CodeRedeemed {
            let code = draft.code.as_deref().ok_or_else(|| {
                Error::InvalidEntry("CodeRedeemed entry requires a code".to_string())
            })?;
            if self.storage.redemption_exists(draft.account_id, code)? {
                return Err(Error::AlreadyRedeemed {
                    account_id: draft.account_id,
                    code: code.to_string(),
                });
            }
        }

        let balance_before = account.coins;
        let balance_after = balance_before.checked_add(draft.amount).ok_or_else(|| {
            Error::InvalidEntry(format!(
                "amount {} overflows balance {}",
                draft.amount, balance_before
            ))
        })?;
        if balance_after < draft.min_balance {
            return Err(Error::InsufficientBalance {
                account_id: draft.account_id,
                available: balance_before,
                required: draft.min_balance.saturating_sub(draft.amount),
            });
        }

        if draft.amount > 0 && draft.kind.counts_as_earning() {
            account.total_coins_earned = account
                .total_coins_earned
                .checked_add(draft.amount)
                .ok_or_else(|| Error::InvalidEntry("earned total overflow".to_string()))?;
        }
        if draft.amount < 0 && draft.kind.counts_as_spend() {
            account.total_coins_spent = account
                .total_coins_spent
                .checked_add(-draft.amount)
                .ok_or_else(|| Error::InvalidEntry("spent total overflow".to_string()))?;
        }

        let now = Utc::now();
        account.coins = balance_after;
        account.version += 1;
        account.updated_at = now;

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id: draft.account_id,
            kind: draft.kind,
            amount: draft.amount,
            balance_before,
            balance_after,
            description: draft.description.clone(),
            reference: draft.reference.clone(),
            code: draft.code.clone(),
            meta: draft.meta.clone(),
            timestamp: now,
        };

        self.storage.apply_atomic(&entry, &account, side)?;

        Ok(Applied { entry, account })
    }

    // Queries

    /// Get an account's entries ordered by timestamp ascending
    pub fn entries_for_account(
        &self,
        account_id: Uuid,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>> {
        self.storage.entries_for_account(account_id, filter)
    }

    /// Whether a (account, code) redemption entry exists
    pub fn redemption_exists(&self, account_id: Uuid, code: &str) -> Result<bool> {
        self.storage.redemption_exists(account_id, code)
    }

    /// Recompute the balance from the entry history
    ///
    /// The reconciliation invariant: this must always equal the account's
    /// current `coins`.
    pub fn rebuild_balance(&self, account_id: Uuid) -> Result<i64> {
        let entries = self
            .storage
            .entries_for_account(account_id, &EntryFilter::default())?;
        Ok(entries.iter().map(|e| e.amount).sum())
    }

    /// Check the reconciliation invariant for one account
    pub fn check_reconciliation(&self, account_id: Uuid) -> Result<bool> {
        let account = self.storage.get_account(account_id)?;
        let rebuilt = self.rebuild_balance(account_id)?;
        Ok(account.coins == rebuilt)
    }

    // Request records

    /// Get withdrawal request by ID
    pub fn get_withdrawal(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        self.storage.get_withdrawal(request_id)
    }

    /// Store a withdrawal request (non-balance transitions)
    pub fn put_withdrawal(&self, request: &WithdrawalRequest) -> Result<()> {
        self.storage.put_withdrawal(request)
    }

    /// Get purchase request by ID
    pub fn get_purchase(&self, request_id: Uuid) -> Result<PurchaseRequest> {
        self.storage.get_purchase(request_id)
    }

    /// Store a purchase request (non-balance transitions)
    pub fn put_purchase(&self, request: &PurchaseRequest) -> Result<()> {
        self.storage.put_purchase(request)
    }

    /// Approximate record counts
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_ledger() -> (CoinLedger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (CoinLedger::open(config).unwrap(), temp_dir)
    }

    #[test]
    fn test_create_and_get_account() {
        let (ledger, _temp) = test_ledger();

        let id = Uuid::new_v4();
        let account = ledger.create_account(id).unwrap();
        assert_eq!(account.coins, 0);

        let retrieved = ledger.get_account(id).unwrap();
        assert_eq!(retrieved.account_id, id);

        // Second create refused
        assert!(matches!(
            ledger.create_account(id),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_apply_credit_then_debit() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        let applied = ledger
            .apply(EntryDraft::new(id, EntryKind::AdminCredit, 100), None)
            .unwrap();
        assert_eq!(applied.entry.balance_before, 0);
        assert_eq!(applied.entry.balance_after, 100);
        assert_eq!(applied.account.coins, 100);

        let applied = ledger
            .apply(EntryDraft::new(id, EntryKind::PurchaseDebit, -40), None)
            .unwrap();
        assert_eq!(applied.entry.balance_before, 100);
        assert_eq!(applied.entry.balance_after, 60);
    }

    #[test]
    fn test_insufficient_balance_leaves_no_trace() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        ledger
            .apply(EntryDraft::new(id, EntryKind::AdminCredit, 100), None)
            .unwrap();

        let result = ledger.apply(EntryDraft::new(id, EntryKind::PurchaseDebit, -500), None);
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));

        let account = ledger.get_account(id).unwrap();
        assert_eq!(account.coins, 100);
        let entries = ledger.entries_for_account(id, &EntryFilter::default()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        let result = ledger.apply(EntryDraft::new(id, EntryKind::AdminCredit, 0), None);
        assert!(matches!(result, Err(Error::InvalidEntry(_))));
    }

    #[test]
    fn test_overflowing_amount_rejected() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        ledger
            .apply(EntryDraft::new(id, EntryKind::AdminCredit, i64::MAX), None)
            .unwrap();

        // A further credit would wrap the balance
        let result = ledger.apply(EntryDraft::new(id, EntryKind::AdminCredit, 1), None);
        assert!(matches!(result, Err(Error::InvalidEntry(_))));

        let account = ledger.get_account(id).unwrap();
        assert_eq!(account.coins, i64::MAX);
        let entries = ledger.entries_for_account(id, &EntryFilter::default()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_underflowing_debit_rejected() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        // i64::MIN cannot be negated; the floor check must refuse it
        // without panicking on the required-coins computation
        let result = ledger.apply(EntryDraft::new(id, EntryKind::WithdrawalDebit, i64::MIN), None);
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert_eq!(ledger.get_account(id).unwrap().coins, 0);
    }

    #[test]
    fn test_code_redemption_unique_per_account() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        let draft = EntryDraft::new(id, EntryKind::CodeRedeemed, 5).with_code("WELCOME");
        ledger.apply(draft.clone(), None).unwrap();

        let result = ledger.apply(draft, None);
        assert!(matches!(result, Err(Error::AlreadyRedeemed { .. })));

        // A different account can still redeem the same code
        let other = Uuid::new_v4();
        ledger.create_account(other).unwrap();
        let draft = EntryDraft::new(other, EntryKind::CodeRedeemed, 5).with_code("WELCOME");
        ledger.apply(draft, None).unwrap();
    }

    #[test]
    fn test_redemption_without_code_rejected() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        let result = ledger.apply(EntryDraft::new(id, EntryKind::CodeRedeemed, 5), None);
        assert!(matches!(result, Err(Error::InvalidEntry(_))));
    }

    #[test]
    fn test_rolling_totals_classification() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        // Earnings count
        ledger
            .apply(
                EntryDraft::new(id, EntryKind::CodeRedeemed, 5).with_code("A"),
                None,
            )
            .unwrap();
        // Admin credits do not
        ledger
            .apply(EntryDraft::new(id, EntryKind::AdminCredit, 100), None)
            .unwrap();
        // Spend counts
        ledger
            .apply(EntryDraft::new(id, EntryKind::WithdrawalDebit, -50), None)
            .unwrap();
        // Refunds do not
        let account = ledger
            .apply(EntryDraft::new(id, EntryKind::Refund, 50), None)
            .unwrap()
            .account;

        assert_eq!(account.total_coins_earned, 5);
        assert_eq!(account.total_coins_spent, 50);
        assert_eq!(account.coins, 105);
    }

    #[test]
    fn test_reconciliation_invariant() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        ledger
            .apply(EntryDraft::new(id, EntryKind::AdminCredit, 1000), None)
            .unwrap();
        ledger
            .apply(EntryDraft::new(id, EntryKind::WithdrawalDebit, -300), None)
            .unwrap();
        ledger
            .apply(EntryDraft::new(id, EntryKind::Refund, 300), None)
            .unwrap();
        ledger
            .apply(EntryDraft::new(id, EntryKind::Penalty, -100), None)
            .unwrap();

        assert!(ledger.check_reconciliation(id).unwrap());
        assert_eq!(ledger.rebuild_balance(id).unwrap(), 900);
    }

    #[test]
    fn test_update_account_cannot_move_money() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        let result: Result<Account> = ledger.update_account(id, |account| {
            account.coins += 1_000_000;
            Ok(())
        });
        assert!(matches!(result, Err(Error::InvalidEntry(_))));

        assert_eq!(ledger.get_account(id).unwrap().coins, 0);
    }

    #[test]
    fn test_update_account_counters() {
        let (ledger, _temp) = test_ledger();
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();

        let account: Account = ledger
            .update_account::<Error, _>(id, |account| {
                account.completed_links += 1;
                account.links_today += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(account.completed_links, 1);
        assert_eq!(account.version, 2);
    }

    #[test]
    fn test_concurrent_applies_reconcile() {
        let (ledger, _temp) = test_ledger();
        let ledger = Arc::new(ledger);
        let id = Uuid::new_v4();
        ledger.create_account(id).unwrap();
        ledger
            .apply(EntryDraft::new(id, EntryKind::AdminCredit, 1000), None)
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    let delta = if i % 2 == 0 { 3 } else { -2 };
                    let kind = if delta > 0 {
                        EntryKind::GiftReceived
                    } else {
                        EntryKind::GiftSent
                    };
                    ledger.apply(EntryDraft::new(id, kind, delta), None).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(ledger.check_reconciliation(id).unwrap());
        let account = ledger.get_account(id).unwrap();
        assert_eq!(account.coins, 1000 + 4 * 10 * 3 - 4 * 10 * 2);
    }
}
