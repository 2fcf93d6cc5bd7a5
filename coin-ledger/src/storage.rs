//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Current account state (key: account_id)
//! - `entries` - Append-only ledger entries (key: entry_id)
//! - `entry_index` - History index (key: account_id || timestamp || entry_id)
//! - `redemptions` - Uniqueness index (key: account_id || code)
//! - `withdrawals` - Withdrawal requests (key: request_id)
//! - `purchases` - Purchase requests (key: request_id)

use crate::{
    error::{Error, Result},
    types::{Account, EntryFilter, EntryKind, LedgerEntry, PurchaseRequest, WithdrawalRequest},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_ENTRIES: &str = "entries";
const CF_ENTRY_INDEX: &str = "entry_index";
const CF_REDEMPTIONS: &str = "redemptions";
const CF_WITHDRAWALS: &str = "withdrawals";
const CF_PURCHASES: &str = "purchases";

/// Request record committed in the same batch as a ledger entry
#[derive(Debug, Clone, Copy)]
pub enum SideRecord<'a> {
    /// Withdrawal request created or updated with this entry
    Withdrawal(&'a WithdrawalRequest),
    /// Purchase request created or updated with this entry
    Purchase(&'a PurchaseRequest),
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for append-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_ENTRY_INDEX, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_REDEMPTIONS, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_WITHDRAWALS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_PURCHASES, Self::cf_options_state()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // State is frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups on the redemption index benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Account operations

    /// Store account state
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = bincode::serialize(account)?;
        self.db.put_cf(cf, account.account_id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get account by ID
    pub fn get_account(&self, account_id: Uuid) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = self
            .db
            .get_cf(cf, account_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("account {}", account_id)))?;
        let account: Account = bincode::deserialize(&value)?;
        Ok(account)
    }

    /// Whether an account exists
    pub fn account_exists(&self, account_id: Uuid) -> Result<bool> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        Ok(self.db.get_cf(cf, account_id.as_bytes())?.is_some())
    }

    // Entry operations

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("entry {}", entry_id)))?;
        let entry: LedgerEntry = bincode::deserialize(&value)?;
        Ok(entry)
    }

    /// Get an account's entries ordered by timestamp ascending
    pub fn entries_for_account(
        &self,
        account_id: Uuid,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_index = self.cf_handle(CF_ENTRY_INDEX)?;
        let prefix = account_id.as_bytes().to_vec();

        let iter = self
            .db
            .iterator_cf(cf_index, IteratorMode::From(&prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            // Key layout: account_id(16) || timestamp_nanos(8) || entry_id(16)
            if key.len() != 40 {
                continue;
            }
            let entry_id_bytes: [u8; 16] = key[24..40]
                .try_into()
                .map_err(|_| Error::Storage("malformed entry index key".to_string()))?;
            let entry = self.get_entry(Uuid::from_bytes(entry_id_bytes))?;

            if !filter.matches(&entry) {
                continue;
            }
            entries.push(entry);

            if let Some(limit) = filter.limit {
                if entries.len() >= limit {
                    break;
                }
            }
        }

        Ok(entries)
    }

    /// Whether a (account, code) redemption entry exists
    pub fn redemption_exists(&self, account_id: Uuid, code: &str) -> Result<bool> {
        let cf = self.cf_handle(CF_REDEMPTIONS)?;
        let key = Self::redemption_key(account_id, code);
        Ok(self.db.get_cf(cf, &key)?.is_some())
    }

    // Atomic apply

    /// Commit entry + index + account state + optional side record in one batch
    ///
    /// Guards on the account's version: the stored version must be exactly
    /// one behind the version being written, otherwise the write is refused
    /// with `Conflict` and nothing lands.
    pub fn apply_atomic(
        &self,
        entry: &LedgerEntry,
        account: &Account,
        side: Option<SideRecord<'_>>,
    ) -> Result<()> {
        let stored = self.get_account(account.account_id)?;
        if stored.version + 1 != account.version {
            return Err(Error::Conflict(format!(
                "account {} version moved from {} (expected {})",
                account.account_id,
                stored.version,
                account.version - 1
            )));
        }

        let mut batch = WriteBatch::default();

        // 1. Entry
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        batch.put_cf(cf_entries, entry.entry_id.as_bytes(), bincode::serialize(entry)?);

        // 2. History index: account_id || timestamp_nanos || entry_id
        let cf_index = self.cf_handle(CF_ENTRY_INDEX)?;
        batch.put_cf(cf_index, Self::entry_index_key(entry), b"");

        // 3. Redemption uniqueness key
        if entry.kind == EntryKind::CodeRedeemed {
            let code = entry
                .code
                .as_deref()
                .ok_or_else(|| Error::InvalidEntry("CodeRedeemed entry without code".to_string()))?;
            let cf_redemptions = self.cf_handle(CF_REDEMPTIONS)?;
            batch.put_cf(
                cf_redemptions,
                Self::redemption_key(entry.account_id, code),
                entry.entry_id.as_bytes(),
            );
        }

        // 4. Account state
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(cf_accounts, account.account_id.as_bytes(), bincode::serialize(account)?);

        // 5. Side record (withdrawal/purchase created or updated with this entry)
        match side {
            Some(SideRecord::Withdrawal(request)) => {
                let cf = self.cf_handle(CF_WITHDRAWALS)?;
                batch.put_cf(cf, request.request_id.as_bytes(), bincode::serialize(request)?);
            }
            Some(SideRecord::Purchase(request)) => {
                let cf = self.cf_handle(CF_PURCHASES)?;
                batch.put_cf(cf, request.request_id.as_bytes(), bincode::serialize(request)?);
            }
            None => {}
        }

        self.db.write(batch)?;

        tracing::debug!(
            entry_id = %entry.entry_id,
            account_id = %entry.account_id,
            kind = ?entry.kind,
            amount = entry.amount,
            balance_after = entry.balance_after,
            "Entry applied"
        );

        Ok(())
    }

    // Request operations

    /// Store withdrawal request
    pub fn put_withdrawal(&self, request: &WithdrawalRequest) -> Result<()> {
        let cf = self.cf_handle(CF_WITHDRAWALS)?;
        let value = bincode::serialize(request)?;
        self.db.put_cf(cf, request.request_id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get withdrawal request by ID
    pub fn get_withdrawal(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        let cf = self.cf_handle(CF_WITHDRAWALS)?;
        let value = self
            .db
            .get_cf(cf, request_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("withdrawal {}", request_id)))?;
        let request: WithdrawalRequest = bincode::deserialize(&value)?;
        Ok(request)
    }

    /// Store purchase request
    pub fn put_purchase(&self, request: &PurchaseRequest) -> Result<()> {
        let cf = self.cf_handle(CF_PURCHASES)?;
        let value = bincode::serialize(request)?;
        self.db.put_cf(cf, request.request_id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get purchase request by ID
    pub fn get_purchase(&self, request_id: Uuid) -> Result<PurchaseRequest> {
        let cf = self.cf_handle(CF_PURCHASES)?;
        let value = self
            .db
            .get_cf(cf, request_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("purchase {}", request_id)))?;
        let request: PurchaseRequest = bincode::deserialize(&value)?;
        Ok(request)
    }

    // Key helpers

    fn entry_index_key(entry: &LedgerEntry) -> Vec<u8> {
        let mut key = entry.account_id.as_bytes().to_vec();
        let nanos = entry.timestamp.timestamp_nanos_opt().unwrap_or(0);
        key.extend_from_slice(&nanos.to_be_bytes());
        key.extend_from_slice(entry.entry_id.as_bytes());
        key
    }

    fn redemption_key(account_id: Uuid, code: &str) -> Vec<u8> {
        let mut key = account_id.as_bytes().to_vec();
        key.extend_from_slice(code.as_bytes());
        key
    }

    // Statistics

    /// Approximate record counts
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_accounts: self.approximate_count(CF_ACCOUNTS)?,
            total_entries: self.approximate_count(CF_ENTRIES)?,
            total_withdrawals: self.approximate_count(CF_WITHDRAWALS)?,
            total_purchases: self.approximate_count(CF_PURCHASES)?,
        })
    }

    fn approximate_count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(prop)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate account count
    pub total_accounts: u64,
    /// Approximate entry count
    pub total_entries: u64,
    /// Approximate withdrawal-request count
    pub total_withdrawals: u64,
    /// Approximate purchase-request count
    pub total_purchases: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_entry(account_id: Uuid, amount: i64, before: i64) -> LedgerEntry {
        LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id,
            kind: EntryKind::CodeRedeemed,
            amount,
            balance_before: before,
            balance_after: before + amount,
            description: None,
            reference: None,
            code: Some(format!("CODE-{}", Uuid::new_v4())),
            meta: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_storage_open() {
        let (storage, _temp) = test_storage();
        assert!(storage.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(storage.db.cf_handle(CF_ENTRIES).is_some());
        assert!(storage.db.cf_handle(CF_REDEMPTIONS).is_some());
    }

    #[test]
    fn test_put_and_get_account() {
        let (storage, _temp) = test_storage();

        let account = Account::new(Uuid::new_v4());
        storage.put_account(&account).unwrap();

        let retrieved = storage.get_account(account.account_id).unwrap();
        assert_eq!(retrieved.account_id, account.account_id);
        assert_eq!(retrieved.coins, 0);
        assert_eq!(retrieved.version, 1);
    }

    #[test]
    fn test_get_missing_account() {
        let (storage, _temp) = test_storage();
        let result = storage.get_account(Uuid::new_v4());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_apply_atomic_writes_everything() {
        let (storage, _temp) = test_storage();

        let mut account = Account::new(Uuid::new_v4());
        storage.put_account(&account).unwrap();

        let entry = test_entry(account.account_id, 5, 0);
        account.coins = 5;
        account.version = 2;

        storage.apply_atomic(&entry, &account, None).unwrap();

        let stored = storage.get_account(account.account_id).unwrap();
        assert_eq!(stored.coins, 5);

        let entries = storage
            .entries_for_account(account.account_id, &EntryFilter::default())
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_id, entry.entry_id);

        assert!(storage
            .redemption_exists(account.account_id, entry.code.as_deref().unwrap())
            .unwrap());
    }

    #[test]
    fn test_apply_atomic_version_guard() {
        let (storage, _temp) = test_storage();

        let mut account = Account::new(Uuid::new_v4());
        storage.put_account(&account).unwrap();

        let entry = test_entry(account.account_id, 5, 0);
        account.coins = 5;
        account.version = 3; // Skips a version

        let result = storage.apply_atomic(&entry, &account, None);
        assert!(matches!(result, Err(Error::Conflict(_))));

        // Nothing landed
        let stored = storage.get_account(account.account_id).unwrap();
        assert_eq!(stored.coins, 0);
        let entries = storage
            .entries_for_account(account.account_id, &EntryFilter::default())
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_entries_ordered_by_timestamp() {
        let (storage, _temp) = test_storage();

        let mut account = Account::new(Uuid::new_v4());
        storage.put_account(&account).unwrap();

        let mut balance = 0;
        for amount in [5, 3, 7] {
            let entry = test_entry(account.account_id, amount, balance);
            balance += amount;
            account.coins = balance;
            account.version += 1;
            storage.apply_atomic(&entry, &account, None).unwrap();
        }

        let entries = storage
            .entries_for_account(account.account_id, &EntryFilter::default())
            .unwrap();
        assert_eq!(entries.len(), 3);
        for pair in entries.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        // Chained balances
        assert_eq!(entries[0].balance_after, entries[1].balance_before);
        assert_eq!(entries[1].balance_after, entries[2].balance_before);
    }

    #[test]
    fn test_entry_filter_limit() {
        let (storage, _temp) = test_storage();

        let mut account = Account::new(Uuid::new_v4());
        storage.put_account(&account).unwrap();

        let mut balance = 0;
        for _ in 0..5 {
            let entry = test_entry(account.account_id, 1, balance);
            balance += 1;
            account.coins = balance;
            account.version += 1;
            storage.apply_atomic(&entry, &account, None).unwrap();
        }

        let filter = EntryFilter {
            limit: Some(2),
            ..Default::default()
        };
        let entries = storage.entries_for_account(account.account_id, &filter).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_withdrawal_roundtrip() {
        let (storage, _temp) = test_storage();

        let request = WithdrawalRequest {
            request_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            robux_amount: 40,
            coin_cost: 1000,
            gamepass_link: "https://example.com/gamepass/123".to_string(),
            status: crate::types::WithdrawalStatus::Pending,
            status_history: vec![],
            processed_by: None,
            processed_at: None,
            rejection_reason: None,
            estimated_completion: Utc::now(),
            meta: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        storage.put_withdrawal(&request).unwrap();
        let retrieved = storage.get_withdrawal(request.request_id).unwrap();
        assert_eq!(retrieved.coin_cost, 1000);
        assert_eq!(retrieved.status, crate::types::WithdrawalStatus::Pending);
    }
}
