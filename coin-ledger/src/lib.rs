//! CoinVault Ledger Core
//!
//! Append-only coin ledger with per-account atomic balance application.
//!
//! # Architecture
//!
//! - **Single mutation path**: Every balance change funnels through
//!   [`CoinLedger::apply`], which records the immutable entry and the
//!   updated account state in one atomic batch
//! - **Per-account serialization**: A lock registry keyed by account ID
//!   serializes mutations on one account while leaving different
//!   accounts fully parallel
//! - **Durable uniqueness**: Code redemptions are deduplicated by a
//!   (account, code) key written with the entry, not by in-memory state
//!
//! # Invariants
//!
//! - Reconciliation: an account's `coins` always equals the sum of its
//!   entry amounts
//! - Append-only: entries are never modified or deleted
//! - Rolling totals: `total_coins_earned` / `total_coins_spent` are
//!   monotonically non-decreasing

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{Applied, CoinLedger};
pub use storage::{SideRecord, Storage};
pub use types::{
    Account, DeliveryTarget, EntryDraft, EntryFilter, EntryKind, EntryReference, ItemCategory,
    ItemDescriptor, ItemKind, LedgerEntry, Level, PurchaseRequest, PurchaseStatus, ReferenceKind,
    RequestMeta, StatusChange, WithdrawalRequest, WithdrawalStatus,
};
