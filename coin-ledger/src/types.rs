//! Core types for the coin ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (coins are integral, all math is i64)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reward level, ordered lowest to highest
///
/// Driven by cumulative completed links; grants a purchase/reward
/// discount that grows with the tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Level {
    /// Starting tier
    Bronze = 1,
    /// Second tier (10+ completed links)
    Gold = 2,
    /// Third tier (50+ completed links)
    Platinum = 3,
    /// Top tier (100+ completed links)
    Diamond = 4,
}

impl Level {
    /// Discount granted at this tier, in whole percent
    pub fn discount_percent(&self) -> i64 {
        match self {
            Level::Bronze => 0,
            Level::Gold => 5,
            Level::Platinum => 10,
            Level::Diamond => 15,
        }
    }

    /// Tier name
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Bronze => "bronze",
            Level::Gold => "gold",
            Level::Platinum => "platinum",
            Level::Diamond => "diamond",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account state, one per user
///
/// Owned exclusively by the ledger; mutated only through the atomic
/// apply primitive or the locked `update_account` path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID
    pub account_id: Uuid,

    /// Current spendable balance, never negative
    pub coins: i64,

    /// Lifetime coins earned (monotonically non-decreasing)
    pub total_coins_earned: i64,

    /// Lifetime coins spent (monotonically non-decreasing)
    pub total_coins_spent: i64,

    /// Reward tier
    pub level: Level,

    /// Lifetime completed links (monotonically non-decreasing)
    pub completed_links: u64,

    /// Links issued today (reset lazily on first access each day)
    pub links_today: u32,

    /// Calendar-day marker for the daily quota reset
    pub last_link_date: Option<DateTime<Utc>>,

    /// Optimistic-concurrency version, bumped on every persisted write
    pub version: u64,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a fresh account with a zero balance
    pub fn new(account_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            coins: 0,
            total_coins_earned: 0,
            total_coins_spent: 0,
            level: Level::Bronze,
            completed_links: 0,
            links_today: 0,
            last_link_date: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Reward for a completed ad link
    LinkReward = 1,
    /// Debit for a withdrawal submission
    WithdrawalDebit = 2,
    /// Debit on the sender side of a gift
    GiftSent = 3,
    /// Credit on the receiver side of a gift
    GiftReceived = 4,
    /// Credit for a redeemed code
    CodeRedeemed = 5,
    /// Debit for an item purchase
    PurchaseDebit = 6,
    /// Manual credit by an administrator
    AdminCredit = 7,
    /// Manual debit by an administrator
    AdminDebit = 8,
    /// Reversal of an earlier debit (rejected/cancelled/failed request)
    Refund = 9,
    /// Punitive debit
    Penalty = 10,
}

impl EntryKind {
    /// Whether a positive entry of this kind counts toward
    /// `total_coins_earned`
    ///
    /// Refunds and admin adjustments are deliberately excluded from the
    /// rolling totals.
    pub fn counts_as_earning(&self) -> bool {
        matches!(
            self,
            EntryKind::LinkReward | EntryKind::CodeRedeemed | EntryKind::GiftReceived
        )
    }

    /// Whether a negative entry of this kind counts toward
    /// `total_coins_spent`
    pub fn counts_as_spend(&self) -> bool {
        matches!(
            self,
            EntryKind::WithdrawalDebit | EntryKind::PurchaseDebit | EntryKind::GiftSent
        )
    }
}

/// Tag identifying what a ledger entry references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReferenceKind {
    /// Withdrawal request
    Withdrawal = 1,
    /// Purchase request
    Purchase = 2,
    /// Gift transfer
    Gift = 3,
    /// Redemption code
    Code = 4,
    /// Support ticket
    Ticket = 5,
    /// Another account (gifts, admin actions)
    Account = 6,
}

/// Reference from a ledger entry to a related entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReference {
    /// What kind of entity is referenced
    pub kind: ReferenceKind,
    /// Identity of the referenced entity (request id, code string, ...)
    pub id: String,
}

impl EntryReference {
    /// Reference a related entity
    pub fn new(kind: ReferenceKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// Request-origin metadata recorded alongside an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Origin address
    pub ip_address: Option<String>,
    /// Client identifier
    pub user_agent: Option<String>,
}

/// Immutable record of one balance-affecting event
///
/// Invariant: `balance_after == balance_before + amount`, always.
/// Ordering a given account's entries by timestamp and summing `amount`
/// from zero reproduces the account's current balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Account this entry belongs to
    pub account_id: Uuid,

    /// Kind of event
    pub kind: EntryKind,

    /// Signed balance delta
    pub amount: i64,

    /// Balance immediately before the delta was applied
    pub balance_before: i64,

    /// Balance immediately after
    pub balance_after: i64,

    /// Human-readable description
    pub description: Option<String>,

    /// Related entity, if any
    pub reference: Option<EntryReference>,

    /// Redemption code (set only for `CodeRedeemed` entries; backs the
    /// per-(account, code) uniqueness index)
    pub code: Option<String>,

    /// Request-origin metadata
    pub meta: Option<RequestMeta>,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

/// Draft of a ledger entry before balances are resolved
///
/// `balance_before`/`balance_after` are computed by the ledger at apply
/// time from the account's current state.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    /// Account to mutate
    pub account_id: Uuid,
    /// Kind of event
    pub kind: EntryKind,
    /// Signed balance delta
    pub amount: i64,
    /// Human-readable description
    pub description: Option<String>,
    /// Related entity, if any
    pub reference: Option<EntryReference>,
    /// Redemption code, for `CodeRedeemed` entries
    pub code: Option<String>,
    /// Request-origin metadata
    pub meta: Option<RequestMeta>,
    /// Lowest balance the resulting state may have (normally zero)
    pub min_balance: i64,
}

impl EntryDraft {
    /// New draft with no description, reference or metadata
    pub fn new(account_id: Uuid, kind: EntryKind, amount: i64) -> Self {
        Self {
            account_id,
            kind,
            amount,
            description: None,
            reference: None,
            code: None,
            meta: None,
            min_balance: 0,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a reference to a related entity
    pub fn with_reference(mut self, kind: ReferenceKind, id: impl Into<String>) -> Self {
        self.reference = Some(EntryReference::new(kind, id));
        self
    }

    /// Attach a redemption code (enforces per-account uniqueness)
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach request-origin metadata
    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Filters for account-history queries
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Restrict to these kinds (None = all)
    pub kinds: Option<Vec<EntryKind>>,
    /// Inclusive lower timestamp bound
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper timestamp bound
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of entries returned
    pub limit: Option<usize>,
}

impl EntryFilter {
    /// Whether an entry passes the kind and time filters
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&entry.kind) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp >= until {
                return false;
            }
        }
        true
    }
}

/// One recorded status transition of a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange<S> {
    /// Status entered
    pub status: S,
    /// Who drove the transition (None = the account holder / system)
    pub actor: Option<Uuid>,
    /// Why, if given
    pub reason: Option<String>,
    /// When
    pub timestamp: DateTime<Utc>,
}

/// Withdrawal request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WithdrawalStatus {
    /// Submitted, coins debited, awaiting processing
    Pending = 1,
    /// Picked up by a processor
    Processing = 2,
    /// Paid out (terminal)
    Completed = 3,
    /// Rejected, coins refunded (terminal)
    Rejected = 4,
    /// Cancelled before processing, coins refunded (terminal)
    Cancelled = 5,
}

impl WithdrawalStatus {
    /// Whether no further transition is permitted
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled
        )
    }

    /// Status name
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Robux withdrawal request
///
/// Created in `Pending` with the coin cost already debited; never
/// deleted, only ended in a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Request ID
    pub request_id: Uuid,

    /// Requesting account
    pub account_id: Uuid,

    /// Robux to pay out
    pub robux_amount: i64,

    /// Coins debited at submission
    pub coin_cost: i64,

    /// Destination claim link
    pub gamepass_link: String,

    /// Current status
    pub status: WithdrawalStatus,

    /// Ordered status-history audit log
    pub status_history: Vec<StatusChange<WithdrawalStatus>>,

    /// Processor who moved the request out of `Pending`
    pub processed_by: Option<Uuid>,

    /// When the terminal status was reached
    pub processed_at: Option<DateTime<Utc>>,

    /// Reason, when rejected
    pub rejection_reason: Option<String>,

    /// Submission time plus the configured SLA window, informational
    pub estimated_completion: DateTime<Utc>,

    /// Request-origin metadata
    pub meta: Option<RequestMeta>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Purchase request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PurchaseStatus {
    /// Submitted, coins debited, awaiting processing
    Pending = 1,
    /// Picked up by a processor
    Processing = 2,
    /// Delivered (terminal)
    Completed = 3,
    /// Delivery failed, coins refunded (terminal)
    Failed = 4,
    /// Cancelled before processing, coins refunded (terminal)
    Cancelled = 5,
}

impl PurchaseStatus {
    /// Whether no further transition is permitted
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseStatus::Completed | PurchaseStatus::Failed | PurchaseStatus::Cancelled
        )
    }

    /// Status name
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Processing => "processing",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of purchasable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ItemKind {
    /// Fixed catalog item
    Fixed = 1,
    /// Random drop
    Random = 2,
    /// Anything else
    Other = 3,
}

/// Item category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ItemCategory {
    /// Character
    Character = 1,
    /// Vehicle
    Vehicle = 2,
    /// Pet
    Pet = 3,
    /// Bundle of several items
    Bundle = 4,
    /// Limited seasonal item
    Seasonal = 5,
}

/// What is being bought, and its list price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Item name
    pub name: String,
    /// Kind
    pub kind: ItemKind,
    /// Category, if classified
    pub category: Option<ItemCategory>,
    /// List price in coins, before any level discount
    pub coin_cost: i64,
}

/// Credentials of the delivery-target game account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryTarget {
    /// Target username
    pub username: String,
    /// Target credential
    pub credential: String,
}

/// Virtual-item purchase request
///
/// Lifecycle mirrors [`WithdrawalRequest`]; the discounted `final_cost`
/// is debited atomically at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Request ID
    pub request_id: Uuid,

    /// Requesting account
    pub account_id: Uuid,

    /// Item being bought
    pub item: ItemDescriptor,

    /// Level discount applied, in whole percent
    pub discount_applied: i64,

    /// Coins debited at submission (list price minus discount, floored)
    pub final_cost: i64,

    /// Where to deliver
    pub delivery: DeliveryTarget,

    /// Current status
    pub status: PurchaseStatus,

    /// Ordered status-history audit log
    pub status_history: Vec<StatusChange<PurchaseStatus>>,

    /// Processor who moved the request out of `Pending`
    pub processed_by: Option<Uuid>,

    /// When the terminal status was reached
    pub processed_at: Option<DateTime<Utc>>,

    /// Processing notes
    pub admin_notes: Option<String>,

    /// Whether delivery was fulfilled
    pub fulfilled: bool,

    /// Identifier of the delivered item, once fulfilled
    pub delivered_item_id: Option<String>,

    /// Request-origin metadata
    pub meta: Option<RequestMeta>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Bronze < Level::Gold);
        assert!(Level::Gold < Level::Platinum);
        assert!(Level::Platinum < Level::Diamond);
    }

    #[test]
    fn test_level_discounts() {
        assert_eq!(Level::Bronze.discount_percent(), 0);
        assert_eq!(Level::Gold.discount_percent(), 5);
        assert_eq!(Level::Platinum.discount_percent(), 10);
        assert_eq!(Level::Diamond.discount_percent(), 15);
    }

    #[test]
    fn test_entry_kind_classification() {
        assert!(EntryKind::CodeRedeemed.counts_as_earning());
        assert!(EntryKind::GiftReceived.counts_as_earning());
        assert!(!EntryKind::Refund.counts_as_earning());
        assert!(!EntryKind::AdminCredit.counts_as_earning());

        assert!(EntryKind::WithdrawalDebit.counts_as_spend());
        assert!(EntryKind::PurchaseDebit.counts_as_spend());
        assert!(!EntryKind::Penalty.counts_as_spend());
        assert!(!EntryKind::AdminDebit.counts_as_spend());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(!WithdrawalStatus::Processing.is_terminal());
        assert!(WithdrawalStatus::Completed.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
        assert!(WithdrawalStatus::Cancelled.is_terminal());

        assert!(!PurchaseStatus::Pending.is_terminal());
        assert!(PurchaseStatus::Failed.is_terminal());
    }

    #[test]
    fn test_entry_filter() {
        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id: Uuid::new_v4(),
            kind: EntryKind::CodeRedeemed,
            amount: 5,
            balance_before: 0,
            balance_after: 5,
            description: None,
            reference: None,
            code: Some("ABC".to_string()),
            meta: None,
            timestamp: Utc::now(),
        };

        assert!(EntryFilter::default().matches(&entry));

        let kind_filter = EntryFilter {
            kinds: Some(vec![EntryKind::Refund]),
            ..Default::default()
        };
        assert!(!kind_filter.matches(&entry));

        let until_filter = EntryFilter {
            until: Some(entry.timestamp),
            ..Default::default()
        };
        assert!(!until_filter.matches(&entry));
    }
}
