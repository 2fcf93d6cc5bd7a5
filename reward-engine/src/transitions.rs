//! Request state-machine transition tables
//!
//! Both lifecycles share the same shape: `Pending` can be picked up
//! (`Processing`) or cancelled by the holder; `Processing` ends in
//! success or a refunding failure. Terminal statuses admit nothing.

use coin_ledger::{PurchaseStatus, WithdrawalStatus};

/// Whether a withdrawal may move from `from` to `to`
pub fn withdrawal_allowed(from: WithdrawalStatus, to: WithdrawalStatus) -> bool {
    use WithdrawalStatus::*;
    matches!(
        (from, to),
        (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed) | (Processing, Rejected)
    )
}

/// Whether entering `to` refunds the withdrawal's coin cost
pub fn withdrawal_refunds(to: WithdrawalStatus) -> bool {
    matches!(to, WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled)
}

/// Whether a purchase may move from `from` to `to`
pub fn purchase_allowed(from: PurchaseStatus, to: PurchaseStatus) -> bool {
    use PurchaseStatus::*;
    matches!(
        (from, to),
        (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed) | (Processing, Failed)
    )
}

/// Whether entering `to` refunds the purchase's final cost
pub fn purchase_refunds(to: PurchaseStatus) -> bool {
    matches!(to, PurchaseStatus::Failed | PurchaseStatus::Cancelled)
}
